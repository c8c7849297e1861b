//! Error types for assessment-remote

use thiserror::Error;

use crate::schema::ObjectKind;

/// Errors that can occur when talking to the remote metadata system
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, TLS, timeout set by the client)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The remote system refused the object (validation, uniqueness, permissions)
    #[error("{kind} rejected by remote: {message}")]
    Rejected { kind: ObjectKind, message: String },

    /// Response body could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Client configuration is missing required values
    #[error("Remote client not configured: {0}")]
    NotConfigured(String),
}

impl RemoteError {
    /// Whether the remote answered and refused, as opposed to never answering.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RemoteError::Rejected { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Deserialization(err.to_string())
        } else {
            RemoteError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error_displays_kind_and_message() {
        let err = RemoteError::Rejected {
            kind: ObjectKind::DataElement,
            message: "Property `code` must be unique".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data element"));
        assert!(msg.contains("must be unique"));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_http_error_is_not_rejection() {
        let err = RemoteError::Http("connection reset".to_string());
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("connection reset"));
    }
}
