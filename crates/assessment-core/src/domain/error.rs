//! Domain-level error taxonomy for assessment provisioning.
//!
//! Only conditions that stop a whole run are errors. Unmatched org units and
//! failed templates are reported as data (`Confidence::None`,
//! `ProvisionStatus::Failed`).

use assessment_remote::RemoteError;

/// Assessment domain errors.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("invalid provisioning request: {0}")]
    InvalidRequest(String),

    #[error("a provisioning run is already active for assessment '{assessment}'")]
    SessionBusy { assessment: String },

    #[error("existing metadata snapshot failed for {kind}: {source}")]
    Snapshot {
        kind: assessment_remote::ObjectKind,
        #[source]
        source: RemoteError,
    },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type for assessment domain operations.
pub type Result<T> = std::result::Result<T, AssessmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_error_display() {
        let err = AssessmentError::InvalidRequest("assessment name is empty".to_string());
        assert!(err.to_string().contains("invalid provisioning request"));

        let err = AssessmentError::SessionBusy {
            assessment: "Malaria 2026".to_string(),
        };
        assert!(err.to_string().contains("Malaria 2026"));
    }

    #[test]
    fn test_remote_error_converts() {
        let err: AssessmentError = RemoteError::Http("connection refused".to_string()).into();
        assert!(err.to_string().contains("remote error"));
        assert!(err.to_string().contains("connection refused"));
    }
}
