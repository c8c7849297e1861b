//! HTTP client for a DHIS2-style metadata web API
//!
//! Endpoints used:
//! - `GET  /api/{collection}?fields=id,name,code,shortName,lastUpdated&paging=false&filter=...`
//! - `POST /api/{collection}` (single create, web-message response with `response.uid`)
//! - `POST /api/metadata?importStrategy=CREATE_AND_UPDATE&atomicMode=NONE` (bulk import)
//!
//! Authentication is HTTP basic. Timeouts and retries are left to the
//! `reqwest::Client` handed in by the caller.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::RemoteError;
use crate::schema::*;
use crate::store::{MetadataStore, RemoteResult};

const QUERY_FIELDS: &str = "id,name,code,shortName,lastUpdated";

/// Connection settings for the remote metadata API
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the instance (e.g., "https://play.example.org/dhis")
    pub base_url: String,
    /// Basic-auth username
    pub username: String,
    /// Basic-auth password
    pub password: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl RemoteConfig {
    /// Create a new configuration for the given instance and credentials
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            user_agent: format!("assessment-remote/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set a custom user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - ASSESS_REMOTE_URL (required)
    /// - ASSESS_REMOTE_USERNAME (required)
    /// - ASSESS_REMOTE_PASSWORD (required)
    pub fn from_env() -> Result<Self, RemoteError> {
        let base_url = std::env::var("ASSESS_REMOTE_URL")
            .map_err(|_| RemoteError::NotConfigured("ASSESS_REMOTE_URL not set".to_string()))?;
        let username = std::env::var("ASSESS_REMOTE_USERNAME").map_err(|_| {
            RemoteError::NotConfigured("ASSESS_REMOTE_USERNAME not set".to_string())
        })?;
        let password = std::env::var("ASSESS_REMOTE_PASSWORD").map_err(|_| {
            RemoteError::NotConfigured("ASSESS_REMOTE_PASSWORD not set".to_string())
        })?;
        Ok(Self::new(base_url, username, password))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// `MetadataStore` backed by the remote web API
pub struct HttpMetadataStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpMetadataStore {
    /// Build a store with a default `reqwest::Client`.
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { config, client })
    }

    /// Build a store around a caller-configured client (timeouts, proxies).
    pub fn with_client(config: RemoteConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> RemoteResult<(u16, Value)> {
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, body))
    }
}

/// Render a `QueryFilter` as the API's `filter` query parameter.
pub fn filter_param(filter: &QueryFilter) -> Option<String> {
    match filter {
        QueryFilter::All => None,
        QueryFilter::CodeEq(code) => Some(format!("code:eq:{}", code)),
        QueryFilter::NameContains(part) => Some(format!("name:ilike:{}", part)),
    }
}

#[derive(Debug, Deserialize)]
struct WebMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<WebMessageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebMessageResponse {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    error_reports: Vec<ErrorReport>,
}

#[derive(Debug, Deserialize)]
struct ErrorReport {
    message: String,
}

/// Extract the created uid from a single-create response, or the reason it failed.
pub fn parse_create_response(kind: ObjectKind, status: u16, body: &Value) -> RemoteResult<String> {
    let message: WebMessage = serde_json::from_value(body.clone()).unwrap_or(WebMessage {
        message: None,
        response: None,
    });
    let reports: Vec<String> = message
        .response
        .as_ref()
        .map(|r| r.error_reports.iter().map(|e| e.message.clone()).collect())
        .unwrap_or_default();

    if (200..300).contains(&status) && reports.is_empty() {
        if let Some(uid) = message.response.and_then(|r| r.uid) {
            return Ok(uid);
        }
        return Err(RemoteError::Deserialization(
            "create response carried no uid".to_string(),
        ));
    }

    let reason = if reports.is_empty() {
        message
            .message
            .unwrap_or_else(|| format!("HTTP status {}", status))
    } else {
        reports.join("; ")
    };
    Err(RemoteError::Rejected {
        kind,
        message: reason,
    })
}

/// Translate a bulk import response into an `ImportReport`.
pub fn parse_import_report(body: &Value) -> RemoteResult<ImportReport> {
    // Newer servers wrap the report in a web message under `response`.
    let report = if body.get("typeReports").is_some() || body.get("stats").is_some() {
        body
    } else {
        body.get("response").unwrap_or(body)
    };

    let status = match report.get("status").and_then(Value::as_str) {
        Some("OK") => ImportStatus::Ok,
        Some("WARNING") => ImportStatus::Warning,
        Some("ERROR") => ImportStatus::Error,
        other => {
            return Err(RemoteError::Deserialization(format!(
                "unknown import status: {:?}",
                other
            )))
        }
    };

    let mut data_elements = KindStats::default();
    let mut data_sets = KindStats::default();
    let mut errors = Vec::new();

    let type_reports = report
        .get("typeReports")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for type_report in &type_reports {
        let klass = type_report.get("klass").and_then(Value::as_str).unwrap_or("");
        let kind = if klass.ends_with(".DataElement") {
            ObjectKind::DataElement
        } else if klass.ends_with(".DataSet") {
            ObjectKind::DataSet
        } else {
            debug!(klass, "ignoring type report for unrelated class");
            continue;
        };

        let stats = type_report.get("stats").cloned().unwrap_or(Value::Null);
        let counts = KindStats {
            created: read_count(&stats, "created"),
            updated: read_count(&stats, "updated"),
            ignored: read_count(&stats, "ignored"),
        };
        match kind {
            ObjectKind::DataElement => data_elements = counts,
            ObjectKind::DataSet => data_sets = counts,
        }

        for object_report in type_report
            .get("objectReports")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let id = object_report
                .get("uid")
                .and_then(Value::as_str)
                .map(str::to_string);
            for error in object_report
                .get("errorReports")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                errors.push(ObjectError {
                    kind,
                    id: id.clone(),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unspecified import error")
                        .to_string(),
                });
            }
        }
    }

    Ok(ImportReport {
        status,
        data_elements,
        data_sets,
        errors,
    })
}

fn read_count(stats: &Value, field: &str) -> u32 {
    stats
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    #[instrument(skip(self), fields(collection = kind.collection()))]
    async fn query(&self, kind: ObjectKind, filter: &QueryFilter) -> RemoteResult<Vec<RemoteObject>> {
        let mut params = vec![
            ("fields", QUERY_FIELDS.to_string()),
            ("paging", "false".to_string()),
        ];
        if let Some(filter) = filter_param(filter) {
            params.push(("filter", filter));
        }
        let request = self
            .client
            .get(self.config.api_url(kind.collection()))
            .query(&params);
        let (status, body) = self.send_json(request).await?;
        if !(200..300).contains(&status) {
            return Err(RemoteError::Http(format!(
                "query {} returned HTTP {}",
                kind.collection(),
                status
            )));
        }

        let items = body
            .get(kind.collection())
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let objects: Vec<RemoteObject> = serde_json::from_value(items)?;
        debug!(count = objects.len(), "query returned objects");
        Ok(objects)
    }

    #[instrument(skip(self, payload), fields(kind = %payload.kind(), code = payload.code()))]
    async fn create(&self, payload: &ObjectPayload) -> RemoteResult<String> {
        let kind = payload.kind();
        let request = self
            .client
            .post(self.config.api_url(kind.collection()))
            .json(payload);
        let (status, body) = self.send_json(request).await?;
        let result = parse_create_response(kind, status, &body);
        if let Err(e) = &result {
            warn!(error = %e, "create refused");
        }
        result
    }

    #[instrument(skip(self, payload), fields(objects = payload.len()))]
    async fn bulk_import(&self, payload: &MetadataPayload) -> RemoteResult<ImportReport> {
        let request = self
            .client
            .post(self.config.api_url("metadata"))
            .query(&[
                ("importStrategy", "CREATE_AND_UPDATE"),
                ("atomicMode", "NONE"),
            ])
            .json(payload);
        let (status, body) = self.send_json(request).await?;
        if body.is_null() {
            return Err(RemoteError::Http(format!(
                "metadata import returned HTTP {} with empty body",
                status
            )));
        }
        parse_import_report(&body)
    }
}
