//! Wire schema for the remote metadata API
//!
//! Objects:
//! - `DataElementPayload` / `DataSetPayload`: create bodies
//! - `RemoteObject`: the slim projection returned by queries
//! - `MetadataPayload` / `ImportReport`: bulk import request and response
//!
//! Field names follow the remote API's camelCase conventions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of remote metadata object handled by this toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    DataElement,
    DataSet,
}

impl ObjectKind {
    /// Collection name used in API paths and bulk payload keys.
    pub fn collection(&self) -> &'static str {
        match self {
            ObjectKind::DataElement => "dataElements",
            ObjectKind::DataSet => "dataSets",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::DataElement => write!(f, "data element"),
            ObjectKind::DataSet => write!(f, "dataset"),
        }
    }
}

/// Reference to another object by id (`{"id": "..."}` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Create body for a data element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElementPayload {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub code: String,
    pub description: String,
    pub value_type: String,
    pub aggregation_type: String,
    pub domain_type: String,
    pub category_combo: IdRef,
    pub public_access: String,
}

/// Membership of a data element in a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetElement {
    pub data_element: IdRef,
}

/// Create body for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetPayload {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub code: String,
    pub description: String,
    pub period_type: String,
    pub category_combo: IdRef,
    pub data_set_elements: Vec<DataSetElement>,
    pub organisation_units: Vec<IdRef>,
    pub public_access: String,
}

/// A create request for a single object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectPayload {
    DataElement(DataElementPayload),
    DataSet(DataSetPayload),
}

impl ObjectPayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectPayload::DataElement(_) => ObjectKind::DataElement,
            ObjectPayload::DataSet(_) => ObjectKind::DataSet,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ObjectPayload::DataElement(p) => &p.id,
            ObjectPayload::DataSet(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ObjectPayload::DataElement(p) => &p.name,
            ObjectPayload::DataSet(p) => &p.name,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ObjectPayload::DataElement(p) => &p.code,
            ObjectPayload::DataSet(p) => &p.code,
        }
    }

    /// Replace the generated code (used when retrying after a collision).
    pub fn set_code(&mut self, code: String) {
        match self {
            ObjectPayload::DataElement(p) => p.code = code,
            ObjectPayload::DataSet(p) => p.code = code,
        }
    }

    pub fn short_name(&self) -> &str {
        match self {
            ObjectPayload::DataElement(p) => &p.short_name,
            ObjectPayload::DataSet(p) => &p.short_name,
        }
    }

    /// Replace the short name (it carries the code, so it changes with it).
    pub fn set_short_name(&mut self, short_name: String) {
        match self {
            ObjectPayload::DataElement(p) => p.short_name = short_name,
            ObjectPayload::DataSet(p) => p.short_name = short_name,
        }
    }
}

/// Slim projection of an existing remote object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Query filter understood by every `MetadataStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Every object of the kind
    All,
    /// Exact code equality
    CodeEq(String),
    /// Case-insensitive substring of the name
    NameContains(String),
}

/// Bulk import body: only the objects that need creating
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_elements: Vec<DataElementPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sets: Vec<DataSetPayload>,
}

impl MetadataPayload {
    pub fn is_empty(&self) -> bool {
        self.data_elements.is_empty() && self.data_sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data_elements.len() + self.data_sets.len()
    }
}

/// Overall outcome reported by a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Ok,
    Warning,
    Error,
}

/// Per-kind create/update counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub created: u32,
    pub updated: u32,
    pub ignored: u32,
}

/// A single object rejected by a bulk import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectError {
    pub kind: ObjectKind,
    pub id: Option<String>,
    pub message: String,
}

/// Bulk import response, kept verbatim for the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub status: ImportStatus,
    pub data_elements: KindStats,
    pub data_sets: KindStats,
    #[serde(default)]
    pub errors: Vec<ObjectError>,
}

impl ImportReport {
    pub fn created_count(&self) -> u32 {
        self.data_elements.created + self.data_sets.created
    }

    pub fn updated_count(&self) -> u32 {
        self.data_elements.updated + self.data_sets.updated
    }

    /// First error reported for the object with the given id, if any.
    pub fn error_for(&self, kind: ObjectKind, id: &str) -> Option<&ObjectError> {
        self.errors
            .iter()
            .find(|e| e.kind == kind && e.id.as_deref() == Some(id))
    }
}
