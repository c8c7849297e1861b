//! Organisation units and the mappings between them.

use serde::{Deserialize, Serialize};

/// An organisation unit, either external (where data was assessed) or local
/// (native to the target system). The two id spaces never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub level: u32,
    /// Parent id only; the parent unit is not owned.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub path: String,
}

impl OrgUnit {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            level: 0,
            parent_id: None,
            path: String::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>, level: u32) -> Self {
        self.parent_id = Some(parent_id.into());
        self.level = level;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// How well an external unit matched its local counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    Partial,
    None,
}

/// Who produced a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    Auto,
    Manual,
}

/// One row of a mapping table: an external unit and the local unit it maps to.
///
/// `local_id` is `None` exactly when `confidence` is `Confidence::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub external_id: String,
    pub local_id: Option<String>,
    pub confidence: Confidence,
    pub origin: MappingOrigin,
}

impl Mapping {
    pub fn auto(external_id: &str, local_id: &str, confidence: Confidence) -> Self {
        Self {
            external_id: external_id.to_string(),
            local_id: Some(local_id.to_string()),
            confidence,
            origin: MappingOrigin::Auto,
        }
    }

    pub fn manual(external_id: &str, local_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            local_id: Some(local_id.to_string()),
            confidence: Confidence::Exact,
            origin: MappingOrigin::Manual,
        }
    }

    pub fn unmatched(external_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            local_id: None,
            confidence: Confidence::None,
            origin: MappingOrigin::Auto,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.origin == MappingOrigin::Manual
    }

    pub fn is_matched(&self) -> bool {
        self.local_id.is_some() && self.confidence != Confidence::None
    }
}
