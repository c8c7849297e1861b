//! Input to a provisioning run.

use serde::{Deserialize, Serialize};

use crate::domain::{AssessmentError, Result, SourceDataElement};

/// What the caller wants provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub assessment_name: String,
    #[serde(default)]
    pub assessment_description: String,
    #[serde(default)]
    pub sources: Vec<SourceDataElement>,
    pub org_unit_ids: Vec<String>,
    #[serde(default = "default_reuse")]
    pub reuse_existing: bool,
}

/// Longest accepted assessment name, in characters. Element names carry it
/// as a suffix, so it must leave room for the label within `NAME_MAX`.
pub const ASSESSMENT_NAME_MAX: usize = 120;

fn default_reuse() -> bool {
    true
}

impl ProvisioningRequest {
    pub fn new(assessment_name: &str, assessment_description: &str) -> Self {
        Self {
            assessment_name: assessment_name.to_string(),
            assessment_description: assessment_description.to_string(),
            sources: Vec::new(),
            org_unit_ids: Vec::new(),
            reuse_existing: default_reuse(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceDataElement>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_org_units<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.org_unit_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reuse_existing(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.assessment_name.trim().is_empty() {
            return Err(AssessmentError::InvalidRequest(
                "assessment name is empty".to_string(),
            ));
        }
        let name_len = self.assessment_name.trim().chars().count();
        if name_len > ASSESSMENT_NAME_MAX {
            return Err(AssessmentError::InvalidRequest(format!(
                "assessment name is {} characters, at most {} are allowed",
                name_len, ASSESSMENT_NAME_MAX
            )));
        }
        if self.org_unit_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(AssessmentError::InvalidRequest(
                "no organisation units selected".to_string(),
            ));
        }
        if let Some(src) = self.sources.iter().find(|s| s.name.trim().is_empty()) {
            return Err(AssessmentError::InvalidRequest(format!(
                "source data element '{}' has no name",
                src.id
            )));
        }
        Ok(())
    }
}
