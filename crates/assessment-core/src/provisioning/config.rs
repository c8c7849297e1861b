//! Provisioning configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{AssessmentError, Sharing};

/// Designated default category combination of the target system.
pub const DEFAULT_CATEGORY_COMBO: &str = "bjDvmb4bfuf";

/// How new objects reach the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStrategy {
    /// One create request per template, with conflict resolution and one retry.
    #[default]
    PerObject,
    /// A single metadata import. No per-object retry; the import report is
    /// surfaced as-is.
    Bulk,
}

impl FromStr for SubmissionStrategy {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-object" | "per_object" | "object" => Ok(Self::PerObject),
            "bulk" => Ok(Self::Bulk),
            other => Err(AssessmentError::InvalidRequest(format!(
                "unknown submission strategy '{}'",
                other
            ))),
        }
    }
}

/// Settings shared by every run of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningConfig {
    pub default_category_combo: String,
    pub period_type: String,
    pub code_length: usize,
    pub sharing: Sharing,
    pub strategy: SubmissionStrategy,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            default_category_combo: DEFAULT_CATEGORY_COMBO.to_string(),
            period_type: "Monthly".to_string(),
            code_length: 12,
            sharing: Sharing::Private,
            strategy: SubmissionStrategy::PerObject,
        }
    }
}

impl ProvisioningConfig {
    pub fn with_default_category_combo(mut self, id: impl Into<String>) -> Self {
        self.default_category_combo = id.into();
        self
    }

    pub fn with_period_type(mut self, period_type: impl Into<String>) -> Self {
        self.period_type = period_type.into();
        self
    }

    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    pub fn with_sharing(mut self, sharing: Sharing) -> Self {
        self.sharing = sharing;
        self
    }

    pub fn with_strategy(mut self, strategy: SubmissionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
