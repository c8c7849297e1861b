//! Metadata templates: immutable definitions awaiting remote creation.

use serde::{Deserialize, Serialize};

/// Longest name the target system accepts.
pub const NAME_MAX: usize = 230;
/// Longest short name the target system accepts.
pub const SHORT_NAME_MAX: usize = 50;
/// Longest description the target system accepts.
pub const DESCRIPTION_MAX: usize = 255;

/// Truncate to at most `max` characters, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// A data element selected by the user as the basis for derived templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDataElement {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub value_type: String,
    pub aggregation_type: String,
    #[serde(default = "default_domain_type")]
    pub domain_type: String,
    #[serde(default)]
    pub category_combo: Option<String>,
}

fn default_domain_type() -> String {
    "AGGREGATE".to_string()
}

impl SourceDataElement {
    pub fn new(id: &str, name: &str, value_type: &str, aggregation_type: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            value_type: value_type.to_string(),
            aggregation_type: aggregation_type.to_string(),
            domain_type: default_domain_type(),
            category_combo: None,
        }
    }

    pub fn with_category_combo(mut self, category_combo: &str) -> Self {
        self.category_combo = Some(category_combo.to_string());
        self
    }
}

/// The four datasets every assessment produces, one per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Register,
    Summary,
    Reported,
    Corrected,
}

impl DatasetType {
    /// All types in provisioning order.
    pub const ALL: [DatasetType; 4] = [
        DatasetType::Register,
        DatasetType::Summary,
        DatasetType::Reported,
        DatasetType::Corrected,
    ];

    pub fn abbrev(&self) -> &'static str {
        match self {
            DatasetType::Register => "REG",
            DatasetType::Summary => "SUM",
            DatasetType::Reported => "REP",
            DatasetType::Corrected => "COR",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatasetType::Register => "Register",
            DatasetType::Summary => "Summary",
            DatasetType::Reported => "Reported",
            DatasetType::Corrected => "Corrected",
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Public access applied to created objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    #[default]
    Private,
    ReadOnly,
    ReadWrite,
}

impl Sharing {
    /// Access string understood by the target system.
    pub fn public_access(&self) -> &'static str {
        match self {
            Sharing::Private => "--------",
            Sharing::ReadOnly => "r-------",
            Sharing::ReadWrite => "rw------",
        }
    }
}

/// A derived data element awaiting creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElementTemplate {
    pub dataset_type: DatasetType,
    /// `"{TypeAbbrev} - {source name}"`, the part reuse checks look for.
    pub label: String,
    pub name: String,
    pub code: String,
    pub short_name: String,
    pub description: String,
    pub value_type: String,
    pub aggregation_type: String,
    pub domain_type: String,
    pub category_combo: String,
    #[serde(default)]
    pub source_id: Option<String>,
}

/// A dataset awaiting creation. Its members are the data-element templates
/// of the same `dataset_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetTemplate {
    pub dataset_type: DatasetType,
    /// `"{assessment} - {Type}"`
    pub label: String,
    pub name: String,
    pub code: String,
    pub short_name: String,
    pub description: String,
    pub period_type: String,
    pub category_combo: String,
    pub org_unit_ids: Vec<String>,
    pub sharing: Sharing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("Ngelehun", 3), "Nge");
        assert_eq!(truncate_chars("Kéré", 2), "Ké");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[test]
    fn test_dataset_type_order_and_abbrev() {
        let abbrevs: Vec<&str> = DatasetType::ALL.iter().map(|t| t.abbrev()).collect();
        assert_eq!(abbrevs, vec!["REG", "SUM", "REP", "COR"]);
    }

    #[test]
    fn test_source_defaults_on_deserialize() {
        let src: SourceDataElement = serde_json::from_str(
            r#"{"id":"s1","name":"ANC 1st visit","valueType":"NUMBER","aggregationType":"SUM"}"#,
        )
        .unwrap();
        assert_eq!(src.domain_type, "AGGREGATE");
        assert_eq!(src.category_combo, None);
    }

    #[test]
    fn test_sharing_access_strings() {
        assert_eq!(Sharing::default().public_access(), "--------");
        assert_eq!(Sharing::ReadOnly.public_access(), "r-------");
    }
}
