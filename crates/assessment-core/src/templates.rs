//! Template resolver: expands source data elements into the per-type
//! families of derived data elements, plus one dataset template per type.
//!
//! Names follow `"{ABBR} - {source name} - {assessment}"` for data elements
//! and `"{assessment} - {Type}"` for datasets. The `"{ABBR} - {source name}"`
//! label is what reuse checks search for, so it is the part that gets
//! truncated when the full name would exceed `NAME_MAX`, down to
//! `LABEL_MIN` characters; past that the assessment suffix is cut instead.
//!
//! Short names are unique per kind on the remote and too short to carry the
//! assessment name, so they end with the random part of the object's code:
//! `"REG - ANC 1st visit (K3Q9ZX0P)"`.

use std::collections::BTreeMap;

use crate::domain::{
    truncate_chars, DataElementTemplate, DatasetTemplate, DatasetType, Sharing, SourceDataElement,
    DESCRIPTION_MAX, NAME_MAX, SHORT_NAME_MAX,
};
use crate::ids::IdGenerator;

/// Generic indicators used when no source element was selected.
pub fn fallback_sources() -> Vec<SourceDataElement> {
    vec![
        SourceDataElement::new("", "Assessment status", "TEXT", "NONE"),
        SourceDataElement::new("", "Completion rate", "PERCENTAGE", "AVERAGE"),
        SourceDataElement::new("", "Quality score", "NUMBER", "AVERAGE"),
    ]
}

/// Code prefix for generated data elements of a type, e.g. `REG_`.
pub fn element_code_prefix(dataset_type: DatasetType) -> String {
    format!("{}_", dataset_type.abbrev())
}

/// Code prefix for generated datasets of a type, e.g. `DS_REG_`.
pub fn dataset_code_prefix(dataset_type: DatasetType) -> String {
    format!("DS_{}_", dataset_type.abbrev())
}

/// Characters of the data-element label kept however long the assessment
/// name is.
pub const LABEL_MIN: usize = 100;

const SHORT_TAG_MAX: usize = 11;

/// The random part of a generated code: everything after the last `_`,
/// capped to its last `SHORT_TAG_MAX` characters.
fn code_tag(code: &str) -> &str {
    let tail = code.rsplit('_').next().unwrap_or(code);
    let skip = tail.chars().count().saturating_sub(SHORT_TAG_MAX);
    match tail.char_indices().nth(skip) {
        Some((at, _)) => &tail[at..],
        None => tail,
    }
}

/// `"{base} ({code tag})"`, with `base` cut so the whole fits
/// `SHORT_NAME_MAX`.
pub fn scoped_short_name(base: &str, code: &str) -> String {
    let tag = code_tag(code);
    if tag.is_empty() {
        return truncate_chars(base, SHORT_NAME_MAX);
    }
    let budget = SHORT_NAME_MAX.saturating_sub(tag.chars().count() + 3);
    format!("{} ({})", truncate_chars(base, budget).trim_end(), tag)
}

/// Re-tag a short name built by `scoped_short_name` after the code changed.
pub fn rescope_short_name(short_name: &str, code: &str) -> String {
    let base = short_name
        .rsplit_once(" (")
        .map_or(short_name, |(base, _)| base);
    scoped_short_name(base, code)
}

/// Label of a dataset for the given assessment and type.
pub fn dataset_label(assessment: &str, dataset_type: DatasetType) -> String {
    truncate_chars(&format!("{} - {}", assessment, dataset_type.label()), NAME_MAX)
}

/// Expands templates for one assessment.
pub struct TemplateResolver<'a> {
    ids: &'a dyn IdGenerator,
    assessment: String,
    description: String,
    code_length: usize,
    default_category_combo: String,
    category_combo: Option<String>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(
        ids: &'a dyn IdGenerator,
        assessment: &str,
        description: &str,
        code_length: usize,
        default_category_combo: &str,
    ) -> Self {
        Self {
            ids,
            assessment: assessment.trim().to_string(),
            description: description.trim().to_string(),
            code_length,
            default_category_combo: default_category_combo.to_string(),
            category_combo: None,
        }
    }

    /// Use `category_combo` for every template instead of per-source
    /// inheritance.
    pub fn with_category_combo(mut self, category_combo: &str) -> Self {
        self.category_combo = Some(category_combo.to_string());
        self
    }

    /// One derived template per source element and dataset type. An empty
    /// `sources` slice expands the generic fallback indicators instead.
    pub fn expand(
        &self,
        sources: &[SourceDataElement],
        types: &[DatasetType],
    ) -> BTreeMap<DatasetType, Vec<DataElementTemplate>> {
        let fallback;
        let sources = if sources.is_empty() {
            fallback = fallback_sources();
            tracing::debug!(count = fallback.len(), "no source elements; using fallback indicators");
            fallback.as_slice()
        } else {
            sources
        };

        types
            .iter()
            .map(|ty| {
                let family = sources.iter().map(|src| self.element(*ty, src)).collect();
                (*ty, family)
            })
            .collect()
    }

    fn element(&self, ty: DatasetType, source: &SourceDataElement) -> DataElementTemplate {
        let suffix = truncate_chars(&format!(" - {}", self.assessment), NAME_MAX - LABEL_MIN);
        let label_budget = NAME_MAX - suffix.chars().count();
        let label = truncate_chars(&format!("{} - {}", ty.abbrev(), source.name.trim()), label_budget);
        let name = format!("{}{}", label, suffix);
        let code = self.ids.new_code(&element_code_prefix(ty), self.code_length);

        let about = source
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&source.name);
        let description = truncate_chars(
            &format!("{} value for {}: {}", ty.label(), self.assessment, about.trim()),
            DESCRIPTION_MAX,
        );

        let category_combo = self
            .category_combo
            .clone()
            .or_else(|| source.category_combo.clone())
            .unwrap_or_else(|| self.default_category_combo.clone());

        DataElementTemplate {
            dataset_type: ty,
            short_name: scoped_short_name(&label, &code),
            label,
            name,
            code,
            description,
            value_type: source.value_type.clone(),
            aggregation_type: source.aggregation_type.clone(),
            domain_type: source.domain_type.clone(),
            category_combo,
            source_id: Some(source.id.clone()).filter(|id| !id.is_empty()),
        }
    }

    /// One dataset template per type, each covering `org_unit_ids`.
    pub fn datasets(
        &self,
        types: &[DatasetType],
        org_unit_ids: &[String],
        period_type: &str,
        sharing: Sharing,
    ) -> Vec<DatasetTemplate> {
        let category_combo = self
            .category_combo
            .clone()
            .unwrap_or_else(|| self.default_category_combo.clone());

        types
            .iter()
            .map(|ty| {
                let label = dataset_label(&self.assessment, *ty);
                let description = if self.description.is_empty() {
                    format!("{} dataset for {}", ty.label(), self.assessment)
                } else {
                    format!("{} dataset for {}: {}", ty.label(), self.assessment, self.description)
                };
                let code = self.ids.new_code(&dataset_code_prefix(*ty), self.code_length);
                DatasetTemplate {
                    dataset_type: *ty,
                    name: label.clone(),
                    label,
                    short_name: scoped_short_name(&format!("{} - {}", ty.abbrev(), self.assessment), &code),
                    code,
                    description: truncate_chars(&description, DESCRIPTION_MAX),
                    period_type: period_type.to_string(),
                    category_combo: category_combo.clone(),
                    org_unit_ids: org_unit_ids.to_vec(),
                    sharing,
                }
            })
            .collect()
    }
}
