//! Category-combination selection for a provisioning run.

use crate::domain::SourceDataElement;

/// Category combination shared by every object in a run.
///
/// The first source element (in the given order) carrying a combination other
/// than `default` wins; otherwise `default` is used. Evaluated once per run.
pub fn select_category_combo(sources: &[SourceDataElement], default: &str) -> String {
    sources
        .iter()
        .filter_map(|s| s.category_combo.as_deref())
        .map(str::trim)
        .find(|cc| !cc.is_empty() && *cc != default)
        .unwrap_or(default)
        .to_string()
}
