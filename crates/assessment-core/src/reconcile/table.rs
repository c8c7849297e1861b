//! The mapping table a reconciliation produces, plus user overrides.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Confidence, Mapping};

/// Aggregate counts over a mapping table. Manual rows are counted only in
/// `manual`, whatever their confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCounts {
    pub exact: usize,
    pub partial: usize,
    pub none: usize,
    pub manual: usize,
}

impl MatchCounts {
    pub fn total(&self) -> usize {
        self.exact + self.partial + self.none + self.manual
    }
}

/// One row per external unit, in reconciliation order.
///
/// Serializes as a plain JSON array of mappings so callers can persist the
/// table and feed it back into a later `reconcile` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    rows: Vec<Mapping>,
}

impl MappingTable {
    pub fn new(rows: Vec<Mapping>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Mapping] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Mapping> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, external_id: &str) -> Option<&Mapping> {
        self.rows.iter().find(|m| m.external_id == external_id)
    }

    /// Local id mapped to `external_id`, if any.
    pub fn local_for(&self, external_id: &str) -> Option<&str> {
        self.get(external_id)
            .filter(|m| m.is_matched())
            .and_then(|m| m.local_id.as_deref())
    }

    /// Assign `local_id` to `external_id` as a manual mapping.
    ///
    /// Any other row holding `local_id` is reset to unmatched. Returns the
    /// external ids of the evicted rows.
    pub fn set_mapping(&mut self, external_id: &str, local_id: &str) -> Vec<String> {
        let mut evicted = Vec::new();
        for row in self.rows.iter_mut() {
            if row.external_id != external_id && row.local_id.as_deref() == Some(local_id) {
                evicted.push(row.external_id.clone());
                *row = Mapping::unmatched(&row.external_id);
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(
                external_id = %external_id,
                local_id = %local_id,
                evicted = ?evicted,
                "manual mapping evicted previous holders"
            );
        }

        let manual = Mapping::manual(external_id, local_id);
        match self.rows.iter_mut().find(|m| m.external_id == external_id) {
            Some(row) => *row = manual,
            None => self.rows.push(manual),
        }
        evicted
    }

    /// Reset `external_id` to unmatched and auto-eligible. Returns `false`
    /// when the table has no row for it.
    pub fn clear_mapping(&mut self, external_id: &str) -> bool {
        match self.rows.iter_mut().find(|m| m.external_id == external_id) {
            Some(row) => {
                *row = Mapping::unmatched(external_id);
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> MatchCounts {
        self.rows
            .iter()
            .fold(MatchCounts::default(), |mut counts, row| {
                if row.is_manual() {
                    counts.manual += 1;
                } else {
                    match row.confidence {
                        Confidence::Exact => counts.exact += 1,
                        Confidence::Partial => counts.partial += 1,
                        Confidence::None => counts.none += 1,
                    }
                }
                counts
            })
    }

    pub fn manual_rows(&self) -> Vec<Mapping> {
        self.rows.iter().filter(|m| m.is_manual()).cloned().collect()
    }

    /// No external id repeats and no local id is held by two matched rows.
    pub fn is_one_to_one(&self) -> bool {
        let mut externals = HashSet::new();
        let mut locals = HashSet::new();
        self.rows.iter().all(|row| {
            let external_ok = externals.insert(row.external_id.as_str());
            let local_ok = match (row.is_matched(), row.local_id.as_deref()) {
                (true, Some(local)) => locals.insert(local),
                _ => true,
            };
            external_ok && local_ok
        })
    }
}
