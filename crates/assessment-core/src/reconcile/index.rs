//! Lookup structures over local org units.
//!
//! Two indexes, both keyed on the normalized name (`lowercase(trim(name))`):
//! - exact: full normalized name -> units with that name, in input order
//! - prefix: each 1-, 2- and 3-token prefix -> units sharing that prefix
//!
//! Units are referenced by position in the input slice, so building the
//! index never clones an `OrgUnit`.

use std::collections::HashMap;

use crate::domain::OrgUnit;

/// Maximum number of leading tokens used for prefix keys.
pub const PREFIX_TOKENS: usize = 3;

/// Normalize a display name for matching.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Prefix keys of a normalized name, shortest first (at most `PREFIX_TOKENS`).
pub fn prefix_keys(normalized: &str) -> Vec<String> {
    let tokens: Vec<&str> = normalized.split_whitespace().take(PREFIX_TOKENS).collect();
    (1..=tokens.len()).map(|n| tokens[..n].join(" ")).collect()
}

/// Exact and prefix indexes over a slice of local org units.
#[derive(Debug)]
pub struct NameIndex<'a> {
    units: &'a [OrgUnit],
    normalized: Vec<String>,
    exact: HashMap<String, Vec<usize>>,
    prefix: HashMap<String, Vec<usize>>,
}

impl<'a> NameIndex<'a> {
    pub fn build(units: &'a [OrgUnit]) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::with_capacity(units.len());
        let mut prefix: HashMap<String, Vec<usize>> = HashMap::new();
        let mut normalized = Vec::with_capacity(units.len());

        for (idx, unit) in units.iter().enumerate() {
            let key = normalize(&unit.display_name);
            for pk in prefix_keys(&key) {
                prefix.entry(pk).or_default().push(idx);
            }
            exact.entry(key.clone()).or_default().push(idx);
            normalized.push(key);
        }

        Self {
            units,
            normalized,
            exact,
            prefix,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, idx: usize) -> &'a OrgUnit {
        &self.units[idx]
    }

    pub fn normalized_name(&self, idx: usize) -> &str {
        &self.normalized[idx]
    }

    /// Units whose normalized name equals `key`, in input order.
    pub fn exact_candidates(&self, key: &str) -> &[usize] {
        self.exact.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Units whose name starts with the token prefix `key`, in input order.
    pub fn prefix_candidates(&self, key: &str) -> &[usize] {
        self.prefix.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Normalized names shared by more than one local unit, sorted.
    pub fn ambiguous_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .exact
            .iter()
            .filter(|(_, idxs)| idxs.len() > 1)
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}
