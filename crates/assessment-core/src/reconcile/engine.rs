//! Org-unit reconciliation: external units onto local units, one-to-one.
//!
//! Each external unit, in input order, goes through:
//! 1. a prior manual mapping, kept as-is
//! 2. exact match on the normalized name
//! 3. partial match through the prefix index (longest prefix first), where
//!    either normalized name contains the other
//! 4. otherwise unmatched
//!
//! A local unit is consumed by the first external unit that takes it. The
//! consumed set is threaded through the fold as a value.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::index::{normalize, prefix_keys, NameIndex};
use super::table::{MappingTable, MatchCounts};
use crate::domain::{Confidence, Mapping, OrgUnit};

/// Local ids already assigned during a pass.
pub type Consumed = HashSet<String>;

/// Output of one `reconcile` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub table: MappingTable,
    pub counts: MatchCounts,
    /// Normalized local names shared by more than one local unit.
    pub ambiguous_local_names: Vec<String>,
}

/// Reconcile `external` against `local`, preserving manual rows from
/// `existing`. Rows with `Auto` origin in `existing` are ignored.
pub fn reconcile(external: &[OrgUnit], local: &[OrgUnit], existing: &[Mapping]) -> Reconciliation {
    let index = NameIndex::build(local);
    let ambiguous_local_names: Vec<String> = index
        .ambiguous_keys()
        .into_iter()
        .map(str::to_string)
        .collect();
    for key in &ambiguous_local_names {
        warn!(name = %key, "several local org units share a normalized name; first unconsumed wins");
    }

    let (manual, manual_order, consumed) = seed_manual(existing);

    let (mut rows, _consumed, seen) = external.iter().fold(
        (Vec::with_capacity(external.len()), consumed, HashSet::new()),
        |(mut rows, consumed, mut seen), unit| {
            if !seen.insert(unit.id.as_str()) {
                warn!(external_id = %unit.id, "duplicate external org unit skipped");
                return (rows, consumed, seen);
            }
            let (row, consumed) = match manual.get(unit.id.as_str()) {
                Some(kept) => ((*kept).clone(), consumed),
                None => match_unit(unit, &index, consumed),
            };
            rows.push(row);
            (rows, consumed, seen)
        },
    );

    // Manual rows for units absent from this pass are still part of the table.
    for external_id in manual_order {
        if !seen.contains(external_id) {
            if let Some(kept) = manual.get(external_id) {
                rows.push((*kept).clone());
            }
        }
    }

    let table = MappingTable::new(rows);
    let counts = table.counts();
    crate::obs::emit_reconcile_finished(&counts, ambiguous_local_names.len());
    crate::metrics::METRICS.inc_reconciliations();

    Reconciliation {
        table,
        counts,
        ambiguous_local_names,
    }
}

/// Manual rows keyed by external id, their original order, and the local ids
/// they already hold. A manual row whose local id was claimed by an earlier
/// manual row is dropped so the table stays one-to-one.
fn seed_manual(existing: &[Mapping]) -> (HashMap<&str, &Mapping>, Vec<&str>, Consumed) {
    let mut manual = HashMap::new();
    let mut order = Vec::new();
    let mut consumed = Consumed::new();

    for row in existing.iter().filter(|m| m.is_manual()) {
        if manual.contains_key(row.external_id.as_str()) {
            continue;
        }
        if let Some(local_id) = row.local_id.as_deref() {
            if !consumed.insert(local_id.to_string()) {
                warn!(
                    external_id = %row.external_id,
                    local_id = %local_id,
                    "manual mapping reuses a local org unit already held; ignored"
                );
                continue;
            }
        }
        manual.insert(row.external_id.as_str(), row);
        order.push(row.external_id.as_str());
    }

    (manual, order, consumed)
}

/// Match one external unit, returning its row and the updated consumed set.
pub fn match_unit(unit: &OrgUnit, index: &NameIndex<'_>, mut consumed: Consumed) -> (Mapping, Consumed) {
    let key = normalize(&unit.display_name);
    if key.is_empty() {
        return (Mapping::unmatched(&unit.id), consumed);
    }

    let free = |idx: &usize| !consumed.contains(&index.unit(*idx).id);

    let exact = index.exact_candidates(&key).iter().copied().find(|i| free(i));
    let found = match exact {
        Some(idx) => Some((idx, Confidence::Exact)),
        None => prefix_keys(&key).iter().rev().find_map(|prefix| {
            index
                .prefix_candidates(prefix)
                .iter()
                .copied()
                .find(|i| free(i) && names_overlap(&key, index.normalized_name(*i)))
                .map(|idx| (idx, Confidence::Partial))
        }),
    };

    match found {
        Some((idx, confidence)) => {
            let local = index.unit(idx);
            debug!(
                external_id = %unit.id,
                local_id = %local.id,
                confidence = ?confidence,
                "org unit matched"
            );
            consumed.insert(local.id.clone());
            (Mapping::auto(&unit.id, &local.id, confidence), consumed)
        }
        None => (Mapping::unmatched(&unit.id), consumed),
    }
}

fn names_overlap(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}
