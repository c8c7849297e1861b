//! Existing-metadata index: answers "is this already on the remote?"
//!
//! Two strategies:
//! - snapshot: every object of a kind fetched once, matched locally by name
//!   containment of the template label plus the scope (assessment name) as
//!   a whole `" - "`-delimited segment, so `"Survey"` does not match
//!   `"... - Survey 2"`
//! - point query: exact code equality against the remote, used during
//!   conflict resolution
//!
//! A snapshot is never refreshed within a run. Reuse policy belongs to the
//! provisioning engine.

use std::collections::HashMap;
use std::sync::Arc;

use assessment_remote::{MetadataStore, ObjectKind, QueryFilter, RemoteObject, RemoteResult};
use tracing::{debug, instrument};

use crate::domain::{AssessmentError, Result};

pub struct ExistingMetadataIndex {
    store: Arc<dyn MetadataStore>,
    scope: String,
    snapshots: HashMap<ObjectKind, Vec<RemoteObject>>,
}

impl std::fmt::Debug for ExistingMetadataIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExistingMetadataIndex")
            .field("scope", &self.scope)
            .field(
                "snapshots",
                &self
                    .snapshots
                    .iter()
                    .map(|(k, v)| (*k, v.len()))
                    .collect::<HashMap<_, _>>(),
            )
            .finish()
    }
}

impl ExistingMetadataIndex {
    /// An index without snapshots. Name lookups fall back to remote queries.
    pub fn new(store: Arc<dyn MetadataStore>, scope: &str) -> Self {
        Self {
            store,
            scope: scope.trim().to_lowercase(),
            snapshots: HashMap::new(),
        }
    }

    /// Fetch a snapshot of every object of each kind in `kinds`.
    #[instrument(skip(store, kinds))]
    pub async fn load(store: Arc<dyn MetadataStore>, scope: &str, kinds: &[ObjectKind]) -> Result<Self> {
        let mut index = Self::new(store, scope);
        for kind in kinds {
            let objects = index
                .store
                .query(*kind, &QueryFilter::All)
                .await
                .map_err(|source| AssessmentError::Snapshot { kind: *kind, source })?;
            debug!(kind = %kind, count = objects.len(), "existing metadata snapshot loaded");
            index.snapshots.insert(*kind, objects);
        }
        Ok(index)
    }

    pub fn has_snapshot(&self, kind: ObjectKind) -> bool {
        self.snapshots.contains_key(&kind)
    }

    /// Number of objects in the snapshot for `kind`.
    pub fn snapshot_len(&self, kind: ObjectKind) -> usize {
        self.snapshots.get(&kind).map_or(0, Vec::len)
    }

    fn in_scope(&self, name: &str, label: &str) -> bool {
        let name = name.to_lowercase();
        name.contains(&label.to_lowercase()) && contains_segment(&name, &self.scope)
    }

    /// Snapshot object whose name contains `label` and has the scope as one
    /// of its `" - "` segments, case-insensitively. `None` when no snapshot was loaded for `kind`.
    pub fn find_by_name(&self, kind: ObjectKind, label: &str) -> Option<&RemoteObject> {
        if label.trim().is_empty() {
            return None;
        }
        self.snapshots
            .get(&kind)?
            .iter()
            .find(|obj| self.in_scope(&obj.name, label))
    }

    /// Reuse candidate for a template: an object named exactly `name` wins,
    /// otherwise the first `find_by_name` match on `label`. Keeps
    /// `"REG - ANC 1"` from taking the object made for `"REG - ANC 10"`.
    pub fn find_reusable(&self, kind: ObjectKind, name: &str, label: &str) -> Option<&RemoteObject> {
        let snapshot = self.snapshots.get(&kind)?;
        snapshot
            .iter()
            .find(|obj| obj.name.trim().eq_ignore_ascii_case(name.trim()))
            .or_else(|| self.find_by_name(kind, label))
    }

    /// Point query by exact code.
    pub async fn find_by_code(&self, kind: ObjectKind, code: &str) -> RemoteResult<Option<RemoteObject>> {
        if code.is_empty() {
            return Ok(None);
        }
        let mut found = self
            .store
            .query(kind, &QueryFilter::CodeEq(code.to_string()))
            .await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Name match first (snapshot, or a remote name query without one), then
    /// exact code.
    pub async fn lookup(&self, kind: ObjectKind, name_part: &str, code: &str) -> RemoteResult<Option<RemoteObject>> {
        if self.has_snapshot(kind) {
            if let Some(obj) = self.find_by_name(kind, name_part) {
                return Ok(Some(obj.clone()));
            }
        } else if !name_part.trim().is_empty() {
            let candidates = self
                .store
                .query(kind, &QueryFilter::NameContains(name_part.to_string()))
                .await?;
            if let Some(obj) = candidates.into_iter().find(|o| self.in_scope(&o.name, name_part)) {
                return Ok(Some(obj));
            }
        }
        self.find_by_code(kind, code).await
    }
}

/// `segment` occurs in `name` bounded on each side by `" - "` or the end of
/// the string.
fn contains_segment(name: &str, segment: &str) -> bool {
    if segment.is_empty() {
        return true;
    }
    name.match_indices(segment).any(|(at, _)| {
        let before = &name[..at];
        let after = &name[at + segment.len()..];
        (before.is_empty() || before.ends_with(" - ")) && (after.is_empty() || after.starts_with(" - "))
    })
}
