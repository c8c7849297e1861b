//! Single-flight guard: at most one provisioning run per assessment.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use crate::domain::{AssessmentError, Result};

/// SHA-256 hex digest of the normalized assessment name.
pub fn session_key(assessment: &str) -> String {
    let normalized = assessment.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Set of assessments with an active run. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

fn lock(active: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the session for `assessment`, or `SessionBusy` if a run holds it.
    pub fn acquire(&self, assessment: &str) -> Result<SessionGuard> {
        let key = session_key(assessment);
        if !lock(&self.active).insert(key.clone()) {
            return Err(AssessmentError::SessionBusy {
                assessment: assessment.trim().to_string(),
            });
        }
        tracing::debug!(session = %key, "provisioning session acquired");
        Ok(SessionGuard {
            key,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, assessment: &str) -> bool {
        lock(&self.active).contains(&session_key(assessment))
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

/// Releases the session on drop.
#[derive(Debug)]
pub struct SessionGuard {
    key: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl SessionGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.key);
        tracing::debug!(session = %self.key, "provisioning session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_case_and_padding() {
        assert_eq!(session_key(" Malaria 2026 "), session_key("malaria 2026"));
        assert_ne!(session_key("Malaria 2026"), session_key("Malaria 2027"));
        assert_eq!(session_key("x").len(), 64);
    }

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let registry = SessionRegistry::new();
        let guard = registry.acquire("Malaria 2026").unwrap();
        assert!(registry.is_active("MALARIA 2026"));

        let err = registry.acquire("malaria 2026").unwrap_err();
        assert!(matches!(err, AssessmentError::SessionBusy { .. }));

        let other = registry.acquire("Measles 2025").unwrap();
        assert_eq!(registry.active_count(), 2);

        drop(guard);
        drop(other);
        assert_eq!(registry.active_count(), 0);
        assert!(registry.acquire("Malaria 2026").is_ok());
    }
}
