//! Global atomic counters for provisioning observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    objects_created: AtomicU64,
    objects_reused: AtomicU64,
    objects_failed: AtomicU64,
    create_retries: AtomicU64,
    reconciliations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            objects_created: AtomicU64::new(0),
            objects_reused: AtomicU64::new(0),
            objects_failed: AtomicU64::new(0),
            create_retries: AtomicU64::new(0),
            reconciliations: AtomicU64::new(0),
        }
    }

    pub fn inc_created(&self) {
        self.objects_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reused(&self) {
        self.objects_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.objects_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A create was retried with a regenerated code.
    pub fn inc_retries(&self) {
        self.create_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "create_retries", "counter incremented");
    }

    pub fn inc_reconciliations(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            objects_created = self.objects_created(),
            objects_reused = self.objects_reused(),
            objects_failed = self.objects_failed(),
            create_retries = self.create_retries(),
            reconciliations = self.reconciliations(),
        );
    }

    pub fn objects_created(&self) -> u64 {
        self.objects_created.load(Ordering::Relaxed)
    }

    pub fn objects_reused(&self) -> u64 {
        self.objects_reused.load(Ordering::Relaxed)
    }

    pub fn objects_failed(&self) -> u64 {
        self.objects_failed.load(Ordering::Relaxed)
    }

    pub fn create_retries(&self) -> u64 {
        self.create_retries.load(Ordering::Relaxed)
    }

    pub fn reconciliations(&self) -> u64 {
        self.reconciliations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.objects_created.store(0, Ordering::Relaxed);
        self.objects_reused.store(0, Ordering::Relaxed);
        self.objects_failed.store(0, Ordering::Relaxed);
        self.create_retries.store(0, Ordering::Relaxed);
        self.reconciliations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_created();
        m.inc_created();
        m.inc_reused();
        m.inc_retries();
        assert_eq!(m.objects_created(), 2);
        assert_eq!(m.objects_reused(), 1);
        assert_eq!(m.objects_failed(), 0);
        assert_eq!(m.create_retries(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_failed();
        m.inc_reconciliations();
        m.reset();
        assert_eq!(m.objects_failed(), 0);
        assert_eq!(m.reconciliations(), 0);
    }
}
