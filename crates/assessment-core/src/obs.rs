//! Structured lifecycle events for reconciliation and provisioning.
//!
//! This module provides:
//! - Job-scoped tracing spans: `job_span` for async code, the `JobSpan`
//!   RAII guard for synchronous scopes
//! - Emission functions for key lifecycle events
//!
//! Events are emitted at `info!` level except per-object outcomes, which use
//! `debug!` for reused objects and `warn!` for failures.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{JobStatus, ProvisionStatus, ProvisionedObject, Stage};
use crate::provisioning::SubmissionStrategy;
use crate::reconcile::MatchCounts;

/// The span every event of one provisioning job is recorded under.
///
/// Attach it to futures with `tracing::Instrument`; an entered guard must not
/// be held across `.await`.
pub fn job_span(job_id: &Uuid, assessment: &str) -> tracing::Span {
    tracing::info_span!("assess.provision", job_id = %job_id, assessment = %assessment)
}

/// RAII guard that enters a job-scoped span in synchronous code.
///
/// # Example
///
/// ```ignore
/// let _span = JobSpan::enter(&job.job_id, "Malaria 2026");
/// // every event below carries job_id and assessment
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(job_id: &Uuid, assessment: &str) -> Self {
        Self {
            _span: job_span(job_id, assessment).entered(),
        }
    }
}

/// Emit event: reconciliation pass finished.
pub fn emit_reconcile_finished(counts: &MatchCounts, ambiguous_local_names: usize) {
    info!(
        event = "reconcile.finished",
        exact = counts.exact,
        partial = counts.partial,
        none = counts.none,
        manual = counts.manual,
        ambiguous_local_names = ambiguous_local_names,
    );
}

/// Emit event: provisioning run started.
pub fn emit_provision_started(job_id: &Uuid, strategy: SubmissionStrategy, reuse_existing: bool) {
    info!(
        event = "provision.started",
        job_id = %job_id,
        strategy = ?strategy,
        reuse_existing = reuse_existing,
    );
}

/// Emit event: the run entered a new stage.
pub fn emit_stage(job_id: &Uuid, stage: Stage) {
    info!(
        event = "provision.stage",
        job_id = %job_id,
        stage = ?stage,
        step = stage.step(),
        total_steps = Stage::TOTAL,
    );
}

/// Emit event: one template reached its terminal status.
pub fn emit_object(job_id: &Uuid, object: &ProvisionedObject) {
    match object.status {
        ProvisionStatus::Failed => warn!(
            event = "provision.object",
            job_id = %job_id,
            kind = %object.kind,
            template = %object.template_ref,
            code = %object.code,
            attempts = object.create_attempts,
            error = object.error.as_deref().unwrap_or_default(),
            status = "failed",
        ),
        status => debug!(
            event = "provision.object",
            job_id = %job_id,
            kind = %object.kind,
            template = %object.template_ref,
            remote_id = object.remote_id.as_deref().unwrap_or_default(),
            attempts = object.create_attempts,
            status = ?status,
        ),
    }
}

/// Emit event: provisioning run finished.
pub fn emit_provision_finished(
    job_id: &Uuid,
    status: JobStatus,
    duration_ms: u64,
    created: usize,
    reused: usize,
    failed: usize,
) {
    info!(
        event = "provision.finished",
        job_id = %job_id,
        status = ?status,
        duration_ms = duration_ms,
        created = created,
        reused = reused,
        failed = failed,
    );
}

/// Emit event: a run stopped early because the caller cancelled it.
pub fn emit_provision_cancelled(job_id: &Uuid, processed: usize) {
    warn!(event = "provision.cancelled", job_id = %job_id, processed = processed);
}
