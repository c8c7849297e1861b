//! Progress reporting: an append-only log on the job, optionally mirrored to
//! a channel for live rendering.

use chrono::Utc;
use tokio::sync::mpsc;

use crate::domain::{ProgressEvent, ProvisioningJob, Severity, Stage};

/// Receiving end is owned by the caller; dropping it does not stop the run.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<ProgressSender>,
    next_seq: u64,
}

impl ProgressReporter {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self { tx, next_seq: 0 }
    }

    /// Move the job to `stage` and log the transition.
    pub fn stage(&mut self, job: &mut ProvisioningJob, stage: Stage, message: impl Into<String>) {
        job.stage = stage;
        crate::obs::emit_stage(&job.job_id, stage);
        self.emit(job, Severity::Info, message);
    }

    pub fn emit(&mut self, job: &mut ProvisioningJob, severity: Severity, message: impl Into<String>) {
        self.next_seq += 1;
        let event = ProgressEvent {
            seq: self.next_seq,
            step: job.stage.step(),
            total_steps: Stage::TOTAL,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        };
        if let Some(tx) = &self.tx {
            if tx.send(event.clone()).is_err() {
                tracing::debug!(job_id = %job.job_id, "progress receiver dropped");
                self.tx = None;
            }
        }
        job.events.push(event);
    }

    pub fn info(&mut self, job: &mut ProvisioningJob, message: impl Into<String>) {
        self.emit(job, Severity::Info, message);
    }

    pub fn success(&mut self, job: &mut ProvisioningJob, message: impl Into<String>) {
        self.emit(job, Severity::Success, message);
    }

    pub fn warning(&mut self, job: &mut ProvisioningJob, message: impl Into<String>) {
        self.emit(job, Severity::Warning, message);
    }

    pub fn error(&mut self, job: &mut ProvisioningJob, message: impl Into<String>) {
        self.emit(job, Severity::Error, message);
    }
}
