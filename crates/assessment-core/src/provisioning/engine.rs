//! Provisioning engine: turns a request into created or reused remote
//! objects, data elements strictly before datasets.
//!
//! Per-object state machine for each template:
//!
//! ```text
//! ReuseCheck --found--> Reused
//!     |
//!   Create --ok--> Created
//!     | err
//! ConflictResolution (lookup by code) --found--> Reused
//!     | not found
//! Create(regenerated code) --ok--> Created
//!     | err
//! lookup by retried code --found--> Reused
//!     | not found
//!   Failed
//! ```
//!
//! A failed template is recorded and the run moves on. Only an invalid
//! request, a busy session or a failed snapshot load abort the run.

use std::sync::Arc;

use assessment_remote::{MetadataStore, ObjectKind, ObjectPayload};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Instrument};

use super::config::{ProvisioningConfig, SubmissionStrategy};
use super::payload::{dataset_object, element_object};
use super::plan::ProvisioningPlan;
use super::progress::{ProgressReporter, ProgressSender};
use super::request::ProvisioningRequest;
use super::session::SessionRegistry;
use crate::category_combo::select_category_combo;
use crate::domain::{
    DatasetType, JobStatus, ProvisionStatus, ProvisionedObject, ProvisioningJob, Result, Stage,
};
use crate::existing::ExistingMetadataIndex;
use crate::ids::IdGenerator;
use crate::metrics::METRICS;
use crate::obs;
use crate::templates::{dataset_code_prefix, element_code_prefix, rescope_short_name};

pub struct ProvisioningEngine {
    pub(super) store: Arc<dyn MetadataStore>,
    pub(super) ids: Arc<dyn IdGenerator>,
    pub(super) config: ProvisioningConfig,
    sessions: SessionRegistry,
}

impl ProvisioningEngine {
    pub fn new(store: Arc<dyn MetadataStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            store,
            ids,
            config: ProvisioningConfig::default(),
            sessions: SessionRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: ProvisioningConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a session registry with other engines in the process.
    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Expand the request's templates without touching the remote.
    pub fn plan(&self, request: &ProvisioningRequest) -> Result<ProvisioningPlan> {
        ProvisioningPlan::build(request, &self.config, self.ids.as_ref())
    }

    /// Run a provisioning job to completion or cancellation.
    ///
    /// Progress events are appended to the returned job and, when `progress`
    /// is given, sent on it as they happen.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
        progress: Option<ProgressSender>,
        cancel: &CancellationToken,
    ) -> Result<ProvisioningJob> {
        request.validate()?;
        let _session = self.sessions.acquire(&request.assessment_name)?;

        let mut run = Run {
            engine: self,
            request,
            cancel,
            job: ProvisioningJob::new(request.assessment_name.trim()),
            progress: ProgressReporter::new(progress),
        };
        let span = obs::job_span(&run.job.job_id, &run.job.assessment);
        span.in_scope(|| {
            obs::emit_provision_started(&run.job.job_id, self.config.strategy, request.reuse_existing)
        });

        run.execute().instrument(span.clone()).await?;
        Ok(span.in_scope(|| run.finish()))
    }
}

/// State of one run. Lives only inside `provision`.
pub(super) struct Run<'a> {
    pub(super) engine: &'a ProvisioningEngine,
    pub(super) request: &'a ProvisioningRequest,
    pub(super) cancel: &'a CancellationToken,
    pub(super) job: ProvisioningJob,
    pub(super) progress: ProgressReporter,
}

impl Run<'_> {
    async fn execute(&mut self) -> Result<()> {
        let engine = self.engine;
        let config = &engine.config;

        self.progress.stage(
            &mut self.job,
            Stage::SelectCategoryCombo,
            "Selecting category combination",
        );
        let category_combo = select_category_combo(&self.request.sources, &config.default_category_combo);
        let message = if category_combo == config.default_category_combo {
            format!("Using default category combination {}", category_combo)
        } else {
            format!("Using category combination {} from the selected data elements", category_combo)
        };
        self.job.category_combo = category_combo.clone();
        self.progress.info(&mut self.job, message);

        self.progress
            .stage(&mut self.job, Stage::ExpandTemplates, "Preparing metadata templates");
        let plan = ProvisioningPlan::build_with(self.request, config, engine.ids.as_ref(), category_combo)?;
        if self.request.sources.is_empty() {
            self.progress.warning(
                &mut self.job,
                "No data elements selected; using the generic assessment indicators",
            );
        }
        self.progress.info(
            &mut self.job,
            format!(
                "Prepared {} data elements and {} datasets",
                plan.element_count(),
                plan.datasets.len()
            ),
        );
        if self.cancelled() {
            return Ok(());
        }

        self.progress
            .stage(&mut self.job, Stage::LoadExisting, "Checking existing metadata");
        let existing = self.load_existing().await?;
        if self.cancelled() {
            return Ok(());
        }

        match config.strategy {
            SubmissionStrategy::PerObject => self.submit_per_object(&plan, &existing).await,
            SubmissionStrategy::Bulk => self.submit_bulk(&plan, &existing).await,
        }
        Ok(())
    }

    async fn load_existing(&mut self) -> Result<ExistingMetadataIndex> {
        let store = Arc::clone(&self.engine.store);
        if !self.request.reuse_existing {
            self.progress.info(
                &mut self.job,
                "Reuse disabled; existing metadata is only consulted on conflicts",
            );
            return Ok(ExistingMetadataIndex::new(store, &self.job.assessment));
        }

        match ExistingMetadataIndex::load(
            store,
            &self.job.assessment,
            &[ObjectKind::DataElement, ObjectKind::DataSet],
        )
        .await
        {
            Ok(index) => {
                let message = format!(
                    "Found {} existing data elements and {} existing datasets",
                    index.snapshot_len(ObjectKind::DataElement),
                    index.snapshot_len(ObjectKind::DataSet)
                );
                self.progress.info(&mut self.job, message);
                Ok(index)
            }
            Err(err) => {
                self.progress
                    .error(&mut self.job, format!("Could not load existing metadata: {}", err));
                Err(err)
            }
        }
    }

    /// True once the caller has cancelled. The first observation marks the
    /// job cancelled and logs it.
    pub(super) fn cancelled(&mut self) -> bool {
        if self.job.status == JobStatus::Cancelled {
            return true;
        }
        if !self.cancel.is_cancelled() {
            return false;
        }
        self.job.status = JobStatus::Cancelled;
        let processed = self.job.objects().count();
        obs::emit_provision_cancelled(&self.job.job_id, processed);
        self.progress.warning(
            &mut self.job,
            format!(
                "Provisioning cancelled after {} objects; objects already created remain",
                processed
            ),
        );
        true
    }

    async fn submit_per_object(&mut self, plan: &ProvisioningPlan, existing: &ExistingMetadataIndex) {
        self.progress.stage(
            &mut self.job,
            Stage::DataElements,
            format!("Provisioning {} data elements", plan.element_count()),
        );
        for template in plan.elements() {
            if self.cancelled() {
                return;
            }
            let payload = element_object(template, &self.engine.ids.new_object_id(), self.engine.config.sharing);
            let object = self
                .provision_one(
                    existing,
                    template.dataset_type,
                    &template.label,
                    &element_code_prefix(template.dataset_type),
                    payload,
                )
                .await;
            self.job.data_elements.push(object);
        }

        self.progress.stage(
            &mut self.job,
            Stage::Datasets,
            format!("Provisioning {} datasets", plan.datasets.len()),
        );
        for template in &plan.datasets {
            if self.cancelled() {
                return;
            }
            let members = self.resolved_members(template.dataset_type);
            if members.is_empty() {
                self.progress.warning(
                    &mut self.job,
                    format!("Dataset '{}' has no provisioned data elements", template.label),
                );
            }
            let payload = dataset_object(template, &self.engine.ids.new_object_id(), &members);
            let object = self
                .provision_one(
                    existing,
                    template.dataset_type,
                    &template.label,
                    &dataset_code_prefix(template.dataset_type),
                    payload,
                )
                .await;
            self.job.datasets.push(object);
        }
    }

    /// Remote ids of this run's non-failed data elements of `dataset_type`.
    pub(super) fn resolved_members(&self, dataset_type: DatasetType) -> Vec<String> {
        self.job
            .data_elements
            .iter()
            .filter(|o| o.dataset_type == dataset_type && !o.is_failed())
            .filter_map(|o| o.remote_id.clone())
            .collect()
    }

    async fn provision_one(
        &mut self,
        existing: &ExistingMetadataIndex,
        dataset_type: DatasetType,
        label: &str,
        code_prefix: &str,
        mut payload: ObjectPayload,
    ) -> ProvisionedObject {
        let kind = payload.kind();
        let object = ProvisionedObject {
            kind,
            dataset_type,
            template_ref: label.to_string(),
            code: payload.code().to_string(),
            remote_id: None,
            status: ProvisionStatus::Failed,
            error: None,
            create_attempts: 0,
        };

        if self.request.reuse_existing {
            if let Some(found) = existing.find_reusable(kind, payload.name(), label) {
                let id = found.id.clone();
                return self.reused(object, id, "already exists");
            }
        }

        let first = match self.create(object, &payload).await {
            Ok(done) => return done,
            Err((object, err)) => {
                self.progress.warning(
                    &mut self.job,
                    format!(
                        "Creating {} '{}' failed: {}; checking code {}",
                        kind, label, err, object.code
                    ),
                );
                object
            }
        };

        if let Some(id) = self.lookup_code(existing, kind, &first.code).await {
            return self.reused(first, id, "found by code after a failed create");
        }

        let code = self.engine.ids.new_code(code_prefix, self.engine.config.code_length);
        let short_name = rescope_short_name(payload.short_name(), &code);
        payload.set_short_name(short_name);
        payload.set_code(code.clone());
        let mut retry = first;
        retry.code = code;
        METRICS.inc_retries();
        tracing::debug!(kind = %kind, label = %label, code = %retry.code, "retrying create with a new code");

        match self.create(retry, &payload).await {
            Ok(done) => done,
            Err((object, err)) => {
                if let Some(id) = self.lookup_code(existing, kind, &object.code).await {
                    return self.reused(object, id, "found by code after a failed retry");
                }
                self.failed(object, err.to_string())
            }
        }
    }

    /// One create request. On error the object comes back for the next step.
    async fn create(
        &mut self,
        mut object: ProvisionedObject,
        payload: &ObjectPayload,
    ) -> std::result::Result<ProvisionedObject, (ProvisionedObject, assessment_remote::RemoteError)> {
        object.create_attempts += 1;
        match self.engine.store.create(payload).await {
            Ok(id) => Ok(self.created(object, id)),
            Err(err) => Err((object, err)),
        }
    }

    async fn lookup_code(&self, existing: &ExistingMetadataIndex, kind: ObjectKind, code: &str) -> Option<String> {
        match existing.find_by_code(kind, code).await {
            Ok(found) => found.map(|o| o.id),
            Err(err) => {
                warn!(kind = %kind, code = %code, error = %err, "code lookup failed");
                None
            }
        }
    }

    pub(super) fn created(&mut self, mut object: ProvisionedObject, remote_id: String) -> ProvisionedObject {
        object.status = ProvisionStatus::Created;
        object.error = None;
        self.progress.success(
            &mut self.job,
            format!("Created {} '{}' ({})", object.kind, object.template_ref, remote_id),
        );
        object.remote_id = Some(remote_id);
        METRICS.inc_created();
        obs::emit_object(&self.job.job_id, &object);
        object
    }

    pub(super) fn reused(&mut self, mut object: ProvisionedObject, remote_id: String, why: &str) -> ProvisionedObject {
        object.status = ProvisionStatus::Reused;
        object.error = None;
        self.progress.info(
            &mut self.job,
            format!(
                "Reusing {} '{}' ({}): {}",
                object.kind, object.template_ref, remote_id, why
            ),
        );
        object.remote_id = Some(remote_id);
        METRICS.inc_reused();
        obs::emit_object(&self.job.job_id, &object);
        object
    }

    pub(super) fn failed(&mut self, mut object: ProvisionedObject, error: String) -> ProvisionedObject {
        object.status = ProvisionStatus::Failed;
        object.remote_id = None;
        self.progress.error(
            &mut self.job,
            format!("Failed to create {} '{}': {}", object.kind, object.template_ref, error),
        );
        object.error = Some(error);
        METRICS.inc_failed();
        obs::emit_object(&self.job.job_id, &object);
        object
    }

    fn finish(mut self) -> ProvisioningJob {
        if self.job.status != JobStatus::Cancelled {
            self.job.status = if self.job.failed().is_empty() {
                JobStatus::Completed
            } else {
                JobStatus::CompletedWithFailures
            };
        }

        let created = self.job.count(ProvisionStatus::Created);
        let reused = self.job.count(ProvisionStatus::Reused);
        let failed = self.job.count(ProvisionStatus::Failed);
        let message = format!(
            "Provisioning finished: {} created, {} reused, {} failed",
            created, reused, failed
        );
        self.progress.stage(&mut self.job, Stage::Finalize, message);

        self.job.finished_at = Some(Utc::now());
        obs::emit_provision_finished(
            &self.job.job_id,
            self.job.status,
            self.job.duration_ms(),
            created,
            reused,
            failed,
        );
        METRICS.flush();
        self.job
    }
}
