//! Assessment Core Library
//!
//! Org-unit reconciliation and idempotent metadata provisioning for
//! assessments. Remote I/O goes through the `assessment_remote::MetadataStore`
//! contract only.
//!
//! ## Layer 1 - Domain Logic
//!
//! - `reconcile`: external -> local org-unit mapping, one-to-one
//! - `templates` / `category_combo`: template expansion for a run
//! - `existing`: reuse lookups against the remote
//! - `provisioning`: the engine, per-object and bulk submission

pub mod category_combo;
pub mod domain;
pub mod existing;
pub mod ids;
pub mod metrics;
pub mod obs;
pub mod provisioning;
pub mod reconcile;
pub mod telemetry;
pub mod templates;

pub use domain::{
    AssessmentError, Confidence, DataElementTemplate, DatasetTemplate, DatasetType, JobStatus,
    Mapping, MappingOrigin, OrgUnit, ProgressEvent, ProvisionStatus, ProvisionedObject,
    ProvisioningJob, ProvisioningSummary, Result, Severity, Sharing, SourceDataElement, Stage,
};

pub use category_combo::select_category_combo;
pub use existing::ExistingMetadataIndex;
pub use ids::{IdGenerator, RandomIdGenerator, SequenceIdGenerator};
pub use provisioning::{
    ProgressSender, ProvisioningConfig, ProvisioningEngine, ProvisioningPlan, ProvisioningRequest,
    SessionRegistry, SubmissionStrategy,
};
pub use reconcile::{reconcile, MappingTable, MatchCounts, Reconciliation};
pub use templates::TemplateResolver;

pub use tokio_util::sync::CancellationToken;
