//! Domain models for assessment provisioning.
//!
//! Canonical definitions for the core entities:
//! - `OrgUnit` / `Mapping`: reconciliation inputs and outputs
//! - `SourceDataElement`, `DataElementTemplate`, `DatasetTemplate`: templates
//! - `ProvisioningJob`, `ProvisionedObject`, `ProgressEvent`: run state

pub mod error;
pub mod job;
pub mod org_unit;
pub mod template;

// Re-export main types and errors
pub use error::{AssessmentError, Result};
pub use job::{
    JobStatus, ProgressEvent, ProvisionStatus, ProvisionedObject, ProvisioningJob,
    ProvisioningSummary, Severity, Stage,
};
pub use org_unit::{Confidence, Mapping, MappingOrigin, OrgUnit};
pub use template::{
    truncate_chars, DataElementTemplate, DatasetTemplate, DatasetType, Sharing,
    SourceDataElement, DESCRIPTION_MAX, NAME_MAX, SHORT_NAME_MAX,
};
