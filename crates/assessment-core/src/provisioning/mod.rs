//! Metadata provisioning.
//!
//! - `engine`: `ProvisioningEngine` and the per-object submission path
//! - `bulk`: single-import submission path
//! - `plan`: template expansion for a request
//! - `session`: one active run per assessment
//! - `progress`: event log and live stream

mod bulk;
pub mod config;
pub mod engine;
pub mod payload;
pub mod plan;
pub mod progress;
pub mod request;
pub mod session;

pub use config::{ProvisioningConfig, SubmissionStrategy, DEFAULT_CATEGORY_COMBO};
pub use engine::ProvisioningEngine;
pub use plan::ProvisioningPlan;
pub use progress::{ProgressReporter, ProgressSender};
pub use request::ProvisioningRequest;
pub use session::{session_key, SessionGuard, SessionRegistry};
