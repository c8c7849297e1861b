//! Observability tests for reconciliation and provisioning tracing.
//!
//! These tests verify that structured lifecycle events are emitted for
//! reconciliation, stage transitions, per-object outcomes and run completion.

use std::sync::Arc;

use assessment_core::domain::{ProvisionStatus, ProvisionedObject, Stage};
use assessment_core::obs::{
    emit_object, emit_provision_cancelled, emit_provision_finished, emit_provision_started,
    emit_stage, JobSpan,
};
use assessment_core::{
    reconcile, CancellationToken, DatasetType, JobStatus, OrgUnit, ProvisioningEngine,
    ProvisioningRequest, SequenceIdGenerator, SubmissionStrategy,
};
use assessment_remote::fakes::{CreateFailure, MemoryMetadataStore};
use assessment_remote::ObjectKind;
use tracing_test::traced_test;
use uuid::Uuid;

fn failed_object() -> ProvisionedObject {
    ProvisionedObject {
        kind: ObjectKind::DataElement,
        dataset_type: DatasetType::Summary,
        template_ref: "SUM - Confirmed cases".to_string(),
        code: "SUM_00000001".to_string(),
        remote_id: None,
        status: ProvisionStatus::Failed,
        error: Some("name must be unique".to_string()),
        create_attempts: 2,
    }
}

#[traced_test]
#[test]
fn test_reconcile_logs_counts() {
    reconcile(
        &[OrgUnit::new("E1", "Bo"), OrgUnit::new("E2", "Kenema")],
        &[OrgUnit::new("L1", "Bo")],
        &[],
    );
    assert!(logs_contain("reconcile.finished"));
}

#[traced_test]
#[test]
fn test_reconcile_warns_on_ambiguous_local_names() {
    reconcile(
        &[OrgUnit::new("E1", "Bo")],
        &[OrgUnit::new("L1", "Bo"), OrgUnit::new("L2", "BO ")],
        &[],
    );
    assert!(logs_contain("share a normalized name"));
}

#[traced_test]
#[test]
fn test_emit_lifecycle_events() {
    let job_id = Uuid::new_v4();
    emit_provision_started(&job_id, SubmissionStrategy::PerObject, true);
    emit_stage(&job_id, Stage::DataElements);
    emit_provision_finished(&job_id, JobStatus::Completed, 120, 16, 0, 0);

    assert!(logs_contain("provision.started"));
    assert!(logs_contain("provision.stage"));
    assert!(logs_contain("provision.finished"));
}

#[traced_test]
#[test]
fn test_failed_object_is_logged_with_error() {
    emit_object(&Uuid::new_v4(), &failed_object());
    assert!(logs_contain("provision.object"));
    assert!(logs_contain("name must be unique"));
}

#[traced_test]
#[test]
fn test_emit_cancelled_logs_warning() {
    emit_provision_cancelled(&Uuid::new_v4(), 3);
    assert!(logs_contain("provision.cancelled"));
}

#[traced_test]
#[test]
fn test_job_span_enter_creates_span() {
    let span = JobSpan::enter(&Uuid::new_v4(), "Malaria 2026");
    tracing::info!("inside job span");
    drop(span);
    assert!(logs_contain("inside job span"));
}

#[traced_test]
#[tokio::test]
async fn test_provision_run_emits_full_lifecycle() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.push_create_failure(CreateFailure::Reject);
    let engine = ProvisioningEngine::new(store, Arc::new(SequenceIdGenerator::new()));
    let request = ProvisioningRequest::new("Observed Assessment", "").with_org_units(["OU1"]);

    let job = engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert!(logs_contain("provision.started"));
    assert!(logs_contain("provision.stage"));
    assert!(logs_contain("provision.finished"));
    assert!(logs_contain("create_retries"));
}
