//! End-to-end provisioning against the in-memory remote.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assessment_core::{
    AssessmentError, CancellationToken, JobStatus, ProvisionStatus, ProvisioningConfig,
    ProvisioningEngine, ProvisioningRequest, SequenceIdGenerator, Severity, SourceDataElement,
    Stage, SubmissionStrategy,
};
use assessment_remote::fakes::{CreateFailure, MemoryMetadataStore};
use assessment_remote::{
    ImportReport, MetadataPayload, MetadataStore, ObjectKind, ObjectPayload, QueryFilter,
    RemoteObject, RemoteResult,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

const ASSESSMENT: &str = "Malaria Assessment 2026";

fn sources(n: usize) -> Vec<SourceDataElement> {
    (1..=n)
        .map(|i| SourceDataElement::new(&format!("src{}", i), &format!("Indicator {}", i), "NUMBER", "SUM"))
        .collect()
}

fn request(n: usize) -> ProvisioningRequest {
    ProvisioningRequest::new(ASSESSMENT, "Annual review")
        .with_org_units(["OU_A", "OU_B"])
        .with_sources(sources(n))
}

fn engine(store: Arc<dyn MetadataStore>) -> ProvisioningEngine {
    ProvisioningEngine::new(store, Arc::new(SequenceIdGenerator::new()))
}

fn dataset_payloads(store: &MemoryMetadataStore) -> Vec<assessment_remote::DataSetPayload> {
    store
        .created_payloads()
        .into_iter()
        .filter_map(|p| match p {
            ObjectPayload::DataSet(ds) => Some(ds),
            ObjectPayload::DataElement(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn fresh_run_creates_every_object() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());

    let job = engine
        .provision(&request(3), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.data_elements.len(), 12);
    assert_eq!(job.datasets.len(), 4);
    assert_eq!(job.count(ProvisionStatus::Created), 16);
    assert_eq!(store.create_calls(), 16);
    assert_eq!(job.category_combo, "bjDvmb4bfuf");

    for ds in dataset_payloads(&store) {
        assert_eq!(ds.data_set_elements.len(), 3);
        assert_eq!(ds.organisation_units.len(), 2);
        assert_eq!(ds.public_access, "--------");
    }
    // Data elements are all created before the first dataset.
    let kinds: Vec<ObjectKind> = store.created_payloads().iter().map(|p| p.kind()).collect();
    let first_dataset = kinds.iter().position(|k| *k == ObjectKind::DataSet).unwrap();
    assert!(kinds[first_dataset..].iter().all(|k| *k == ObjectKind::DataSet));
}

#[tokio::test]
async fn second_run_reuses_everything() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());
    let request = request(3);

    engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap();
    let creates_after_first = store.create_calls();

    let second = engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.status, JobStatus::Completed);
    assert!(second.objects().all(|o| o.status == ProvisionStatus::Reused));
    assert_eq!(second.objects().count(), 16);
    assert_eq!(store.create_calls(), creates_after_first);
    assert_eq!(store.objects(ObjectKind::DataElement).len(), 12);
    assert_eq!(store.objects(ObjectKind::DataSet).len(), 4);
}

#[tokio::test]
async fn two_assessments_share_one_remote() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());

    let malaria = engine
        .provision(&request(3), None, &CancellationToken::new())
        .await
        .unwrap();
    let measles = ProvisioningRequest::new("Measles 2025", "")
        .with_org_units(["OU_A"])
        .with_sources(sources(3));
    let second = engine
        .provision(&measles, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(malaria.count(ProvisionStatus::Created), 16);
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.count(ProvisionStatus::Created), 16);
    assert!(second.failed().is_empty());
    assert_eq!(store.objects(ObjectKind::DataElement).len(), 24);
    assert_eq!(store.objects(ObjectKind::DataSet).len(), 8);
}

#[tokio::test]
async fn overlong_assessment_name_is_rejected_before_any_call() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());
    let request = ProvisioningRequest::new(&"A".repeat(240), "")
        .with_org_units(["OU_A"])
        .with_sources(sources(2));

    let err = engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AssessmentError::InvalidRequest(_)));
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.query_calls(), 0);
}

#[tokio::test]
async fn lost_create_response_is_resolved_by_code() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.push_create_failure(CreateFailure::CommitThenError);
    let engine = engine(store.clone());

    let job = engine
        .provision(&request(1), None, &CancellationToken::new())
        .await
        .unwrap();

    let first = &job.data_elements[0];
    assert_eq!(first.status, ProvisionStatus::Reused);
    assert_eq!(first.create_attempts, 1);
    assert!(first.remote_id.is_some());
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(store.create_calls(), 8);
}

#[tokio::test]
async fn retried_code_found_after_second_failure() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.push_create_failure(CreateFailure::Reject);
    store.push_create_failure(CreateFailure::CommitThenError);
    let engine = engine(store.clone());

    let job = engine
        .provision(&request(1), None, &CancellationToken::new())
        .await
        .unwrap();

    let first = &job.data_elements[0];
    assert_eq!(first.status, ProvisionStatus::Reused);
    assert_eq!(first.create_attempts, 2, "exactly one retry");
    let stored = store.objects(ObjectKind::DataElement);
    assert_eq!(stored[0].code.as_deref(), Some(first.code.as_str()));
    // The short name is re-tagged with the retried code.
    let tag = format!("({})", &first.code["REG_".len()..]);
    assert!(stored[0].short_name.as_deref().unwrap().ends_with(&tag));
    assert_eq!(store.create_calls(), 9);
}

#[tokio::test]
async fn template_fails_after_one_retry_and_run_continues() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.push_create_failure(CreateFailure::Reject);
    store.push_create_failure(CreateFailure::Reject);
    let engine = engine(store.clone());

    let job = engine
        .provision(&request(1), None, &CancellationToken::new())
        .await
        .unwrap();

    let failed = job.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].create_attempts, 2);
    assert!(failed[0].error.as_deref().unwrap().contains("scripted rejection"));
    assert_eq!(job.status, JobStatus::CompletedWithFailures);
    assert_eq!(job.count(ProvisionStatus::Created), 7);
    assert!(job
        .events
        .iter()
        .any(|e| e.severity == Severity::Error && e.message.contains("REG - Indicator 1")));

    // The Register dataset is still created, without the failed element.
    let register = dataset_payloads(&store)
        .into_iter()
        .find(|ds| ds.name.ends_with("Register"))
        .unwrap();
    assert!(register.data_set_elements.is_empty());
}

#[tokio::test]
async fn selected_category_combo_applies_to_the_whole_batch() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());
    let mut sources = sources(3);
    sources[1] = sources[1].clone().with_category_combo("ageSexCombo");
    let request = request(0).with_sources(sources);

    let job = engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.category_combo, "ageSexCombo");
    for payload in store.created_payloads() {
        let cc = match payload {
            ObjectPayload::DataElement(p) => p.category_combo.id,
            ObjectPayload::DataSet(p) => p.category_combo.id,
        };
        assert_eq!(cc, "ageSexCombo");
    }
}

#[tokio::test]
async fn progress_is_streamed_with_monotonic_steps() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let job = engine
        .provision(&request(2), Some(tx), &CancellationToken::new())
        .await
        .unwrap();

    let mut streamed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        streamed.push(event);
    }
    assert_eq!(streamed, job.events);
    assert!(streamed.windows(2).all(|w| w[0].step <= w[1].step && w[0].seq < w[1].seq));
    assert_eq!(streamed.first().unwrap().step, 1);
    assert_eq!(streamed.last().unwrap().step, Stage::TOTAL);
    assert!(streamed.iter().all(|e| e.total_steps == Stage::TOTAL));
}

#[tokio::test]
async fn snapshot_failure_aborts_when_reusing() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.fail_queries("gateway timeout");
    let engine = engine(store.clone());

    let err = engine
        .provision(&request(1), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::Snapshot { .. }));
    assert_eq!(store.create_calls(), 0);

    // Without reuse nothing is queried up front, so the run proceeds.
    let job = engine
        .provision(&request(1).with_reuse_existing(false), None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(job.count(ProvisionStatus::Created), 8);
    assert!(!engine.sessions().is_active(ASSESSMENT));
}

#[tokio::test]
async fn concurrent_run_for_same_assessment_is_refused() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());

    let _held = engine.sessions().acquire("  malaria assessment 2026").unwrap();
    let err = engine
        .provision(&request(1), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::SessionBusy { .. }));
    assert_eq!(store.query_calls(), 0);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_remote_call() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());
    let request = ProvisioningRequest::new(ASSESSMENT, "").with_sources(sources(1));

    let err = engine
        .provision(&request, None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::InvalidRequest(_)));
    assert_eq!(store.query_calls() + store.create_calls(), 0);
}

#[tokio::test]
async fn cancelled_before_start_creates_nothing() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = engine(store.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let job = engine.provision(&request(2), None, &cancel).await.unwrap();

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.objects().count(), 0);
    assert_eq!(store.create_calls(), 0);
    assert_eq!(job.stage, Stage::Finalize);
}

/// Cancels the shared token once `after` creates have gone through.
struct CancelAfterCreates {
    inner: Arc<MemoryMetadataStore>,
    token: CancellationToken,
    after: usize,
    seen: AtomicUsize,
}

#[async_trait]
impl MetadataStore for CancelAfterCreates {
    async fn query(&self, kind: ObjectKind, filter: &QueryFilter) -> RemoteResult<Vec<RemoteObject>> {
        self.inner.query(kind, filter).await
    }

    async fn create(&self, payload: &ObjectPayload) -> RemoteResult<String> {
        let result = self.inner.create(payload).await;
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        result
    }

    async fn bulk_import(&self, payload: &MetadataPayload) -> RemoteResult<ImportReport> {
        self.inner.bulk_import(payload).await
    }
}

#[tokio::test]
async fn cancellation_between_templates_keeps_finished_objects() {
    let inner = Arc::new(MemoryMetadataStore::new());
    let token = CancellationToken::new();
    let store = Arc::new(CancelAfterCreates {
        inner: inner.clone(),
        token: token.clone(),
        after: 2,
        seen: AtomicUsize::new(0),
    });
    let engine = engine(store);

    let job = engine.provision(&request(1), None, &token).await.unwrap();

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.data_elements.len(), 2);
    assert!(job.datasets.is_empty());
    assert_eq!(inner.create_calls(), 2);
    // Objects created before cancellation stay on the remote.
    assert_eq!(inner.objects(ObjectKind::DataElement).len(), 2);
    assert!(job
        .events
        .iter()
        .any(|e| e.severity == Severity::Warning && e.message.contains("cancelled")));
}

fn bulk_engine(store: Arc<dyn MetadataStore>) -> ProvisioningEngine {
    engine(store).with_config(ProvisioningConfig::default().with_strategy(SubmissionStrategy::Bulk))
}

#[tokio::test]
async fn bulk_run_submits_one_import() {
    let store = Arc::new(MemoryMetadataStore::new());
    let engine = bulk_engine(store.clone());

    let job = engine
        .provision(&request(3), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.bulk_calls(), 1);
    assert_eq!(store.create_calls(), 0);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.count(ProvisionStatus::Created), 16);

    let report = job.import_report.as_ref().unwrap();
    assert_eq!(report.data_elements.created, 12);
    assert_eq!(report.data_sets.created, 4);
    for ds in dataset_payloads(&store) {
        assert_eq!(ds.data_set_elements.len(), 3);
    }

    // Nothing left to import on a second run.
    let second = engine
        .provision(&request(3), None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(second.objects().all(|o| o.status == ProvisionStatus::Reused));
    assert_eq!(store.bulk_calls(), 1);
    assert!(second.import_report.is_none());
}

#[tokio::test]
async fn bulk_rejections_are_reported_verbatim_without_retry() {
    let store = Arc::new(MemoryMetadataStore::new());
    // Same name as the first Register element; reuse is off so it collides.
    store.seed(
        ObjectKind::DataElement,
        RemoteObject {
            id: "taken00001".to_string(),
            name: format!("REG - Indicator 1 - {}", ASSESSMENT),
            code: Some("OTHER".to_string()),
            short_name: None,
            last_updated: None,
        },
    );
    let engine = bulk_engine(store.clone());

    let job = engine
        .provision(&request(1).with_reuse_existing(false), None, &CancellationToken::new())
        .await
        .unwrap();

    let report = job.import_report.as_ref().unwrap();
    assert_eq!(report.status, assessment_remote::ImportStatus::Warning);
    assert_eq!(store.bulk_calls(), 1);
    assert_eq!(store.create_calls(), 0);

    let failed = job.failed();
    // The colliding element, and the Register dataset that references it.
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|o| o.create_attempts == 1));
    assert!(failed[0].error.as_deref().unwrap().contains("must be unique"));
    assert_eq!(job.status, JobStatus::CompletedWithFailures);
}

#[tokio::test]
async fn bulk_transport_failure_fails_every_pending_object() {
    let store = Arc::new(MemoryMetadataStore::new());
    store.fail_bulk_import("connection reset");
    let engine = bulk_engine(store.clone());

    let job = engine
        .provision(&request(2), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.count(ProvisionStatus::Failed), 12);
    assert!(job.import_report.is_none());
    assert!(job.objects().all(|o| o.remote_id.is_none()));
    assert_eq!(job.status, JobStatus::CompletedWithFailures);
}
