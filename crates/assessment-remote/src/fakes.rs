//! In-memory fake for `MetadataStore` (testing only)
//!
//! `MemoryMetadataStore` enforces the uniqueness rules of the real system
//! (id, code, name and short name per kind) and can be scripted to fail creates, either
//! by refusing them or by storing the object and still reporting an error,
//! which is what a lost response looks like to the caller.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::RemoteError;
use crate::schema::*;
use crate::store::{MetadataStore, RemoteResult};

/// Scripted outcome for the next `create` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateFailure {
    /// Refuse the object; nothing is stored.
    Reject,
    /// Store the object, then report an error anyway.
    CommitThenError,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectKind, Vec<RemoteObject>>,
    created: Vec<ObjectPayload>,
    create_failures: VecDeque<CreateFailure>,
    query_failure: Option<String>,
    bulk_failure: Option<String>,
    create_calls: usize,
    query_calls: usize,
    bulk_calls: usize,
}

impl State {
    fn check_unique(&self, payload: &ObjectPayload) -> Result<(), String> {
        let (id, name, code, short_name) =
            (payload.id(), payload.name(), payload.code(), payload.short_name());
        let existing = self
            .objects
            .get(&payload.kind())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for obj in existing {
            if obj.id == id {
                return Err(format!("Property `id` with value `{}` must be unique", id));
            }
            if obj.code.as_deref() == Some(code) {
                return Err(format!("Property `code` with value `{}` must be unique", code));
            }
            if obj.name == name {
                return Err(format!("Property `name` with value `{}` must be unique", name));
            }
            if obj.short_name.as_deref() == Some(short_name) {
                return Err(format!(
                    "Property `shortName` with value `{}` must be unique",
                    short_name
                ));
            }
        }
        Ok(())
    }

    fn check_references(&self, payload: &ObjectPayload) -> Result<(), String> {
        if let ObjectPayload::DataSet(ds) = payload {
            let elements = self
                .objects
                .get(&ObjectKind::DataElement)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for member in &ds.data_set_elements {
                if !elements.iter().any(|e| e.id == member.data_element.id) {
                    return Err(format!(
                        "Reference to unknown data element `{}`",
                        member.data_element.id
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate(&self, payload: &ObjectPayload) -> Result<(), String> {
        self.check_unique(payload)?;
        self.check_references(payload)
    }

    fn store(&mut self, payload: &ObjectPayload) {
        self.objects
            .entry(payload.kind())
            .or_default()
            .push(RemoteObject {
                id: payload.id().to_string(),
                name: payload.name().to_string(),
                code: Some(payload.code().to_string()),
                short_name: Some(payload.short_name().to_string()),
                last_updated: Some(Utc::now()),
            });
        self.created.push(payload.clone());
    }
}

/// In-memory metadata store backed by a `HashMap<kind, objects>`.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    state: Mutex<State>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an object as if it already existed remotely.
    pub fn seed(&self, kind: ObjectKind, object: RemoteObject) {
        let mut state = self.state.lock().unwrap();
        state.objects.entry(kind).or_default().push(object);
    }

    /// Queue a scripted failure for an upcoming `create` call.
    pub fn push_create_failure(&self, failure: CreateFailure) {
        let mut state = self.state.lock().unwrap();
        state.create_failures.push_back(failure);
    }

    /// Make every subsequent `query` fail with `message`.
    pub fn fail_queries(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.query_failure = Some(message.to_string());
    }

    /// Make every subsequent `bulk_import` fail at the transport level.
    pub fn fail_bulk_import(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.bulk_failure = Some(message.to_string());
    }

    /// Snapshot of stored objects of a kind, in insertion order.
    pub fn objects(&self, kind: ObjectKind) -> Vec<RemoteObject> {
        let state = self.state.lock().unwrap();
        state.objects.get(&kind).cloned().unwrap_or_default()
    }

    /// Payloads stored through `create` or `bulk_import`, in order.
    pub fn created_payloads(&self) -> Vec<ObjectPayload> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn query_calls(&self) -> usize {
        self.state.lock().unwrap().query_calls
    }

    pub fn bulk_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_calls
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn query(&self, kind: ObjectKind, filter: &QueryFilter) -> RemoteResult<Vec<RemoteObject>> {
        let mut state = self.state.lock().unwrap();
        state.query_calls += 1;
        if let Some(message) = &state.query_failure {
            return Err(RemoteError::Http(message.clone()));
        }
        let objects = state.objects.get(&kind).map(Vec::as_slice).unwrap_or_default();
        let matched = objects
            .iter()
            .filter(|obj| match filter {
                QueryFilter::All => true,
                QueryFilter::CodeEq(code) => obj.code.as_deref() == Some(code.as_str()),
                QueryFilter::NameContains(part) => obj
                    .name
                    .to_lowercase()
                    .contains(&part.to_lowercase()),
            })
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn create(&self, payload: &ObjectPayload) -> RemoteResult<String> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        let kind = payload.kind();

        match state.create_failures.pop_front() {
            Some(CreateFailure::Reject) => {
                return Err(RemoteError::Rejected {
                    kind,
                    message: "scripted rejection".to_string(),
                });
            }
            Some(CreateFailure::CommitThenError) => {
                if state.validate(payload).is_ok() {
                    state.store(payload);
                }
                return Err(RemoteError::Http("response lost after commit".to_string()));
            }
            None => {}
        }

        state
            .validate(payload)
            .map_err(|message| RemoteError::Rejected { kind, message })?;
        state.store(payload);
        Ok(payload.id().to_string())
    }

    async fn bulk_import(&self, payload: &MetadataPayload) -> RemoteResult<ImportReport> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if let Some(message) = &state.bulk_failure {
            return Err(RemoteError::Http(message.clone()));
        }

        let mut data_elements = KindStats::default();
        let mut data_sets = KindStats::default();
        let mut errors = Vec::new();

        let ordered = payload
            .data_elements
            .iter()
            .cloned()
            .map(ObjectPayload::DataElement)
            .chain(payload.data_sets.iter().cloned().map(ObjectPayload::DataSet));

        for object in ordered {
            let stats = match object.kind() {
                ObjectKind::DataElement => &mut data_elements,
                ObjectKind::DataSet => &mut data_sets,
            };
            match state.validate(&object) {
                Ok(()) => {
                    state.store(&object);
                    stats.created += 1;
                }
                Err(message) => {
                    stats.ignored += 1;
                    errors.push(ObjectError {
                        kind: object.kind(),
                        id: Some(object.id().to_string()),
                        message,
                    });
                }
            }
        }

        let created = data_elements.created + data_sets.created;
        let status = match (errors.is_empty(), created) {
            (true, _) => ImportStatus::Ok,
            (false, 0) => ImportStatus::Error,
            (false, _) => ImportStatus::Warning,
        };

        Ok(ImportReport {
            status,
            data_elements,
            data_sets,
            errors,
        })
    }
}
