//! Remote collaborator contract
//!
//! `MetadataStore` is the only surface the provisioning core talks to:
//! - `query`: list existing objects of a kind matching a filter
//! - `create`: submit one object, returning its remote id
//! - `bulk_import`: submit many objects at once, returning the import report
//!
//! The trait is async and protocol-agnostic. An in-memory fake lives in
//! `fakes`, an HTTP implementation in `http`.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::schema::{ImportReport, MetadataPayload, ObjectKind, ObjectPayload, QueryFilter, RemoteObject};

/// Result type for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Remote metadata system.
///
/// Guarantees expected of implementations:
/// - `query` never mutates remote state.
/// - `create` either returns the id of a newly stored object or an error;
///   an error does not prove that nothing was stored (the response may
///   have been lost after the remote committed).
/// - `bulk_import` reports per-kind counts and per-object errors instead of
///   failing the call when individual objects are refused.
///
/// No timeout or backoff policy is imposed here; that belongs to the
/// concrete client.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// List objects of `kind` matching `filter`.
    async fn query(&self, kind: ObjectKind, filter: &QueryFilter) -> RemoteResult<Vec<RemoteObject>>;

    /// Create a single object and return its remote id.
    async fn create(&self, payload: &ObjectPayload) -> RemoteResult<String>;

    /// Import a batch of objects in one request.
    async fn bulk_import(&self, payload: &MetadataPayload) -> RemoteResult<ImportReport>;
}
