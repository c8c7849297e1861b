//! Assessment-Remote: remote metadata collaborator for assessment provisioning
//!
//! This crate owns every byte that crosses the wire to the target metadata
//! system. The provisioning core depends only on the [`MetadataStore`]
//! contract defined here, never on a concrete protocol.
//!
//! ## Layer 0 - Remote I/O
//!
//! Focus: faithful request/response mapping, no policy.
//!
//! ## Key Components
//!
//! - `MetadataStore`: query / create / bulk import contract
//! - `HttpMetadataStore`: DHIS2-style web API client
//! - `MemoryMetadataStore`: scriptable in-memory fake for tests

mod error;
pub mod fakes;
pub mod http;
pub mod schema;
pub mod store;

pub use error::RemoteError;
pub use http::{HttpMetadataStore, RemoteConfig};
pub use schema::{
    DataElementPayload, DataSetElement, DataSetPayload, IdRef, ImportReport, ImportStatus,
    KindStats, MetadataPayload, ObjectError, ObjectKind, ObjectPayload, QueryFilter, RemoteObject,
};
pub use store::{MetadataStore, RemoteResult};
