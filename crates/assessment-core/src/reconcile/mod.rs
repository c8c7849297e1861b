//! Org-unit reconciliation.
//!
//! - `index`: exact and prefix lookup over local units
//! - `engine`: the `reconcile` pass
//! - `table`: the resulting `MappingTable` and manual overrides

pub mod engine;
pub mod index;
pub mod table;

pub use engine::{reconcile, Reconciliation};
pub use index::{normalize, NameIndex};
pub use table::{MappingTable, MatchCounts};
