//! Metadata Catalog Service
//!
//! Maintains mirrored technical metadata (sources, datasets, tables, columns)
//! for external warehouses. Scans are resumable: a failing table never aborts
//! its siblings, failures are aggregated into a `ScanReport`. Scans of the
//! same source are serialized; different sources scan independently.
//!
//! Catalog metadata is the only durable state in the system: the store can be
//! snapshotted to and restored from a JSON file. Graphs and scores are always
//! recomputed on demand.

pub mod service;
pub mod store;

pub use service::{CatalogError, CatalogService, MappedAttribute, TableInfo};
pub use store::CatalogStore;
