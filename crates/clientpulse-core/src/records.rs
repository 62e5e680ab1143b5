//! Catalog records mirrored from external warehouses
//!
//! Each record carries explicit required fields plus an opaque `extra` map for
//! anything the warehouse reports that the catalog does not model. Records are
//! keyed by qualified names so repeated scans upsert rather than duplicate.

use crate::schema::{ColumnMeta, TableMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build the qualified name used as an upsert key
///
/// Segments are joined with `.`: `source.dataset.table[.column]`.
pub fn qualified_name(segments: &[&str]) -> String {
    segments.join(".")
}

/// The kind of external warehouse behind a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PostgreSQL-compatible warehouse (Postgres, Redshift, ...)
    Postgres,

    /// In-memory mock source, used for tests and demos
    Mock,

    /// Anything else, preserved verbatim
    Other(String),
}

/// Connection status of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Last health check succeeded
    Connected,

    /// Reachable but the last scan reported per-item failures
    Degraded,

    /// Last health check failed
    Unreachable,
}

/// One configured connection to an external warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceRecord {
    /// Source id, unique per physical external account
    pub id: String,

    /// Warehouse kind
    pub kind: SourceKind,

    /// Connection status as of the last scan or health check
    pub status: SourceStatus,

    /// Unrecognized source attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DataSourceRecord {
    /// Create a new source record in `Connected` state
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            status: SourceStatus::Connected,
            extra: BTreeMap::new(),
        }
    }
}

/// A logical dataset (schema/namespace) under a data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Qualified id: `source.dataset`
    pub id: String,

    /// Owning source id
    pub source_id: String,

    /// Dataset name within the source
    pub name: String,

    /// Physical location, when reported
    pub location: Option<String>,

    /// Free-form description, when reported
    pub description: Option<String>,

    /// Unrecognized dataset attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DatasetRecord {
    /// Create a dataset record under a source
    pub fn new(source_id: impl Into<String>, name: impl Into<String>) -> Self {
        let source_id = source_id.into();
        let name = name.into();
        Self {
            id: qualified_name(&[&source_id, &name]),
            source_id,
            name,
            location: None,
            description: None,
            extra: BTreeMap::new(),
        }
    }
}

/// A physical table under exactly one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Qualified id: `source.dataset.table`
    pub fqn: String,

    /// Owning dataset id (`source.dataset`)
    pub dataset_id: String,

    /// Technical metadata from the warehouse
    pub meta: TableMeta,

    /// Unrecognized table attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TableRecord {
    /// Create a table record under a dataset
    pub fn new(dataset_id: impl Into<String>, meta: TableMeta) -> Self {
        let dataset_id = dataset_id.into();
        Self {
            fqn: qualified_name(&[&dataset_id, &meta.name]),
            dataset_id,
            meta,
            extra: BTreeMap::new(),
        }
    }
}

/// A column under exactly one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    /// Owning table fqn (`source.dataset.table`)
    pub table_fqn: String,

    /// Column metadata
    pub column: ColumnMeta,

    /// Unrecognized column attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ColumnRecord {
    /// Create a column record under a table
    pub fn new(table_fqn: impl Into<String>, column: ColumnMeta) -> Self {
        Self {
            table_fqn: table_fqn.into(),
            column,
            extra: BTreeMap::new(),
        }
    }
}
