//! Connector trait for read-only warehouse access

use clientpulse_core::{Schema, TableMeta};
use serde::{Deserialize, Serialize};

/// Errors that can occur when talking to a warehouse
///
/// The taxonomy matters to callers: `Auth` requires re-credentialing and is
/// surfaced immediately, `Connection`/`Timeout` are transient and retryable,
/// `NotFound` turns into an explicit empty or partial result upstream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConnectorError {
    /// Whether the caller may retry this operation (with backoff)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Whether this error requires re-credentialing before any retry
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Result of a connection health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    /// Whether the warehouse answered
    pub ok: bool,

    /// Round-trip latency of the check, in milliseconds
    pub latency_ms: u64,

    /// Server version string, when the warehouse reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,

    /// Free-form detail (error text on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Rows returned from an ad hoc query
///
/// Cells are `serde_json::Value` so connectors can return heterogeneous
/// warehouse types without a per-warehouse row representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in select order
    pub columns: Vec<String>,

    /// Row values, one Vec per row, aligned with `columns`
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Create an empty result with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Index of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of a named column in a row, if both exist
    pub fn value(&self, row: usize, column: &str) -> Option<&serde_json::Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait for read-only warehouse connectors
///
/// One connector instance corresponds to one configured data source. Every
/// operation is read-only; none mutates warehouse state. Callers own timeout
/// and retry policy (see the catalog service).
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Get the connector name (e.g., "Postgres", "Mock")
    fn name(&self) -> &'static str;

    /// Test the connection and report a health summary
    async fn test_connection(&self) -> Result<ConnectionHealth, ConnectorError>;

    /// List dataset (schema/namespace) names, in a stable order
    async fn list_datasets(&self) -> Result<Vec<String>, ConnectorError>;

    /// List tables in a dataset with technical metadata
    async fn list_tables(&self, dataset: &str) -> Result<Vec<TableMeta>, ConnectorError>;

    /// Fetch the column schema for a table
    ///
    /// This should query the warehouse's INFORMATION_SCHEMA (or equivalent)
    /// to get column names, declared types, nullability and ordinals.
    async fn get_schema(&self, dataset: &str, table: &str) -> Result<Schema, ConnectorError>;

    /// Run an ad hoc read-only query
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectorError>;
}
