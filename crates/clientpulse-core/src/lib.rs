//! ClientPulse Core
//!
//! Core domain model with stable, versioned types.
//! Never rename diagnostic codes - they are part of the public API.

pub mod config;
pub mod diagnostic;
pub mod records;
pub mod report;
pub mod schema;

pub use config::{
    Config, ConfigError, ConnectorConfig, GraphConfig, InferenceConfig, ScoringConfig,
    WarehouseConfig,
};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use records::{
    qualified_name, ColumnRecord, DataSourceRecord, DatasetRecord, SourceKind, SourceStatus,
    TableRecord,
};
pub use report::{ScanError, ScanReport};
pub use schema::{ColumnMeta, LogicalType, Nullability, Schema, TableMeta};
