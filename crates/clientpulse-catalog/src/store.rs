//! Keyed, upsertable catalog records with JSON snapshot persistence

use clientpulse_core::{
    qualified_name, ColumnRecord, DataSourceRecord, DatasetRecord, TableRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory catalog keyed by qualified names
///
/// BTreeMaps keep dataset and table listings in a stable order, and upserts
/// keyed by qualified name make repeated scans idempotent: scanning an
/// unchanged source twice leaves identical record counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStore {
    /// source id -> source record
    sources: BTreeMap<String, DataSourceRecord>,

    /// "source.dataset" -> dataset record
    datasets: BTreeMap<String, DatasetRecord>,

    /// "source.dataset.table" -> table record
    tables: BTreeMap<String, TableRecord>,

    /// "source.dataset.table" -> column records in ordinal order
    columns: BTreeMap<String, Vec<ColumnRecord>>,
}

impl CatalogStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a source record
    pub fn upsert_source(&mut self, source: DataSourceRecord) {
        self.sources.insert(source.id.clone(), source);
    }

    /// Insert or replace a dataset record
    pub fn upsert_dataset(&mut self, dataset: DatasetRecord) {
        self.datasets.insert(dataset.id.clone(), dataset);
    }

    /// Insert or replace a table record
    pub fn upsert_table(&mut self, table: TableRecord) {
        self.tables.insert(table.fqn.clone(), table);
    }

    /// Replace all column records for a table
    ///
    /// Columns are replaced wholesale so a rescan drops columns the warehouse
    /// no longer reports instead of accreting stale ones.
    pub fn upsert_columns(&mut self, table_fqn: &str, columns: Vec<ColumnRecord>) {
        self.columns.insert(table_fqn.to_string(), columns);
    }

    /// Get a source record
    pub fn get_source(&self, source_id: &str) -> Option<&DataSourceRecord> {
        self.sources.get(source_id)
    }

    /// Get a dataset record by qualified id
    pub fn get_dataset(&self, dataset_id: &str) -> Option<&DatasetRecord> {
        self.datasets.get(dataset_id)
    }

    /// Get a table record by fqn
    pub fn get_table(&self, fqn: &str) -> Option<&TableRecord> {
        self.tables.get(fqn)
    }

    /// Get a table's columns in ordinal order
    pub fn get_columns(&self, fqn: &str) -> &[ColumnRecord] {
        self.columns.get(fqn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a column exists under a table
    pub fn has_column(&self, table_fqn: &str, column: &str) -> bool {
        self.get_columns(table_fqn)
            .iter()
            .any(|c| c.column.name.eq_ignore_ascii_case(column))
    }

    /// List datasets under a source, in id order
    pub fn list_datasets(&self, source_id: &str) -> Vec<&DatasetRecord> {
        self.datasets
            .values()
            .filter(|d| d.source_id == source_id)
            .collect()
    }

    /// List tables under a dataset, in fqn order
    pub fn list_tables(&self, source_id: &str, dataset: &str) -> Vec<&TableRecord> {
        let dataset_id = qualified_name(&[source_id, dataset]);
        self.tables
            .values()
            .filter(|t| t.dataset_id == dataset_id)
            .collect()
    }

    /// List every table in the catalog, in fqn order
    pub fn list_all_tables(&self) -> Vec<&TableRecord> {
        self.tables.values().collect()
    }

    /// Total record counts: (sources, datasets, tables, columns)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.sources.len(),
            self.datasets.len(),
            self.tables.len(),
            self.columns.values().map(Vec::len).sum(),
        )
    }

    /// Serialize the catalog to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Snapshot the catalog to a file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// Restore a catalog from a snapshot file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
