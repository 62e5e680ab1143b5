//! Catalog scan service
//!
//! `scan_source` walks a connector dataset-by-dataset, table-by-table, and
//! upserts what it finds. Failures are per-item: a table whose schema fetch
//! fails becomes a `ScanError` in the report while the rest of the scan
//! continues. Only `ConnectorError::Auth` aborts a scan, since nothing else
//! can succeed without re-credentialing.

use crate::store::CatalogStore;
use clientpulse_connector::{Connector, ConnectorError};
use clientpulse_core::{
    qualified_name, ColumnRecord, Config, DataSourceRecord, DatasetRecord, ScanReport, SourceKind,
    SourceStatus, TableRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Catalog-level errors
///
/// Per-item scan failures do NOT appear here; they are aggregated into the
/// `ScanReport`. This enum covers failures of the scan as a whole.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Authentication failed for source '{source_id}': {detail}")]
    Auth { source_id: String, detail: String },

    #[error("Could not list datasets for source '{source_id}': {source}")]
    DatasetListing {
        source_id: String,
        source: ConnectorError,
    },

    #[error("Catalog persistence failed: {0}")]
    Persistence(#[from] std::io::Error),
}

/// An attribute mapped onto a table's column, as seen from the catalog side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedAttribute {
    /// Business entity name
    pub entity: String,

    /// Attribute name
    pub attribute: String,

    /// Physical column the attribute is bound to
    pub column: String,
}

/// Technical metadata for a table merged with the mappings that reference it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table record
    pub table: TableRecord,

    /// Columns in ordinal order
    pub columns: Vec<ColumnRecord>,

    /// Attributes mapped onto this table
    pub mapped_attributes: Vec<MappedAttribute>,
}

/// Metadata catalog service
///
/// Holds the catalog store plus per-source scan locks. Scans of the same
/// source are serialized (single-flight per source id); scans of different
/// sources share no mutable state beyond the store's keyed upserts.
pub struct CatalogService {
    store: Arc<RwLock<CatalogStore>>,
    query_timeout: Duration,
    scan_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CatalogService {
    /// Create a service with an empty store
    pub fn new(config: &Config) -> Self {
        Self::with_store(CatalogStore::new(), config)
    }

    /// Create a service around an existing store (e.g. a restored snapshot)
    pub fn with_store(store: CatalogStore, config: &Config) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            query_timeout: config.query_timeout(),
            scan_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Scan one source and upsert everything it reports
    ///
    /// Resumable: per-dataset and per-table failures are collected into the
    /// returned `ScanReport` and the scan continues. `Auth` errors abort.
    pub async fn scan_source(
        &self,
        source_id: &str,
        kind: SourceKind,
        connector: &dyn Connector,
    ) -> Result<ScanReport, CatalogError> {
        // Single-flight per source id: a second scan of the same source waits
        // for the first instead of racing upserts on the same keys.
        let lock = {
            let mut locks = self.scan_locks.lock().await;
            Arc::clone(locks.entry(source_id.to_string()).or_default())
        };
        let _guard = lock.lock().await;

        info!(source_id, connector = connector.name(), "starting catalog scan");
        let mut report = ScanReport::new(source_id);

        let datasets = match self.bounded(connector.list_datasets()).await {
            Ok(datasets) => datasets,
            Err(e) if e.is_fatal() => {
                return Err(CatalogError::Auth {
                    source_id: source_id.to_string(),
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                return Err(CatalogError::DatasetListing {
                    source_id: source_id.to_string(),
                    source: e,
                })
            }
        };

        for dataset in &datasets {
            match self.scan_dataset(source_id, dataset, connector, &mut report).await {
                Ok(()) => report.datasets_scanned += 1,
                Err(e) if e.is_fatal() => {
                    return Err(CatalogError::Auth {
                        source_id: source_id.to_string(),
                        detail: e.to_string(),
                    })
                }
                Err(e) => {
                    warn!(source_id, dataset, error = %e, "dataset scan failed, continuing");
                    report.record_dataset_error(dataset, e.to_string(), e.is_retryable());
                }
            }
        }

        report.finish();

        let status = if report.is_clean() {
            SourceStatus::Connected
        } else {
            SourceStatus::Degraded
        };
        {
            let mut store = self.store.write().expect("catalog store poisoned");
            let mut source = DataSourceRecord::new(source_id, kind);
            source.status = status;
            store.upsert_source(source);
        }

        info!(
            source_id,
            datasets = report.datasets_scanned,
            tables = report.tables_scanned,
            columns = report.columns_scanned,
            errors = report.errors.len(),
            "catalog scan finished"
        );
        Ok(report)
    }

    /// Scan one dataset; table failures are recorded, not propagated
    async fn scan_dataset(
        &self,
        source_id: &str,
        dataset: &str,
        connector: &dyn Connector,
        report: &mut ScanReport,
    ) -> Result<(), ConnectorError> {
        let tables = self.bounded(connector.list_tables(dataset)).await?;

        {
            let mut store = self.store.write().expect("catalog store poisoned");
            store.upsert_dataset(DatasetRecord::new(source_id, dataset));
        }

        for meta in tables {
            let table_name = meta.name.clone();
            match self.bounded(connector.get_schema(dataset, &table_name)).await {
                Ok(schema) => {
                    let dataset_id = qualified_name(&[source_id, dataset]);
                    let record = TableRecord::new(&dataset_id, meta);
                    let fqn = record.fqn.clone();
                    let columns: Vec<ColumnRecord> = schema
                        .columns
                        .into_iter()
                        .map(|c| ColumnRecord::new(&fqn, c))
                        .collect();

                    let mut store = self.store.write().expect("catalog store poisoned");
                    report.columns_scanned += columns.len();
                    report.tables_scanned += 1;
                    store.upsert_table(record);
                    store.upsert_columns(&fqn, columns);
                    debug!(fqn, "table upserted");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(dataset, table = %table_name, error = %e, "schema fetch failed, continuing");
                    report.record_table_error(dataset, table_name, e.to_string(), e.is_retryable());
                }
            }
        }
        Ok(())
    }

    /// Impose the configured timeout on one connector call
    ///
    /// A timeout is a transient per-item failure, treated like any other
    /// retryable connector error by the scan loop.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ConnectorError>>,
    ) -> Result<T, ConnectorError> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ConnectorError::Timeout(format!(
                "warehouse call exceeded {}s",
                self.query_timeout.as_secs()
            ))),
        }
    }

    /// Ordered dataset summaries for a source
    pub fn list_datasets(&self, source_id: &str) -> Vec<DatasetRecord> {
        let store = self.store.read().expect("catalog store poisoned");
        store.list_datasets(source_id).into_iter().cloned().collect()
    }

    /// Ordered table summaries for a dataset
    pub fn list_tables(&self, source_id: &str, dataset: &str) -> Vec<TableRecord> {
        let store = self.store.read().expect("catalog store poisoned");
        store
            .list_tables(source_id, dataset)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Technical metadata merged with the mappings referencing a table
    ///
    /// The semantic layer owns mappings; callers pass the ones that point at
    /// this table (see `SemanticModel::mapped_attributes_for`).
    pub fn get_table_info(&self, fqn: &str, mapped: Vec<MappedAttribute>) -> Option<TableInfo> {
        let store = self.store.read().expect("catalog store poisoned");
        let table = store.get_table(fqn)?.clone();
        let columns = store.get_columns(fqn).to_vec();
        Some(TableInfo {
            table,
            columns,
            mapped_attributes: mapped,
        })
    }

    /// Clone of the current catalog contents
    ///
    /// Graph builds and mapping validation work against a point-in-time copy
    /// so they never hold the store lock across a warehouse call.
    pub fn snapshot(&self) -> CatalogStore {
        self.store.read().expect("catalog store poisoned").clone()
    }

    /// Snapshot the catalog to a file (the only durable state)
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), CatalogError> {
        let store = self.store.read().expect("catalog store poisoned");
        store.save_to_file(path)?;
        Ok(())
    }

    /// Restore a service from a snapshot file
    pub fn load_from_file(path: &std::path::Path, config: &Config) -> Result<Self, CatalogError> {
        let store = CatalogStore::load_from_file(path)?;
        Ok(Self::with_store(store, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientpulse_connector::MockConnector;
    use clientpulse_core::{ColumnMeta, LogicalType, Schema, TableMeta};

    fn schema() -> Schema {
        Schema::from_columns(vec![
            ColumnMeta::new("id", LogicalType::Int, 1),
            ColumnMeta::new("account_id", LogicalType::Int, 2),
        ])
    }

    async fn seeded_connector() -> MockConnector {
        let connector = MockConnector::new();
        connector
            .add_table("billing", TableMeta::new("invoices"), schema())
            .await;
        connector
            .add_table("billing", TableMeta::new("payments"), schema())
            .await;
        connector
            .add_table("sales", TableMeta::new("orders"), schema())
            .await;
        connector
    }

    #[tokio::test]
    async fn clean_scan_counts_everything() {
        let connector = seeded_connector().await;
        let service = CatalogService::new(&Config::default());

        let report = service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.datasets_scanned, 2);
        assert_eq!(report.tables_scanned, 3);
        assert_eq!(report.columns_scanned, 6);
        assert_eq!(
            service.snapshot().get_source("crm").unwrap().status,
            SourceStatus::Connected
        );
    }

    #[tokio::test]
    async fn rescan_is_idempotent() {
        let connector = seeded_connector().await;
        let service = CatalogService::new(&Config::default());

        service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();
        let counts_first = service.snapshot().counts();

        service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();
        assert_eq!(service.snapshot().counts(), counts_first);
    }

    #[tokio::test]
    async fn table_failure_does_not_abort_scan() {
        let connector = seeded_connector().await;
        connector
            .add_table_error(
                "billing",
                "payments",
                ConnectorError::Query("permission denied".into()),
            )
            .await;
        let service = CatalogService::new(&Config::default());

        let report = service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();

        assert_eq!(report.tables_scanned, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].table.as_deref(), Some("payments"));
        // The sibling table in the same dataset still landed
        assert!(service.snapshot().get_table("crm.billing.invoices").is_some());
        assert!(service.snapshot().get_table("crm.billing.payments").is_none());
        assert_eq!(
            service.snapshot().get_source("crm").unwrap().status,
            SourceStatus::Degraded
        );
    }

    #[tokio::test]
    async fn dataset_failure_keeps_siblings() {
        let connector = seeded_connector().await;
        connector
            .add_dataset_error("billing", ConnectorError::Connection("reset".into()))
            .await;
        let service = CatalogService::new(&Config::default());

        let report = service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();

        assert_eq!(report.datasets_scanned, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].dataset, "billing");
        assert!(report.errors[0].retryable);
        assert!(service.snapshot().get_table("crm.sales.orders").is_some());
    }

    #[tokio::test]
    async fn auth_failure_aborts_scan() {
        let connector = seeded_connector().await;
        connector
            .add_dataset_error("billing", ConnectorError::Auth("token expired".into()))
            .await;
        let service = CatalogService::new(&Config::default());

        let result = service.scan_source("crm", SourceKind::Mock, &connector).await;
        assert!(matches!(result, Err(CatalogError::Auth { .. })));
    }

    #[tokio::test]
    async fn listings_read_from_store() {
        let connector = seeded_connector().await;
        let service = CatalogService::new(&Config::default());
        service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();

        let datasets: Vec<String> = service
            .list_datasets("crm")
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(datasets, vec!["billing", "sales"]);

        let tables: Vec<String> = service
            .list_tables("crm", "billing")
            .into_iter()
            .map(|t| t.meta.name)
            .collect();
        assert_eq!(tables, vec!["invoices", "payments"]);
    }

    #[tokio::test]
    async fn table_info_merges_mappings() {
        let connector = seeded_connector().await;
        let service = CatalogService::new(&Config::default());
        service
            .scan_source("crm", SourceKind::Mock, &connector)
            .await
            .unwrap();

        let info = service
            .get_table_info(
                "crm.billing.invoices",
                vec![MappedAttribute {
                    entity: "Customer".into(),
                    attribute: "MRR".into(),
                    column: "account_id".into(),
                }],
            )
            .unwrap();

        assert_eq!(info.columns.len(), 2);
        assert_eq!(info.mapped_attributes[0].entity, "Customer");
        assert!(service.get_table_info("crm.billing.ghosts", vec![]).is_none());
    }
}
