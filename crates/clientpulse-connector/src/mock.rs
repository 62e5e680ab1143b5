//! Mock connector for testing and offline demos
//!
//! The mock holds a full miniature warehouse in memory: datasets, tables with
//! technical metadata, column schemas, and canned query results. It is used
//! for unit tests of the catalog scan, relationship inference sampling, graph
//! builds and scoring, and backs the CLI when no real warehouse is configured.
//!
//! ## Simulating failures
//!
//! ```rust,ignore
//! // Fail listing one dataset while its siblings keep scanning
//! let connector = MockConnector::new();
//! connector
//!     .add_dataset_error("billing", ConnectorError::Connection("reset".into()))
//!     .await;
//!
//! // Fail all connection checks
//! let connector = MockConnector::new().with_connection_failure();
//! ```

use crate::connector::{ConnectionHealth, Connector, ConnectorError, QueryResult};
use clientpulse_core::{Schema, TableMeta};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MockState {
    /// dataset name -> tables in listing order
    datasets: BTreeMap<String, Vec<TableMeta>>,

    /// "dataset.table" -> schema
    schemas: HashMap<String, Schema>,

    /// Canned query results, matched by substring of the submitted SQL
    query_fixtures: Vec<(String, QueryResult)>,

    /// Errors to inject for specific datasets
    dataset_errors: HashMap<String, ConnectorError>,

    /// Errors to inject for specific "dataset.table" schema fetches
    table_errors: HashMap<String, ConnectorError>,
}

/// In-memory connector with error and latency injection
pub struct MockConnector {
    state: Arc<RwLock<MockState>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulated latency per operation (milliseconds)
    latency_ms: u64,

    /// Name to return from name()
    connector_name: &'static str,
}

impl MockConnector {
    /// Create an empty mock warehouse
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            fail_connection: false,
            latency_ms: 0,
            connector_name: "Mock",
        }
    }

    /// Add a table with its schema under a dataset
    ///
    /// The dataset is created on first use; tables keep insertion order.
    pub async fn add_table(&self, dataset: &str, meta: TableMeta, schema: Schema) {
        let mut state = self.state.write().await;
        let key = format!("{}.{}", dataset, meta.name);
        state
            .datasets
            .entry(dataset.to_string())
            .or_default()
            .push(meta);
        state.schemas.insert(key, schema);
    }

    /// Register a canned result for any query containing `sql_fragment`
    ///
    /// Fixtures are matched in registration order; the first hit wins.
    pub async fn add_query_fixture(&self, sql_fragment: impl Into<String>, result: QueryResult) {
        self.state
            .write()
            .await
            .query_fixtures
            .push((sql_fragment.into(), result));
    }

    /// Inject an error for listing one dataset's tables
    pub async fn add_dataset_error(&self, dataset: &str, error: ConnectorError) {
        self.state
            .write()
            .await
            .dataset_errors
            .insert(dataset.to_string(), error);
    }

    /// Inject an error for one table's schema fetch
    pub async fn add_table_error(&self, dataset: &str, table: &str, error: ConnectorError) {
        self.state
            .write()
            .await
            .table_errors
            .insert(format!("{}.{}", dataset, table), error);
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom connector name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.connector_name = name;
        self
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockConnector {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            connector_name: self.connector_name,
        }
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &'static str {
        self.connector_name
    }

    async fn test_connection(&self) -> Result<ConnectionHealth, ConnectorError> {
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(ConnectorError::Connection(
                "Simulated connection failure".to_string(),
            ));
        }

        Ok(ConnectionHealth {
            ok: true,
            latency_ms: self.latency_ms,
            server_version: Some("mock-1.0".to_string()),
            detail: None,
        })
    }

    async fn list_datasets(&self) -> Result<Vec<String>, ConnectorError> {
        self.simulate_latency().await;
        Ok(self.state.read().await.datasets.keys().cloned().collect())
    }

    async fn list_tables(&self, dataset: &str) -> Result<Vec<TableMeta>, ConnectorError> {
        self.simulate_latency().await;
        let state = self.state.read().await;

        if let Some(error) = state.dataset_errors.get(dataset) {
            return Err(error.clone());
        }

        state
            .datasets
            .get(dataset)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("dataset '{}'", dataset)))
    }

    async fn get_schema(&self, dataset: &str, table: &str) -> Result<Schema, ConnectorError> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        let key = format!("{}.{}", dataset, table);

        if let Some(error) = state.table_errors.get(&key) {
            return Err(error.clone());
        }

        state
            .schemas
            .get(&key)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("table '{}'", key)))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectorError> {
        self.simulate_latency().await;
        let state = self.state.read().await;

        for (fragment, result) in &state.query_fixtures {
            if sql.contains(fragment.as_str()) {
                return Ok(result.clone());
            }
        }

        // Unmatched queries return an empty result rather than erroring so
        // account-scoped graph builds on unseeded tables see zero rows.
        Ok(QueryResult::new(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientpulse_core::{ColumnMeta, LogicalType};

    fn accounts_schema() -> Schema {
        Schema::from_columns(vec![
            ColumnMeta::new("id", LogicalType::Int, 1),
            ColumnMeta::new("name", LogicalType::String, 2),
        ])
    }

    #[tokio::test]
    async fn lists_datasets_in_order() {
        let connector = MockConnector::new();
        connector
            .add_table("sales", TableMeta::new("orders"), accounts_schema())
            .await;
        connector
            .add_table("billing", TableMeta::new("invoices"), accounts_schema())
            .await;

        // BTreeMap keeps dataset listing deterministic
        let datasets = connector.list_datasets().await.unwrap();
        assert_eq!(datasets, vec!["billing", "sales"]);
    }

    #[tokio::test]
    async fn fetches_schema_and_reports_missing() {
        let connector = MockConnector::new();
        connector
            .add_table("crm", TableMeta::new("accounts"), accounts_schema())
            .await;

        let schema = connector.get_schema("crm", "accounts").await.unwrap();
        assert_eq!(schema.columns.len(), 2);

        let missing = connector.get_schema("crm", "ghosts").await;
        assert!(matches!(missing, Err(ConnectorError::NotFound(_))));
    }

    #[tokio::test]
    async fn injected_errors_surface() {
        let connector = MockConnector::new();
        connector
            .add_table("crm", TableMeta::new("accounts"), accounts_schema())
            .await;
        connector
            .add_table_error("crm", "accounts", ConnectorError::Query("boom".into()))
            .await;
        connector
            .add_dataset_error("billing", ConnectorError::Connection("reset".into()))
            .await;

        assert!(matches!(
            connector.get_schema("crm", "accounts").await,
            Err(ConnectorError::Query(_))
        ));
        assert!(matches!(
            connector.list_tables("billing").await,
            Err(ConnectorError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn connection_failure_simulation() {
        let connector = MockConnector::new().with_connection_failure();
        let result = connector.test_connection().await;
        assert!(matches!(result, Err(ConnectorError::Connection(_))));

        let healthy = MockConnector::new();
        let health = healthy.test_connection().await.unwrap();
        assert!(health.ok);
    }

    #[tokio::test]
    async fn query_fixtures_match_by_fragment() {
        let connector = MockConnector::new();
        connector
            .add_query_fixture(
                "FROM crm.accounts",
                QueryResult {
                    columns: vec!["id".into()],
                    rows: vec![vec![serde_json::json!(1)]],
                },
            )
            .await;

        let hit = connector
            .execute_query("SELECT id FROM crm.accounts WHERE id = 1")
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = connector.execute_query("SELECT 1").await.unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let connector = MockConnector::new();
        let cloned = connector.clone();
        connector
            .add_table("crm", TableMeta::new("accounts"), accounts_schema())
            .await;

        assert_eq!(cloned.list_datasets().await.unwrap(), vec!["crm"]);
    }
}
