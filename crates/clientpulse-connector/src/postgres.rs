//! PostgreSQL connector using information_schema
//!
//! Works with PostgreSQL 9.4+, Amazon Redshift and other wire-compatible
//! warehouses. Datasets map to non-system schemas; table row counts and byte
//! sizes come from `pg_class` statistics, so they are estimates, not exact.
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::connector::{ConnectionHealth, Connector, ConnectorError, QueryResult};
#[cfg(feature = "postgres")]
use clientpulse_core::{ColumnMeta, LogicalType, Nullability};
use clientpulse_core::{Schema, TableMeta};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;
#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls, Row};

/// PostgreSQL warehouse connector
pub struct PostgresConnector {
    #[cfg(feature = "postgres")]
    client: Client,

    /// Connection host, kept for error messages
    #[cfg(feature = "postgres")]
    host: String,

    /// Database name
    #[cfg(feature = "postgres")]
    database: String,

    #[cfg(not(feature = "postgres"))]
    _phantom: std::marker::PhantomData<()>,
}

#[cfg(feature = "postgres")]
impl PostgresConnector {
    /// Connect with direct credentials over a plain connection
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        let host = host.into();
        let database = database.into();
        let config = format!(
            "host={} port={} dbname={} user={} password={}",
            host,
            port,
            database,
            user.into(),
            password.into()
        );

        let (client, connection) = tokio_postgres::connect(&config, NoTls)
            .await
            .map_err(|e| classify_connect_error(&host, port, e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection task ended");
            }
        });

        Ok(Self {
            client,
            host,
            database,
        })
    }

    /// Connect with direct credentials over TLS
    pub async fn connect_with_tls(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        let host = host.into();
        let database = database.into();
        let config = format!(
            "host={} port={} dbname={} user={} password={} sslmode=require",
            host,
            port,
            database,
            user.into(),
            password.into()
        );

        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| ConnectorError::Config(format!("TLS setup failed: {}", e)))?;
        let tls = MakeTlsConnector::new(tls);

        let (client, connection) = tokio_postgres::connect(&config, tls)
            .await
            .map_err(|e| classify_connect_error(&host, port, e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection task ended");
            }
        });

        Ok(Self {
            client,
            host,
            database,
        })
    }

    fn map_query_error(&self, e: tokio_postgres::Error) -> ConnectorError {
        if e.is_closed() {
            ConnectorError::Connection(format!("connection to {} lost: {}", self.host, e))
        } else {
            ConnectorError::Query(e.to_string())
        }
    }
}

#[cfg(not(feature = "postgres"))]
impl PostgresConnector {
    /// Create connector without the postgres feature (returns error)
    pub async fn connect(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        Err(ConnectorError::Config(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    /// Create TLS connector without the postgres feature (returns error)
    pub async fn connect_with_tls(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        Err(ConnectorError::Config(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }
}

// The stub constructors always fail, so these methods are unreachable; the
// impl exists so `Box<dyn Connector>` call sites compile without the feature.
#[cfg(not(feature = "postgres"))]
#[async_trait::async_trait]
impl Connector for PostgresConnector {
    fn name(&self) -> &'static str {
        "Postgres"
    }

    async fn test_connection(&self) -> Result<ConnectionHealth, ConnectorError> {
        Err(feature_missing())
    }

    async fn list_datasets(&self) -> Result<Vec<String>, ConnectorError> {
        Err(feature_missing())
    }

    async fn list_tables(&self, _dataset: &str) -> Result<Vec<TableMeta>, ConnectorError> {
        Err(feature_missing())
    }

    async fn get_schema(&self, _dataset: &str, _table: &str) -> Result<Schema, ConnectorError> {
        Err(feature_missing())
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult, ConnectorError> {
        Err(feature_missing())
    }
}

#[cfg(not(feature = "postgres"))]
fn feature_missing() -> ConnectorError {
    ConnectorError::Config(
        "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
            .to_string(),
    )
}

#[cfg(feature = "postgres")]
fn classify_connect_error(host: &str, port: u16, e: tokio_postgres::Error) -> ConnectorError {
    let text = e.to_string();
    if text.contains("password") || text.contains("authentication") || text.contains("role") {
        ConnectorError::Auth(format!("{}:{}: {}", host, port, text))
    } else {
        ConnectorError::Connection(format!("{}:{}: {}", host, port, text))
    }
}

/// Convert one cell to JSON by probing common Rust target types
///
/// tokio-postgres needs a concrete type per get; probing i64/i32/f64/bool/
/// String covers the column types the catalog and scoring engine consume.
/// Anything else degrades to null rather than failing the whole query.
#[cfg(feature = "postgres")]
fn cell_to_json(row: &Row, idx: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<f32>>(idx) {
        return v
            .map(|f| serde_json::Value::from(f as f64))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    serde_json::Value::Null
}

#[cfg(feature = "postgres")]
#[async_trait::async_trait]
impl Connector for PostgresConnector {
    fn name(&self) -> &'static str {
        "Postgres"
    }

    async fn test_connection(&self) -> Result<ConnectionHealth, ConnectorError> {
        let started = std::time::Instant::now();
        let row = self
            .client
            .query_one("SELECT version()", &[])
            .await
            .map_err(|e| self.map_query_error(e))?;
        let version: String = row
            .try_get(0)
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        Ok(ConnectionHealth {
            ok: true,
            latency_ms: started.elapsed().as_millis() as u64,
            server_version: Some(version),
            detail: None,
        })
    }

    async fn list_datasets(&self) -> Result<Vec<String>, ConnectorError> {
        let rows = self
            .client
            .query(
                "SELECT schema_name FROM information_schema.schemata \
                 WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
                   AND schema_name NOT LIKE 'pg_%' \
                 ORDER BY schema_name",
                &[],
            )
            .await
            .map_err(|e| self.map_query_error(e))?;

        rows.iter()
            .map(|r| {
                r.try_get::<_, String>(0)
                    .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))
            })
            .collect()
    }

    async fn list_tables(&self, dataset: &str) -> Result<Vec<TableMeta>, ConnectorError> {
        let rows = self
            .client
            .query(
                "SELECT t.table_name, \
                        c.reltuples::BIGINT AS approx_rows, \
                        pg_total_relation_size(c.oid) AS total_bytes \
                 FROM information_schema.tables t \
                 JOIN pg_namespace n ON n.nspname = t.table_schema \
                 JOIN pg_class c ON c.relnamespace = n.oid AND c.relname = t.table_name \
                 WHERE t.table_schema = $1 AND t.table_type = 'BASE TABLE' \
                 ORDER BY t.table_name",
                &[&dataset],
            )
            .await
            .map_err(|e| self.map_query_error(e))?;

        if rows.is_empty() {
            // Distinguish a missing schema from an empty one
            let exists = self
                .client
                .query_opt(
                    "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1",
                    &[&dataset],
                )
                .await
                .map_err(|e| self.map_query_error(e))?;
            if exists.is_none() {
                return Err(ConnectorError::NotFound(format!(
                    "dataset '{}' in {}",
                    dataset, self.database
                )));
            }
        }

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("table_name")
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            let approx_rows: Option<i64> = row.try_get("approx_rows").ok();
            let total_bytes: Option<i64> = row.try_get("total_bytes").ok();

            let mut meta = TableMeta::new(name);
            // reltuples is -1 until the first ANALYZE
            if let Some(n) = approx_rows.filter(|n| *n >= 0) {
                meta = meta.with_row_count(n as u64);
            }
            if let Some(b) = total_bytes.filter(|b| *b >= 0) {
                meta = meta.with_byte_size(b as u64);
            }
            tables.push(meta);
        }
        Ok(tables)
    }

    async fn get_schema(&self, dataset: &str, table: &str) -> Result<Schema, ConnectorError> {
        let rows = self
            .client
            .query(
                "SELECT column_name, data_type, is_nullable, ordinal_position \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&dataset, &table],
            )
            .await
            .map_err(|e| self.map_query_error(e))?;

        if rows.is_empty() {
            return Err(ConnectorError::NotFound(format!(
                "table '{}.{}' in {}",
                dataset, table, self.database
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("column_name")
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            let declared: String = row
                .try_get("data_type")
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            let is_nullable: String = row
                .try_get("is_nullable")
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
            let ordinal: i32 = row
                .try_get("ordinal_position")
                .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

            let nullable = match is_nullable.as_str() {
                "YES" => Nullability::Yes,
                "NO" => Nullability::No,
                _ => Nullability::Unknown,
            };

            columns.push(
                ColumnMeta::new(name, LogicalType::from_warehouse_type(&declared), ordinal as u32)
                    .with_nullability(nullable),
            );
        }

        Ok(Schema::from_columns(columns))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ConnectorError> {
        let rows = self
            .client
            .query(sql, &[])
            .await
            .map_err(|e| self.map_query_error(e))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let data = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| cell_to_json(row, i)).collect())
            .collect();

        Ok(QueryResult {
            columns,
            rows: data,
        })
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn stub_reports_missing_feature() {
        use super::*;
        let result = PostgresConnector::connect("localhost", 5432, "crm", "user", "pass").await;
        assert!(matches!(result, Err(ConnectorError::Config(_))));
    }
}
