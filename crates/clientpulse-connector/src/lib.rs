//! Warehouse connectors for the ClientPulse catalog
//!
//! This crate provides a uniform, read-only interface over external analytical
//! warehouses: listing datasets and tables, fetching schemas, and running ad
//! hoc row queries. All implementations are side-effect-free on the source.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `postgres` - PostgreSQL/Redshift support
//!
//! ## Example
//!
//! ```rust,ignore
//! use clientpulse_connector::{Connector, PostgresConnector};
//!
//! let connector = PostgresConnector::connect("localhost", 5432, "crm", "user", "pass").await?;
//! let datasets = connector.list_datasets().await?;
//! let schema = connector.get_schema("billing", "subscriptions").await?;
//! ```

pub mod connector;
pub mod mock;
pub mod postgres;

pub use connector::{ConnectionHealth, Connector, ConnectorError, QueryResult};
pub use mock::MockConnector;
pub use postgres::PostgresConnector;
