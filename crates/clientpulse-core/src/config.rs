//! Configuration schema (clientpulse.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connector-boundary settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Timeout applied by callers to every warehouse call, in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_query_timeout() -> u64 {
    30
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
        }
    }
}

/// Relationship-inference settings
///
/// The heuristic is approximate; thresholds are configurable because false
/// positives are expected and must stay inspectable by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Maximum distinct values sampled per candidate column
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,

    /// Whether to run value-overlap sampling at all
    #[serde(default = "default_true")]
    pub enable_sampling: bool,

    /// Numeric score attached to name-match-only edges
    #[serde(default = "default_low_confidence")]
    pub low_confidence: f64,

    /// Numeric score attached to name-match + value-overlap edges
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
}

fn default_sample_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_low_confidence() -> f64 {
    0.5
}

fn default_high_confidence() -> f64 {
    0.85
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
            enable_sampling: true,
            low_confidence: default_low_confidence(),
            high_confidence: default_high_confidence(),
        }
    }
}

/// Knowledge-graph build settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Hard cap on nodes per build; exceeding it truncates the result
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Row limit for account-scoped seed queries
    #[serde(default = "default_account_row_limit")]
    pub account_row_limit: usize,
}

fn default_max_nodes() -> usize {
    1000
}

fn default_account_row_limit() -> usize {
    25
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            account_row_limit: default_account_row_limit(),
        }
    }
}

/// Scoring-engine constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Fixed discount applied to health score to produce the CNS display value
    #[serde(default = "default_cns_discount")]
    pub cns_discount: f64,

    /// Additive churn boost per recent failed transaction
    #[serde(default = "default_failure_boost_per_failure")]
    pub failure_boost_per_failure: f64,

    /// Upper bound on the total churn failure boost
    #[serde(default = "default_failure_boost_cap")]
    pub failure_boost_cap: f64,
}

fn default_cns_discount() -> f64 {
    0.8
}

fn default_failure_boost_per_failure() -> f64 {
    5.0
}

fn default_failure_boost_cap() -> f64 {
    15.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cns_discount: default_cns_discount(),
            failure_boost_per_failure: default_failure_boost_per_failure(),
            failure_boost_cap: default_failure_boost_cap(),
        }
    }
}

/// Warehouse connection settings (connector-specific)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse type (postgres, mock, ...)
    #[serde(rename = "type")]
    pub warehouse_type: String,

    /// Connection settings (warehouse-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Connector-boundary settings
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Relationship-inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Knowledge-graph settings
    #[serde(default)]
    pub graph: GraphConfig,

    /// Scoring constants
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Warehouse connection (optional; the CLI falls back to the demo mock)
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Query timeout as a Duration
    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connector.query_timeout_secs)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
