//! Graph node, edge and result types

use clientpulse_core::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a graph build is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum GraphScope {
    /// All tables of one dataset plus the semantic layer over them
    Dataset {
        source_id: String,
        dataset_id: String,
    },

    /// One account's rows across every account-keyed table
    Account { account_id: String },
}

impl std::fmt::Display for GraphScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dataset {
                source_id,
                dataset_id,
            } => write!(f, "dataset {}.{}", source_id, dataset_id),
            Self::Account { account_id } => write!(f, "account {}", account_id),
        }
    }
}

/// Node categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Table,
    Entity,
    Account,
    Row,
}

/// A graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable id, unique within one result
    pub id: String,

    /// Display label
    pub label: String,

    /// Node category
    pub kind: NodeKind,

    /// Open property bag
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl GraphNode {
    /// Create a node with an empty property bag
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property
    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// A directed edge between two node ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id
    pub from: String,

    /// Target node id
    pub to: String,

    /// Edge label (e.g. "MAPS_TO", "HAS_MANY", "INFERRED_JOIN")
    pub label: String,

    /// 1.0 for declared facts, < 1.0 for inferred proposals
    pub confidence: f64,

    /// Open property bag
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl GraphEdge {
    /// Create an edge with an empty property bag
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.into(),
            confidence,
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property
    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// Result of one graph build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,

    /// True when the node cap forced nodes to be dropped
    pub truncated: bool,

    /// Human-readable note, set on truncation or an empty scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Non-fatal problems encountered during the build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl GraphResult {
    /// True when the build produced no nodes at all
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by id
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Serialize for the UI boundary
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
