//! Knowledge graph builder
//!
//! Assembles a request-scoped graph over one dataset or one account. Nodes
//! come from the catalog (tables), the semantic model (entities) and, for
//! account scope, bounded row queries against the warehouse. Declared
//! mappings and relations become confidence-1.0 edges; inferred join
//! proposals carry their sub-1.0 scores. Graphs are never persisted.

pub mod builder;
pub mod model;

pub use builder::GraphBuilder;
pub use model::{GraphEdge, GraphNode, GraphResult, GraphScope, NodeKind};
