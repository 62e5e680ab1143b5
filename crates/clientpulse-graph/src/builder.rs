//! Graph assembly over catalog, semantic model and inferred edges

use crate::model::{GraphEdge, GraphNode, GraphResult, GraphScope, NodeKind};
use clientpulse_catalog::CatalogStore;
use clientpulse_connector::Connector;
use clientpulse_core::{Diagnostic, DiagnosticCode, GraphConfig, Severity};
use clientpulse_semantic::{InferredEdge, SemanticModel};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Builds request-scoped knowledge graphs
///
/// Holds read-only views of the catalog and the semantic model for the
/// duration of one request. Missing catalog or semantic pieces skip the
/// affected node or edge and surface a diagnostic (`GRAPH_NODE_SKIPPED`, or
/// a `MAPPING_UNRESOLVED_*` code when a declared mapping no longer resolves
/// against the catalog); they never fail the build.
pub struct GraphBuilder<'a> {
    store: &'a CatalogStore,
    model: &'a SemanticModel,
    config: GraphConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a CatalogStore, model: &'a SemanticModel, config: &GraphConfig) -> Self {
        Self {
            store,
            model,
            config: config.clone(),
        }
    }

    /// Build a graph for the given scope
    ///
    /// Account scope needs warehouse access for its row queries; dataset
    /// scope works from the catalog alone and ignores the connector.
    pub async fn build(
        &self,
        scope: &GraphScope,
        connector: Option<&dyn Connector>,
        inferred: &[InferredEdge],
    ) -> GraphResult {
        match scope {
            GraphScope::Dataset {
                source_id,
                dataset_id,
            } => self.build_dataset(source_id, dataset_id, inferred),
            GraphScope::Account { account_id } => match connector {
                Some(connector) => self.build_account(account_id, connector).await,
                None => GraphResult {
                    reason: Some("account scope requires a connector".to_string()),
                    ..GraphResult::default()
                },
            },
        }
    }

    /// Dataset scope: table nodes, entity nodes, mapping/relation/inferred edges
    pub fn build_dataset(
        &self,
        source_id: &str,
        dataset_id: &str,
        inferred: &[InferredEdge],
    ) -> GraphResult {
        let mut assembly = Assembly::default();

        let tables = self.store.list_tables(source_id, dataset_id);
        if tables.is_empty() {
            return GraphResult {
                reason: Some("no data for scope".to_string()),
                ..GraphResult::default()
            };
        }

        for table in &tables {
            let mut node = GraphNode::new(&table.fqn, &table.meta.name, NodeKind::Table)
                .with_property("dataset", serde_json::json!(table.dataset_id));
            if let Some(rows) = table.meta.row_count {
                node = node.with_property("row_count", serde_json::json!(rows));
            }
            assembly.add_node(node);
        }

        // Declared mappings attach entities to tables at full confidence.
        // Mappings are validated when added, but the catalog can drift under
        // them on rescan; drift surfaces as MAPPING_UNRESOLVED_* diagnostics.
        for mapping in &self.model.mappings {
            if self.store.get_table(&mapping.table_fqn).is_none() {
                assembly.unresolved_mapping(
                    DiagnosticCode::MappingUnresolvedTable,
                    format!(
                        "mapping {}.{} targets a table no longer in the catalog",
                        mapping.entity, mapping.attribute
                    ),
                    &mapping.table_fqn,
                );
                continue;
            }
            if !assembly.has_node(&mapping.table_fqn) {
                // Mapped into a table outside this scope
                continue;
            }
            if !self.store.has_column(&mapping.table_fqn, &mapping.column) {
                assembly.unresolved_mapping(
                    DiagnosticCode::MappingUnresolvedColumn,
                    format!(
                        "mapping {}.{} targets missing column {}.{}",
                        mapping.entity, mapping.attribute, mapping.table_fqn, mapping.column
                    ),
                    &mapping.table_fqn,
                );
                continue;
            }
            let entity_id = entity_node_id(&mapping.entity);
            assembly.add_node(GraphNode::new(&entity_id, &mapping.entity, NodeKind::Entity));
            assembly.add_edge(
                GraphEdge::new(&entity_id, &mapping.table_fqn, "MAPS_TO", 1.0)
                    .with_property("attribute", serde_json::json!(mapping.attribute))
                    .with_property("column", serde_json::json!(mapping.column)),
            );
        }

        // Declared relations link entity nodes already present in scope
        for relation in &self.model.relations {
            let from = entity_node_id(&relation.from_entity);
            let to = entity_node_id(&relation.to_entity);
            if assembly.has_node(&from) && assembly.has_node(&to) {
                assembly.add_edge(GraphEdge::new(&from, &to, relation.kind.to_string(), 1.0));
            } else {
                assembly.skip(format!(
                    "relation {} -> {} has no mapped entity in scope",
                    relation.from_entity, relation.to_entity
                ));
            }
        }

        // Inferred join proposals, clearly marked by their sub-1.0 confidence
        for edge in inferred {
            if assembly.has_node(&edge.left_table) && assembly.has_node(&edge.right_table) {
                assembly.add_edge(
                    GraphEdge::new(&edge.left_table, &edge.right_table, "INFERRED_JOIN", edge.score)
                        .with_property("left_column", serde_json::json!(edge.left_column))
                        .with_property("right_column", serde_json::json!(edge.right_column))
                        .with_property("basis", serde_json::json!(edge.basis)),
                );
            }
        }

        self.finish(assembly)
    }

    /// Account scope: bounded row queries per account-keyed table
    pub async fn build_account(&self, account_id: &str, connector: &dyn Connector) -> GraphResult {
        let mut assembly = Assembly::default();
        let account_node_id = format!("account:{}", account_id);
        let mut any_rows = false;

        for table in self.account_keyed_tables() {
            let sql = format!(
                "SELECT * FROM {} WHERE account_id = '{}' LIMIT {}",
                sql_table_name(&table.fqn),
                account_id.replace('\'', "''"),
                self.config.account_row_limit
            );
            let result = match connector.execute_query(&sql).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(table = %table.fqn, error = %e, "account row query failed");
                    assembly.skip(format!("row query against {} failed: {}", table.fqn, e));
                    continue;
                }
            };
            if result.is_empty() {
                continue;
            }
            any_rows = true;

            assembly.add_node(GraphNode::new(&table.fqn, &table.meta.name, NodeKind::Table));
            for (idx, row) in result.rows.iter().enumerate() {
                let row_id = format!("{}#{}", table.fqn, idx + 1);
                let mut node = GraphNode::new(
                    &row_id,
                    format!("{} row {}", table.meta.name, idx + 1),
                    NodeKind::Row,
                );
                for (column, value) in result.columns.iter().zip(row) {
                    node.properties.insert(column.clone(), value.clone());
                }
                assembly.add_node(node);
                assembly.add_edge(GraphEdge::new(&account_node_id, &row_id, "OWNS", 1.0));
                assembly.add_edge(GraphEdge::new(&row_id, &table.fqn, "ROW_OF", 1.0));
            }
        }

        if !any_rows {
            debug!(account_id, "no rows matched the account scope");
            return GraphResult {
                reason: Some("no data for scope".to_string()),
                diagnostics: assembly.diagnostics,
                ..GraphResult::default()
            };
        }

        assembly.add_node(GraphNode::new(&account_node_id, account_id, NodeKind::Account));
        self.finish(assembly)
    }

    /// Tables carrying an `account_id` column, in catalog order
    fn account_keyed_tables(&self) -> Vec<&clientpulse_core::TableRecord> {
        self.store
            .list_all_tables()
            .into_iter()
            .filter(|t| self.store.has_column(&t.fqn, "account_id"))
            .collect()
    }

    /// Apply the node cap and produce the final result
    fn finish(&self, assembly: Assembly) -> GraphResult {
        let Assembly {
            nodes,
            edges,
            mut diagnostics,
        } = assembly;

        let total = nodes.len();
        if total <= self.config.max_nodes {
            return GraphResult {
                nodes: nodes.into_values().collect(),
                edges,
                truncated: false,
                reason: None,
                diagnostics,
            };
        }

        // Retention priority: nodes attached by an authoritative edge first,
        // then by degree, with id order breaking ties for determinism
        let kept: HashSet<String> = {
            let mut authoritative: HashSet<&str> = HashSet::new();
            let mut degree: HashMap<&str, usize> = HashMap::new();
            for edge in &edges {
                *degree.entry(edge.from.as_str()).or_default() += 1;
                *degree.entry(edge.to.as_str()).or_default() += 1;
                if edge.confidence >= 1.0 {
                    authoritative.insert(edge.from.as_str());
                    authoritative.insert(edge.to.as_str());
                }
            }

            let mut ranked: Vec<&str> = nodes.keys().map(String::as_str).collect();
            ranked.sort_by_key(|id| {
                (
                    !authoritative.contains(id),
                    std::cmp::Reverse(degree.get(id).copied().unwrap_or(0)),
                    id.to_string(),
                )
            });
            ranked
                .into_iter()
                .take(self.config.max_nodes)
                .map(String::from)
                .collect()
        };

        let reason = format!(
            "node cap {} exceeded; kept {} of {} nodes",
            self.config.max_nodes,
            kept.len(),
            total
        );
        warn!(%reason, "graph truncated");
        diagnostics.push(Diagnostic::new(
            DiagnosticCode::GraphTruncated,
            Severity::Warn,
            reason.clone(),
        ));

        GraphResult {
            nodes: nodes
                .into_iter()
                .filter(|(id, _)| kept.contains(id))
                .map(|(_, node)| node)
                .collect(),
            edges: edges
                .into_iter()
                .filter(|e| kept.contains(&e.from) && kept.contains(&e.to))
                .collect(),
            truncated: true,
            reason: Some(reason),
            diagnostics,
        }
    }
}

fn entity_node_id(entity: &str) -> String {
    format!("entity:{}", entity)
}

/// SQL sees `dataset.table`; the catalog key carries the source prefix too
fn sql_table_name(fqn: &str) -> &str {
    match fqn.find('.') {
        Some(idx) => &fqn[idx + 1..],
        None => fqn,
    }
}

/// Intermediate graph state with dedupe rules applied on insert
#[derive(Default)]
struct Assembly {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    diagnostics: Vec<Diagnostic>,
}

impl Assembly {
    fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn add_node(&mut self, node: GraphNode) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    /// Insert an edge, keeping at most one per unordered node pair
    ///
    /// On a collision the higher-confidence edge wins its label and score;
    /// properties merge either way. Self-edges are dropped.
    fn add_edge(&mut self, edge: GraphEdge) {
        if edge.from == edge.to {
            return;
        }
        let existing = self.edges.iter_mut().find(|e| {
            (e.from == edge.from && e.to == edge.to) || (e.from == edge.to && e.to == edge.from)
        });
        match existing {
            Some(current) => {
                let mut properties = std::mem::take(&mut current.properties);
                for (key, value) in edge.properties.iter() {
                    properties.entry(key.clone()).or_insert_with(|| value.clone());
                }
                if edge.confidence > current.confidence {
                    *current = edge;
                }
                current.properties = properties;
            }
            None => self.edges.push(edge),
        }
    }

    fn skip(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticCode::GraphNodeSkipped,
            Severity::Info,
            message,
        ));
    }

    fn unresolved_mapping(&mut self, code: DiagnosticCode, message: String, table_fqn: &str) {
        self.diagnostics
            .push(Diagnostic::new(code, Severity::Warn, message).with_subject(table_fqn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_edges_are_dropped() {
        let mut assembly = Assembly::default();
        assembly.add_edge(GraphEdge::new("a", "a", "LOOP", 1.0));
        assert!(assembly.edges.is_empty());
    }

    #[test]
    fn unordered_pair_keeps_highest_confidence() {
        let mut assembly = Assembly::default();
        assembly.add_edge(
            GraphEdge::new("a", "b", "INFERRED_JOIN", 0.5)
                .with_property("basis", serde_json::json!("name match")),
        );
        assembly.add_edge(GraphEdge::new("b", "a", "MAPS_TO", 1.0));

        assert_eq!(assembly.edges.len(), 1);
        let edge = &assembly.edges[0];
        assert_eq!(edge.label, "MAPS_TO");
        assert_eq!(edge.confidence, 1.0);
        // Properties from the losing edge survive the merge
        assert_eq!(edge.properties["basis"], serde_json::json!("name match"));
    }

    #[test]
    fn lower_confidence_collision_merges_without_replacing() {
        let mut assembly = Assembly::default();
        assembly.add_edge(GraphEdge::new("a", "b", "MAPS_TO", 1.0));
        assembly.add_edge(GraphEdge::new("a", "b", "INFERRED_JOIN", 0.85));

        assert_eq!(assembly.edges.len(), 1);
        assert_eq!(assembly.edges[0].label, "MAPS_TO");
    }
}
