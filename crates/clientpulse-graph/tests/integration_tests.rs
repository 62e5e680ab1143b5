//! Integration tests for graph builds over catalog, semantic and mock data

use clientpulse_catalog::CatalogStore;
use clientpulse_connector::{MockConnector, QueryResult};
use clientpulse_core::{
    ColumnMeta, ColumnRecord, DatasetRecord, GraphConfig, LogicalType, TableMeta, TableRecord,
};
use clientpulse_graph::{GraphBuilder, NodeKind};
use clientpulse_semantic::{
    Confidence, EntityDefinition, InferredEdge, Mapping, Relation, RelationKind, SemanticModel,
};
use pretty_assertions::assert_eq;

fn add_table(store: &mut CatalogStore, dataset_id: &str, table: &str, columns: &[&str]) {
    let record = TableRecord::new(dataset_id, TableMeta::new(table).with_row_count(10));
    let fqn = record.fqn.clone();
    store.upsert_table(record);
    store.upsert_columns(
        &fqn,
        columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ColumnRecord::new(&fqn, ColumnMeta::new(*name, LogicalType::Int, i as u32 + 1))
            })
            .collect(),
    );
}

fn sales_catalog() -> CatalogStore {
    let mut store = CatalogStore::new();
    store.upsert_dataset(DatasetRecord::new("crm", "sales"));
    add_table(&mut store, "crm.sales", "customers", &["id", "name"]);
    add_table(&mut store, "crm.sales", "orders", &["id", "customer_id", "account_id", "amount"]);
    store
}

fn sales_model(store: &CatalogStore) -> SemanticModel {
    let mut model = SemanticModel::new();
    model.add_entity(EntityDefinition::new("Customer").with_attribute("Name"));
    model.add_entity(EntityDefinition::new("Order").with_attribute("Amount"));
    model
        .add_mapping(
            Mapping {
                entity: "Customer".into(),
                attribute: "Name".into(),
                table_fqn: "crm.sales.customers".into(),
                column: "name".into(),
            },
            store,
        )
        .unwrap();
    model
        .add_mapping(
            Mapping {
                entity: "Order".into(),
                attribute: "Amount".into(),
                table_fqn: "crm.sales.orders".into(),
                column: "amount".into(),
            },
            store,
        )
        .unwrap();
    model
        .add_relation(Relation {
            from_entity: "Customer".into(),
            to_entity: "Order".into(),
            kind: RelationKind::HasMany,
        })
        .unwrap();
    model
}

fn customer_order_edge() -> InferredEdge {
    InferredEdge {
        left_table: "crm.sales.orders".into(),
        left_column: "customer_id".into(),
        right_table: "crm.sales.customers".into(),
        right_column: "id".into(),
        confidence: Confidence::Low,
        score: 0.5,
        basis: "column 'customer_id' matches table 'customers'".into(),
    }
}

#[tokio::test]
async fn dataset_graph_links_entities_and_tables() {
    let store = sales_catalog();
    let model = sales_model(&store);
    let builder = GraphBuilder::new(&store, &model, &GraphConfig::default());

    let result = builder.build_dataset("crm", "sales", &[customer_order_edge()]);

    assert!(!result.truncated);
    assert!(result.reason.is_none());
    assert_eq!(result.nodes.len(), 4);
    assert!(result.find_node("crm.sales.orders").is_some());
    assert!(result.find_node("entity:Customer").is_some());

    // Declared facts at 1.0, the inferred proposal below
    let maps_to: Vec<_> = result.edges.iter().filter(|e| e.label == "MAPS_TO").collect();
    assert_eq!(maps_to.len(), 2);
    assert!(maps_to.iter().all(|e| e.confidence == 1.0));

    let relation = result.edges.iter().find(|e| e.label == "HAS_MANY").unwrap();
    assert_eq!(relation.confidence, 1.0);

    let inferred = result
        .edges
        .iter()
        .find(|e| e.label == "INFERRED_JOIN")
        .unwrap();
    assert_eq!(inferred.confidence, 0.5);
    assert_eq!(
        inferred.properties["left_column"],
        serde_json::json!("customer_id")
    );

    for edge in &result.edges {
        assert_ne!(edge.from, edge.to);
    }
}

#[tokio::test]
async fn node_cap_truncates_with_reason() {
    let mut store = CatalogStore::new();
    store.upsert_dataset(DatasetRecord::new("crm", "wide"));
    for i in 0..6 {
        add_table(&mut store, "crm.wide", &format!("t{}", i), &["id"]);
    }
    let model = SemanticModel::new();
    let config = GraphConfig {
        max_nodes: 3,
        ..GraphConfig::default()
    };
    let builder = GraphBuilder::new(&store, &model, &config);

    let result = builder.build_dataset("crm", "wide", &[]);

    assert!(result.truncated);
    assert!(result.nodes.len() <= 3);
    assert!(result.reason.as_deref().unwrap().contains("node cap"));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code.as_str(), "GRAPH_TRUNCATED");
}

#[tokio::test]
async fn unmapped_relation_is_skipped_with_diagnostic() {
    let store = sales_catalog();
    let mut model = SemanticModel::new();
    model.add_entity(EntityDefinition::new("Customer").with_attribute("Name"));
    model.add_entity(EntityDefinition::new("Ticket"));
    model
        .add_mapping(
            Mapping {
                entity: "Customer".into(),
                attribute: "Name".into(),
                table_fqn: "crm.sales.customers".into(),
                column: "name".into(),
            },
            &store,
        )
        .unwrap();
    // Ticket has no mapping into this dataset, so the relation cannot land
    model
        .add_relation(Relation {
            from_entity: "Customer".into(),
            to_entity: "Ticket".into(),
            kind: RelationKind::HasMany,
        })
        .unwrap();

    let builder = GraphBuilder::new(&store, &model, &GraphConfig::default());
    let result = builder.build_dataset("crm", "sales", &[]);

    assert!(result.edges.iter().all(|e| e.label != "HAS_MANY"));
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code.as_str() == "GRAPH_NODE_SKIPPED"));
}

#[tokio::test]
async fn catalog_drift_surfaces_unresolved_mapping_codes() {
    let store = sales_catalog();
    let model = sales_model(&store);

    // Rescan drift: the customers table disappeared and orders lost its
    // amount column, so neither mapping resolves anymore
    let mut drifted = CatalogStore::new();
    drifted.upsert_dataset(DatasetRecord::new("crm", "sales"));
    add_table(&mut drifted, "crm.sales", "orders", &["id", "customer_id", "account_id"]);

    let builder = GraphBuilder::new(&drifted, &model, &GraphConfig::default());
    let result = builder.build_dataset("crm", "sales", &[]);

    let codes: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert!(codes.contains(&"MAPPING_UNRESOLVED_TABLE"));
    assert!(codes.contains(&"MAPPING_UNRESOLVED_COLUMN"));
    assert!(result.edges.iter().all(|e| e.label != "MAPS_TO"));
}

#[tokio::test]
async fn account_graph_collects_matching_rows() {
    let store = sales_catalog();
    let model = sales_model(&store);
    let builder = GraphBuilder::new(&store, &model, &GraphConfig::default());

    let connector = MockConnector::new();
    connector
        .add_query_fixture(
            "FROM sales.orders WHERE account_id = '42'",
            QueryResult {
                columns: vec!["id".into(), "account_id".into(), "amount".into()],
                rows: vec![
                    vec![
                        serde_json::json!(1),
                        serde_json::json!(42),
                        serde_json::json!(99.5),
                    ],
                    vec![
                        serde_json::json!(2),
                        serde_json::json!(42),
                        serde_json::json!(10.0),
                    ],
                ],
            },
        )
        .await;

    let result = builder.build_account("42", &connector).await;

    // Account node, the orders table, two row nodes
    assert_eq!(result.nodes.len(), 4);
    let account = result.find_node("account:42").unwrap();
    assert_eq!(account.kind, NodeKind::Account);

    let row = result.find_node("crm.sales.orders#1").unwrap();
    assert_eq!(row.kind, NodeKind::Row);
    assert_eq!(row.properties["amount"], serde_json::json!(99.5));

    let owns = result.edges.iter().filter(|e| e.label == "OWNS").count();
    assert_eq!(owns, 2);
}

#[tokio::test]
async fn empty_account_scope_is_not_an_error() {
    let store = sales_catalog();
    let model = sales_model(&store);
    let builder = GraphBuilder::new(&store, &model, &GraphConfig::default());

    // Unmatched queries return zero rows from the mock
    let connector = MockConnector::new();
    let result = builder.build_account("no-such-account", &connector).await;

    assert!(result.is_empty());
    assert!(!result.truncated);
    assert_eq!(result.reason.as_deref(), Some("no data for scope"));
}
