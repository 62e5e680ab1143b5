use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use clientpulse_catalog::CatalogService;
use clientpulse_connector::{Connector, MockConnector, PostgresConnector, QueryResult};
use clientpulse_core::{
    ColumnMeta, Config, LogicalType, Schema, Severity, SourceKind, TableMeta,
};
use clientpulse_graph::{GraphBuilder, GraphResult, GraphScope, NodeKind};
use clientpulse_scoring::{billing_signals_from, subscription_signals_from, ScoringEngine};
use clientpulse_semantic::{
    EntityDefinition, Mapping, Relation, RelationKind, RelationshipInference, SemanticModel,
};

/// ClientPulse - customer warehouse catalog, knowledge graph and health scoring
#[derive(Parser)]
#[command(name = "clientpulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: clientpulse.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog source id (default: warehouse 'source_id' setting, or the
    /// database name, or "demo")
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the configured warehouse into the metadata catalog
    Scan {
        /// Output file for the scan report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List catalogued datasets
    Datasets,

    /// List catalogued tables in a dataset
    Tables {
        /// Dataset name
        dataset: String,
    },

    /// Build a knowledge graph for a dataset or an account
    Graph {
        /// Dataset scope
        #[arg(short, long, conflicts_with = "account")]
        dataset: Option<String>,

        /// Account scope
        #[arg(short, long)]
        account: Option<String>,

        /// Output file for the graph (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute health and churn scores for one account
    Health {
        /// Account id
        account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if std::path::Path::new("clientpulse.toml").exists() {
        Config::from_file(std::path::Path::new("clientpulse.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    let mut warehouse = connect(&config, cli.verbose).await?;
    if let Some(source) = cli.source {
        warehouse.source_id = source;
    }

    match cli.command {
        Commands::Scan { output } => {
            scan_command(&config, &warehouse, output.as_deref(), cli.verbose).await
        }
        Commands::Datasets => datasets_command(&config, &warehouse).await,
        Commands::Tables { dataset } => tables_command(&config, &warehouse, &dataset).await,
        Commands::Graph {
            dataset,
            account,
            output,
        } => {
            graph_command(
                &config,
                &warehouse,
                dataset.as_deref(),
                account.as_deref(),
                output.as_deref(),
                cli.verbose,
            )
            .await
        }
        Commands::Health { account } => {
            health_command(&config, &warehouse, &account, cli.verbose).await
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The selected warehouse connection and how to identify it in the catalog
struct Warehouse {
    source_id: String,
    kind: SourceKind,
    connector: Box<dyn Connector>,

    /// True when no real warehouse is configured and the seeded demo is used
    demo: bool,
}

/// Pick a connector from config: postgres when configured, demo mock otherwise
async fn connect(config: &Config, verbose: bool) -> Result<Warehouse> {
    if let Some(warehouse) = &config.warehouse {
        match warehouse.warehouse_type.to_lowercase().as_str() {
            "postgres" => {
                let get = |key: &str| -> Result<&String> {
                    warehouse.settings.get(key).ok_or_else(|| {
                        anyhow::anyhow!("postgres requires '{}' in warehouse settings", key)
                    })
                };
                let host = get("host")?;
                let database = get("database")?;
                let user = get("user")?;
                let port: u16 = warehouse
                    .settings
                    .get("port")
                    .map(|p| p.parse())
                    .transpose()?
                    .unwrap_or(5432);
                let password = match warehouse.settings.get("password") {
                    Some(password) => password.clone(),
                    None => std::env::var("CLIENTPULSE_PG_PASSWORD").map_err(|_| {
                        anyhow::anyhow!(
                            "set 'password' in warehouse settings or CLIENTPULSE_PG_PASSWORD in the environment"
                        )
                    })?,
                };

                if verbose {
                    eprintln!("{} postgres at {}:{}...", "Connecting to".cyan(), host, port);
                }
                let tls = warehouse.settings.get("sslmode").map(String::as_str) == Some("require");
                let connector = if tls {
                    PostgresConnector::connect_with_tls(
                        host.as_str(),
                        port,
                        database.as_str(),
                        user.as_str(),
                        password,
                    )
                    .await?
                } else {
                    PostgresConnector::connect(
                        host.as_str(),
                        port,
                        database.as_str(),
                        user.as_str(),
                        password,
                    )
                    .await?
                };
                let source_id = warehouse
                    .settings
                    .get("source_id")
                    .cloned()
                    .unwrap_or_else(|| database.clone());
                return Ok(Warehouse {
                    source_id,
                    kind: SourceKind::Postgres,
                    connector: Box::new(connector),
                    demo: false,
                });
            }
            "mock" => {}
            other => {
                return Err(anyhow::anyhow!(
                    "Unsupported warehouse type '{}'. Supported: postgres, mock",
                    other
                ));
            }
        }
    }

    if verbose {
        eprintln!(
            "{}",
            "No warehouse configured, using the seeded demo connector".yellow()
        );
    }
    Ok(Warehouse {
        source_id: "demo".to_string(),
        kind: SourceKind::Mock,
        connector: Box::new(demo_connector().await),
        demo: true,
    })
}

/// A miniature customer warehouse so every command works offline
async fn demo_connector() -> MockConnector {
    let connector = MockConnector::new();

    connector
        .add_table(
            "crm",
            TableMeta::new("accounts").with_row_count(2),
            Schema::from_columns(vec![
                ColumnMeta::new("id", LogicalType::String, 1),
                ColumnMeta::new("name", LogicalType::String, 2),
                ColumnMeta::new("industry", LogicalType::String, 3),
            ]),
        )
        .await;
    connector
        .add_table(
            "crm",
            TableMeta::new("subscriptions").with_row_count(2),
            Schema::from_columns(vec![
                ColumnMeta::new("id", LogicalType::Int, 1),
                ColumnMeta::new("account_id", LogicalType::String, 2),
                ColumnMeta::new("payment_method", LogicalType::String, 3),
                ColumnMeta::new("plan_tier", LogicalType::String, 4),
                ColumnMeta::new("active_services", LogicalType::Int, 5),
                ColumnMeta::new("tenure_months", LogicalType::Int, 6),
                ColumnMeta::new("subscription_amount", LogicalType::Float, 7),
            ]),
        )
        .await;
    connector
        .add_table(
            "crm",
            TableMeta::new("billing").with_row_count(2),
            Schema::from_columns(vec![
                ColumnMeta::new("id", LogicalType::Int, 1),
                ColumnMeta::new("account_id", LogicalType::String, 2),
                ColumnMeta::new("failed_transactions", LogicalType::Int, 3),
                ColumnMeta::new("credit_amount", LogicalType::Float, 4),
            ]),
        )
        .await;
    connector
        .add_table(
            "support",
            TableMeta::new("tickets").with_row_count(1),
            Schema::from_columns(vec![
                ColumnMeta::new("id", LogicalType::Int, 1),
                ColumnMeta::new("account_id", LogicalType::String, 2),
                ColumnMeta::new("subject", LogicalType::String, 3),
            ]),
        )
        .await;

    // Signal queries for health scoring
    connector
        .add_query_fixture(
            "subscription_amount FROM crm.subscriptions",
            QueryResult {
                columns: vec![
                    "account_id".into(),
                    "payment_method".into(),
                    "plan_tier".into(),
                    "active_services".into(),
                    "tenure_months".into(),
                    "subscription_amount".into(),
                ],
                rows: vec![
                    vec![
                        serde_json::json!("acme"),
                        serde_json::json!("card"),
                        serde_json::json!("premium"),
                        serde_json::json!(10),
                        serde_json::json!(24),
                        serde_json::json!(500.0),
                    ],
                    vec![
                        serde_json::json!("globex"),
                        serde_json::json!("check"),
                        serde_json::json!("standard"),
                        serde_json::json!(3),
                        serde_json::json!(6),
                        serde_json::json!(120.0),
                    ],
                ],
            },
        )
        .await;
    connector
        .add_query_fixture(
            "credit_amount FROM crm.billing",
            QueryResult {
                columns: vec![
                    "account_id".into(),
                    "failed_transactions".into(),
                    "credit_amount".into(),
                ],
                rows: vec![vec![
                    serde_json::json!("globex"),
                    serde_json::json!(2),
                    serde_json::json!(20.0),
                ]],
            },
        )
        .await;

    // Sampling fixtures so inference can confirm the shared account key
    connector
        .add_query_fixture(
            "DISTINCT account_id FROM crm.subscriptions",
            QueryResult {
                columns: vec!["account_id".into()],
                rows: vec![
                    vec![serde_json::json!("acme")],
                    vec![serde_json::json!("globex")],
                ],
            },
        )
        .await;
    connector
        .add_query_fixture(
            "DISTINCT account_id FROM crm.billing",
            QueryResult {
                columns: vec!["account_id".into()],
                rows: vec![vec![serde_json::json!("globex")]],
            },
        )
        .await;

    // Account-scoped rows for graph builds
    connector
        .add_query_fixture(
            "FROM crm.subscriptions WHERE account_id = 'acme'",
            QueryResult {
                columns: vec![
                    "id".into(),
                    "account_id".into(),
                    "plan_tier".into(),
                    "subscription_amount".into(),
                ],
                rows: vec![vec![
                    serde_json::json!(1),
                    serde_json::json!("acme"),
                    serde_json::json!("premium"),
                    serde_json::json!(500.0),
                ]],
            },
        )
        .await;
    connector
        .add_query_fixture(
            "FROM support.tickets WHERE account_id = 'acme'",
            QueryResult {
                columns: vec!["id".into(), "account_id".into(), "subject".into()],
                rows: vec![vec![
                    serde_json::json!(7),
                    serde_json::json!("acme"),
                    serde_json::json!("onboarding question"),
                ]],
            },
        )
        .await;

    connector
}

/// Entities and mappings used with the demo warehouse
fn demo_model(store: &clientpulse_catalog::CatalogStore) -> SemanticModel {
    let mut model = SemanticModel::new();
    model.add_entity(EntityDefinition::new("Account").with_attribute("Name"));
    model.add_entity(EntityDefinition::new("Subscription").with_attribute("Amount"));

    // Mappings only land when the scan catalogued their targets
    let _ = model.add_mapping(
        Mapping {
            entity: "Account".into(),
            attribute: "Name".into(),
            table_fqn: "demo.crm.accounts".into(),
            column: "name".into(),
        },
        store,
    );
    let _ = model.add_mapping(
        Mapping {
            entity: "Subscription".into(),
            attribute: "Amount".into(),
            table_fqn: "demo.crm.subscriptions".into(),
            column: "subscription_amount".into(),
        },
        store,
    );
    let _ = model.add_relation(Relation {
        from_entity: "Account".into(),
        to_entity: "Subscription".into(),
        kind: RelationKind::HasMany,
    });
    model
}

/// Scan the warehouse and print the report
async fn scan_command(
    config: &Config,
    warehouse: &Warehouse,
    output: Option<&std::path::Path>,
    verbose: bool,
) -> Result<()> {
    if verbose {
        eprintln!(
            "{} source '{}' via {}...",
            "Scanning".cyan(),
            warehouse.source_id,
            warehouse.connector.name()
        );
    }

    let service = CatalogService::new(config);
    let report = service
        .scan_source(
            &warehouse.source_id,
            warehouse.kind.clone(),
            warehouse.connector.as_ref(),
        )
        .await?;

    if let Some(path) = output {
        report.save_to_file(path)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Catalog Scan Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {}", "Source:".bold(), report.source_id);
    println!("  Datasets: {}", report.datasets_scanned);
    println!("  Tables:   {}", report.tables_scanned);
    println!("  Columns:  {}", report.columns_scanned);
    println!();

    if report.is_clean() {
        println!("{}", "✓ Scan completed without errors".green().bold());
    } else {
        println!(
            "{}",
            format!("{} item(s) failed to scan:", report.errors.len())
                .yellow()
                .bold()
        );
        for diag in &report.diagnostics() {
            print_diagnostic(diag);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

/// List datasets after a scan
async fn datasets_command(config: &Config, warehouse: &Warehouse) -> Result<()> {
    let service = scan_into_service(config, warehouse).await?;
    let datasets = service.list_datasets(&warehouse.source_id);

    println!("{}", format!("Datasets in '{}':", warehouse.source_id).bold());
    for dataset in datasets {
        println!("  {}", dataset.id.green());
    }
    Ok(())
}

/// List tables of one dataset after a scan
async fn tables_command(config: &Config, warehouse: &Warehouse, dataset: &str) -> Result<()> {
    let service = scan_into_service(config, warehouse).await?;
    let tables = service.list_tables(&warehouse.source_id, dataset);

    if tables.is_empty() {
        println!(
            "{}",
            format!("No tables found in dataset '{}'", dataset).yellow()
        );
        return Ok(());
    }

    println!("{}", format!("Tables in '{}.{}':", warehouse.source_id, dataset).bold());
    for table in tables {
        let rows = table
            .meta
            .row_count
            .map(|n| format!("{} rows", n))
            .unwrap_or_else(|| "row count unknown".to_string());
        println!("  {} ({})", table.fqn.green(), rows);
    }
    Ok(())
}

/// Build and print a knowledge graph
async fn graph_command(
    config: &Config,
    warehouse: &Warehouse,
    dataset: Option<&str>,
    account: Option<&str>,
    output: Option<&std::path::Path>,
    verbose: bool,
) -> Result<()> {
    let scope = match (dataset, account) {
        (Some(dataset), None) => GraphScope::Dataset {
            source_id: warehouse.source_id.clone(),
            dataset_id: dataset.to_string(),
        },
        (None, Some(account)) => GraphScope::Account {
            account_id: account.to_string(),
        },
        _ => {
            return Err(anyhow::anyhow!(
                "graph needs exactly one of --dataset or --account"
            ))
        }
    };

    let service = scan_into_service(config, warehouse).await?;
    let store = service.snapshot();
    let model = if warehouse.demo {
        demo_model(&store)
    } else {
        SemanticModel::new()
    };

    if verbose {
        eprintln!("{} {}...", "Inferring relationships for".cyan(), scope);
    }
    let schemas: Vec<(String, Schema)> = store
        .list_all_tables()
        .into_iter()
        .map(|table| {
            let columns = store
                .get_columns(&table.fqn)
                .iter()
                .map(|record| record.column.clone())
                .collect();
            (table.fqn.clone(), Schema::from_columns(columns))
        })
        .collect();
    let inference = RelationshipInference::new(config.inference.clone());
    let (inferred, inference_diagnostics) = inference
        .infer(&schemas, Some(warehouse.connector.as_ref()))
        .await;

    let builder = GraphBuilder::new(&store, &model, &config.graph);
    let mut result = builder
        .build(&scope, Some(warehouse.connector.as_ref()), &inferred)
        .await;
    result.diagnostics.extend(inference_diagnostics);

    if let Some(path) = output {
        std::fs::write(path, result.to_json()?)?;
        if verbose {
            eprintln!("{} {}", "Graph saved to:".green(), path.display());
        }
    }

    print_graph(&scope, &result);
    Ok(())
}

fn print_graph(scope: &GraphScope, result: &GraphResult) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", format!("Knowledge Graph: {}", scope).bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if result.is_empty() {
        let reason = result.reason.as_deref().unwrap_or("empty graph");
        println!("{}", reason.yellow());
        println!();
        println!("{}", "=".repeat(60).bright_blue());
        return;
    }

    println!("Nodes: {}  Edges: {}", result.nodes.len(), result.edges.len());
    if result.truncated {
        if let Some(reason) = &result.reason {
            println!("{}", format!("⚠ {}", reason).yellow().bold());
        }
    }
    println!();

    for node in &result.nodes {
        let kind = match node.kind {
            NodeKind::Table => "table".cyan(),
            NodeKind::Entity => "entity".magenta(),
            NodeKind::Account => "account".green(),
            NodeKind::Row => "row".normal(),
        };
        println!("  [{}] {}", kind, node.id);
    }
    println!();

    for edge in &result.edges {
        let confidence = if edge.confidence >= 1.0 {
            format!("{:.2}", edge.confidence).green()
        } else {
            format!("{:.2}", edge.confidence).yellow()
        };
        println!(
            "  {} -[{} {}]-> {}",
            edge.from, edge.label, confidence, edge.to
        );
    }

    if !result.diagnostics.is_empty() {
        println!();
        println!("{}", "Diagnostics:".bold());
        for diag in &result.diagnostics {
            print_diagnostic(diag);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Score one account from warehouse signal queries
async fn health_command(
    config: &Config,
    warehouse: &Warehouse,
    account: &str,
    verbose: bool,
) -> Result<()> {
    let subscription_sql = warehouse_query(
        config,
        "subscription_query",
        "SELECT account_id, payment_method, plan_tier, active_services, \
         tenure_months, subscription_amount FROM crm.subscriptions",
    );
    let billing_sql = warehouse_query(
        config,
        "billing_query",
        "SELECT account_id, failed_transactions, credit_amount FROM crm.billing",
    );

    if verbose {
        eprintln!("{}", "Fetching subscription and billing signals...".cyan());
    }
    let subscriptions =
        subscription_signals_from(&warehouse.connector.execute_query(&subscription_sql).await?);
    let billing = billing_signals_from(&warehouse.connector.execute_query(&billing_sql).await?);

    let engine = ScoringEngine::new(config.scoring.clone());
    let health = engine.score_account(
        account,
        subscriptions.iter().find(|s| s.account_id == account),
        billing.iter().find(|b| b.account_id == account),
    );

    println!("\n{}", "=".repeat(60).bright_blue());
    println!(
        "{}",
        format!("Account Health: {}", health.account_id)
            .bold()
            .bright_blue()
    );
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let score = format!("{:.1}", health.health_score);
    let score = if health.health_score >= 70.0 {
        score.green().bold()
    } else if health.health_score >= 40.0 {
        score.yellow().bold()
    } else {
        score.red().bold()
    };
    println!("{} {} / 100", "Health score:".bold(), score);
    println!(
        "{} {:.1} / 100",
        "Churn probability:".bold(),
        health.churn_probability
    );
    println!("{} {:.1}", "Customer net score:".bold(), health.cns);
    println!("{} {:.2}", "MRR:".bold(), health.mrr);
    println!();

    println!("{}", "Factors:".bold());
    println!("  Payment method:       {:>6.1}", health.factors.payment_method);
    println!("  Transaction failures: {:>6.1}", health.factors.transaction_failures);
    println!("  Service engagement:   {:>6.1}", health.factors.service_engagement);
    println!("  Plan tier:            {:>6.1}", health.factors.plan_tier);
    println!("  Tenure:               {:>6.1}", health.factors.tenure);
    println!();

    println!("{}", "Explanation:".bold());
    for line in &health.explanation {
        println!("  - {}", line);
    }

    if !health.diagnostics.is_empty() {
        println!();
        println!("{}", "Diagnostics:".bold());
        for diag in &health.diagnostics {
            print_diagnostic(diag);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
    Ok(())
}

fn print_diagnostic(diag: &clientpulse_core::Diagnostic) {
    let severity = match diag.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    };
    match &diag.subject {
        Some(subject) => println!("  [{}] {}: {} ({})", severity, diag.code, diag.message, subject),
        None => println!("  [{}] {}: {}", severity, diag.code, diag.message),
    }
}

/// Scan the configured source into a fresh in-memory catalog
async fn scan_into_service(config: &Config, warehouse: &Warehouse) -> Result<CatalogService> {
    let service = CatalogService::new(config);
    service
        .scan_source(
            &warehouse.source_id,
            warehouse.kind.clone(),
            warehouse.connector.as_ref(),
        )
        .await?;
    Ok(service)
}

/// A warehouse-specific override query, or the documented default
fn warehouse_query(config: &Config, key: &str, default: &str) -> String {
    config
        .warehouse
        .as_ref()
        .and_then(|w| w.settings.get(key))
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn source_flag_parses_on_subcommands() {
        let cli = Cli::try_parse_from(["clientpulse", "scan", "--source", "prod"]).unwrap();
        assert_eq!(cli.source.as_deref(), Some("prod"));

        let cli = Cli::try_parse_from(["clientpulse", "datasets"]).unwrap();
        assert_eq!(cli.source, None);
    }

    #[tokio::test]
    async fn demo_warehouse_scans_cleanly() {
        let config = Config::default();
        let connector = demo_connector().await;
        let service = CatalogService::new(&config);
        let report = service
            .scan_source("demo", SourceKind::Mock, &connector)
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.datasets_scanned, 2);
        assert!(service.snapshot().get_table("demo.crm.subscriptions").is_some());
    }
}
