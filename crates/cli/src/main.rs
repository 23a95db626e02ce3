//! `agentic-orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow JSON file.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "agentic-orchestrator",
    about = "Agentic workflow orchestrator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[arg(long, env = "ORCHESTRATOR_CONFIG")]
        config: Option<std::path::PathBuf>,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, config } => {
            info!("starting API server on {bind}");

            let pool = db::pool::create_pool(&database_url, 10)
                .await
                .expect("failed to connect to database");

            let orchestrator_config = match config {
                Some(path) => orchestrator::OrchestratorConfig::load_from_file(&path)
                    .expect("failed to load orchestrator config"),
                None => orchestrator::OrchestratorConfig::default(),
            };

            let tools = Arc::new(tools::ToolRegistry::with_builtins());
            let mandates = Arc::new(mandates::MandateChainManager::new());
            let signer: Arc<dyn mandates::Signer> =
                Arc::new(mandates::Ed25519Signer::generate("agentic-orchestrator-primary"));
            let store: Arc<dyn orchestrator::Store> = Arc::new(db::PgStore::new(pool.clone()));
            let events: Arc<dyn orchestrator::EventBus> =
                Arc::new(orchestrator::InMemoryEventBus::new(1024));
            let clock: Arc<dyn engine::Clock> = Arc::new(engine::SystemClock);

            let orchestrator = Arc::new(orchestrator::Orchestrator::new(
                tools,
                mandates,
                signer,
                store,
                events,
                clock,
                orchestrator_config,
            ));

            let state = api::AppState { pool, orchestrator };
            api::serve(&bind, state).await.expect("server terminated unexpectedly");
        }
        Command::Migrate { database_url } => {
            info!("running migrations against configured database");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .expect("failed to connect to database");
            db::pool::run_migrations(&pool).await.expect("migration failed");
            info!("migrations applied successfully");
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("cannot read file {}: {e}", path.display()));

            let workflow: engine::Workflow = serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("invalid JSON: {e}"));

            let report = engine::validate(&workflow);
            for warning in &report.warnings {
                eprintln!("⚠ [{}] {}", warning.code, warning.message);
            }
            if !report.ok {
                for error in &report.errors {
                    eprintln!("✗ [{}] {}", error.code, error.message);
                }
                std::process::exit(1);
            }

            match engine::order(&workflow) {
                Ok(ordered) => {
                    println!("✓ workflow is valid. execution order: {:?}", ordered.sequence);
                }
                Err(e) => {
                    eprintln!("✗ ordering failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
