//! DocForge Ingestion Worker
//!
//! Operational entry points:
//! - `migrate`: apply SQL migrations
//! - `run-worker`: poll the outbox and process ingestion jobs
//! - `verify-db`: check connectivity and schema presence
//!
//! Exit code 0 on success, 1 on failure.

mod chunker;
mod dispatcher;
mod errors;
mod parse;
mod processor;
mod quality;

use clap::{Parser, Subcommand};
use dispatcher::Dispatcher;
use docforge_common::{
    config::AppConfig, db::DbPool, db::Repository, embeddings::create_embedder,
    metrics::register_metrics, storage::ObjectStore, VERSION,
};
use processor::IngestionProcessor;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ingestion", version, about = "DocForge ingestion worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply database migrations
    Migrate,
    /// Run the outbox dispatcher and ingestion workers
    RunWorker,
    /// Verify database connectivity and schema
    VerifyDb,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .json()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => migrate().await,
        Command::RunWorker => run_worker().await,
        Command::VerifyDb => verify_db().await,
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<Arc<AppConfig>> {
    let config = AppConfig::load().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Arc::new(config))
}

async fn migrate() -> anyhow::Result<()> {
    let config = load_config()?;

    info!("Applying migrations...");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!("Migrations applied");
    Ok(())
}

async fn run_worker() -> anyhow::Result<()> {
    let config = load_config()?;

    info!("Starting DocForge ingestion worker v{}", VERSION);

    register_metrics();
    if config.observability.metrics_port != 0 {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .install()?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    let storage = ObjectStore::new(&config.object_store);
    let embedder = create_embedder(&config.embedding)?;

    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let processor = Arc::new(IngestionProcessor::new(
        repository.clone(),
        storage,
        embedder,
        config.clone(),
    ));

    let dispatcher = Dispatcher::new(repository, processor, config);
    dispatcher.run().await;

    info!("Ingestion worker shutting down");
    Ok(())
}

async fn verify_db() -> anyhow::Result<()> {
    let config = load_config()?;

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ping().await?;

    // Schema presence: every table the pipeline writes to must exist.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await?;

    for table in [
        "documents",
        "document_versions",
        "document_pages",
        "document_chunks",
        "chunk_embeddings",
        "ingestion_jobs",
        "event_outbox",
        "business_members",
    ] {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)")
                .bind(table)
                .fetch_one(&pool)
                .await?;
        if !exists {
            anyhow::bail!("table {} is missing; run `ingestion migrate`", table);
        }
    }

    info!("Database verified");
    Ok(())
}
