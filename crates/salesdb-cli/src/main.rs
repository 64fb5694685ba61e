mod ingest;
mod maintenance;

use clap::{Parser, Subcommand};
use salesdb_core::{AppConfig, ReportTable};
use tracing_subscriber::EnvFilter;

use crate::ingest::IngestArgs;
use crate::maintenance::RepairCommands;

#[derive(Debug, Parser)]
#[command(name = "salesdb")]
#[command(about = "Point-of-sale report ingestion into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database connectivity and schema management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Parse, normalize, and store report files
    Ingest(IngestArgs),
    /// Report or resolve duplicate natural keys in a report table
    Dedupe {
        /// Table to check (sales-summary, tender-type, labor, daypart)
        #[arg(long)]
        table: ReportTable,
        /// Delete all but the newest row for each duplicated key
        #[arg(long)]
        resolve: bool,
    },
    /// Operator data repairs
    Repair {
        #[command(subcommand)]
        command: RepairCommands,
    },
    /// List recent ingest runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = salesdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Db { command }) => run_db(&config, command).await,
        Some(Commands::Ingest(args)) => ingest::run_ingest(&config, &args).await,
        Some(Commands::Dedupe { table, resolve }) => {
            let pool = connect(&config).await?;
            maintenance::run_dedupe(&pool, table, resolve).await
        }
        Some(Commands::Repair { command }) => {
            let pool = connect(&config).await?;
            maintenance::run_repair(&pool, command).await
        }
        Some(Commands::Runs { limit }) => {
            let pool = connect(&config).await?;
            maintenance::run_list_runs(&pool, limit).await
        }
        None => {
            println!("no command given; see `salesdb --help`");
            Ok(())
        }
    }
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    match command {
        DbCommands::Ping => {
            salesdb_db::ping(&pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = salesdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
        }
    }
    Ok(())
}

/// Connect to the configured database. Fails when `DATABASE_URL` is unset.
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let database_url = config.require_database_url()?;
    let pool_config = salesdb_db::PoolConfig::from_app_config(config);
    let pool = salesdb_db::connect_pool(database_url, pool_config).await?;
    Ok(pool)
}

/// Attempt to mark an ingest run as failed, logging any secondary error.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    message: String,
    summary: Option<&salesdb_core::RunSummary>,
) {
    if let Err(mark_err) = salesdb_db::fail_ingest_run(pool, run_id, &message, summary).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark ingest run as failed"
        );
    }
}
