//! EcoTrace API
//!
//! Run modes:
//!   ecotrace-api serve [--port <port>]   - Start the REST API (default: 4000)
//!   ecotrace-api seed --file seed.toml   - Load users and materials into the ledger

use clap::{Parser, Subcommand};
use ecotrace::api::{self, AppState, ProxyPolicy};
use ecotrace::common::logging::init_from_config;
use ecotrace::seed::{self, SeedFile};
use ecotrace::{
    AuditLogger, EcoTraceConfig, EcoTraceError, LedgerService, SqliteAuditStore,
    SqliteLedgerStore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ecotrace-api")]
#[command(about = "Points ledger and audit trail for the EcoTrace recycling program")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API
    Serve {
        /// Listen port (overrides ECOTRACE_API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Seed users and materials from a TOML file
    Seed {
        /// Path to the seed file
        #[arg(short, long, default_value = "seed.toml")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(target: "ecotrace", code = e.error_code(), "{}", e);
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), EcoTraceError> {
    let mut config = EcoTraceConfig::from_env()?;
    init_from_config(&config)?;
    config.validate_for_production()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.api_port = port;
            }
            serve(config).await
        }
        Commands::Seed { file } => run_seed(&config, file).await,
    }
}

async fn serve(config: EcoTraceConfig) -> Result<(), EcoTraceError> {
    config.log_summary();

    let ledger_store = SqliteLedgerStore::new(&config.ledger_db)?;
    let audit_store = SqliteAuditStore::new(&config.audit_db)?;

    let (audit, audit_worker) = AuditLogger::start(Arc::new(audit_store));
    let ledger = LedgerService::new(Arc::new(ledger_store), audit.clone(), config.ledger.clone());
    let state = AppState::new(
        ledger,
        config.rate_limit_per_min,
        ProxyPolicy::new(config.trust_proxy_headers),
    );

    api::start_server(state, &config.cors_origins, config.api_port, shutdown_signal()).await?;

    // Drain queued audit entries before exiting
    audit.flush().await;
    let stats = audit.stats();
    tracing::info!(
        target: "ecotrace",
        written = stats.written,
        dropped = stats.dropped,
        "Audit log flushed"
    );
    drop(audit);
    audit_worker.abort();

    Ok(())
}

async fn run_seed(config: &EcoTraceConfig, file: PathBuf) -> Result<(), EcoTraceError> {
    let seed_file = SeedFile::load(&file)?;
    let store = SqliteLedgerStore::new(&config.ledger_db)?;

    let summary = seed::apply(&store, &seed_file).await?;

    println!("Seeded {} into {}", file.display(), config.ledger_db);
    println!("  Users created:     {}", summary.users_created);
    println!("  Materials created: {}", summary.materials_created);
    println!("  Already present:   {}", summary.skipped);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "ecotrace", error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "ecotrace", "Shutdown signal received");
}
