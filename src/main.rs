//! # Forms Relay Entry Point

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use forms_relay::{
    config::ConfigLoader,
    db::init_pool,
    migration::{Migrator, MigratorTrait},
    server::run_server,
    telemetry,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "forms-relay", version, about = "Healthcare forms webhook relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations and serve the API (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;
    telemetry::init_tracing(&config).context("Failed to initialise tracing")?;

    match config.redacted_json() {
        Ok(redacted) => info!(profile = %config.profile, config = %redacted, "Configuration loaded"),
        Err(e) => info!(profile = %config.profile, error = %e, "Configuration loaded"),
    }

    let db = init_pool(&config).await.context("Failed to open database")?;
    Migrator::up(&db, None)
        .await
        .context("Failed to apply migrations")?;
    info!("Migrations applied");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => Ok(()),
        Command::Serve => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        signal.cancel();
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });

            run_server(Arc::new(config), db, shutdown).await
        }
    }
}
