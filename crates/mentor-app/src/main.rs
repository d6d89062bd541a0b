//! Mentor application binary - composition root.
//!
//! 1. Load configuration (file, then env, then CLI flags) and validate it
//! 2. Open the database pool (warm-up + migrations)
//! 3. Build the retrieval gateway
//! 4. Wire handlers, router and orchestrator into the API state
//! 5. Serve HTTP until Ctrl-C, then drain and close the pool

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use mentor_agents::{LoggingCallService, UnavailableSpeechService};
use mentor_api::state::AppState;
use mentor_core::config::MentorConfig;
use mentor_core::error::MentorError;
use mentor_retrieval::RetrievalGateway;
use mentor_storage::Database;

use crate::cli::CliArgs;

fn load_config(args: &CliArgs) -> Result<MentorConfig, MentorError> {
    let path = args.resolve_config_path();
    let mut config = if Path::new(&path).exists() {
        MentorConfig::load(&path)?
    } else {
        MentorConfig::default()
    };
    config.apply_env()?;
    args.apply_to(&mut config);
    Ok(config)
}

fn init_tracing(config_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(config_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, draining in-flight requests");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_tracing(&config.general.log_level);

    tracing::info!(
        environment = ?config.general.environment,
        "Starting Mentor v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let database = match Database::connect(&config.database).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!(error = %e, "Database unavailable at startup");
            return Err(e.into());
        }
    };

    let retrieval = RetrievalGateway::from_config(&config.retrieval, config.general.environment)?;

    let addr = format!("0.0.0.0:{}", config.general.port);
    let state = AppState::new(
        config,
        database.clone(),
        retrieval,
        Arc::new(LoggingCallService),
        Arc::new(UnavailableSpeechService),
    );

    let served = mentor_api::start_server(&addr, state, shutdown_signal()).await;
    database.close();
    served?;
    Ok(())
}
