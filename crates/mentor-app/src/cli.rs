//! CLI argument definitions for the mentor binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use mentor_core::config::MentorConfig;

const DEFAULT_CONFIG_FILE: &str = "mentor.toml";

/// Mentor - multi-agent chat assistant for course questions and bookings.
#[derive(Parser, Debug, Default)]
#[command(name = "mentor", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP listen port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Database connection string (`sqlite://<path>` or a bare path).
    #[arg(long = "database-url")]
    pub database_url: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MENTOR_CONFIG env var > ./mentor.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = lookup("MENTOR_CONFIG").filter(|p| !p.trim().is_empty()) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply flag overrides on top of a loaded (and env-overridden) config.
    pub fn apply_to(&self, config: &mut MentorConfig) {
        if let Some(port) = self.port {
            config.general.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref url) = self.database_url {
            config.database.url = url.clone();
        }
    }
}
