use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MentorError, Result};

/// Top-level configuration for the mentor service.
///
/// Loaded from `mentor.toml` (or the file named by `MENTOR_CONFIG`), then
/// overridden from the process environment. Each section corresponds to a
/// bounded context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

impl MentorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MentorConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply `MENTOR_*` environment overrides from the current process.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    ///
    /// Unset or blank variables leave the file value untouched. Numeric
    /// variables that fail to parse are configuration errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MENTOR_ENVIRONMENT") {
            self.general.environment = v.parse()?;
        }
        if let Some(v) = get("MENTOR_PORT") {
            self.general.port = parse_number("MENTOR_PORT", &v)?;
        }
        if let Some(v) = get("MENTOR_LOG_LEVEL") {
            self.general.log_level = v;
        }
        if let Some(v) = get("MENTOR_ALLOWED_ORIGINS") {
            self.general.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("MENTOR_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get("MENTOR_DB_POOL_MIN") {
            self.database.min_connections = parse_number("MENTOR_DB_POOL_MIN", &v)?;
        }
        if let Some(v) = get("MENTOR_DB_POOL_MAX") {
            self.database.max_connections = parse_number("MENTOR_DB_POOL_MAX", &v)?;
        }
        if let Some(v) = get("MENTOR_DB_COMMAND_TIMEOUT_SECS") {
            self.database.command_timeout_secs =
                parse_number("MENTOR_DB_COMMAND_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("MENTOR_VECTOR_URL") {
            self.retrieval.vector_url = v;
        }
        if let Some(v) = get("MENTOR_VECTOR_TOKEN") {
            self.retrieval.vector_token = v;
        }
        if let Some(v) = get("MENTOR_EMBEDDING_URL") {
            self.retrieval.embedding_url = v;
        }
        if let Some(v) = get("MENTOR_EMBEDDING_TOKEN") {
            self.retrieval.embedding_token = v;
        }
        if let Some(v) = get("MENTOR_EMBEDDING_MODEL") {
            self.retrieval.embedding_model = v;
        }
        Ok(())
    }

    /// Startup gate. Anything returned from here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(MentorError::Config(
                "database url is not set (MENTOR_DATABASE_URL)".to_string(),
            ));
        }
        if self.database.min_connections == 0 {
            return Err(MentorError::Config(
                "database.min_connections must be at least 1".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(MentorError::Config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }
        if self.retrieval.embedding_dimension == 0 {
            return Err(MentorError::Config(
                "retrieval.embedding_dimension must be positive".to_string(),
            ));
        }
        if self.general.environment == Environment::Production && !self.retrieval.is_remote() {
            return Err(MentorError::Config(
                "production mode requires vector and embedding service URLs and tokens"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| MentorError::Config(format!("{} is not a valid number: {}", key, value)))
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(MentorError::Config(format!("unknown environment: {}", other))),
        }
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Deployment mode.
    pub environment: Environment,
    /// HTTP listen port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            port: 8000,
            log_level: "info".to_string(),
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string: `sqlite://<path>` or a bare path.
    pub url: String,
    /// Connections opened and verified at startup.
    pub min_connections: usize,
    /// Pool ceiling; callers queue once this many sessions are checked out.
    pub max_connections: usize,
    /// Upper bound on a single scoped interaction.
    pub command_timeout_secs: u64,
    /// Upper bound on waiting for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: 5,
            max_connections: 20,
            command_timeout_secs: 60,
            acquire_timeout_secs: 30,
        }
    }
}

/// Remote embedding and vector-index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub vector_url: String,
    pub vector_token: String,
    pub embedding_url: String,
    pub embedding_token: String,
    pub embedding_model: String,
    /// Every vector the gateway returns has exactly this length.
    pub embedding_dimension: usize,
    /// Default number of chunks per query.
    pub top_k: usize,
    pub request_timeout_secs: u64,
    /// Maximum characters of chunk content quoted back as a source snippet.
    pub snippet_chars: usize,
}

impl RetrievalConfig {
    /// Both remote services are fully configured.
    pub fn is_remote(&self) -> bool {
        [
            &self.vector_url,
            &self.vector_token,
            &self.embedding_url,
            &self.embedding_token,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_url: String::new(),
            vector_token: String::new(),
            embedding_url: "https://api.mixedbread.ai/v1".to_string(),
            embedding_token: String::new(),
            embedding_model: "mixedbread-ai/mxbai-embed-large-v1".to_string(),
            embedding_dimension: 1024,
            top_k: 5,
            request_timeout_secs: 30,
            snippet_chars: 200,
        }
    }
}

/// Chat boundary limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    pub max_message_length: usize,
    /// Maximum session key length in characters.
    pub max_session_key_length: usize,
    /// Default number of turns returned by the history endpoint.
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            max_session_key_length: 255,
            history_limit: 20,
        }
    }
}

/// Access policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Session keys refused before dispatch.
    pub blocked_sessions: Vec<String>,
}
