//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::rate_limiter::RefillPolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to expose interactive API docs (Swagger UI). Should be false in hardened production.
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_docs: true,
            request_timeout_seconds: 30,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Storage backend for bucket and user records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Redis-compatible shared store (required for multi-instance quota enforcement)
    #[default]
    Redis,
    /// In-process storage, suitable for development and single-instance use
    Memory,
}

/// Shared store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Connection timeout in seconds
    pub connection_timeout_seconds: u64,
    /// Key prefix for rate limit bucket records
    pub bucket_key_prefix: String,
    /// Key prefix for user records
    pub user_key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_seconds: 5,
            bucket_key_prefix: "rate_limit".to_string(),
            user_key_prefix: "user".to_string(),
        }
    }
}

/// Token bucket rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity per identity
    pub max_tokens: u32,
    /// Seconds between refill events
    pub refill_interval_seconds: u64,
    /// Tokens granted per elapsed interval
    pub tokens_per_refill: u32,
    /// Upper bound on optimistic write retries per admission check
    pub max_write_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2,
            refill_interval_seconds: 60,
            tokens_per_refill: 2,
            max_write_attempts: 8,
        }
    }
}

impl RateLimitConfig {
    /// Convert to the engine's refill policy
    pub fn refill_policy(&self) -> RefillPolicy {
        RefillPolicy {
            max_tokens: self.max_tokens,
            refill_interval: Duration::from_secs(self.refill_interval_seconds),
            tokens_per_refill: self.tokens_per_refill,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Minimum accepted password length at registration
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: 8,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and the environment.
    ///
    /// Sources, lowest to highest priority: `config/default`, `config/{ENV}`
    /// when the `ENV` variable is set, `config/local`, then environment
    /// variables with the `GATEWARDEN__` prefix and `__` separators
    /// (e.g. `GATEWARDEN__SERVER__PORT=8080`).
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("GATEWARDEN").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
