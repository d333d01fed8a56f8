//! Configuration validation module

use crate::config::{AuthConfig, Config, LoggingConfig, RateLimitConfig, ServerConfig, StoreConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Server configuration error: {message}")]
    Server { message: String },

    #[error("Store configuration error: {message}")]
    Store { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Authentication configuration error: {message}")]
    Auth { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::server("Port must be in range 1-65535"));
        }

        if self.host.is_empty() {
            return Err(ValidationError::server("Host cannot be empty"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::server(
                "Request timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::store("Store URL cannot be empty"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(ValidationError::store(
                "Connection timeout must be greater than zero",
            ));
        }

        if self.bucket_key_prefix.is_empty() || self.user_key_prefix.is_empty() {
            return Err(ValidationError::store("Key prefixes cannot be empty"));
        }

        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_tokens == 0 {
            return Err(ValidationError::rate_limit(
                "max_tokens must be at least 1",
            ));
        }

        if self.refill_interval_seconds == 0 {
            return Err(ValidationError::rate_limit(
                "refill_interval_seconds must be at least 1",
            ));
        }

        if self.tokens_per_refill == 0 {
            return Err(ValidationError::rate_limit(
                "tokens_per_refill must be at least 1",
            ));
        }

        if self.max_write_attempts == 0 {
            return Err(ValidationError::rate_limit(
                "max_write_attempts must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.min_password_length == 0 {
            return Err(ValidationError::auth(
                "min_password_length must be at least 1",
            ));
        }

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(ValidationError::logging(format!(
                "Unknown log level '{}', expected one of {:?}",
                self.level, LEVELS
            )));
        }

        const FORMATS: [&str; 2] = ["json", "pretty"];
        if !FORMATS.contains(&self.format.as_str()) {
            return Err(ValidationError::logging(format!(
                "Unknown log format '{}', expected one of {:?}",
                self.format, FORMATS
            )));
        }

        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.store.validate()?;
        self.rate_limit.validate()?;
        self.auth.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
