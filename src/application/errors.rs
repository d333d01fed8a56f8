//! Shared application error types

use thiserror::Error;

use crate::domain::auth::AuthError;
use crate::infrastructure::rate_limiter::RateLimitError;

/// Application-level errors crossing layer boundaries
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Rate limiting error: {0}")]
    RateLimit(#[from] RateLimitError),
}
