//! API request and response DTOs

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::ApplicationError;
use crate::domain::auth::AuthError;
use crate::infrastructure::rate_limiter::RateLimitError;

/// Register new caller request DTO
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Caller username, used as the rate limit identity
    #[schema(example = "alice")]
    pub username: String,
    /// Caller password
    #[schema(example = "secure_password_123")]
    pub password: String,
}

/// Login request DTO
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Caller username
    #[schema(example = "alice")]
    pub username: String,
    /// Caller password
    #[schema(example = "secure_password_123")]
    pub password: String,
}

/// Generic success message DTO
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "User registered successfully")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error response DTO
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "RATE_LIMITED")]
    pub code: String,
    /// Human-readable message
    #[schema(example = "Rate limit exceeded")]
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Health check response DTO
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "0.1.0")]
    pub version: String,
}

/// Application error wrapper translating layer errors into HTTP responses
pub struct ApiError(pub ApplicationError);

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            ApplicationError::Auth(AuthError::InvalidCredentials) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials provided".to_string(),
            ),
            ApplicationError::Auth(AuthError::UsernameAlreadyExists { .. }) => (
                StatusCode::CONFLICT,
                "USERNAME_TAKEN",
                self.0.to_string(),
            ),
            ApplicationError::Auth(
                AuthError::InvalidUsername { .. }
                | AuthError::InvalidPassword { .. }
                | AuthError::WeakPassword { .. },
            ) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", self.0.to_string()),
            ApplicationError::RateLimit(RateLimitError::InvalidIdentity) => (
                StatusCode::BAD_REQUEST,
                "INVALID_IDENTITY",
                self.0.to_string(),
            ),
            // Store details stay in the logs.
            ApplicationError::Auth(AuthError::Storage { .. })
            | ApplicationError::RateLimit(RateLimitError::StoreUnavailable(_)) => {
                tracing::error!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
