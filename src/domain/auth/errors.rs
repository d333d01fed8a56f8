//! Authentication domain errors

use thiserror::Error;

/// Authentication-specific domain errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid credentials provided")]
    InvalidCredentials,

    #[error("Username already exists: {username}")]
    UsernameAlreadyExists { username: String },

    #[error("Invalid username: {reason}")]
    InvalidUsername { reason: String },

    #[error("Invalid password: {reason}")]
    InvalidPassword { reason: String },

    #[error("Password is too weak - must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("Storage error: {message}")]
    Storage { message: String },
}
