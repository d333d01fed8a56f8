//! Authentication domain entities

use chrono::{DateTime, Utc};

use super::value_objects::{PasswordHash, Username};

/// User aggregate root
#[derive(Debug, Clone)]
pub struct User {
    /// Unique username, also the caller identity for rate limiting
    pub username: Username,
    /// Hashed password (never expose raw hash)
    pub password_hash: PasswordHash,
    /// Account registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl User {
    /// Create a new user registered now
    pub fn new(username: Username, password_hash: PasswordHash) -> Self {
        Self {
            username,
            password_hash,
            registered_at: Utc::now(),
        }
    }
}
