//! User repository implementations
//!
//! User records live in the same shared store as the rate limit buckets:
//! one hash per user keyed `"{prefix}:{username}"` with `username`,
//! `password_hash` and `registered_at` fields.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::domain::auth::{
    entities::User,
    errors::AuthError,
    repositories::IUserRepository,
    value_objects::{PasswordHash, Username},
};

/// Redis-backed user repository
pub struct RedisUserRepository {
    connection_manager: Arc<ConnectionManager>,
    key_prefix: String,
}

impl RedisUserRepository {
    pub fn new(connection_manager: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            connection_manager: Arc::new(connection_manager),
            key_prefix: key_prefix.to_string(),
        }
    }

    fn key(&self, username: &Username) -> String {
        format!("{}:{}", self.key_prefix, username.as_str())
    }

    fn storage_error(context: &str, err: impl std::fmt::Display) -> AuthError {
        AuthError::Storage {
            message: format!("{context}: {err}"),
        }
    }
}

#[async_trait]
impl IUserRepository for RedisUserRepository {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, AuthError> {
        let mut conn = (*self.connection_manager).clone();

        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.key(username))
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("failed to read user record", e))?;

        if fields.is_empty() {
            return Ok(None);
        }

        let password_hash = fields
            .get("password_hash")
            .cloned()
            .map(PasswordHash::from)
            .ok_or_else(|| AuthError::Storage {
                message: format!(
                    "user record for '{}' is missing password_hash",
                    username.as_str()
                ),
            })?;

        let registered_at = fields
            .get("registered_at")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .ok_or_else(|| AuthError::Storage {
                message: format!(
                    "user record for '{}' has an unreadable registered_at",
                    username.as_str()
                ),
            })?;

        Ok(Some(User {
            username: username.clone(),
            password_hash,
            registered_at,
        }))
    }

    async fn create(&self, user: &User) -> Result<(), AuthError> {
        let mut conn = (*self.connection_manager).clone();

        let _: i64 = redis::cmd("HSET")
            .arg(self.key(&user.username))
            .arg("username")
            .arg(user.username.as_str())
            .arg("password_hash")
            .arg(user.password_hash.as_str())
            .arg("registered_at")
            .arg(user.registered_at.to_rfc3339())
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("failed to write user record", e))?;

        Ok(())
    }
}

/// In-memory user repository for development and tests
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IUserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.get(username.as_str()).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        users.insert(user.username.as_str().to_string(), user.clone());
        Ok(())
    }
}
