//! Authentication repository traits

use async_trait::async_trait;

use super::entities::User;
use super::errors::AuthError;
use super::value_objects::Username;

/// User repository trait for user persistence
#[async_trait]
pub trait IUserRepository: Send + Sync {
    /// Find a user by username
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, AuthError>;

    /// Create a new user record
    async fn create(&self, user: &User) -> Result<(), AuthError>;
}
