//! Authentication use cases

use std::sync::Arc;

use tracing::warn;

use crate::application::errors::ApplicationError;
use crate::domain::auth::{
    entities::User, errors::AuthError, repositories::IUserRepository, value_objects::Username,
};
use crate::infrastructure::auth::PasswordHasher;
use crate::infrastructure::rate_limiter::RateLimiterService;

/// Use case for registering new callers
pub struct RegisterUserUseCase {
    user_repository: Arc<dyn IUserRepository>,
    password_hasher: Arc<PasswordHasher>,
    rate_limiter: Arc<RateLimiterService>,
    min_password_length: usize,
}

impl RegisterUserUseCase {
    pub fn new(
        user_repository: Arc<dyn IUserRepository>,
        password_hasher: Arc<PasswordHasher>,
        rate_limiter: Arc<RateLimiterService>,
        min_password_length: usize,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            rate_limiter,
            min_password_length,
        }
    }

    pub async fn execute(
        &self,
        username: Username,
        password: String,
    ) -> Result<(), ApplicationError> {
        if let Some(_existing) = self.user_repository.find_by_username(&username).await? {
            return Err(AuthError::UsernameAlreadyExists {
                username: username.as_str().to_string(),
            }
            .into());
        }

        if password.len() < self.min_password_length {
            return Err(AuthError::WeakPassword {
                min_length: self.min_password_length,
            }
            .into());
        }

        let password_hash = self.password_hasher.hash(password).await?;
        let user = User::new(username.clone(), password_hash);
        self.user_repository.create(&user).await?;

        // Seed the caller's bucket so the first admission check starts from
        // a full quota. The limiter lazily seeds on first check anyway, so
        // a failure here must not fail the registration.
        if let Err(err) = self.rate_limiter.initialize(username.as_str()).await {
            warn!(
                username = %username,
                error = %err,
                "failed to seed rate limit bucket at registration"
            );
        }

        Ok(())
    }
}

/// Use case for caller login
pub struct LoginUseCase {
    user_repository: Arc<dyn IUserRepository>,
    password_hasher: Arc<PasswordHasher>,
}

impl LoginUseCase {
    pub fn new(
        user_repository: Arc<dyn IUserRepository>,
        password_hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    pub async fn execute(
        &self,
        username: Username,
        password: String,
    ) -> Result<(), ApplicationError> {
        // An unknown username and a wrong password are indistinguishable to
        // the caller.
        let user = self
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let is_valid = self
            .password_hasher
            .verify(password, user.password_hash)
            .await
            .map_err(|_| AuthError::InvalidCredentials)?;

        if !is_valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::InMemoryUserRepository;
    use crate::infrastructure::rate_limiter::{InMemoryBucketStore, RefillPolicy};
    use std::time::Duration;

    fn limiter(storage: Arc<InMemoryBucketStore>) -> Arc<RateLimiterService> {
        Arc::new(RateLimiterService::new(
            storage,
            RefillPolicy {
                max_tokens: 2,
                refill_interval: Duration::from_secs(60),
                tokens_per_refill: 2,
            },
            8,
        ))
    }

    fn register_use_case(
        repository: Arc<InMemoryUserRepository>,
        storage: Arc<InMemoryBucketStore>,
    ) -> RegisterUserUseCase {
        RegisterUserUseCase::new(
            repository,
            Arc::new(PasswordHasher::with_params(4096, 1, 1)),
            limiter(storage),
            8,
        )
    }

    #[tokio::test]
    async fn test_register_seeds_rate_limit_bucket() {
        let repository = Arc::new(InMemoryUserRepository::new());
        let storage = Arc::new(InMemoryBucketStore::new());
        let use_case = register_use_case(repository.clone(), storage.clone());

        use_case
            .execute(Username::new("alice").unwrap(), "password123".to_string())
            .await
            .unwrap();

        let username = Username::new("alice").unwrap();
        assert!(repository.find_by_username(&username).await.unwrap().is_some());

        use crate::infrastructure::rate_limiter::BucketStore;
        let bucket = storage.read("alice").await.unwrap().unwrap();
        assert_eq!(bucket.snapshot.tokens, 2);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let repository = Arc::new(InMemoryUserRepository::new());
        let storage = Arc::new(InMemoryBucketStore::new());
        let use_case = register_use_case(repository, storage);

        use_case
            .execute(Username::new("alice").unwrap(), "password123".to_string())
            .await
            .unwrap();

        let err = use_case
            .execute(Username::new("alice").unwrap(), "password456".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Auth(AuthError::UsernameAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let repository = Arc::new(InMemoryUserRepository::new());
        let storage = Arc::new(InMemoryBucketStore::new());
        let use_case = register_use_case(repository, storage);

        let err = use_case
            .execute(Username::new("alice").unwrap(), "short".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Auth(AuthError::WeakPassword { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_verifies_password() {
        let repository = Arc::new(InMemoryUserRepository::new());
        let storage = Arc::new(InMemoryBucketStore::new());
        let hasher = Arc::new(PasswordHasher::with_params(4096, 1, 1));

        RegisterUserUseCase::new(repository.clone(), hasher.clone(), limiter(storage), 8)
            .execute(Username::new("alice").unwrap(), "password123".to_string())
            .await
            .unwrap();

        let login = LoginUseCase::new(repository, hasher);
        assert!(
            login
                .execute(Username::new("alice").unwrap(), "password123".to_string())
                .await
                .is_ok()
        );

        let err = login
            .execute(Username::new("alice").unwrap(), "wrong_password".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Auth(AuthError::InvalidCredentials)
        ));

        let err = login
            .execute(Username::new("nobody").unwrap(), "password123".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Auth(AuthError::InvalidCredentials)
        ));
    }
}
