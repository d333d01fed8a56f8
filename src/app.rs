//! Application setup and wiring

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use crate::application::auth::{LoginUseCase, RegisterUserUseCase};
use crate::config::{Config, StoreBackend, StoreConfig};
use crate::domain::auth::IUserRepository;
use crate::infrastructure::auth::{InMemoryUserRepository, PasswordHasher, RedisUserRepository};
use crate::infrastructure::rate_limiter::{
    BucketStore, InMemoryBucketStore, RateLimiterService, RedisBucketStore, StoreError,
};
use crate::presentation::controllers::auth::AuthAppState;
use crate::presentation::middleware::RateLimiterState;
use crate::presentation::routes;

/// Build the application router from configuration.
///
/// When the configured Redis store is unreachable the gateway falls back
/// to in-memory storage with a warning, so a development instance still
/// comes up without a running store.
pub async fn create_app(config: Config) -> Router {
    let (bucket_store, user_repository) = build_stores(&config.store).await;

    let limiter = Arc::new(RateLimiterService::new(
        bucket_store,
        config.rate_limit.refill_policy(),
        config.rate_limit.max_write_attempts,
    ));
    let password_hasher = Arc::new(PasswordHasher::new());

    let register = Arc::new(RegisterUserUseCase::new(
        user_repository.clone(),
        password_hasher.clone(),
        limiter.clone(),
        config.auth.min_password_length,
    ));
    let login = Arc::new(LoginUseCase::new(user_repository, password_hasher));

    routes::create_router(
        &config.server,
        AuthAppState { register, login },
        RateLimiterState { limiter },
    )
}

async fn build_stores(config: &StoreConfig) -> (Arc<dyn BucketStore>, Arc<dyn IUserRepository>) {
    match config.backend {
        StoreBackend::Redis => match connect(config).await {
            Ok(manager) => {
                info!("using Redis store backend at {}", config.url);
                (
                    Arc::new(RedisBucketStore::with_manager(
                        manager.clone(),
                        &config.bucket_key_prefix,
                    )),
                    Arc::new(RedisUserRepository::new(manager, &config.user_key_prefix)),
                )
            }
            Err(err) => {
                warn!(
                    "failed to connect to Redis, falling back to in-memory store: {}",
                    err
                );
                in_memory_stores()
            }
        },
        StoreBackend::Memory => {
            info!("using in-memory store backend");
            in_memory_stores()
        }
    }
}

fn in_memory_stores() -> (Arc<dyn BucketStore>, Arc<dyn IUserRepository>) {
    (
        Arc::new(InMemoryBucketStore::new()),
        Arc::new(InMemoryUserRepository::new()),
    )
}

/// Open a ping-checked connection shared by the bucket store and the user
/// repository.
async fn connect(config: &StoreConfig) -> Result<ConnectionManager, StoreError> {
    let timeout = Duration::from_secs(config.connection_timeout_seconds);

    let client = redis::Client::open(config.url.as_str())
        .map_err(|e| StoreError::Unavailable(format!("failed to create Redis client: {e}")))?;

    let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
        .await
        .map_err(|_| StoreError::Unavailable(format!("timed out connecting to {}", config.url)))?
        .map_err(|e| StoreError::Unavailable(format!("failed to connect to {}: {e}", config.url)))?;

    let mut conn = manager.clone();
    tokio::time::timeout(timeout, redis::cmd("PING").query_async::<String>(&mut conn))
        .await
        .map_err(|_| StoreError::Unavailable(format!("timed out pinging {}", config.url)))?
        .map_err(|e| StoreError::Unavailable(format!("failed to ping {}: {e}", config.url)))?;

    Ok(manager)
}
