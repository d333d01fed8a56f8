//! Rate limiter service
//!
//! The facade composing the token bucket engine and the bucket store. One
//! admission check is a read, a refill, a consume attempt and a single
//! conditional write; a version conflict with a concurrent checker restarts
//! the sequence against a fresh read, a bounded number of times.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::storage::{BucketStore, StoreError};
use super::token_bucket::{RefillPolicy, try_consume};
use super::types::{AdmissionDecision, current_time_millis};

/// Errors surfaced by the rate limiter facade
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The identity was empty; rejected before any store access
    #[error("identity must be a non-empty string")]
    InvalidIdentity,

    /// The shared store could not be reached, or concurrent write
    /// conflicts persisted past the bounded retry count
    #[error("rate limit store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for RateLimitError {
    fn from(err: StoreError) -> Self {
        RateLimitError::StoreUnavailable(err.to_string())
    }
}

/// Token bucket admission control over a shared bucket store
pub struct RateLimiterService {
    storage: Arc<dyn BucketStore>,
    policy: RefillPolicy,
    max_write_attempts: u32,
}

impl RateLimiterService {
    pub fn new(storage: Arc<dyn BucketStore>, policy: RefillPolicy, max_write_attempts: u32) -> Self {
        Self {
            storage,
            policy,
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    /// The refill parameters this limiter enforces
    pub fn policy(&self) -> &RefillPolicy {
        &self.policy
    }

    /// Seed a full bucket for a new identity.
    ///
    /// Idempotent: an existing bucket, even a partially consumed one, is
    /// left untouched.
    pub async fn initialize(&self, identity: &str) -> Result<(), RateLimitError> {
        let identity = validate_identity(identity)?;

        let bucket = self.policy.full_bucket(current_time_millis());
        let created = self.storage.create_if_absent(identity, &bucket).await?;
        if created {
            debug!(identity, "seeded rate limit bucket");
        }
        Ok(())
    }

    /// Decide whether one request from `identity` is admitted.
    ///
    /// The refilled state is persisted whether or not the request is
    /// admitted, so refill progress is never discarded. An absent bucket is
    /// lazily seeded at full capacity; a corrupt record is reset to full
    /// capacity and logged. Store failures propagate so the caller can deny
    /// the request (fail closed); they are never converted into an admit.
    pub async fn allow_request(&self, identity: &str) -> Result<AdmissionDecision, RateLimitError> {
        let identity = validate_identity(identity)?;

        for attempt in 1..=self.max_write_attempts {
            let now = current_time_millis();

            let (snapshot, expected_version, heal) = match self.storage.read(identity).await {
                Ok(Some(record)) => (record.snapshot, record.version, false),
                Ok(None) => (self.policy.full_bucket(now), 0, false),
                Err(StoreError::Corrupt {
                    identity: id,
                    detail,
                }) => {
                    warn!(
                        identity = %id,
                        %detail,
                        "corrupt bucket record, resetting to full capacity"
                    );
                    (self.policy.full_bucket(now), 0, true)
                }
                Err(err) => return Err(err.into()),
            };

            let refilled = self.policy.refill(snapshot, now);
            let (allowed, after) = try_consume(refilled);

            let persisted = if heal {
                // The stored version is unreadable, so a conditional write
                // cannot apply; overwrite the record to self-heal.
                self.storage.write(identity, &after).await?;
                true
            } else {
                self.storage
                    .write_versioned(identity, expected_version, &after)
                    .await?
            };

            if !persisted {
                debug!(identity, attempt, "concurrent bucket write, retrying");
                continue;
            }

            return Ok(if allowed {
                AdmissionDecision::allowed(self.policy.max_tokens, after.tokens)
            } else {
                AdmissionDecision::denied(
                    self.policy.max_tokens,
                    after.tokens,
                    self.policy.retry_after(after, now),
                )
            });
        }

        Err(RateLimitError::StoreUnavailable(format!(
            "conflicting writes persisted across {} attempts",
            self.max_write_attempts
        )))
    }
}

fn validate_identity(identity: &str) -> Result<&str, RateLimitError> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(RateLimitError::InvalidIdentity);
    }
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rate_limiter::storage::InMemoryBucketStore;
    use crate::infrastructure::rate_limiter::types::{BucketSnapshot, VersionedBucket};
    use async_trait::async_trait;
    use std::time::Duration;

    fn service(max_tokens: u32, storage: Arc<dyn BucketStore>) -> RateLimiterService {
        RateLimiterService::new(
            storage,
            RefillPolicy {
                max_tokens,
                refill_interval: Duration::from_secs(60),
                tokens_per_refill: max_tokens,
            },
            8,
        )
    }

    #[tokio::test]
    async fn test_lazy_initialization_on_first_check() {
        let storage = Arc::new(InMemoryBucketStore::new());
        let limiter = service(2, storage.clone());

        let decision = limiter.allow_request("alice").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);

        let record = storage.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot.tokens, 1);
    }

    #[tokio::test]
    async fn test_denies_when_bucket_is_empty() {
        let storage = Arc::new(InMemoryBucketStore::new());
        let limiter = service(2, storage.clone());

        assert!(limiter.allow_request("alice").await.unwrap().allowed);
        assert!(limiter.allow_request("alice").await.unwrap().allowed);

        let decision = limiter.allow_request("alice").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        let retry_after = decision.retry_after.unwrap();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(retry_after > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_initialize_never_resets_consumed_bucket() {
        let storage = Arc::new(InMemoryBucketStore::new());
        let limiter = service(2, storage.clone());

        limiter.initialize("alice").await.unwrap();
        assert!(limiter.allow_request("alice").await.unwrap().allowed);

        limiter.initialize("alice").await.unwrap();

        let record = storage.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot.tokens, 1);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let storage = Arc::new(InMemoryBucketStore::new());
        let limiter = service(1, storage.clone());

        assert!(limiter.allow_request("alice").await.unwrap().allowed);
        assert!(!limiter.allow_request("alice").await.unwrap().allowed);
        assert!(limiter.allow_request("bob").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_empty_identity_is_rejected_before_store_access() {
        let storage = Arc::new(InMemoryBucketStore::new());
        let limiter = service(2, storage.clone());

        let err = limiter.allow_request("  ").await.unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidIdentity));
        let err = limiter.initialize("").await.unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidIdentity));
    }

    /// Store whose first read reports a corrupt record, delegating to an
    /// in-memory store afterwards.
    struct CorruptOnceStore {
        inner: InMemoryBucketStore,
        corrupted: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl BucketStore for CorruptOnceStore {
        async fn read(&self, identity: &str) -> Result<Option<VersionedBucket>, StoreError> {
            if !self.corrupted.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Corrupt {
                    identity: identity.to_string(),
                    detail: "tokens is not an unsigned integer".to_string(),
                });
            }
            self.inner.read(identity).await
        }

        async fn write(&self, identity: &str, snapshot: &BucketSnapshot) -> Result<(), StoreError> {
            self.inner.write(identity, snapshot).await
        }

        async fn write_versioned(
            &self,
            identity: &str,
            expected_version: u64,
            snapshot: &BucketSnapshot,
        ) -> Result<bool, StoreError> {
            self.inner.write_versioned(identity, expected_version, snapshot).await
        }

        async fn create_if_absent(
            &self,
            identity: &str,
            snapshot: &BucketSnapshot,
        ) -> Result<bool, StoreError> {
            self.inner.create_if_absent(identity, snapshot).await
        }

        async fn increment_tokens(&self, identity: &str, delta: i64) -> Result<i64, StoreError> {
            self.inner.increment_tokens(identity, delta).await
        }
    }

    #[tokio::test]
    async fn test_corrupt_record_resets_to_full_capacity() {
        let storage = Arc::new(CorruptOnceStore {
            inner: InMemoryBucketStore::new(),
            corrupted: std::sync::atomic::AtomicBool::new(false),
        });
        let limiter = service(2, storage.clone());

        let decision = limiter.allow_request("alice").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);

        // The healed record is a normal bucket from here on.
        let decision = limiter.allow_request("alice").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    /// Store whose conditional writes always lose, as if another gateway
    /// instance wins every race.
    struct AlwaysConflictingStore {
        inner: InMemoryBucketStore,
    }

    #[async_trait]
    impl BucketStore for AlwaysConflictingStore {
        async fn read(&self, identity: &str) -> Result<Option<VersionedBucket>, StoreError> {
            self.inner.read(identity).await
        }

        async fn write(&self, identity: &str, snapshot: &BucketSnapshot) -> Result<(), StoreError> {
            self.inner.write(identity, snapshot).await
        }

        async fn write_versioned(
            &self,
            _identity: &str,
            _expected_version: u64,
            _snapshot: &BucketSnapshot,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn create_if_absent(
            &self,
            identity: &str,
            snapshot: &BucketSnapshot,
        ) -> Result<bool, StoreError> {
            self.inner.create_if_absent(identity, snapshot).await
        }

        async fn increment_tokens(&self, identity: &str, delta: i64) -> Result<i64, StoreError> {
            self.inner.increment_tokens(identity, delta).await
        }
    }

    #[tokio::test]
    async fn test_exhausted_write_conflicts_surface_as_store_unavailable() {
        let storage = Arc::new(AlwaysConflictingStore {
            inner: InMemoryBucketStore::new(),
        });
        let limiter = service(2, storage);

        let err = limiter.allow_request("alice").await.unwrap_err();
        assert!(matches!(err, RateLimitError::StoreUnavailable(_)));
    }
}
