//! Bucket store backends
//!
//! Provides storage implementations for token bucket state:
//! - Redis for distributed, multi-instance deployments
//! - In-memory for development and single-instance use
//!
//! Records carry a write-counter version so that callers can perform
//! conditional writes; on Redis the conditional paths run as server-side
//! scripts so no window exists between the version check and the write.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::RwLock;

use super::types::{BucketSnapshot, VersionedBucket, current_time_millis};

/// Bucket store failure modes
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached, or the call timed out
    #[error("bucket store unavailable: {0}")]
    Unavailable(String),

    /// Stored fields for the identity do not parse as bucket state
    #[error("corrupt bucket record for '{identity}': {detail}")]
    Corrupt { identity: String, detail: String },
}

/// Trait for bucket store backends
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Read the bucket record for an identity, `None` when absent
    async fn read(&self, identity: &str) -> Result<Option<VersionedBucket>, StoreError>;

    /// Overwrite the full record unconditionally, bumping its version
    async fn write(&self, identity: &str, snapshot: &BucketSnapshot) -> Result<(), StoreError>;

    /// Write the record only if its version still equals `expected_version`
    /// (`0` meaning "no record exists"). Returns `false` when another
    /// writer got there first.
    async fn write_versioned(
        &self,
        identity: &str,
        expected_version: u64,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError>;

    /// Seed a record if none exists yet. Returns `true` when this call
    /// created it; an existing record is left untouched.
    async fn create_if_absent(
        &self,
        identity: &str,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError>;

    /// Atomically adjust the token count, clamping at zero.
    /// Returns the count after the adjustment.
    async fn increment_tokens(&self, identity: &str, delta: i64) -> Result<i64, StoreError>;
}

/// Conditional write: applies the new state only while the stored version
/// matches the caller's expectation (absent records count as version 0).
const WRITE_VERSIONED_SCRIPT: &str = r"
local v = tonumber(redis.call('HGET', KEYS[1], 'version')) or 0
if v ~= tonumber(ARGV[1]) then
  return 0
end
redis.call('HSET', KEYS[1], 'tokens', ARGV[2], 'last_refill_ms', ARGV[3], 'version', v + 1)
return 1
";

/// Unconditional overwrite that still bumps the version, tolerating a
/// non-numeric version field left behind by a corrupt record.
const WRITE_SCRIPT: &str = r"
local v = tonumber(redis.call('HGET', KEYS[1], 'version')) or 0
redis.call('HSET', KEYS[1], 'tokens', ARGV[1], 'last_refill_ms', ARGV[2], 'version', v + 1)
return 1
";

const CREATE_IF_ABSENT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'tokens', ARGV[1], 'last_refill_ms', ARGV[2], 'version', 1)
return 1
";

/// Clamped token adjustment. An absent record is seeded empty first so the
/// resulting hash always carries all three fields.
const INCREMENT_TOKENS_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('HSET', KEYS[1], 'tokens', 0, 'last_refill_ms', ARGV[2], 'version', 0)
end
local t = (tonumber(redis.call('HGET', KEYS[1], 'tokens')) or 0) + tonumber(ARGV[1])
if t < 0 then t = 0 end
local v = tonumber(redis.call('HGET', KEYS[1], 'version')) or 0
redis.call('HSET', KEYS[1], 'tokens', t, 'version', v + 1)
return t
";

/// Redis storage backend
///
/// Bucket records are hashes with `tokens`, `last_refill_ms` and `version`
/// fields, keyed `"{prefix}:{identity}"`.
pub struct RedisBucketStore {
    connection_manager: Arc<ConnectionManager>,
    key_prefix: String,
    write_versioned_script: Script,
    write_script: Script,
    create_script: Script,
    increment_script: Script,
}

impl RedisBucketStore {
    /// Build a store over an established connection manager
    pub fn with_manager(connection_manager: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            connection_manager: Arc::new(connection_manager),
            key_prefix: key_prefix.to_string(),
            write_versioned_script: Script::new(WRITE_VERSIONED_SCRIPT),
            write_script: Script::new(WRITE_SCRIPT),
            create_script: Script::new(CREATE_IF_ABSENT_SCRIPT),
            increment_script: Script::new(INCREMENT_TOKENS_SCRIPT),
        }
    }

    fn key(&self, identity: &str) -> String {
        format!("{}:{}", self.key_prefix, identity)
    }

    fn parse_record(
        identity: &str,
        fields: &HashMap<String, String>,
    ) -> Result<VersionedBucket, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt {
            identity: identity.to_string(),
            detail,
        };

        let tokens = fields
            .get("tokens")
            .ok_or_else(|| corrupt("missing tokens field".to_string()))?
            .parse::<u32>()
            .map_err(|_| corrupt("tokens is not an unsigned integer".to_string()))?;

        let last_refill_ms = fields
            .get("last_refill_ms")
            .ok_or_else(|| corrupt("missing last_refill_ms field".to_string()))?
            .parse::<u64>()
            .map_err(|_| corrupt("last_refill_ms is not a timestamp".to_string()))?;

        let version = fields
            .get("version")
            .ok_or_else(|| corrupt("missing version field".to_string()))?
            .parse::<u64>()
            .map_err(|_| corrupt("version is not an unsigned integer".to_string()))?;

        Ok(VersionedBucket {
            snapshot: BucketSnapshot {
                tokens,
                last_refill_ms,
            },
            version,
        })
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn read(&self, identity: &str) -> Result<Option<VersionedBucket>, StoreError> {
        let mut conn = (*self.connection_manager).clone();

        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.key(identity))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("HGETALL failed: {e}")))?;

        if fields.is_empty() {
            return Ok(None);
        }

        Self::parse_record(identity, &fields).map(Some)
    }

    async fn write(&self, identity: &str, snapshot: &BucketSnapshot) -> Result<(), StoreError> {
        let mut conn = (*self.connection_manager).clone();

        let _: i64 = self
            .write_script
            .key(self.key(identity))
            .arg(snapshot.tokens)
            .arg(snapshot.last_refill_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("bucket write failed: {e}")))?;

        Ok(())
    }

    async fn write_versioned(
        &self,
        identity: &str,
        expected_version: u64,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError> {
        let mut conn = (*self.connection_manager).clone();

        let applied: i64 = self
            .write_versioned_script
            .key(self.key(identity))
            .arg(expected_version)
            .arg(snapshot.tokens)
            .arg(snapshot.last_refill_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("conditional write failed: {e}")))?;

        Ok(applied == 1)
    }

    async fn create_if_absent(
        &self,
        identity: &str,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError> {
        let mut conn = (*self.connection_manager).clone();

        let created: i64 = self
            .create_script
            .key(self.key(identity))
            .arg(snapshot.tokens)
            .arg(snapshot.last_refill_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("bucket create failed: {e}")))?;

        Ok(created == 1)
    }

    async fn increment_tokens(&self, identity: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = (*self.connection_manager).clone();

        self.increment_script
            .key(self.key(identity))
            .arg(delta)
            .arg(current_time_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("token increment failed: {e}")))
    }
}

/// In-memory storage backend for development and tests
///
/// Implements the same versioned-write semantics as the Redis backend so
/// the optimistic retry path is exercised identically.
pub struct InMemoryBucketStore {
    buckets: RwLock<HashMap<String, VersionedBucket>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn read(&self, identity: &str) -> Result<Option<VersionedBucket>, StoreError> {
        let buckets = self.buckets.read().await;
        Ok(buckets.get(identity).copied())
    }

    async fn write(&self, identity: &str, snapshot: &BucketSnapshot) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let version = buckets.get(identity).map(|b| b.version).unwrap_or(0);
        buckets.insert(
            identity.to_string(),
            VersionedBucket {
                snapshot: *snapshot,
                version: version + 1,
            },
        );
        Ok(())
    }

    async fn write_versioned(
        &self,
        identity: &str,
        expected_version: u64,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError> {
        let mut buckets = self.buckets.write().await;
        let current = buckets.get(identity).map(|b| b.version).unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        buckets.insert(
            identity.to_string(),
            VersionedBucket {
                snapshot: *snapshot,
                version: current + 1,
            },
        );
        Ok(true)
    }

    async fn create_if_absent(
        &self,
        identity: &str,
        snapshot: &BucketSnapshot,
    ) -> Result<bool, StoreError> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(identity) {
            return Ok(false);
        }
        buckets.insert(
            identity.to_string(),
            VersionedBucket {
                snapshot: *snapshot,
                version: 1,
            },
        );
        Ok(true)
    }

    async fn increment_tokens(&self, identity: &str, delta: i64) -> Result<i64, StoreError> {
        let mut buckets = self.buckets.write().await;
        let record = buckets
            .entry(identity.to_string())
            .or_insert(VersionedBucket {
                snapshot: BucketSnapshot {
                    tokens: 0,
                    last_refill_ms: current_time_millis(),
                },
                version: 0,
            });
        let tokens = (record.snapshot.tokens as i64).saturating_add(delta).max(0);
        record.snapshot.tokens = tokens as u32;
        record.version += 1;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tokens: u32, last_refill_ms: u64) -> BucketSnapshot {
        BucketSnapshot {
            tokens,
            last_refill_ms,
        }
    }

    #[tokio::test]
    async fn test_read_absent_record() {
        let store = InMemoryBucketStore::new();
        assert!(store.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let store = InMemoryBucketStore::new();

        assert!(store.create_if_absent("alice", &snapshot(2, 100)).await.unwrap());
        // Second seed attempt must not clobber the existing record.
        assert!(!store.create_if_absent("alice", &snapshot(9, 900)).await.unwrap());

        let record = store.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot, snapshot(2, 100));
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_write_versioned_detects_conflict() {
        let store = InMemoryBucketStore::new();
        store.create_if_absent("alice", &snapshot(2, 100)).await.unwrap();

        // A concurrent writer bumps the version between read and write.
        assert!(store.write_versioned("alice", 1, &snapshot(1, 100)).await.unwrap());

        // The stale writer's attempt is rejected without touching the record.
        assert!(!store.write_versioned("alice", 1, &snapshot(0, 100)).await.unwrap());

        let record = store.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot.tokens, 1);
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn test_write_versioned_creates_when_expecting_absent() {
        let store = InMemoryBucketStore::new();

        assert!(store.write_versioned("alice", 0, &snapshot(1, 100)).await.unwrap());
        assert!(!store.write_versioned("alice", 0, &snapshot(2, 100)).await.unwrap());

        let record = store.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot.tokens, 1);
    }

    #[tokio::test]
    async fn test_unconditional_write_bumps_version() {
        let store = InMemoryBucketStore::new();
        store.create_if_absent("alice", &snapshot(2, 100)).await.unwrap();

        store.write("alice", &snapshot(0, 200)).await.unwrap();

        let record = store.read("alice").await.unwrap().unwrap();
        assert_eq!(record.snapshot, snapshot(0, 200));
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn test_increment_tokens_clamps_at_zero() {
        let store = InMemoryBucketStore::new();
        store.create_if_absent("alice", &snapshot(2, 100)).await.unwrap();

        assert_eq!(store.increment_tokens("alice", -1).await.unwrap(), 1);
        assert_eq!(store.increment_tokens("alice", -5).await.unwrap(), 0);
        assert_eq!(store.increment_tokens("alice", 3).await.unwrap(), 3);
    }

    #[test]
    fn test_parse_record_rejects_bad_fields() {
        let mut fields = HashMap::new();
        fields.insert("tokens".to_string(), "two".to_string());
        fields.insert("last_refill_ms".to_string(), "100".to_string());
        fields.insert("version".to_string(), "1".to_string());

        let err = RedisBucketStore::parse_record("alice", &fields).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        fields.insert("tokens".to_string(), "2".to_string());
        fields.remove("version");
        let err = RedisBucketStore::parse_record("alice", &fields).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        fields.insert("version".to_string(), "1".to_string());
        let record = RedisBucketStore::parse_record("alice", &fields).unwrap();
        assert_eq!(record.snapshot.tokens, 2);
    }
}
