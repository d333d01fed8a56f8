//! Rate limiter types and core data structures

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Durable token bucket state for a single identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    /// Current number of tokens in the bucket
    pub tokens: u32,
    /// Time of the last applied refill event (Unix timestamp in milliseconds)
    pub last_refill_ms: u64,
}

/// A bucket record together with its store version
///
/// The version is a per-record write counter used for conditional writes;
/// `0` is reserved for "no record exists yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedBucket {
    pub snapshot: BucketSnapshot,
    pub version: u64,
}

/// Result of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Bucket capacity for the identity
    pub limit: u32,
    /// Tokens remaining after this check
    pub remaining: u32,
    /// Suggested wait before retrying (set when denied)
    pub retry_after: Option<Duration>,
}

impl AdmissionDecision {
    /// Create a new admitted decision
    pub fn allowed(limit: u32, remaining: u32) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            retry_after: None,
        }
    }

    /// Create a new denied decision with a retry hint
    pub fn denied(limit: u32, remaining: u32, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining,
            retry_after: Some(retry_after),
        }
    }
}

/// Get current time in milliseconds since Unix epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
