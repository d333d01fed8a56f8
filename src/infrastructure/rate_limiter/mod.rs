//! Rate limiting infrastructure
//!
//! Token bucket admission control with state shared through a pluggable
//! key-value store, so several gateway instances enforce one per-identity
//! quota. The read-refill-consume-write cycle is made atomic at the store
//! boundary with versioned conditional writes.

pub mod service;
pub mod storage;
pub mod token_bucket;
pub mod types;

pub use service::{RateLimitError, RateLimiterService};
pub use storage::{BucketStore, InMemoryBucketStore, RedisBucketStore, StoreError};
pub use token_bucket::RefillPolicy;
pub use types::{AdmissionDecision, BucketSnapshot, VersionedBucket};
