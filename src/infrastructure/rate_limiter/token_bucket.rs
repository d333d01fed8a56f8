//! Token bucket refill and consumption engine
//!
//! Pure functions of a bucket snapshot plus the current time. All store
//! access happens in the service layer around the engine, so the refill
//! arithmetic is testable without a live store.

use std::time::Duration;

use super::types::BucketSnapshot;

/// Refill parameters, fixed per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillPolicy {
    /// Bucket capacity
    pub max_tokens: u32,
    /// Duration between refill events
    pub refill_interval: Duration,
    /// Tokens granted per elapsed interval
    pub tokens_per_refill: u32,
}

impl RefillPolicy {
    /// A freshly seeded bucket at full capacity
    pub fn full_bucket(&self, now_ms: u64) -> BucketSnapshot {
        BucketSnapshot {
            tokens: self.max_tokens,
            last_refill_ms: now_ms,
        }
    }

    /// Apply the refills owed since the snapshot's last refill event.
    ///
    /// `last_refill_ms` advances by whole intervals rather than snapping to
    /// `now_ms`, so partial progress toward the next refill survives
    /// frequent checks. Applying `refill` twice with the same `now_ms` is a
    /// no-op the second time.
    pub fn refill(&self, snapshot: BucketSnapshot, now_ms: u64) -> BucketSnapshot {
        let tokens = snapshot.tokens.min(self.max_tokens);
        let interval_ms = self.refill_interval.as_millis() as u64;
        if interval_ms == 0 {
            // Degenerate policy: a zero interval means the bucket is always full.
            return self.full_bucket(now_ms);
        }

        let elapsed_ms = now_ms.saturating_sub(snapshot.last_refill_ms);
        let intervals = elapsed_ms / interval_ms;
        if intervals == 0 {
            return BucketSnapshot {
                tokens,
                last_refill_ms: snapshot.last_refill_ms,
            };
        }

        let credit = intervals.saturating_mul(self.tokens_per_refill as u64);
        let tokens = (tokens as u64).saturating_add(credit).min(self.max_tokens as u64) as u32;

        BucketSnapshot {
            tokens,
            last_refill_ms: snapshot.last_refill_ms + intervals * interval_ms,
        }
    }

    /// Remaining time until the next refill event after `now_ms`.
    ///
    /// Called on a snapshot that `refill` has already been applied to, so
    /// the elapsed time since the last refill event is under one interval.
    pub fn retry_after(&self, snapshot: BucketSnapshot, now_ms: u64) -> Duration {
        let interval_ms = self.refill_interval.as_millis() as u64;
        if interval_ms == 0 {
            return Duration::ZERO;
        }
        let elapsed_ms = now_ms.saturating_sub(snapshot.last_refill_ms);
        Duration::from_millis(interval_ms - (elapsed_ms % interval_ms))
    }
}

/// Consume one token when one is available.
///
/// Returns the admission verdict and the snapshot to persist; a denial
/// leaves the token count untouched.
pub fn try_consume(snapshot: BucketSnapshot) -> (bool, BucketSnapshot) {
    if snapshot.tokens > 0 {
        (
            true,
            BucketSnapshot {
                tokens: snapshot.tokens - 1,
                ..snapshot
            },
        )
    } else {
        (false, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_tokens: u32, interval_secs: u64, tokens_per_refill: u32) -> RefillPolicy {
        RefillPolicy {
            max_tokens,
            refill_interval: Duration::from_secs(interval_secs),
            tokens_per_refill,
        }
    }

    #[test]
    fn test_refill_before_first_interval_is_noop() {
        let policy = policy(2, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 1,
            last_refill_ms: 1_000,
        };

        let refilled = policy.refill(snapshot, 59_000);
        assert_eq!(refilled, snapshot);
    }

    #[test]
    fn test_refill_credits_whole_intervals_and_clamps() {
        let policy = policy(2, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 0,
            last_refill_ms: 0,
        };

        // 61s elapsed: one interval owed, credit clamped to capacity.
        let refilled = policy.refill(snapshot, 61_000);
        assert_eq!(refilled.tokens, 2);
        // last_refill advances by the whole interval, not to `now`.
        assert_eq!(refilled.last_refill_ms, 60_000);
    }

    #[test]
    fn test_refill_preserves_fractional_progress() {
        let policy = policy(10, 60, 1);
        let snapshot = BucketSnapshot {
            tokens: 0,
            last_refill_ms: 0,
        };

        // 2.5 intervals elapsed: two refills granted, the half interval of
        // progress stays banked in last_refill_ms.
        let refilled = policy.refill(snapshot, 150_000);
        assert_eq!(refilled.tokens, 2);
        assert_eq!(refilled.last_refill_ms, 120_000);

        // 30s later the banked half interval completes and pays out.
        let refilled = policy.refill(refilled, 180_000);
        assert_eq!(refilled.tokens, 3);
        assert_eq!(refilled.last_refill_ms, 180_000);
    }

    #[test]
    fn test_refill_is_idempotent_for_fixed_now() {
        let policy = policy(5, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 1,
            last_refill_ms: 0,
        };

        let once = policy.refill(snapshot, 125_000);
        let twice = policy.refill(once, 125_000);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_refill_clamps_oversized_snapshot() {
        let policy = policy(2, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 9,
            last_refill_ms: 0,
        };

        let refilled = policy.refill(snapshot, 1_000);
        assert_eq!(refilled.tokens, 2);
    }

    #[test]
    fn test_refill_handles_clock_going_backwards() {
        let policy = policy(2, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 1,
            last_refill_ms: 120_000,
        };

        let refilled = policy.refill(snapshot, 60_000);
        assert_eq!(refilled.tokens, 1);
        assert_eq!(refilled.last_refill_ms, 120_000);
    }

    #[test]
    fn test_try_consume_takes_one_token() {
        let (allowed, after) = try_consume(BucketSnapshot {
            tokens: 2,
            last_refill_ms: 0,
        });
        assert!(allowed);
        assert_eq!(after.tokens, 1);
    }

    #[test]
    fn test_try_consume_denies_on_empty_bucket() {
        let snapshot = BucketSnapshot {
            tokens: 0,
            last_refill_ms: 7_000,
        };
        let (allowed, after) = try_consume(snapshot);
        assert!(!allowed);
        assert_eq!(after, snapshot);
    }

    #[test]
    fn test_retry_after_counts_down_to_next_refill() {
        let policy = policy(2, 60, 2);
        let snapshot = BucketSnapshot {
            tokens: 0,
            last_refill_ms: 60_000,
        };

        assert_eq!(
            policy.retry_after(snapshot, 75_000),
            Duration::from_secs(45)
        );
        assert_eq!(
            policy.retry_after(snapshot, 60_000),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_reference_sequence_of_outcomes() {
        // max 2 tokens, 2 tokens per 60s refill: admit, admit, deny at t=0,
        // then admit again after the refill lands at t=61s.
        let policy = policy(2, 60, 2);
        let bucket = policy.full_bucket(0);

        let (allowed, bucket) = try_consume(policy.refill(bucket, 0));
        assert!(allowed);
        assert_eq!(bucket.tokens, 1);

        let (allowed, bucket) = try_consume(policy.refill(bucket, 0));
        assert!(allowed);
        assert_eq!(bucket.tokens, 0);

        let (allowed, bucket) = try_consume(policy.refill(bucket, 0));
        assert!(!allowed);
        assert_eq!(bucket.tokens, 0);

        let (allowed, bucket) = try_consume(policy.refill(bucket, 61_000));
        assert!(allowed);
        assert_eq!(bucket.tokens, 1);
        assert_eq!(bucket.last_refill_ms, 60_000);
    }
}
