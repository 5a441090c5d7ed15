//! Token-bucket rate limiting for admission control.
//!
//! One [`RateLimiter`] owns a table of per-key buckets (keyed by client IP,
//! user id, or anything else the caller picks). A bucket starts full at
//! `capacity = 2 * rate` to absorb short bursts, refills `rate` tokens per
//! whole elapsed interval, and is swept after ten idle intervals to bound
//! memory under high key cardinality.
//!
//! Mutation happens through the map's entry guard, so concurrent calls on
//! the same key are serialized while different keys proceed in parallel.

use crate::config::{LimiterSpec, RateLimitConfig};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// A single key's bucket state.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    /// Advanced only by whole consumed intervals, so a stream of denied
    /// calls cannot push the refill horizon away forever.
    last_refill: Instant,
    /// Used by the idle sweep.
    last_seen: Instant,
}

/// Thread-safe token-bucket limiter over arbitrary string keys.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    rate: u32,
    capacity: u32,
    interval: Duration,
}

impl RateLimiter {
    /// Idle buckets older than this many intervals are swept.
    const IDLE_INTERVALS: u32 = 10;

    /// Create a limiter adding `rate` tokens per `interval`.
    ///
    /// Burst capacity is twice the rate. Panics if `rate` or `interval` is
    /// zero; both are construction-time configuration errors.
    pub fn new(rate: u32, interval: Duration) -> Self {
        assert!(rate > 0, "rate limiter rate must be non-zero");
        assert!(!interval.is_zero(), "rate limiter interval must be non-zero");
        Self {
            buckets: DashMap::new(),
            rate,
            capacity: rate * 2,
            interval,
        }
    }

    pub fn from_spec(spec: LimiterSpec) -> Self {
        Self::new(spec.rate, Duration::from_secs(spec.interval_secs))
    }

    /// Check whether one action for `key` is admitted, consuming a token
    /// when it is. Never errors; denial is just `false`.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
            last_seen: now,
        });
        let bucket = entry.value_mut();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let intervals = (elapsed.as_nanos() / self.interval.as_nanos()) as u64;
        if intervals > 0 {
            let refill = intervals.saturating_mul(u64::from(self.rate));
            if refill >= u64::from(self.capacity) {
                bucket.tokens = self.capacity;
                bucket.last_refill = now;
            } else {
                bucket.tokens = (bucket.tokens + refill as u32).min(self.capacity);
                bucket.last_refill += self.interval * intervals as u32;
            }
        }
        bucket.last_seen = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// The refill interval, exposed so the admission layer can turn a
    /// denial into a retry-after hint.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Remove buckets idle longer than ten intervals. Returns how many
    /// were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.buckets.len();
        let idle_cutoff = self.interval * Self::IDLE_INTERVALS;
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < idle_cutoff);
        before - self.buckets.len()
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// The named limiter instances guarding each admission edge.
///
/// Each endpoint class gets an independently parameterized limiter;
/// exhausting the login budget must not starve registration or the
/// general API.
#[derive(Debug)]
pub struct RateLimiters {
    /// Login attempts, keyed by client IP.
    pub login: RateLimiter,
    /// Registration attempts, keyed by client IP.
    pub register: RateLimiter,
    /// Everything else, keyed by client IP.
    pub general: RateLimiter,
    /// Message sends, keyed by user id; owned here, consumed by the
    /// transport layer.
    pub message: RateLimiter,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            login: RateLimiter::from_spec(config.login),
            register: RateLimiter::from_spec(config.register),
            general: RateLimiter::from_spec(config.general),
            message: RateLimiter::from_spec(config.message),
        }
    }

    /// Sweep idle buckets in every instance. Called from the maintenance
    /// task, never from request flow.
    pub fn sweep(&self) {
        let removed = self.login.sweep()
            + self.register.sweep()
            + self.general.sweep()
            + self.message.sweep();
        if removed > 0 {
            debug!(removed, "idle rate-limit buckets swept");
        }
    }
}
