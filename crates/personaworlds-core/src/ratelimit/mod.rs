//! In-process fixed-window rate limiters.
//!
//! One limiter instance per protected surface (public reads, public
//! writes, per-user creation). Buckets are keyed by client IP or user id;
//! a single mutex guards the bucket map. This is per-process state; a
//! multi-instance deployment needs a shared-store replacement.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counter keyed by an opaque string.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `limit` requests per `window` per key.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter for public read endpoints: 120 requests/minute per IP.
    pub fn public_read() -> Self {
        Self::new(120, Duration::from_secs(60))
    }

    /// Limiter for public write endpoints: 30 requests/minute per IP.
    pub fn public_write() -> Self {
        Self::new(30, Duration::from_secs(60))
    }

    /// Record a request for `key` and report whether it is allowed.
    ///
    /// The first request in a fresh window resets the bucket; stale
    /// buckets (older than twice the window) are collected on the way.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("limiter mutex");

        let gc_cutoff = self.window * 2;
        buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < gc_cutoff);

        match buckets.get_mut(key) {
            Some(bucket) if now.duration_since(bucket.window_start) < self.window => {
                if bucket.count >= self.limit {
                    return false;
                }
                bucket.count += 1;
                true
            }
            _ => {
                buckets.insert(
                    key.to_string(),
                    Bucket {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Number of live buckets, for the metrics endpoint.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().expect("limiter mutex").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn window_rollover_resets_count() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(10));
        let start = Instant::now();
        assert!(limiter.allow_at("k", start));
        assert!(!limiter.allow_at("k", start));
        assert!(limiter.allow_at("k", start + Duration::from_millis(11)));
    }

    #[test]
    fn stale_buckets_are_collected() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_millis(10));
        let start = Instant::now();
        assert!(limiter.allow_at("old", start));
        assert_eq!(limiter.bucket_count(), 1);
        // next request arrives after 2x the window; the old bucket goes away
        assert!(limiter.allow_at("new", start + Duration::from_millis(25)));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn public_limiter_defaults() {
        let read = FixedWindowLimiter::public_read();
        let write = FixedWindowLimiter::public_write();
        assert_eq!(read.limit, 120);
        assert_eq!(write.limit, 30);
    }
}
