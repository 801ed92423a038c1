//! Per-client-IP rate limiter
//!
//! Token bucket per source address, guarding the admin surface. Buckets
//! idle for ten minutes are rebuilt from scratch, which bounds the size of
//! the map.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_ADMIN_RATE_PER_MINUTE: f64 = 100.0;
pub const DEFAULT_ADMIN_BURST: f64 = 20.0;

const ENTRY_TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct BucketEntry {
    tokens: f64,
    last_refill: Instant,
    expires: Instant,
}

/// Process-wide map from client IP to token bucket.
#[derive(Debug)]
pub struct IpRateLimiter {
    entries: Mutex<HashMap<String, BucketEntry>>,
    rate_per_sec: f64,
    burst: f64,
}

impl IpRateLimiter {
    /// `rate_per_minute` tokens are replenished per minute up to `burst`.
    pub fn new(rate_per_minute: f64, burst: f64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            rate_per_sec: rate_per_minute / 60.0,
            burst,
        }
    }

    /// Non-blocking acquisition of one token for `ip`. An empty address
    /// resolves to the literal "unknown" bucket.
    pub fn allow(&self, ip: &str) -> bool {
        let ip = if ip.is_empty() { "unknown" } else { ip };
        let now = Instant::now();

        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| now < entry.expires);

        let entry = entries
            .entry(ip.to_string())
            .or_insert_with(|| BucketEntry {
                tokens: self.burst,
                last_refill: now,
                expires: now + ENTRY_TTL,
            });

        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.rate_per_sec).min(self.burst);
        entry.last_refill = now;
        entry.expires = now + ENTRY_TTL;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for IpRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_RATE_PER_MINUTE, DEFAULT_ADMIN_BURST)
    }
}
