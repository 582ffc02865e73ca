use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::metrics::RATE_LIMIT_ENTRIES;

// Entries idle for this many windows are dropped by the sweeper
const STALE_WINDOWS: u32 = 3;

// Rate limit entry - tracks requests per client key
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
    pub last_seen: Instant,
}

/// Fixed-window admission control keyed by client.
///
/// Each key gets its own counter; the read-modify-write of a counter happens
/// while holding the DashMap shard lock for that key, so concurrent requests
/// for the same key serialize and different keys only contend when they
/// hash to the same shard.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // Admit or reject one request from `key`
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit clock reading.
    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        // fast path avoids allocating the key for clients we already track
        if let Some(mut entry) = self.entries.get_mut(key) {
            return self.bump(&mut entry, now);
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
                last_seen: now,
            });
        self.bump(&mut entry, now)
    }

    fn bump(&self, entry: &mut RateLimitEntry, now: Instant) -> bool {
        entry.last_seen = now;

        // window expired..? reset it
        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 1;
            entry.window_start = now;
            return true;
        }

        // under limit..? allow
        if entry.count < self.max_requests {
            entry.count += 1;
            return true;
        }

        // over limit, count stays clamped at max
        false
    }

    /// Drop entries that have seen no traffic for several windows.
    /// Returns how many were removed.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let ttl = self.window * STALE_WINDOWS;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) < ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // current count for a key, None if untracked
    pub fn count(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|e| e.count)
    }
}

// Sweeper - periodically evicts idle entries so memory stays bounded
pub async fn evict_stale_entries(limiter: Arc<RateLimiter>, sweep_interval: Duration) {
    let mut interval = interval(sweep_interval);

    tracing::info!(interval = ?sweep_interval, "Rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = limiter.evict_stale(Instant::now());
        RATE_LIMIT_ENTRIES.set(limiter.len() as f64);

        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.len(), "Evicted stale rate limit entries");
        }
    }
}
