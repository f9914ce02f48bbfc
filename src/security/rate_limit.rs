//! Fixed-window rate limiter with optional hard blocks.
//!
//! Counters live in a process-wide map keyed by `"{user}:{ACTION}"`, so a
//! user's quota is shared by every connection hitting this process.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::security::actions::{Action, ActionLimit};
use crate::security::now_millis;

/// Default interval between cleanup sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Counter state for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitEntry {
    pub count: u32,
    /// Epoch ms at which the window rolls over.
    pub reset_at: u64,
    pub blocked: bool,
    /// Epoch ms at which a hard block lapses.
    pub block_until: Option<u64>,
}

impl RateLimitEntry {
    fn fresh(now: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(window_ms),
            blocked: false,
            block_until: None,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at && self.block_until.map_or(true, |until| now >= until)
    }
}

/// Outcome of a single limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in_ms: u64,
    /// True only while a hard block is in effect.
    pub blocked: bool,
}

/// Build the limiter key for a user/action pair.
pub fn limit_key(user_id: Option<&str>, action: Action) -> String {
    format!("{}:{}", user_id.unwrap_or("anonymous"), action)
}

/// In-memory rate limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `key` and report whether it may proceed.
    pub fn check_limit(&self, key: &str, limit: &ActionLimit) -> RateLimitDecision {
        self.check_limit_at(key, limit, now_millis())
    }

    /// [`check_limit`](Self::check_limit) at an explicit time.
    pub fn check_limit_at(&self, key: &str, limit: &ActionLimit, now: u64) -> RateLimitDecision {
        let fresh = RateLimitDecision {
            allowed: true,
            remaining: limit.max_requests.saturating_sub(1),
            reset_in_ms: limit.window_ms,
            blocked: false,
        };

        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                // Shard guard is dropped here; `len()` locks every shard.
                vacant.insert(RateLimitEntry::fresh(now, limit.window_ms));
                self.publish_tracked_keys();
                return fresh;
            }
            Entry::Occupied(occupied) => occupied.into_ref(),
        };

        if let Some(until) = entry.block_until {
            if now < until {
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_in_ms: until - now,
                    blocked: true,
                };
            }
        }

        // Any block still recorded here has lapsed.
        let block_lapsed = entry.block_until.is_some();
        if now >= entry.reset_at || block_lapsed {
            *entry = RateLimitEntry::fresh(now, limit.window_ms);
            return fresh;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > limit.max_requests {
            entry.blocked = true;
            match limit.block_duration_ms {
                Some(block_ms) => {
                    entry.block_until = Some(now.saturating_add(block_ms));
                    tracing::debug!(key, block_ms, "Rate limit key blocked");
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_in_ms: block_ms,
                        blocked: true,
                    }
                }
                None => RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_in_ms: entry.reset_at.saturating_sub(now),
                    blocked: false,
                },
            }
        } else {
            RateLimitDecision {
                allowed: true,
                remaining: limit.max_requests - entry.count,
                reset_in_ms: entry.reset_at.saturating_sub(now),
                blocked: false,
            }
        }
    }

    /// Count a request without caring about the outcome.
    pub fn record_action(&self, key: &str, limit: &ActionLimit) {
        let _ = self.check_limit(key, limit);
    }

    /// Forget everything about `key`.
    pub fn reset(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.publish_tracked_keys();
        }
    }

    /// Block `key` for `duration_ms` regardless of its current state.
    pub fn block(&self, key: &str, duration_ms: u64) {
        self.block_at(key, duration_ms, now_millis());
    }

    pub fn block_at(&self, key: &str, duration_ms: u64, now: u64) {
        let until = now.saturating_add(duration_ms);
        self.entries.insert(
            key.to_string(),
            RateLimitEntry {
                count: 0,
                reset_at: until,
                blocked: true,
                block_until: Some(until),
            },
        );
        self.publish_tracked_keys();
        tracing::info!(key, duration_ms, "Rate limit key manually blocked");
    }

    /// Snapshot of the entry for `key`, if tracked.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Drop entries whose window and block have both lapsed.
    /// Returns the number of entries removed.
    pub fn cleanup(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        self.publish_tracked_keys();
        removed
    }

    fn publish_tracked_keys(&self) {
        metrics::record_tracked_keys(self.entries.len());
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until shutdown fires.
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.cleanup(now_millis());
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = self.tracked_keys(),
                                "Rate limit sweep"
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweep stopped");
                        break;
                    }
                }
            }
        })
    }
}
