//! Core rate limiter implementation.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

use super::client::ClientKey;
use super::clock::{Clock, SystemClock};
use super::log::RequestLog;
use super::window::WindowSpec;

/// Quota state of one window for one client, at a single instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatus {
    pub name: String,
    pub limit: usize,
    pub remaining: usize,
    /// When the oldest request inside the window ages out, or "now" when
    /// the window is empty.
    pub reset_at: Duration,
}

/// A sliding-window rate limiter keyed by client identity.
///
/// Each client key maps to a log of admitted request times. A key's log is
/// locked for the whole check-and-record step, so concurrent checks on the
/// same key cannot both admit past a limit.
///
/// Memory grows with the number of distinct keys seen until [`cleanup`]
/// runs; see [`super::Sweeper`].
///
/// [`cleanup`]: RateLimiter::cleanup
pub struct RateLimiter<C: Clock = SystemClock> {
    clients: DashMap<String, RequestLog>,
    windows: WindowSpec,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter with the standard windows and the system clock.
    pub fn new() -> Self {
        Self::with_clock(WindowSpec::standard(), SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(windows: WindowSpec, clock: C) -> Self {
        Self {
            clients: DashMap::new(),
            windows,
            clock,
        }
    }

    pub fn windows(&self) -> &WindowSpec {
        &self.windows
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Check whether a request from `key` is admitted, recording it if so.
    ///
    /// An empty key is always denied and leaves no trace.
    pub fn is_allowed(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }

        let mut log = self.clients.entry(key.to_string()).or_insert_with(|| {
            debug!(key = %key, "Creating new request log");
            RequestLog::new()
        });

        // Read the clock under the entry lock so appends stay ordered.
        let now = self.clock.now();

        trace!(key = %key, entries = log.len(), "Checking rate limit");

        // Each window prunes the shared log in declared order; windows after
        // the first exhausted one are neither pruned nor checked.
        for window in self.windows.windows() {
            log.prune_before(window.cutoff(now));
            if log.len() >= window.max_count() {
                debug!(
                    key = %key,
                    window = window.name(),
                    count = log.len(),
                    limit = window.max_count(),
                    "Rate limit exceeded"
                );
                return false;
            }
        }

        log.record(now);
        log.truncate_oldest(self.windows.log_cap());
        true
    }

    /// Convenience for callers holding the raw address and credential.
    ///
    /// A blank address is denied without touching any state.
    pub fn is_allowed_for(&self, address: &str, credential: Option<&str>) -> bool {
        match ClientKey::new(address, credential) {
            Ok(key) => self.is_allowed(&key.to_string_key()),
            Err(_) => false,
        }
    }

    /// Per-window quota for `key`, in declaration order. Read-only.
    pub fn status(&self, key: &str) -> Vec<WindowStatus> {
        let now = self.clock.now();
        let log = self.clients.get(key);

        self.windows
            .windows()
            .iter()
            .map(|window| {
                let cutoff = window.cutoff(now);
                let (count, earliest) = match log.as_deref() {
                    Some(log) => (log.count_since(cutoff), log.earliest_since(cutoff)),
                    None => (0, None),
                };

                WindowStatus {
                    name: window.name().to_string(),
                    limit: window.max_count(),
                    remaining: window.max_count().saturating_sub(count),
                    reset_at: earliest.map_or(now, |t| t + window.duration()),
                }
            })
            .collect()
    }

    /// Requests left in each window for `key`. Read-only.
    pub fn remaining_quota(&self, key: &str) -> BTreeMap<String, usize> {
        self.status(key)
            .into_iter()
            .map(|s| (s.name, s.remaining))
            .collect()
    }

    /// When each window's oldest counted request expires for `key`. Read-only.
    pub fn reset_times(&self, key: &str) -> BTreeMap<String, Duration> {
        self.status(key)
            .into_iter()
            .map(|s| (s.name, s.reset_at))
            .collect()
    }

    /// Drop entries older than `max_age` and forget clients left with none.
    ///
    /// Returns the number of clients removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = self.clock.now().saturating_sub(max_age);
        let before = self.clients.len();

        self.clients.retain(|_, log| {
            log.prune_before(cutoff);
            !log.is_empty()
        });

        let removed = before.saturating_sub(self.clients.len());
        debug!(
            removed = removed,
            remaining = self.clients.len(),
            "Cleaned up idle clients"
        );
        removed
    }

    /// [`cleanup`](RateLimiter::cleanup) with the longest window as the age
    /// limit, which never changes an admission outcome.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup(self.windows.longest())
    }

    /// Number of entries currently logged for `key`.
    pub fn log_len(&self, key: &str) -> usize {
        self.clients.get(key).map_or(0, |log| log.len())
    }

    /// Get the number of tracked clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Forget every client.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.clients.clear();
    }
}
