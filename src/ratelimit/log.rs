//! Per-client request log.

use std::collections::VecDeque;
use std::time::Duration;

/// Timestamps of admitted requests for one client, oldest first.
///
/// Entries are only ever appended with the current time, so under a
/// non-decreasing clock the log stays sorted and every prune is a prefix.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    entries: VecDeque<Duration>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries strictly older than `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: Duration) -> usize {
        let mut removed = 0;
        while let Some(&front) = self.entries.front() {
            if front < cutoff {
                self.entries.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn record(&mut self, now: Duration) {
        self.entries.push_back(now);
    }

    /// Drop the oldest entries until at most `cap` remain.
    pub fn truncate_oldest(&mut self, cap: usize) {
        let excess = self.entries.len().saturating_sub(cap);
        self.entries.drain(..excess);
    }

    /// Count entries at or after `cutoff` without mutating.
    pub fn count_since(&self, cutoff: Duration) -> usize {
        self.entries.iter().filter(|&&t| t >= cutoff).count()
    }

    /// Earliest entry at or after `cutoff`.
    pub fn earliest_since(&self, cutoff: Duration) -> Option<Duration> {
        self.entries.iter().copied().find(|&t| t >= cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn log_of(times: &[u64]) -> RequestLog {
        let mut log = RequestLog::new();
        for &t in times {
            log.record(secs(t));
        }
        log
    }

    #[test]
    fn test_prune_is_strict() {
        let mut log = log_of(&[0, 5, 10]);
        assert_eq!(log.prune_before(secs(5)), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.earliest_since(Duration::ZERO), Some(secs(5)));
    }

    #[test]
    fn test_prune_everything() {
        let mut log = log_of(&[1, 2]);
        assert_eq!(log.prune_before(secs(100)), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_truncate_oldest() {
        let mut log = log_of(&[1, 2, 3, 4]);
        log.truncate_oldest(2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.earliest_since(Duration::ZERO), Some(secs(3)));

        log.truncate_oldest(10);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_count_and_earliest_since() {
        let log = log_of(&[0, 30, 60]);
        assert_eq!(log.count_since(secs(30)), 2);
        assert_eq!(log.earliest_since(secs(31)), Some(secs(60)));
        assert_eq!(log.earliest_since(secs(61)), None);
    }
}
