//! Short-lived per-key failed-attempt counters.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
struct AttemptEntry {
    count: u32,
    expires_at: DateTime<Utc>,
}

/// In-memory per-key counter with a rolling TTL.
///
/// The window is refreshed on every increment, so a key that keeps failing
/// never ages out mid-streak. Counters are cleared explicitly on successful
/// authentication, or lapse once the window passes without activity.
///
/// Increments go through dashmap's entry API, which locks the key's shard
/// for the whole read-reset-increment step; concurrent increments for the
/// same key cannot lose updates.
pub struct AttemptTracker {
    entries: DashMap<String, AttemptEntry>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl AttemptTracker {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            clock,
        }
    }

    /// Increment the counter for `key` and refresh its TTL.
    ///
    /// A counter whose window has lapsed restarts at 1. Returns the new
    /// count.
    pub fn increment(&self, key: &str) -> u32 {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(AttemptEntry {
                count: 0,
                expires_at: now + self.window,
            });
        if entry.expires_at <= now {
            entry.count = 0;
        }
        entry.count += 1;
        entry.expires_at = now + self.window;
        entry.count
    }

    /// Current count for `key`, or 0 if absent or expired.
    pub fn get(&self, key: &str) -> u32 {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Drop the counter for `key`. Called on successful authentication, and
    /// after a block is applied (the block supersedes tracking).
    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop lapsed entries. Expiry is already enforced lazily on read; this
    /// only bounds memory. Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker_with_clock(window_secs: i64) -> (AttemptTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = AttemptTracker::with_clock(Duration::seconds(window_secs), clock.clone());
        (tracker, clock)
    }

    #[test]
    fn test_increment_and_get() {
        let (tracker, _clock) = tracker_with_clock(3_600);
        assert_eq!(tracker.get("10.0.0.5"), 0);
        assert_eq!(tracker.increment("10.0.0.5"), 1);
        assert_eq!(tracker.increment("10.0.0.5"), 2);
        assert_eq!(tracker.get("10.0.0.5"), 2);
        // Other keys are independent.
        assert_eq!(tracker.get("10.0.0.6"), 0);
    }

    #[test]
    fn test_window_refreshes_on_every_increment() {
        let (tracker, clock) = tracker_with_clock(60);
        for expected in 1..=5 {
            assert_eq!(tracker.increment("10.0.0.5"), expected);
            // 45s gaps, each shorter than the window; the refreshed TTL
            // keeps the streak alive well past the original 60s.
            clock.advance(Duration::seconds(45));
        }
        assert_eq!(tracker.get("10.0.0.5"), 5);
    }

    #[test]
    fn test_counter_resets_after_gap_beyond_window() {
        let (tracker, clock) = tracker_with_clock(60);
        tracker.increment("10.0.0.5");
        tracker.increment("10.0.0.5");

        clock.advance(Duration::seconds(61));
        assert_eq!(tracker.get("10.0.0.5"), 0);
        assert_eq!(tracker.increment("10.0.0.5"), 1);
    }

    #[test]
    fn test_clear() {
        let (tracker, _clock) = tracker_with_clock(3_600);
        tracker.increment("10.0.0.5");
        tracker.increment("10.0.0.5");
        tracker.clear("10.0.0.5");
        assert_eq!(tracker.get("10.0.0.5"), 0);
        assert_eq!(tracker.increment("10.0.0.5"), 1);
    }

    #[test]
    fn test_prune_drops_only_lapsed_entries() {
        let (tracker, clock) = tracker_with_clock(60);
        tracker.increment("10.0.0.5");
        clock.advance(Duration::seconds(40));
        tracker.increment("10.0.0.6");
        clock.advance(Duration::seconds(30));

        // First key lapsed (70s > 60s), second is 30s old.
        assert_eq!(tracker.prune(), 1);
        assert_eq!(tracker.get("10.0.0.5"), 0);
        assert_eq!(tracker.get("10.0.0.6"), 1);
    }
}
