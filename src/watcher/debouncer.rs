//! Coalescing of bursts of change notifications.
//!
//! Editors often touch a file several times per save (truncate, write,
//! metadata). The debouncer collapses such a burst into a single delivery
//! once the file has been quiet for the configured duration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::path_key::PathKey;

/// Debounces change notifications by file identity.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: identity -> last change timestamp.
    pending: HashMap<PathKey, Instant>,
    duration: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a change, resetting the timer for this identity.
    pub fn record(&mut self, key: PathKey) {
        self.pending.insert(key, Instant::now());
    }

    /// Take every identity that has been stable for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<PathKey> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|key, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(key.clone());
                false
            } else {
                true
            }
        });

        ready
    }

    /// Time until the earliest pending change becomes ready, or `None` if
    /// nothing is pending.
    pub fn next_deadline(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending
            .values()
            .map(|last_change| (*last_change + self.duration).saturating_duration_since(now))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn key(ino: u64) -> PathKey {
        PathKey::Inode { dev: 1, ino }
    }

    #[test]
    fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50);

        debouncer.record(key(1));

        // Immediately after, nothing should be ready
        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.next_deadline().is_some());

        sleep(Duration::from_millis(60));

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![key(1)]);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_debouncer_resets_on_new_change() {
        let mut debouncer = Debouncer::new(50);

        debouncer.record(key(1));
        sleep(Duration::from_millis(30));

        // Record again - should reset the timer
        debouncer.record(key(1));
        sleep(Duration::from_millis(30));

        // 60ms since the first change, only 30ms since the second
        assert!(debouncer.take_ready().is_empty());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[test]
    fn test_debouncer_multiple_files() {
        let mut debouncer = Debouncer::new(50);

        debouncer.record(key(1));
        sleep(Duration::from_millis(30));
        debouncer.record(key(2));
        sleep(Duration::from_millis(25));

        assert_eq!(debouncer.take_ready(), vec![key(1)]);
        assert!(debouncer.next_deadline().is_some());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready(), vec![key(2)]);
    }

    #[test]
    fn test_nothing_pending_has_no_deadline() {
        let mut debouncer = Debouncer::new(0);
        assert_eq!(debouncer.next_deadline(), None);

        debouncer.record(key(1));
        debouncer.take_ready();
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let mut debouncer = Debouncer::new(0);

        debouncer.record(key(1));
        assert_eq!(debouncer.next_deadline(), Some(Duration::ZERO));
        assert_eq!(debouncer.take_ready(), vec![key(1)]);
    }

    #[test]
    fn test_next_deadline_bounded_by_duration() {
        let mut debouncer = Debouncer::new(200);
        debouncer.record(key(1));

        let deadline = debouncer.next_deadline().unwrap();
        assert!(deadline <= Duration::from_millis(200));
        assert!(deadline > Duration::from_millis(100));
    }
}
