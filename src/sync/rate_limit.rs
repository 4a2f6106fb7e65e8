//! Sliding creation window.
//!
//! Remembers when recent creations were seen. Re-filtered against the
//! wall clock every pass, so the window slides rather than resetting in
//! fixed buckets.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Default)]
pub struct CreationWindow {
    seen: VecDeque<SystemTime>,
}

impl CreationWindow {
    /// Forget creations older than `window` before `now`.
    pub fn prune(&mut self, now: SystemTime, window: Duration) {
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };
        while self.seen.front().is_some_and(|&t| t < cutoff) {
            self.seen.pop_front();
        }
    }

    /// Whether `incoming` more creations would push the window past `threshold`.
    #[must_use]
    pub fn would_exceed(&self, incoming: usize, threshold: usize) -> bool {
        self.seen.len() + incoming > threshold
    }

    pub fn record(&mut self, count: usize, at: SystemTime) {
        self.seen.extend(std::iter::repeat_n(at, count));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let now = SystemTime::now();
        let mut window = CreationWindow::default();
        assert!(!window.would_exceed(25, 25));
        assert!(window.would_exceed(26, 25));

        window.record(20, now);
        assert!(!window.would_exceed(5, 25));
        assert!(window.would_exceed(6, 25));
    }

    #[test]
    fn test_window_slides() {
        let now = SystemTime::now();
        let mut window = CreationWindow::default();
        window.record(10, now - Duration::from_secs(90));
        window.record(3, now - Duration::from_secs(10));

        window.prune(now, Duration::from_secs(60));
        assert_eq!(window.len(), 3);
    }
}
