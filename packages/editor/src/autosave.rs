//! Autosave debounce timer.
//!
//! The timer only tracks a deadline; the container decides when to sleep
//! and dispatches `Intent::Autosave` once the deadline passes. The autosave
//! intent re-checks its own preconditions, so a stale deadline is harmless.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl AutosaveTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Update the timer after a state change.
    ///
    /// Clears it when autosaving no longer applies, restarts it when the
    /// content changed, and arms it when it is not running.
    pub fn sync(&mut self, should_save: bool, changed: bool, now: Instant) {
        if !should_save {
            self.deadline = None;
        } else if changed || self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    /// Consume the deadline if it has passed
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_push_the_deadline_back() {
        let start = Instant::now();
        let mut timer = AutosaveTimer::new(Duration::from_secs(10));

        timer.sync(true, true, start);
        timer.sync(true, true, start + Duration::from_secs(4));
        assert!(!timer.take_due(start + Duration::from_secs(10)));
        assert!(timer.take_due(start + Duration::from_secs(14)));
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_unchanged_state_keeps_deadline() {
        let start = Instant::now();
        let mut timer = AutosaveTimer::new(Duration::from_secs(10));

        timer.sync(true, true, start);
        timer.sync(true, false, start + Duration::from_secs(5));
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_condition_flipping_false_clears() {
        let start = Instant::now();
        let mut timer = AutosaveTimer::new(Duration::from_secs(10));

        timer.sync(true, true, start);
        timer.sync(false, true, start);
        assert!(!timer.take_due(start + Duration::from_secs(60)));
    }
}
