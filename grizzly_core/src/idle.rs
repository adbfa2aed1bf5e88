//! Tells a hung target apart from one that is idle for benign reasons.
//!
//! The check is only useful once a test case has run longer than expected, so the
//! first poll is delayed by a grace period. Afterwards the target is polled at most once
//! per poll delay, however often the serving loop asks.

use core::time::Duration;
use std::time::Instant;

/// Default minimum spacing between two idle polls.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// A wall-clock gate in front of an "is the target idle" check.
#[derive(Debug, Clone)]
pub struct IdleHeuristic {
    init_delay: Duration,
    next_poll: Option<Instant>,
    poll_delay: Duration,
    threshold: u8,
}

impl IdleHeuristic {
    /// Creates a new [`IdleHeuristic`].
    ///
    /// `threshold` is the CPU usage percentage below which the target counts as idle and
    /// must be below 100. `initial_delay` is the grace period before the first poll,
    /// `poll_delay` the spacing of the following polls.
    #[must_use]
    pub fn new(threshold: u8, initial_delay: Duration, poll_delay: Duration) -> Self {
        assert!(threshold < 100, "idle threshold must be in [0, 100)");
        Self {
            init_delay: initial_delay,
            next_poll: None,
            poll_delay,
            threshold,
        }
    }

    /// The CPU usage threshold handed to the check
    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Schedules the next poll relative to now.
    pub fn schedule_poll(&mut self, initial: bool) {
        self.schedule_poll_at(initial, Instant::now());
    }

    /// Schedules the next poll relative to `now`, after the initial delay if `initial`
    /// is set and after the poll delay otherwise.
    pub fn schedule_poll_at(&mut self, initial: bool, now: Instant) {
        let delay = if initial {
            self.init_delay
        } else {
            self.poll_delay
        };
        self.next_poll = Some(now + delay);
    }

    /// Runs `check` with the threshold if a poll is due.
    ///
    /// Returns `true` only if `check` ran and reported the target idle. A negative check
    /// schedules the next poll. Panics if no poll was ever scheduled.
    pub fn is_idle<F>(&mut self, check: F) -> bool
    where
        F: FnOnce(u8) -> bool,
    {
        self.is_idle_at(Instant::now(), check)
    }

    /// Same as [`IdleHeuristic::is_idle`], with the current time passed in.
    pub fn is_idle_at<F>(&mut self, now: Instant, check: F) -> bool
    where
        F: FnOnce(u8) -> bool,
    {
        let next_poll = self
            .next_poll
            .expect("schedule_poll() must be called first");
        if now >= next_poll {
            if check(self.threshold) {
                return true;
            }
            self.schedule_poll_at(false, now);
        }
        false
    }
}
