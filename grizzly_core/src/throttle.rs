//! Rate limiting for the status line.
//!
//! Early iterations and every relaunch are reported, afterwards output becomes
//! logarithmic in the iteration count, with a wall-clock ceiling between two lines.

use core::time::Duration;
use std::time::Instant;

/// Default maximum time between two status lines.
pub const DEFAULT_OUTPUT_DELAY: Duration = Duration::from_secs(300);

/// Default growth factor of the iteration schedule.
pub const DEFAULT_MULTIPLIER: u64 = 2;

/// Decides whether a status line is due.
#[derive(Debug, Clone)]
pub struct OutputThrottle {
    /// maximum time between output
    delay: Duration,
    /// next iteration to trigger output
    iterations: u64,
    /// next launch to trigger output
    launches: u64,
    /// growth of the iteration schedule
    multiplier: u64,
    last: Instant,
    /// always ready
    verbose: bool,
}

impl Default for OutputThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DELAY, DEFAULT_MULTIPLIER, false)
    }
}

impl OutputThrottle {
    /// Creates a new [`OutputThrottle`]. The iteration schedule starts at 1 and is
    /// multiplied by `multiplier` every time it fires.
    #[must_use]
    pub fn new(delay: Duration, multiplier: u64, verbose: bool) -> Self {
        assert!(multiplier > 1, "multiplier must be greater than 1");
        Self {
            delay,
            iterations: 1,
            launches: 1,
            multiplier,
            last: Instant::now(),
            verbose,
        }
    }

    /// Returns `true` if a status line should be printed for `cur_iter`.
    pub fn ready(&mut self, cur_iter: u64, launches: u64) -> bool {
        self.ready_at(cur_iter, launches, Instant::now())
    }

    /// Same as [`OutputThrottle::ready`], with the current time passed in.
    pub fn ready_at(&mut self, cur_iter: u64, launches: u64, now: Instant) -> bool {
        if self.verbose {
            return true;
        }
        let mut ready = false;
        if cur_iter >= self.iterations {
            ready = true;
            self.iterations = self.iterations.saturating_mul(self.multiplier);
        } else if launches >= self.launches {
            ready = true;
        } else if now.saturating_duration_since(self.last) >= self.delay {
            ready = true;
        }
        if ready {
            self.last = now;
            self.launches = launches + 1;
        }
        ready
    }
}
