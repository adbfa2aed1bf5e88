//! Monitors show the progress of a session to the user.

use core::fmt::{self, Debug};

use crate::status::Status;

/// Receives the user facing status and result lines of a session.
pub trait Monitor {
    /// Show `msg` to the user. `status` holds the counters at the time of the message.
    fn display(&mut self, status: &Status, msg: &str);
}

/// Monitor that print exactly nothing.
/// Not good for debugging, very good for speed.
#[derive(Debug, Clone, Default)]
pub struct NopMonitor {}

impl NopMonitor {
    /// Create new [`NopMonitor`]
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

impl Monitor for NopMonitor {
    #[inline]
    fn display(&mut self, _status: &Status, _msg: &str) {}
}

/// Hands every line to a closure.
#[derive(Clone)]
pub struct SimpleMonitor<F>
where
    F: FnMut(&str),
{
    print_fn: F,
}

impl<F> Debug for SimpleMonitor<F>
where
    F: FnMut(&str),
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleMonitor").finish_non_exhaustive()
    }
}

impl<F> SimpleMonitor<F>
where
    F: FnMut(&str),
{
    /// Creates the monitor
    pub fn new(print_fn: F) -> Self {
        Self { print_fn }
    }
}

impl<F> Monitor for SimpleMonitor<F>
where
    F: FnMut(&str),
{
    fn display(&mut self, _status: &Status, msg: &str) {
        (self.print_fn)(msg);
    }
}

impl<A: Monitor, B: Monitor> Monitor for (A, B) {
    fn display(&mut self, status: &Status, msg: &str) {
        self.0.display(status, msg);
        self.1.display(status, msg);
    }
}
