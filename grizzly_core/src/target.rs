//! The target is the monitored process the harness delivers inputs to.
//!
//! Launching, sandboxing and crash detection are up to the implementor; the core only
//! depends on the capabilities collected in [`Target`].

use core::{
    fmt::{self, Display},
    time::Duration,
};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::Error;

/// Outcome of [`Target::detect_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResult {
    /// Nothing went wrong.
    None,
    /// A failure was detected and should be reported.
    Failure,
    /// A failure was detected but matches the ignore list.
    Ignored,
}

/// Why a [`Target::launch`] call failed.
#[derive(Debug)]
pub enum LaunchFailure {
    /// The target could not be started, usually a bad build or environment.
    Error {
        /// Partial failure report written during the attempt, if any.
        report: Option<PathBuf>,
    },
    /// The target started but did not become responsive in time.
    Timeout,
}

impl Display for LaunchFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Error { report: Some(report) } => {
                write!(f, "launch error (report: {})", report.display())
            }
            Self::Error { report: None } => write!(f, "launch error"),
            Self::Timeout => write!(f, "launch timeout"),
        }
    }
}

impl LaunchFailure {
    /// Removes the partial failure report of a launch error, if there is one.
    pub fn cleanup(&mut self) {
        if let Self::Error { report } = self {
            if let Some(report) = report.take() {
                if let Err(err) = std::fs::remove_dir_all(&report) {
                    log::debug!("failed to remove launch report {}: {err}", report.display());
                }
            }
        }
    }
}

/// Health information of a running target.
pub trait TargetMonitor {
    /// Returns `true` while the target process is alive and not in a failure state.
    fn is_healthy(&self) -> bool;

    /// Number of times the target was launched.
    fn launches(&self) -> u64;
}

/// A target process the harness can launch, feed and inspect.
pub trait Target {
    /// The health monitor of this target
    type Monitor: TargetMonitor;

    /// Launches the target and opens `location`.
    fn launch(
        &mut self,
        location: &str,
        env_mod: Option<&HashMap<String, String>>,
    ) -> Result<(), LaunchFailure>;

    /// How long a launch may take before it is a [`LaunchFailure::Timeout`].
    fn launch_timeout(&self) -> Duration;

    /// Closes the target. Calling this on a closed target is a no-op.
    fn close(&mut self);

    /// `true` until the next successful [`Target::launch`] after a [`Target::close`].
    ///
    /// This is the only signal the session uses to decide on a relaunch.
    fn closed(&self) -> bool;

    /// Called once per iteration, before the input is generated.
    fn step(&mut self);

    /// The health monitor
    fn monitor(&self) -> &Self::Monitor;

    /// Returns `true` if the target CPU usage is below `threshold` percent.
    fn is_idle(&mut self, threshold: u8) -> bool;

    /// Checks for failures after a delivery, skipping the kinds listed in `ignore`.
    fn detect_failure(&mut self, ignore: &[String], was_timeout: bool) -> FailureResult;

    /// Dumps collected coverage data.
    fn dump_coverage(&mut self);

    /// Copies the target logs into `dest`.
    fn save_logs(&mut self, dest: &Path) -> Result<(), Error>;

    /// Accumulated size of the target logs in bytes.
    fn log_size(&self) -> u64;

    /// Closes the target if the relaunch policy says so.
    fn check_relaunch(&mut self);

    /// Preferences file the target was launched with.
    fn prefs(&self) -> Option<&Path>;

    /// Whether the harness should force the target closed after each input.
    fn forced_close(&self) -> bool;

    /// Iterations between relaunches, handed to the harness as `close_after`.
    fn relaunch_reset_count(&self) -> u32;

    /// The target binary, needed to symbolize crash reports.
    fn binary(&self) -> &Path;
}
