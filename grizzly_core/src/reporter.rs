//! Crash reports and the reporter that stores them.

use std::path::{Path, PathBuf};

use crate::{testcase::TestCase, Error};

/// A parsed crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Where the report keeps its logs
    pub path: PathBuf,
    /// Short human readable signature of the crash
    pub short_signature: String,
    /// Hash of the top frames of the crashing stack
    pub major: String,
    /// Hash of the crashing stack including more frames
    pub minor: String,
}

impl Report {
    /// The first eight characters of the major hash.
    #[must_use]
    pub fn major_short(&self) -> &str {
        prefix(&self.major, 8)
    }

    /// The first eight characters of the minor hash.
    #[must_use]
    pub fn minor_short(&self) -> &str {
        prefix(&self.minor, 8)
    }
}

fn prefix(value: &str, len: usize) -> &str {
    match value.char_indices().nth(len) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Turns target logs into reports and files them.
pub trait Reporter {
    /// Builds a [`Report`] from the logs saved in `log_path` for `binary`.
    ///
    /// The report must not depend on `log_path` once this returns, the session
    /// removes the directory after [`Reporter::submit`].
    fn create_report(&mut self, log_path: &Path, binary: &Path) -> Result<Report, Error>;

    /// Stores `report` with the inputs that led to it, newest first.
    fn submit(&mut self, tests: &[&TestCase], report: Report) -> Result<(), Error>;
}
