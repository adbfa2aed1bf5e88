//! Counters of a running session.

use core::time::Duration;
use std::{fs, io, path::PathBuf, time::Instant};

use grizzly_bolts::{current_time, fs::write_file_atomic};
use hashbrown::HashMap;
use serde::Serialize;

use crate::Error;

/// Minimum time between two writes of the status file.
pub const REPORT_FREQ: Duration = Duration::from_secs(60);

/// Run counters, optionally mirrored to a JSON file.
#[derive(Debug, Serialize)]
pub struct Status {
    /// Number of iterations started
    pub iteration: u64,
    /// Number of reported results
    pub results: u64,
    /// Number of failures that matched the ignore list
    pub ignored: u64,
    /// Last observed size of the target logs in bytes
    pub log_size: u64,
    /// Name of the input of the current test case
    pub test_name: Option<String>,
    /// Start of the session, since the unix epoch
    start_time: Duration,
    /// Reported results by short signature
    signatures: HashMap<String, u64>,
    #[serde(skip)]
    last_report: Option<Instant>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Status {
    /// Starts counting. With `path` set, [`Status::report`] keeps a JSON copy there.
    #[must_use]
    pub fn start(path: Option<PathBuf>) -> Self {
        Self {
            iteration: 0,
            results: 0,
            ignored: 0,
            log_size: 0,
            test_name: None,
            start_time: current_time(),
            signatures: HashMap::new(),
            last_report: None,
            path,
        }
    }

    /// Time since [`Status::start`]
    #[must_use]
    pub fn duration(&self) -> Duration {
        current_time().saturating_sub(self.start_time)
    }

    /// Counts a reported result with signature `signature`.
    pub fn count_result(&mut self, signature: &str) {
        self.results += 1;
        *self.signatures.entry(signature.to_string()).or_insert(0) += 1;
    }

    /// Reported results by short signature
    #[must_use]
    pub fn signatures(&self) -> &HashMap<String, u64> {
        &self.signatures
    }

    /// Writes the status file, at most once per [`REPORT_FREQ`].
    ///
    /// Returns `true` if the file was written.
    pub fn report(&mut self) -> Result<bool, Error> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let now = Instant::now();
        if self
            .last_report
            .is_some_and(|last| now.saturating_duration_since(last) < REPORT_FREQ)
        {
            return Ok(false);
        }
        write_file_atomic(path, &serde_json::to_vec(&self)?)?;
        self.last_report = Some(now);
        Ok(true)
    }

    /// Removes the status file.
    pub fn cleanup(&mut self) {
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => (),
                Err(err) if err.kind() == io::ErrorKind::NotFound => (),
                Err(err) => log::warn!("failed to remove {}: {err}", path.display()),
            }
        }
    }
}
