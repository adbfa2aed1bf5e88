//! Harness configuration, built in code or loaded from TOML.
//!
//! ```toml
//! idle_threshold = 25
//! idle_delay = 60
//! coverage = false
//! iteration_limit = 1000
//! display = "verbose"
//! ignore = ["log-limit", "timeout"]
//! ```
//! Durations are whole seconds.

use core::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{idle::DEFAULT_POLL_DELAY, throttle::DEFAULT_OUTPUT_DELAY, Error};

/// Default number of launch retries before a launch failure is fatal.
pub const DEFAULT_LAUNCH_RETRIES: u32 = 3;

/// How chatty the status output is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Report every iteration
    Verbose,
    /// Quickly reduce the amount of output
    #[default]
    Normal,
}

mod duration_secs {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Settings of a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// CPU usage in percent below which a slow target counts as idle, 0 disables the check
    #[builder(default = 0)]
    pub idle_threshold: u8,
    /// Grace period before the first idle poll
    #[builder(default = Duration::from_secs(60))]
    #[serde(with = "duration_secs")]
    pub idle_delay: Duration,
    /// Time between two idle polls
    #[builder(default = DEFAULT_POLL_DELAY)]
    #[serde(with = "duration_secs")]
    pub idle_poll: Duration,
    /// Dump coverage after every successful delivery
    #[builder(default = false)]
    pub coverage: bool,
    /// Stop after this many iterations
    #[builder(default, setter(strip_option))]
    pub iteration_limit: Option<u64>,
    /// Status output
    #[builder(default)]
    pub display: DisplayMode,
    /// Failure kinds to count but not report
    #[builder(default)]
    pub ignore: Vec<String>,
    /// Launch attempts after the first one failed
    #[builder(default = DEFAULT_LAUNCH_RETRIES)]
    pub launch_retries: u32,
    /// Pause between launch attempts
    #[builder(default = Duration::ZERO)]
    #[serde(with = "duration_secs")]
    pub launch_retry_delay: Duration,
    /// Where to keep a JSON copy of the run counters
    #[builder(default, setter(strip_option))]
    pub status_path: Option<PathBuf>,
    /// Longest time without a status line
    #[builder(default = DEFAULT_OUTPUT_DELAY)]
    #[serde(with = "duration_secs")]
    pub log_limiter_delay: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HarnessConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn from_file<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Checks values the types cannot rule out.
    pub fn validate(&self) -> Result<(), Error> {
        if self.idle_threshold >= 100 {
            return Err(Error::illegal_argument(format!(
                "idle_threshold must be below 100, got {}",
                self.idle_threshold
            )));
        }
        if self.idle_threshold > 0 && self.idle_delay.is_zero() {
            return Err(Error::illegal_argument(
                "idle_delay must be set when idle_threshold is used",
            ));
        }
        if self.iteration_limit == Some(0) {
            return Err(Error::illegal_argument("iteration_limit must be at least 1"));
        }
        Ok(())
    }
}
