/*!
Welcome to `grizzly_bolts`

Small pieces shared by the grizzly crates: the error type, scratch directory handling
and time helpers.
*/
#![warn(clippy::cargo)]
#![deny(clippy::cargo_common_metadata)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::unreadable_literal,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items,
    clippy::module_name_repetitions
)]
#![cfg_attr(not(test), warn(
    missing_debug_implementations,
    missing_docs,
    //trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    //unused_results
))]

pub mod fs;

use core::{
    fmt::{self, Display},
    time,
};
use std::{
    io,
    time::{SystemTime, UNIX_EPOCH},
};

/// Empty struct standing in for a captured backtrace.
#[derive(Debug, Default)]
pub struct ErrorBacktrace {}

impl ErrorBacktrace {
    /// Nop
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

#[allow(clippy::unnecessary_wraps)]
fn display_error_backtrace(_f: &mut fmt::Formatter, _err: &ErrorBacktrace) -> fmt::Result {
    fmt::Result::Ok(())
}

/// Main error struct for grizzly
#[derive(Debug)]
pub enum Error {
    /// Serialization error
    Serialize(String, ErrorBacktrace),
    /// File related error
    File(io::Error, ErrorBacktrace),
    /// The argument passed to this method or function is not valid
    IllegalArgument(String, ErrorBacktrace),
    /// The target failed to launch, most likely a bad build or environment.
    LaunchError(String, ErrorBacktrace),
    /// The target did not become responsive in time.
    LaunchTimeout(String, ErrorBacktrace),
    /// The session cannot continue, the target/adapter combination looks broken.
    SessionAbort(String, ErrorBacktrace),
    /// Shutting down, not really an error.
    ShuttingDown,
    /// Something else happened
    Unknown(String, ErrorBacktrace),
}

impl Error {
    /// Serialization error
    #[must_use]
    pub fn serialize<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Serialize(arg.into(), ErrorBacktrace::new())
    }
    /// File related error
    #[must_use]
    pub fn file(arg: io::Error) -> Self {
        Error::File(arg, ErrorBacktrace::new())
    }
    /// The argument passed to this method or function is not valid
    #[must_use]
    pub fn illegal_argument<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::IllegalArgument(arg.into(), ErrorBacktrace::new())
    }
    /// The target failed to launch
    #[must_use]
    pub fn launch_error<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::LaunchError(arg.into(), ErrorBacktrace::new())
    }
    /// The target launch timed out
    #[must_use]
    pub fn launch_timeout<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::LaunchTimeout(arg.into(), ErrorBacktrace::new())
    }
    /// The session has to stop
    #[must_use]
    pub fn session_abort<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::SessionAbort(arg.into(), ErrorBacktrace::new())
    }
    /// Shutting down, not really an error.
    #[must_use]
    pub fn shutting_down() -> Self {
        Error::ShuttingDown
    }
    /// Something else happened
    #[must_use]
    pub fn unknown<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Unknown(arg.into(), ErrorBacktrace::new())
    }

    /// Returns `true` if this error was raised while launching the target.
    #[must_use]
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::LaunchError(..) | Self::LaunchTimeout(..))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Serialize(s, b) => {
                write!(f, "Error in Serialization: `{0}`", &s)?;
                display_error_backtrace(f, b)
            }
            Self::File(err, b) => {
                write!(f, "File IO failed: {:?}", &err)?;
                display_error_backtrace(f, b)
            }
            Self::IllegalArgument(s, b) => {
                write!(f, "Illegal argument: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::LaunchError(s, b) => {
                write!(f, "Target launch failed: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::LaunchTimeout(s, b) => {
                write!(f, "Target launch timed out: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::SessionAbort(s, b) => {
                write!(f, "Session aborted: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::ShuttingDown => write!(f, "Shutting down!"),
            Self::Unknown(s, b) => {
                write!(f, "Unknown error: {0}", &s)?;
                display_error_backtrace(f, b)
            }
        }
    }
}

/// Stringify the json serializer error
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialize(format!("{err:?}"))
    }
}

/// Stringify the toml deserializer error
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::serialize(format!("{err}"))
    }
}

/// Create a grizzly Error from io Error
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::file(err)
    }
}

impl std::error::Error for Error {}

/// Current time
#[must_use]
#[inline]
pub fn current_time() -> time::Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap()
}

/// Format a `Duration` into a HMS string
#[must_use]
pub fn format_duration_hms(duration: &time::Duration) -> String {
    let secs = duration.as_secs();
    format!("{}h-{}m-{}s", (secs / 60) / 60, (secs / 60) % 60, secs % 60)
}
