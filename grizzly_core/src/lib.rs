/*!
Welcome to `grizzly_core`

The execution core of the grizzly harness. A [`session::Session`] drives the iteration
loop: it (re)launches the target, asks the [`adapter::Adapter`] for a new input, hands it
to the [`runner::Runner`] for delivery through the [`server::Server`] and classifies what
the [`target::Target`] reports back.
*/
#![warn(clippy::cargo)]
#![deny(clippy::cargo_common_metadata)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::unreadable_literal,
    clippy::type_repetition_in_bounds,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items,
    clippy::module_name_repetitions,
    clippy::too_many_arguments
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

pub mod adapter;
pub mod config;
pub mod idle;
pub mod iomanager;
pub mod monitors;
pub mod reporter;
pub mod runner;
pub mod server;
pub mod session;
pub mod status;
pub mod target;
pub mod testcase;
pub mod throttle;

pub use grizzly_bolts::Error;

/// The purpose of this module is to alleviate imports of many components by adding a glob import.
pub mod prelude {
    pub use super::{
        adapter::Adapter,
        config::{DisplayMode, HarnessConfig},
        idle::IdleHeuristic,
        iomanager::IoManager,
        monitors::{Monitor, NopMonitor, SimpleMonitor},
        reporter::{Report, Reporter},
        runner::{DeliveryResult, DeliveryStatus, Runner},
        server::{ServeStatus, Served, Server, ServerMap},
        session::{ExitCode, Session},
        status::Status,
        target::{FailureResult, LaunchFailure, Target, TargetMonitor},
        testcase::{TestCase, TestFile},
        throttle::OutputThrottle,
        Error,
    };
}
