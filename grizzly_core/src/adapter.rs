//! Adapters generate the inputs the session delivers.

use crate::{
    server::{Served, ServerMap},
    testcase::TestCase,
    Error,
};

/// Default time in seconds the harness gives a single test case.
pub const DEFAULT_TEST_DURATION: u64 = 30;

/// Produces a new test case for every iteration and reacts to delivery outcomes.
pub trait Adapter {
    /// Name stored with every generated test case
    fn name(&self) -> &str;

    /// Fills `testcase` with a new input. Additional routes needed by the input can be
    /// registered in `server_map`.
    fn generate(&mut self, testcase: &mut TestCase, server_map: &mut ServerMap)
        -> Result<(), Error>;

    /// Called after a delivery that ended in a timeout.
    #[inline]
    fn on_timeout(&mut self, _testcase: &mut TestCase, _served: &Served) {}

    /// Called after a delivery that finished in time.
    #[inline]
    fn on_served(&mut self, _testcase: &mut TestCase, _served: &Served) {}

    /// Called before every (re)launch of the target.
    #[inline]
    fn pre_launch(&mut self) {}

    /// Inputs left to replay, `None` if the adapter never runs out.
    #[inline]
    fn remaining(&self) -> Option<u64> {
        None
    }

    /// Whether files the target never requested are stripped from the test case.
    #[inline]
    fn ignore_unserved(&self) -> bool {
        true
    }

    /// Time in seconds the harness gives a single test case.
    #[inline]
    fn test_duration(&self) -> u64 {
        DEFAULT_TEST_DURATION
    }
}
