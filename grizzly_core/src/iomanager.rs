//! Bookkeeping of generated test cases and of the routes the server needs for them.

use std::collections::VecDeque;

use crate::{server::ServerMap, testcase::TestCase, Error};

/// Default number of delivered test cases kept for reporting.
pub const DEFAULT_MAX_TESTS: usize = 1;

/// Path the target opens when no harness is used. Redirects to the newest test case.
pub const CURRENT_TEST_URL: &str = "grz_current_test";

/// Path of the harness page.
pub const HARNESS_URL: &str = "grz_harness";

/// Owns the input history, the server route table and the optional harness page.
#[derive(Debug)]
pub struct IoManager {
    generated: u64,
    harness: Option<Vec<u8>>,
    max_tests: usize,
    server_map: ServerMap,
    tests: VecDeque<TestCase>,
}

impl IoManager {
    /// Keeps up to `max_tests` test cases. With a `harness` page, the page is served at
    /// [`HARNESS_URL`] and opens the test cases itself.
    pub fn new(max_tests: usize, harness: Option<Vec<u8>>) -> Result<Self, Error> {
        if max_tests == 0 {
            return Err(Error::illegal_argument("max_tests must be at least 1"));
        }
        let mut server_map = ServerMap::new();
        if let Some(harness) = &harness {
            let page = harness.clone();
            server_map.set_dynamic_response(HARNESS_URL, move || page.clone(), "text/html")?;
        }
        Ok(Self {
            generated: 0,
            harness,
            max_tests,
            server_map,
            tests: VecDeque::with_capacity(max_tests),
        })
    }

    /// The landing page name of the next test case.
    #[must_use]
    pub fn landing_page(&self) -> String {
        format!("test_page_{:04}.html", self.generated)
    }

    /// Creates an empty test case with a fresh landing page and points
    /// [`CURRENT_TEST_URL`] at it.
    pub fn create_testcase(&mut self, adapter_name: &str) -> Result<TestCase, Error> {
        let landing_page = self.landing_page();
        self.generated += 1;
        self.server_map
            .set_redirect(CURRENT_TEST_URL, &landing_page, false)?;
        Ok(TestCase::new(&landing_page, adapter_name))
    }

    /// Adds a delivered test case to the history, dropping the oldest one when full.
    pub fn commit(&mut self, testcase: TestCase) {
        while self.tests.len() >= self.max_tests {
            self.tests.pop_front();
        }
        self.tests.push_back(testcase);
    }

    /// Forgets all test cases, used when the target is relaunched.
    pub fn purge_tests(&mut self) {
        log::debug!("purging {} test case(s)", self.tests.len());
        self.tests.clear();
    }

    /// Delivered test cases, oldest first
    #[must_use]
    pub fn tests(&self) -> &VecDeque<TestCase> {
        &self.tests
    }

    /// The harness page, if used
    #[must_use]
    pub fn harness(&self) -> Option<&[u8]> {
        self.harness.as_deref()
    }

    /// The server route table
    #[must_use]
    pub fn server_map(&self) -> &ServerMap {
        &self.server_map
    }

    /// The server route table (mut)
    pub fn server_map_mut(&mut self) -> &mut ServerMap {
        &mut self.server_map
    }
}
