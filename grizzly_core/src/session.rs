//! The session is the iteration loop: it keeps the target running, generates inputs,
//! delivers them and reports what the target does with them.

use core::{
    fmt::{self, Debug, Formatter},
    time::Duration,
};

use grizzly_bolts::{
    format_duration_hms,
    fs::{persistent_dir, scratch_dir},
};

use crate::{
    adapter::Adapter,
    config::{DisplayMode, HarnessConfig},
    iomanager::{IoManager, CURRENT_TEST_URL, HARNESS_URL},
    monitors::Monitor,
    reporter::Reporter,
    runner::{build_location, DeliveryStatus, Runner},
    server::Server,
    status::Status,
    target::{Target, TargetMonitor},
    testcase::{TestCase, TestFile},
    throttle::{OutputThrottle, DEFAULT_MULTIPLIER},
    Error,
};

/// Target logs above this size (25MB) trigger a warning.
pub const TARGET_LOG_SIZE_WARN: u64 = 0x1900000;

/// Path of the dynamic response that makes the harness close the target.
pub const CLOSE_BROWSER_URL: &str = "grz_close_browser";

/// Process exit classification of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Finished without results
    Success = 0,
    /// Unexpected error
    Error = 1,
    /// Bad arguments
    Args = 2,
    /// Aborted by the user
    Abort = 3,
    /// The target could not be launched
    LaunchFailure = 4,
    /// Finished with results
    Failure = 5,
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            _ if err.is_launch_failure() => Self::LaunchFailure,
            Error::ShuttingDown => Self::Abort,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Drives the target through one input after the other until the adapter runs out of
/// inputs or the iteration limit is hit.
pub struct Session<A, M, R, S, T> {
    adapter: A,
    coverage: bool,
    display: DisplayMode,
    ignore: Vec<String>,
    iomanager: IoManager,
    iteration_limit: Option<u64>,
    launch_retries: u32,
    log_limiter_delay: Duration,
    monitor: M,
    reporter: R,
    retry_delay: Duration,
    runner: Runner<S, T>,
    status: Status,
}

impl<A, M, R, S, T> Debug for Session<A, M, R, S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("coverage", &self.coverage)
            .field("display", &self.display)
            .field("ignore", &self.ignore)
            .field("iomanager", &self.iomanager)
            .field("iteration_limit", &self.iteration_limit)
            .field("runner", &self.runner)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<A, M, R, S, T> Session<A, M, R, S, T>
where
    A: Adapter,
    M: Monitor,
    R: Reporter,
    S: Server,
    T: Target,
{
    /// Creates a new [`Session`]. The target is expected to be closed, the first
    /// iteration launches it.
    #[must_use]
    pub fn new(
        adapter: A,
        iomanager: IoManager,
        monitor: M,
        reporter: R,
        server: S,
        target: T,
        config: &HarnessConfig,
    ) -> Self {
        let runner = Runner::with_idle_poll(
            server,
            target,
            config.idle_threshold,
            config.idle_delay,
            config.idle_poll,
        );
        Self {
            adapter,
            coverage: config.coverage,
            display: config.display,
            ignore: config.ignore.clone(),
            iomanager,
            iteration_limit: config.iteration_limit,
            launch_retries: config.launch_retries,
            log_limiter_delay: config.log_limiter_delay,
            monitor,
            reporter,
            retry_delay: config.launch_retry_delay,
            runner,
            status: Status::start(config.status_path.clone()),
        }
    }

    /// Shows the status line of the current iteration, if due.
    pub fn display_status(&mut self, throttle: &mut OutputThrottle) {
        let msg = if let Some(remaining) = self.adapter.remaining() {
            format!(
                "[I{:04}-L{:02}-R{:02}] {}",
                self.status.iteration,
                remaining,
                self.status.results,
                self.status.test_name.as_deref().unwrap_or_default()
            )
        } else if throttle.ready(
            self.status.iteration,
            self.runner.target().monitor().launches(),
        ) {
            format!("I{:04}-R{:02}", self.status.iteration, self.status.results)
        } else {
            return;
        };
        self.monitor.display(&self.status, &msg);
    }

    /// Creates a test case and lets the adapter fill it.
    pub fn generate_testcase(&mut self) -> Result<TestCase, Error> {
        log::debug!("calling iomanager.create_testcase()");
        let mut testcase = self.iomanager.create_testcase(self.adapter.name())?;
        log::debug!("calling adapter.generate()");
        self.adapter
            .generate(&mut testcase, self.iomanager.server_map_mut())?;
        log::debug!(
            "{} generated {}",
            testcase.adapter_name(),
            testcase.landing_page()
        );
        self.status.test_name = testcase.input_fname().map(str::to_string);
        if let Some(prefs) = self.runner.target().prefs() {
            testcase.add_meta(TestFile::from_file(prefs, "prefs.js")?);
        }
        Ok(testcase)
    }

    /// Saves the target logs, turns them into a report and submits it with the input
    /// history, newest first.
    pub fn report_result(&mut self) -> Result<(), Error> {
        let result_logs = scratch_dir("logs_", "logs")?;
        self.runner.target_mut().save_logs(result_logs.path())?;
        let report = self
            .reporter
            .create_report(result_logs.path(), self.runner.target().binary())?;
        let short_sig = report.short_signature.clone();
        let msg = format!(
            "Result: {short_sig} ({}:{})",
            report.major_short(),
            report.minor_short()
        );
        self.monitor.display(&self.status, &msg);
        let tests: Vec<&TestCase> = self.iomanager.tests().iter().rev().collect();
        self.reporter.submit(&tests, report)?;
        drop(result_logs);
        self.status.count_result(&short_sig);
        Ok(())
    }

    /// [`Session::run`] with the ignore list, iteration limit and display mode of the
    /// [`HarnessConfig`] the session was created with.
    pub fn run_configured(&mut self) -> Result<(), Error> {
        let ignore = self.ignore.clone();
        self.run(&ignore, self.iteration_limit, self.display)
    }

    /// Runs iterations until the adapter has no inputs left or `iteration_limit` is hit.
    ///
    /// Failures the target reports are checked against `ignore`. Returns an error if the
    /// target cannot be launched or never loads the first input after a launch.
    pub fn run(
        &mut self,
        ignore: &[String],
        iteration_limit: Option<u64>,
        display: DisplayMode,
    ) -> Result<(), Error> {
        let mut throttle = OutputThrottle::new(
            self.log_limiter_delay,
            DEFAULT_MULTIPLIER,
            display == DisplayMode::Verbose,
        );
        let close_request = self.runner.close_request();
        self.iomanager.server_map_mut().set_dynamic_response(
            CLOSE_BROWSER_URL,
            move || {
                close_request.set(true);
                b"<h1>Close Browser</h1>".to_vec()
            },
            "text/html",
        )?;

        loop {
            if let Err(err) = self.status.report() {
                log::warn!("failed to write status: {err}");
            }
            self.status.iteration += 1;

            if self.runner.target().closed() {
                self.launch()?;
            }
            self.runner.target_mut().step();

            let mut testcase = self.generate_testcase()?;
            self.display_status(&mut throttle);

            let result = self.runner.run(
                ignore,
                self.iomanager.server_map_mut(),
                &mut testcase,
                None,
                self.coverage,
                false,
            )?;
            testcase.set_duration(result.duration());
            if result.timeout() {
                log::debug!("calling adapter.on_timeout()");
                self.adapter.on_timeout(&mut testcase, result.served());
            } else {
                log::debug!("calling adapter.on_served()");
                self.adapter.on_served(&mut testcase, result.served());
            }

            if result.attempted() {
                if result.served().is_empty() {
                    // the target crashed between two test cases
                    log::info!("Ignoring test case since nothing was served");
                } else {
                    if self.adapter.ignore_unserved() {
                        log::debug!("removing unserved files from the test case");
                        testcase.purge_optional(result.served());
                    }
                    self.iomanager.commit(testcase);
                }
            } else {
                log::error!("Test case was not served");
                if !testcase.contains(testcase.landing_page()) {
                    log::warn!("Test case is missing landing page");
                }
                if result.initial() {
                    // first test case since launch, the target or adapter is broken
                    let err_logs = persistent_dir("error_", "logs")?;
                    self.runner.target_mut().save_logs(&err_logs)?;
                    log::error!("ERROR: Test case was not served. Timeout too short?");
                    log::error!("Logs can be found here {}", err_logs.display());
                    return Err(Error::session_abort("Please check Adapter and Target"));
                }
                self.iomanager.commit(testcase);
            }

            match result.status() {
                DeliveryStatus::Failed => {
                    log::debug!("result detected");
                    self.report_result()?;
                }
                DeliveryStatus::Ignored => {
                    self.status.ignored += 1;
                    let msg = format!("Ignored ({})", self.status.ignored);
                    self.monitor.display(&self.status, &msg);
                }
                DeliveryStatus::None => (),
            }

            // closes the target if a relaunch is due
            self.runner.target_mut().check_relaunch();

            if self.adapter.remaining().is_some_and(|remaining| remaining < 1) {
                self.monitor.display(&self.status, "Replay Complete");
                break;
            }
            if iteration_limit.is_some_and(|limit| self.status.iteration >= limit) {
                self.monitor.display(&self.status, "Hit iteration limit");
                break;
            }

            self.status.log_size = self.runner.target().log_size();
            if self.status.log_size > TARGET_LOG_SIZE_WARN {
                let msg = format!("Large browser logs: {}MBs", self.status.log_size / 0x100000);
                self.monitor.display(&self.status, &msg);
            }
        }
        log::info!(
            "{} iteration(s) in {}",
            self.status.iteration,
            format_duration_hms(&self.status.duration())
        );
        Ok(())
    }

    fn launch(&mut self) -> Result<(), Error> {
        self.iomanager.purge_tests();
        self.adapter.pre_launch();
        let port = self.runner.server().port();
        let location = if self.iomanager.harness().is_some() {
            // the harness opens the test cases
            let target = self.runner.target();
            build_location(
                HARNESS_URL,
                port,
                Some(target.relaunch_reset_count()),
                target.forced_close(),
                Some(self.adapter.test_duration()),
            )
        } else {
            build_location(CURRENT_TEST_URL, port, None, true, None)
        };
        log::debug!("launching target with {location}");
        self.runner
            .launch(&location, None, self.launch_retries, self.retry_delay)
    }

    /// The adapter
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The input history and route table
    #[must_use]
    pub fn iomanager(&self) -> &IoManager {
        &self.iomanager
    }

    /// The monitor
    #[must_use]
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    /// The reporter
    #[must_use]
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// The runner, owning server and target
    #[must_use]
    pub fn runner(&self) -> &Runner<S, T> {
        &self.runner
    }

    /// Run counters
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }
}

impl<A, M, R, S, T> Drop for Session<A, M, R, S, T> {
    fn drop(&mut self) {
        self.status.cleanup();
    }
}
