//! The runner delivers one test case to the target and interprets the outcome.

use core::{
    cell::Cell,
    fmt::{self, Debug, Formatter},
    time::Duration,
};
use std::{path::Path, rc::Rc, thread, time::Instant};

use grizzly_bolts::fs::scratch_dir;
use hashbrown::HashMap;

use crate::{
    idle::{IdleHeuristic, DEFAULT_POLL_DELAY},
    server::{ServeStatus, Served, Server, ServerMap},
    target::{FailureResult, LaunchFailure, Target, TargetMonitor},
    testcase::TestCase,
    Error,
};

/// Time between a close request and closing a healthy target, shutdown crashes show up
/// in this window.
pub const CLOSE_DELAY: Duration = Duration::from_millis(100);

/// Classification of a delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No failure
    #[default]
    None,
    /// The target failed
    Failed,
    /// The target failed in a way the ignore list covers
    Ignored,
}

/// Outcome of one [`Runner::run`] call.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    attempted: bool,
    duration: Duration,
    initial: bool,
    served: Served,
    status: DeliveryStatus,
    timeout: bool,
}

impl DeliveryResult {
    /// A result that was neither attempted nor classified yet.
    #[must_use]
    pub fn new(served: Served, duration: Duration, timeout: bool) -> Self {
        Self {
            attempted: false,
            duration,
            initial: false,
            served,
            status: DeliveryStatus::None,
            timeout,
        }
    }

    /// The landing page was requested by the target.
    #[must_use]
    pub fn attempted(&self) -> bool {
        self.attempted
    }

    /// Time spent serving
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// First delivery since the target was (re)launched.
    #[must_use]
    pub fn initial(&self) -> bool {
        self.initial
    }

    /// Files the target requested, in request order
    #[must_use]
    pub fn served(&self) -> &Served {
        &self.served
    }

    /// Failure classification, only ever set for attempted deliveries
    #[must_use]
    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// The server timed out before the target was done.
    #[must_use]
    pub fn timeout(&self) -> bool {
        self.timeout
    }
}

/// Builds the url the target opens.
///
/// `close_after`, `forced_close` and `timeout` (seconds) are harness arguments and only
/// show up in the query string if they differ from their defaults.
#[must_use]
pub fn build_location(
    srv_path: &str,
    srv_port: u16,
    close_after: Option<u32>,
    forced_close: bool,
    timeout: Option<u64>,
) -> String {
    let mut location = format!(
        "http://127.0.0.1:{srv_port}/{}",
        srv_path.trim_start_matches('/')
    );
    let mut args = Vec::new();
    if let Some(close_after) = close_after {
        args.push(format!("close_after={close_after}"));
    }
    if !forced_close {
        args.push("forced_close=0".to_string());
    }
    if let Some(timeout) = timeout {
        args.push(format!("timeout={}", timeout.saturating_mul(1000)));
    }
    if !args.is_empty() {
        location.push('?');
        location.push_str(&args.join("&"));
    }
    location
}

/// Launches the target and delivers test cases to it through the server.
pub struct Runner<S, T> {
    close_request: Rc<Cell<bool>>,
    idle: Option<IdleHeuristic>,
    server: S,
    target: T,
    /// number of tests run since target (re)launched
    tests_run: u64,
}

impl<S, T> Debug for Runner<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("idle", &self.idle)
            .field("tests_run", &self.tests_run)
            .finish_non_exhaustive()
    }
}

impl<S, T> Runner<S, T>
where
    S: Server,
    T: Target,
{
    /// Creates a new [`Runner`]. An `idle_threshold` above 0 enables idle detection,
    /// which then needs a non-zero `idle_delay`.
    #[must_use]
    pub fn new(server: S, target: T, idle_threshold: u8, idle_delay: Duration) -> Self {
        Self::with_idle_poll(server, target, idle_threshold, idle_delay, DEFAULT_POLL_DELAY)
    }

    /// Same as [`Runner::new`] with a custom spacing of idle polls.
    #[must_use]
    pub fn with_idle_poll(
        server: S,
        target: T,
        idle_threshold: u8,
        idle_delay: Duration,
        idle_poll: Duration,
    ) -> Self {
        let idle = if idle_threshold > 0 {
            assert!(
                !idle_delay.is_zero(),
                "idle_delay must be set when idle_threshold is used"
            );
            log::debug!(
                "using idle check, th {idle_threshold}, delay {}s",
                idle_delay.as_secs()
            );
            Some(IdleHeuristic::new(idle_threshold, idle_delay, idle_poll))
        } else {
            None
        };
        Self {
            close_request: Rc::new(Cell::new(false)),
            idle,
            server,
            target,
            tests_run: 0,
        }
    }

    /// Launches the target and opens `location`.
    ///
    /// A failed launch is retried up to `max_retries` times, `retry_delay` apart. The
    /// failure of the last attempt is returned.
    pub fn launch(
        &mut self,
        location: &str,
        env_mod: Option<&HashMap<String, String>>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<(), Error> {
        self.server.clear_backlog();
        log::debug!(
            "launching target (timeout {}s)",
            self.target.launch_timeout().as_secs()
        );
        let mut retries = max_retries;
        while let Err(mut failure) = self.target.launch(location, env_mod) {
            if retries == 0 {
                let attempts = u64::from(max_retries) + 1;
                return Err(match failure {
                    LaunchFailure::Error { .. } => {
                        Error::launch_error(format!("{failure}, {attempts} attempt(s)"))
                    }
                    LaunchFailure::Timeout => {
                        Error::launch_timeout(format!("{failure}, {attempts} attempt(s)"))
                    }
                });
            }
            match failure {
                // likely a bad build or environment configuration
                LaunchFailure::Error { .. } => {
                    log::warn!("Failure detected during launch (retries {retries})");
                    failure.cleanup();
                }
                // frequently seen on machines under high load
                LaunchFailure::Timeout => {
                    log::warn!("Timeout detected during launch (retries {retries})");
                }
            }
            retries -= 1;
            thread::sleep(retry_delay);
        }
        // a request aimed at the previous instance must not close this one
        self.close_request.set(false);
        self.tests_run = 0;
        Ok(())
    }

    /// Serves `testcase` and checks the target for failures.
    ///
    /// Without `test_path` the test case is written to a scratch directory that is gone
    /// when this returns, with `test_path` the files are served from there. With
    /// `wait_for_callback` the server keeps serving until the liveness callback stops it.
    pub fn run(
        &mut self,
        ignore: &[String],
        server_map: &mut ServerMap,
        testcase: &mut TestCase,
        test_path: Option<&Path>,
        coverage: bool,
        wait_for_callback: bool,
    ) -> Result<DeliveryResult, Error> {
        if let Some(idle) = &mut self.idle {
            idle.schedule_poll(true);
        }
        let optional = testcase.optional();
        let (server_status, served, duration) = {
            let scratch;
            let wwwdir = if let Some(test_path) = test_path {
                test_path
            } else {
                scratch = scratch_dir("test_", "serve")?;
                testcase.dump(scratch.path())?;
                scratch.path()
            };
            let close_request = Rc::clone(&self.close_request);
            let Self {
                idle,
                server,
                target,
                ..
            } = self;
            let mut continue_cb = || keep_waiting(&close_request, idle.as_mut(), &mut *target);
            let serve_start = Instant::now();
            let (server_status, served) = server.serve_path(
                wwwdir,
                &mut continue_cb,
                wait_for_callback,
                &optional,
                server_map,
            )?;
            (server_status, served, serve_start.elapsed())
        };
        // the close page can be the last request, the server does not poll after it
        close_if_requested(&self.close_request, &mut self.target);
        let timeout = server_status == ServeStatus::Timeout;
        let mut result = DeliveryResult::new(served, duration, timeout);
        // keep files pulled in from include routes with the test case
        for (url, include) in server_map.include() {
            testcase.add_batch(include, &result.served, url)?;
        }
        result.attempted = result.served.contains(testcase.landing_page());
        if result.attempted && coverage && !result.timeout {
            // before detect_failure() so coverage issues are caught too
            self.target.dump_coverage();
        }
        let failure = self.target.detect_failure(ignore, result.timeout);
        result.initial = self.tests_run == 0;
        if result.attempted {
            self.tests_run += 1;
            result.status = match failure {
                FailureResult::Failure => DeliveryStatus::Failed,
                FailureResult::Ignored => DeliveryStatus::Ignored,
                FailureResult::None => DeliveryStatus::None,
            };
        } else {
            // the previous iteration likely left the target in a bad state
            log::debug!("landing page {:?} not served!", testcase.landing_page());
            if failure != FailureResult::None {
                log::warn!("dropping {failure:?} result, the landing page was never served");
            }
            self.target.close();
        }
        Ok(result)
    }

    /// Asks the runner to close the target from inside a delivery. Used by dynamic
    /// responses that cannot reach the target themselves.
    #[must_use]
    pub fn close_request(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.close_request)
    }

    /// Deliveries since the last successful launch
    #[must_use]
    pub fn tests_run(&self) -> u64 {
        self.tests_run
    }

    /// The server
    #[must_use]
    pub fn server(&self) -> &S {
        &self.server
    }

    /// The server (mut)
    pub fn server_mut(&mut self) -> &mut S {
        &mut self.server
    }

    /// The target
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The target (mut)
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

/// Consumes a pending close request. A healthy target is closed after [`CLOSE_DELAY`].
///
/// Returns `true` if there was a request.
fn close_if_requested<T>(close_request: &Cell<bool>, target: &mut T) -> bool
where
    T: Target,
{
    if !close_request.take() {
        return false;
    }
    if target.monitor().is_healthy() {
        thread::sleep(CLOSE_DELAY);
        target.close();
    }
    true
}

/// Liveness callback handed to the server. Must stay cheap, it is polled from the
/// serving loop.
fn keep_waiting<T>(
    close_request: &Cell<bool>,
    idle: Option<&mut IdleHeuristic>,
    target: &mut T,
) -> bool
where
    T: Target,
{
    if close_if_requested(close_request, target) {
        return false;
    }
    if let Some(idle) = idle {
        if idle.is_idle(|threshold| target.is_idle(threshold)) {
            log::debug!("idle target detected");
            return false;
        }
    }
    target.monitor().is_healthy()
}

#[cfg(test)]
mod tests {
    use core::{cell::Cell, time::Duration};
    use std::{
        cell::RefCell,
        collections::VecDeque,
        env, fs,
        path::{Path, PathBuf},
        rc::Rc,
    };

    use grizzly_bolts::fs::GRZ_TMP_ENV;
    use hashbrown::HashMap;
    use serial_test::serial;

    use super::{build_location, DeliveryStatus, Runner};
    use crate::{
        server::{ServeStatus, Served, Server, ServerMap},
        target::{FailureResult, LaunchFailure, Target, TargetMonitor},
        testcase::TestCase,
        Error,
    };

    type ServeFn =
        Box<dyn FnMut(&Path, &mut dyn FnMut() -> bool) -> Result<(ServeStatus, Served), Error>>;

    struct FakeServer {
        cleared: usize,
        serve: ServeFn,
    }

    impl FakeServer {
        fn new<F>(serve: F) -> Self
        where
            F: FnMut(&Path, &mut dyn FnMut() -> bool) -> Result<(ServeStatus, Served), Error>
                + 'static,
        {
            Self {
                cleared: 0,
                serve: Box::new(serve),
            }
        }

        /// Serves every file found in the root.
        fn serve_all() -> Self {
            Self::new(|path, _| {
                let served = fs::read_dir(path)
                    .unwrap()
                    .map(|entry| {
                        let entry = entry.unwrap();
                        (entry.file_name().to_string_lossy().into_owned(), entry.path())
                    })
                    .collect();
                Ok((ServeStatus::All, served))
            })
        }
    }

    impl Server for FakeServer {
        fn port(&self) -> u16 {
            8000
        }

        fn clear_backlog(&mut self) {
            self.cleared += 1;
        }

        fn serve_path(
            &mut self,
            path: &Path,
            continue_cb: &mut dyn FnMut() -> bool,
            _forever: bool,
            _optional_files: &[String],
            _server_map: &mut ServerMap,
        ) -> Result<(ServeStatus, Served), Error> {
            (self.serve)(path, continue_cb)
        }
    }

    struct FakeMonitor {
        healthy: bool,
        launches: u64,
    }

    impl TargetMonitor for FakeMonitor {
        fn is_healthy(&self) -> bool {
            self.healthy
        }

        fn launches(&self) -> u64 {
            self.launches
        }
    }

    struct FakeTarget {
        closed: bool,
        events: Vec<&'static str>,
        failure: FailureResult,
        idle: bool,
        launch_results: VecDeque<Result<(), LaunchFailure>>,
        monitor: FakeMonitor,
        binary: PathBuf,
    }

    impl FakeTarget {
        fn new() -> Self {
            Self {
                closed: true,
                events: Vec::new(),
                failure: FailureResult::None,
                idle: false,
                launch_results: VecDeque::new(),
                monitor: FakeMonitor {
                    healthy: true,
                    launches: 0,
                },
                binary: PathBuf::from("firefox"),
            }
        }
    }

    impl Target for FakeTarget {
        type Monitor = FakeMonitor;

        fn launch(
            &mut self,
            _location: &str,
            _env_mod: Option<&HashMap<String, String>>,
        ) -> Result<(), LaunchFailure> {
            self.events.push("launch");
            self.monitor.launches += 1;
            let result = self.launch_results.pop_front().unwrap_or(Ok(()));
            self.closed = result.is_err();
            result
        }

        fn launch_timeout(&self) -> Duration {
            Duration::from_secs(300)
        }

        fn close(&mut self) {
            self.events.push("close");
            self.closed = true;
        }

        fn closed(&self) -> bool {
            self.closed
        }

        fn step(&mut self) {}

        fn monitor(&self) -> &FakeMonitor {
            &self.monitor
        }

        fn is_idle(&mut self, _threshold: u8) -> bool {
            self.events.push("is_idle");
            self.idle
        }

        fn detect_failure(&mut self, _ignore: &[String], _was_timeout: bool) -> FailureResult {
            self.events.push("detect_failure");
            self.failure
        }

        fn dump_coverage(&mut self) {
            self.events.push("dump_coverage");
        }

        fn save_logs(&mut self, _dest: &Path) -> Result<(), Error> {
            Ok(())
        }

        fn log_size(&self) -> u64 {
            0
        }

        fn check_relaunch(&mut self) {}

        fn prefs(&self) -> Option<&Path> {
            None
        }

        fn forced_close(&self) -> bool {
            true
        }

        fn relaunch_reset_count(&self) -> u32 {
            0
        }

        fn binary(&self) -> &Path {
            &self.binary
        }
    }

    fn testcase() -> TestCase {
        let mut test = TestCase::new("test_page_0000.html", "fuzz");
        test.add_from_data("<html>", "test_page_0000.html", true).unwrap();
        test
    }

    fn with_grz_tmp<R>(f: impl FnOnce(&Path) -> R) -> R {
        let base = tempfile::tempdir().unwrap();
        env::set_var(GRZ_TMP_ENV, base.path());
        let result = f(base.path());
        env::remove_var(GRZ_TMP_ENV);
        result
    }

    #[test]
    fn test_location() {
        assert_eq!(
            build_location("/x", 8080, None, true, None),
            "http://127.0.0.1:8080/x"
        );
        assert_eq!(
            build_location("/x", 8080, Some(5), false, Some(2)),
            "http://127.0.0.1:8080/x?close_after=5&forced_close=0&timeout=2000"
        );
        assert_eq!(
            build_location("grz_harness", 1337, None, true, Some(0)),
            "http://127.0.0.1:1337/grz_harness?timeout=0"
        );
        assert_eq!(
            build_location("/grz_harness", 1337, Some(0), false, None),
            "http://127.0.0.1:1337/grz_harness?close_after=0&forced_close=0"
        );
    }

    #[test]
    fn test_launch_retries() {
        let mut target = FakeTarget::new();
        target
            .launch_results
            .push_back(Err(LaunchFailure::Error { report: None }));
        target.launch_results.push_back(Err(LaunchFailure::Timeout));
        let mut runner = Runner::new(FakeServer::serve_all(), target, 0, Duration::ZERO);
        runner
            .launch("http://127.0.0.1:8000/a", None, 3, Duration::ZERO)
            .unwrap();
        assert_eq!(runner.target().monitor().launches(), 3);
        assert!(!runner.target().closed());
        assert_eq!(runner.server().cleared, 1);
    }

    #[test]
    fn test_launch_exhausts_retries() {
        let mut target = FakeTarget::new();
        for _ in 0..4 {
            target.launch_results.push_back(Err(LaunchFailure::Timeout));
        }
        target
            .launch_results
            .push_back(Err(LaunchFailure::Error { report: None }));
        let mut runner = Runner::new(FakeServer::serve_all(), target, 0, Duration::ZERO);
        let err = runner
            .launch("http://127.0.0.1:8000/a", None, 3, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::LaunchTimeout(..)));
        // the initial attempt plus three retries
        assert_eq!(runner.target().monitor().launches(), 4);

        let err = runner
            .launch("http://127.0.0.1:8000/a", None, 0, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::LaunchError(..)));
        assert_eq!(runner.target().monitor().launches(), 5);
    }

    #[test]
    fn test_launch_cleans_failed_report() {
        let base = tempfile::tempdir().unwrap();
        let report = base.path().join("report");
        fs::create_dir(&report).unwrap();
        let mut target = FakeTarget::new();
        target.launch_results.push_back(Err(LaunchFailure::Error {
            report: Some(report.clone()),
        }));
        let mut runner = Runner::new(FakeServer::serve_all(), target, 0, Duration::ZERO);
        runner.launch("about:blank", None, 1, Duration::ZERO).unwrap();
        assert!(!report.exists());
    }

    #[test]
    #[serial]
    fn test_launch_resets_tests_run() {
        with_grz_tmp(|_| {
            let mut runner =
                Runner::new(FakeServer::serve_all(), FakeTarget::new(), 0, Duration::ZERO);
            runner.launch("about:blank", None, 0, Duration::ZERO).unwrap();
            let mut map = ServerMap::new();
            for expect_initial in [true, false, false] {
                let result = runner
                    .run(&[], &mut map, &mut testcase(), None, false, false)
                    .unwrap();
                assert_eq!(result.initial(), expect_initial);
            }
            assert_eq!(runner.tests_run(), 3);
            runner.launch("about:blank", None, 0, Duration::ZERO).unwrap();
            assert_eq!(runner.tests_run(), 0);
        });
    }

    #[test]
    #[serial]
    fn test_run_removes_scratch_dir() {
        with_grz_tmp(|base| {
            let seen = Rc::new(RefCell::new(None));
            let seen_by_server = Rc::clone(&seen);
            let server = FakeServer::new(move |path, _| {
                assert!(path.join("test_page_0000.html").is_file());
                *seen_by_server.borrow_mut() = Some(path.to_path_buf());
                Ok((
                    ServeStatus::All,
                    [("test_page_0000.html", path.join("test_page_0000.html"))]
                        .into_iter()
                        .collect(),
                ))
            });
            let mut runner = Runner::new(server, FakeTarget::new(), 0, Duration::ZERO);
            let mut map = ServerMap::new();
            let result = runner
                .run(&[], &mut map, &mut testcase(), None, false, false)
                .unwrap();
            assert!(result.attempted());
            assert!(!result.timeout());
            assert_eq!(result.status(), DeliveryStatus::None);
            let scratch = seen.borrow().clone().unwrap();
            assert!(scratch.starts_with(base.join("serve")));
            assert!(!scratch.exists());
        });
    }

    #[test]
    #[serial]
    fn test_run_removes_scratch_dir_on_error() {
        with_grz_tmp(|_| {
            let seen = Rc::new(RefCell::new(None));
            let seen_by_server = Rc::clone(&seen);
            let server = FakeServer::new(move |path, _| {
                *seen_by_server.borrow_mut() = Some(path.to_path_buf());
                Err(Error::unknown("socket closed"))
            });
            let mut runner = Runner::new(server, FakeTarget::new(), 0, Duration::ZERO);
            let mut map = ServerMap::new();
            assert!(runner
                .run(&[], &mut map, &mut testcase(), None, false, false)
                .is_err());
            assert!(!seen.borrow().as_ref().unwrap().exists());
        });
    }

    #[test]
    fn test_run_with_test_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test_page_0000.html"), b"<html>").unwrap();
        let mut runner = Runner::new(FakeServer::serve_all(), FakeTarget::new(), 0, Duration::ZERO);
        let mut map = ServerMap::new();
        let result = runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, false)
            .unwrap();
        assert!(result.attempted());
        // the caller owns test_path
        assert!(dir.path().join("test_page_0000.html").is_file());
    }

    #[test]
    fn test_attempted_tracks_landing_page() {
        let dir = tempfile::tempdir().unwrap();
        let cases: [&[&str]; 4] = [
            &[],
            &["test_page_0000.html"],
            &["other.html"],
            &["a.js", "test_page_0000.html", "b.js"],
        ];
        for served_urls in cases {
            let served: Served = served_urls
                .iter()
                .map(|url| (url.to_string(), dir.path().join(url)))
                .collect();
            let server = FakeServer::new(move |_, _| Ok((ServeStatus::All, served.clone())));
            let mut runner = Runner::new(server, FakeTarget::new(), 0, Duration::ZERO);
            let mut map = ServerMap::new();
            let result = runner
                .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, false)
                .unwrap();
            assert_eq!(
                result.attempted(),
                served_urls.contains(&"test_page_0000.html")
            );
            assert_eq!(result.served().len(), served_urls.len());
        }
    }

    #[test]
    fn test_not_attempted_closes_target() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new(|_, _| Ok((ServeStatus::None, Served::new())));
        let mut target = FakeTarget::new();
        target.closed = false;
        target.failure = FailureResult::Failure;
        let mut runner = Runner::new(server, target, 0, Duration::ZERO);
        let mut map = ServerMap::new();
        let result = runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), true, false)
            .unwrap();
        assert!(!result.attempted());
        assert!(result.initial());
        assert_eq!(result.status(), DeliveryStatus::None);
        assert_eq!(runner.tests_run(), 0);
        assert!(runner.target().closed());
        assert_eq!(runner.target().events, ["detect_failure", "close"]);
    }

    #[test]
    fn test_coverage_before_detect_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test_page_0000.html"), b"<html>").unwrap();
        let mut target = FakeTarget::new();
        target.failure = FailureResult::Ignored;
        let mut runner = Runner::new(FakeServer::serve_all(), target, 0, Duration::ZERO);
        let mut map = ServerMap::new();
        let result = runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), true, false)
            .unwrap();
        assert_eq!(result.status(), DeliveryStatus::Ignored);
        assert_eq!(runner.target().events, ["dump_coverage", "detect_failure"]);
    }

    #[test]
    fn test_no_coverage_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let served: Served = [("test_page_0000.html", dir.path().join("test_page_0000.html"))]
            .into_iter()
            .collect();
        let server = FakeServer::new(move |_, _| Ok((ServeStatus::Timeout, served.clone())));
        let mut target = FakeTarget::new();
        target.failure = FailureResult::Failure;
        let mut runner = Runner::new(server, target, 0, Duration::ZERO);
        let mut map = ServerMap::new();
        let result = runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), true, false)
            .unwrap();
        assert!(result.timeout());
        assert_eq!(result.status(), DeliveryStatus::Failed);
        assert_eq!(runner.target().events, ["detect_failure"]);
    }

    #[test]
    fn test_include_files_added() {
        let www = tempfile::tempdir().unwrap();
        let include = tempfile::tempdir().unwrap();
        fs::write(include.path().join("lib.js"), b"lib").unwrap();
        let served: Served = [
            ("test_page_0000.html", www.path().join("test_page_0000.html")),
            ("inc/lib.js", include.path().join("lib.js")),
        ]
        .into_iter()
        .collect();
        let server = FakeServer::new(move |_, _| Ok((ServeStatus::All, served.clone())));
        let mut runner = Runner::new(server, FakeTarget::new(), 0, Duration::ZERO);
        let mut map = ServerMap::new();
        map.set_include("inc", include.path()).unwrap();
        let mut test = testcase();
        runner
            .run(&[], &mut map, &mut test, Some(www.path()), false, false)
            .unwrap();
        assert!(test.contains("inc/lib.js"));
    }

    #[test]
    fn test_callback_reports_health() {
        let dir = tempfile::tempdir().unwrap();
        let polls = Rc::new(Cell::new(Vec::new()));
        let polls_by_server = Rc::clone(&polls);
        let server = FakeServer::new(move |_, continue_cb| {
            let mut seen = polls_by_server.take();
            seen.push(continue_cb());
            polls_by_server.set(seen);
            Ok((ServeStatus::Request, Served::new()))
        });
        let mut target = FakeTarget::new();
        target.monitor.healthy = false;
        let mut runner = Runner::new(server, target, 0, Duration::ZERO);
        let mut map = ServerMap::new();
        runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, true)
            .unwrap();
        assert_eq!(polls.take(), [false]);
    }

    #[test]
    fn test_callback_idle_check() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new(|_, continue_cb| {
            // still inside the initial grace period
            assert!(continue_cb());
            Ok((ServeStatus::Request, Served::new()))
        });
        let mut target = FakeTarget::new();
        target.idle = true;
        let mut runner = Runner::new(server, target, 30, Duration::from_secs(60));
        let mut map = ServerMap::new();
        runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, true)
            .unwrap();
        assert!(!runner.target().events.contains(&"is_idle"));

        let server = FakeServer::new(|_, continue_cb| {
            assert!(!continue_cb());
            Ok((ServeStatus::Request, Served::new()))
        });
        let mut target = FakeTarget::new();
        target.idle = true;
        let mut runner = Runner::with_idle_poll(
            server,
            target,
            30,
            Duration::from_nanos(1),
            Duration::from_secs(1),
        );
        runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, true)
            .unwrap();
        assert_eq!(runner.target().events[0], "is_idle");
    }

    #[test]
    fn test_close_request() {
        let dir = tempfile::tempdir().unwrap();
        let server = FakeServer::new(|_, continue_cb| {
            assert!(!continue_cb());
            Ok((ServeStatus::Request, Served::new()))
        });
        let mut target = FakeTarget::new();
        target.closed = false;
        let mut runner = Runner::new(server, target, 0, Duration::ZERO);
        runner.close_request().set(true);
        let mut map = ServerMap::new();
        runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, true)
            .unwrap();
        assert_eq!(runner.target().events[0], "close");
        assert!(!runner.close_request().get());
    }

    #[test]
    fn test_close_request_after_last_poll() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test_page_0000.html"), b"<html>").unwrap();
        let close_request = Rc::new(RefCell::new(None::<Rc<Cell<bool>>>));
        let close_by_server = Rc::clone(&close_request);
        // the close page arrives with the last file, the callback is never polled again
        let server = FakeServer::new(move |path, _| {
            if let Some(close) = close_by_server.borrow().as_ref() {
                close.set(true);
            }
            Ok((
                ServeStatus::All,
                [("test_page_0000.html", path.join("test_page_0000.html"))]
                    .into_iter()
                    .collect(),
            ))
        });
        let mut runner = Runner::new(server, FakeTarget::new(), 0, Duration::ZERO);
        runner.launch("about:blank", None, 0, Duration::ZERO).unwrap();
        *close_request.borrow_mut() = Some(runner.close_request());
        let mut map = ServerMap::new();
        let result = runner
            .run(&[], &mut map, &mut testcase(), Some(dir.path()), false, true)
            .unwrap();
        assert!(result.attempted());
        assert_eq!(runner.target().events, ["launch", "close", "detect_failure"]);
        assert!(runner.target().closed());
        assert!(!runner.close_request().get());
    }

    #[test]
    fn test_launch_clears_close_request() {
        let mut runner = Runner::new(FakeServer::serve_all(), FakeTarget::new(), 0, Duration::ZERO);
        runner.close_request().set(true);
        runner.launch("about:blank", None, 0, Duration::ZERO).unwrap();
        assert!(!runner.close_request().get());
        assert!(!runner.target().closed());
    }

    #[test]
    #[should_panic(expected = "idle_delay must be set")]
    fn test_idle_needs_delay() {
        let _ = Runner::new(FakeServer::serve_all(), FakeTarget::new(), 10, Duration::ZERO);
    }
}
