//! One supervised OS process.
//!
//! A [`ProcessHandle`] owns exactly one child process from `start` until it
//! has been reaped:
//!
//! - `start` spawns without blocking; stdout goes to a capture file (or a
//!   pipe for the next pipeline stage), stderr into a bounded tail buffer
//! - `wait(timeout)` polls for at most `timeout`; a live process is not an
//!   error, a non-zero exit is
//! - `stop` sends SIGTERM, waits out a grace period, then SIGKILLs
//!
//! Dropping a handle whose process is still running kills and reaps it.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use super::spec::{Capture, ProcessSpec};
use super::stderr::StderrTail;
use crate::config::{DEFAULT_STDERR_LIMIT_BYTES, DEFAULT_STOP_GRACE_MS};
use crate::logging::event_names;

/// Interval between `try_wait` probes inside a bounded wait.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

const TRUNCATED_MARKER: &str = "...(truncated) ";

/// Lifecycle of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessState::NotStarted => "not_started",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
            ProcessState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a bounded wait that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The process is still running after the timeout.
    Alive,
    /// The process has exited successfully (or was already reaped).
    Exited,
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// Exit status of the reaped process, if it was ever started.
    pub status: Option<ExitStatus>,
    /// Whether SIGKILL was needed after the grace period.
    pub escalated: bool,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {name}: {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} has an empty command line")]
    EmptyCommand { name: String },

    #[error("failed to create capture file {path}: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} (pid {pid}) failed with {}: {stderr}", describe_exit(*code))]
    ProcessFailed {
        name: String,
        pid: u32,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{name} has not been started")]
    NotStarted { name: String },

    #[error("{name} was already started")]
    AlreadyStarted { name: String },

    #[error("I/O error supervising {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Per-handle supervision settings.
#[derive(Debug, Clone, Copy)]
pub struct HandleOptions {
    pub stderr_limit: usize,
    pub stop_grace: Duration,
}

impl Default for HandleOptions {
    fn default() -> Self {
        HandleOptions {
            stderr_limit: DEFAULT_STDERR_LIMIT_BYTES,
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
        }
    }
}

/// Owner of one spawned external process.
#[derive(Debug)]
pub struct ProcessHandle {
    spec: ProcessSpec,
    options: HandleOptions,
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
    capture_path: Option<PathBuf>,
    stdout_pipe: Option<ChildStdout>,
    stderr_pipe: Option<ChildStderr>,
    stderr: StderrTail,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    pub fn new(spec: ProcessSpec, options: HandleOptions) -> Self {
        ProcessHandle {
            stderr: StderrTail::new(options.stderr_limit),
            spec,
            options,
            state: ProcessState::NotStarted,
            child: None,
            pid: None,
            capture_path: None,
            stdout_pipe: None,
            stderr_pipe: None,
            exit: None,
        }
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn capture_path(&self) -> Option<&Path> {
        self.capture_path.as_deref()
    }

    /// Whether the OS process may still be alive.
    pub fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running | ProcessState::Stopping)
    }

    /// Retained stderr (most recent bytes up to the configured limit),
    /// prefixed with a marker when older output was dropped.
    pub fn stderr_tail(&self) -> String {
        if self.stderr.truncated() {
            format!("{}{}", TRUNCATED_MARKER, self.stderr.contents())
        } else {
            self.stderr.contents()
        }
    }

    /// Spawn the process with stdin closed.
    pub fn start(&mut self, output_dir: &Path) -> Result<(), ProcessError> {
        self.start_with_stdin(output_dir, Stdio::null())
    }

    /// Spawn the process reading `stdin` (the previous pipeline stage).
    ///
    /// Returns once the OS process exists; never waits for output.
    pub fn start_with_stdin(&mut self, output_dir: &Path, stdin: Stdio) -> Result<(), ProcessError> {
        if self.state != ProcessState::NotStarted {
            return Err(ProcessError::AlreadyStarted {
                name: self.name().to_string(),
            });
        }
        let program = self
            .spec
            .program()
            .ok_or_else(|| ProcessError::EmptyCommand {
                name: self.name().to_string(),
            })?
            .to_string();

        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f").to_string();
        let capture_path = match self.spec.capture() {
            Capture::Pipe => None,
            Capture::Stdout | Capture::OutputFlag(_) => {
                Some(output_dir.join(self.spec.capture_file_name(&stamp)))
            }
        };

        let stdout = match (self.spec.capture(), capture_path.as_ref()) {
            (Capture::Stdout, Some(path)) => {
                let file = File::create(path).map_err(|source| ProcessError::Capture {
                    path: path.clone(),
                    source,
                })?;
                Stdio::from(file)
            }
            (Capture::Pipe, _) => Stdio::piped(),
            _ => Stdio::null(),
        };

        let mut command = Command::new(&program);
        command
            .args(self.spec.effective_args(capture_path.as_deref()))
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped());
        if let Some(cwd) = self.spec.cwd() {
            command.current_dir(cwd);
        }
        for (key, value) in self.spec.env() {
            command.env(key, value);
        }

        debug!(
            name = %self.name(),
            argv = ?self.spec.argv(),
            capture = ?capture_path,
            "spawning process"
        );

        let mut child = command.spawn().map_err(|source| {
            error!(name = %self.spec.name(), error = %source, "failed to spawn");
            self.state = ProcessState::Failed;
            ProcessError::SpawnFailed {
                name: self.spec.name().to_string(),
                source,
            }
        })?;

        let pid = child.id();
        self.stderr_pipe = child.stderr.take();
        self.stdout_pipe = child.stdout.take();
        #[cfg(unix)]
        if let Some(ref pipe) = self.stderr_pipe {
            if let Err(e) = super::stderr::set_nonblocking(pipe) {
                warn!(pid, error = %e, "stderr pipe left blocking; draining only after exit");
            }
        }

        self.child = Some(child);
        self.pid = Some(pid);
        self.capture_path = capture_path;
        self.state = ProcessState::Running;

        info!(
            event = event_names::PROCESS_STARTED,
            name = %self.name(),
            pid,
            capture = ?self.capture_path,
            "started process"
        );
        Ok(())
    }

    /// Hand the stdout pipe to the next pipeline stage.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout_pipe.take()
    }

    /// Poll the process for at most `timeout`.
    ///
    /// Returns `Ok(Alive)` if it is still running when the timeout expires.
    /// A non-zero exit yields `ProcessFailed` carrying the stderr tail; it is
    /// reported once, after which the handle is `Failed` and further waits
    /// return `Ok(Exited)`.
    pub fn wait(&mut self, timeout: Duration) -> Result<WaitStatus, ProcessError> {
        match self.state {
            ProcessState::NotStarted => {
                return Err(ProcessError::NotStarted {
                    name: self.name().to_string(),
                })
            }
            ProcessState::Stopped | ProcessState::Failed => return Ok(WaitStatus::Exited),
            ProcessState::Running | ProcessState::Stopping => {}
        }

        let deadline = Instant::now() + timeout;
        let pid = self.pid.unwrap_or_default();
        trace!(pid, name = %self.name(), "checking process");

        loop {
            self.drain_stderr(false);

            let polled = match self.child.as_mut() {
                Some(child) => child.try_wait(),
                None => return Ok(WaitStatus::Exited),
            };
            match polled {
                Ok(Some(status)) => return self.on_exit(status),
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        trace!(
                            event = event_names::PROCESS_ALIVE,
                            pid,
                            "process still running"
                        );
                        return Ok(WaitStatus::Alive);
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(source) => {
                    error!(pid, error = %source, "failed to wait for child");
                    return Err(ProcessError::Io {
                        name: self.name().to_string(),
                        source,
                    });
                }
            }
        }
    }

    fn on_exit(&mut self, status: ExitStatus) -> Result<WaitStatus, ProcessError> {
        self.drain_stderr(true);
        self.exit = Some(status);
        self.child = None;
        let pid = self.pid.unwrap_or_default();

        if status.success() {
            self.state = ProcessState::Stopped;
            info!(
                event = event_names::PROCESS_EXITED,
                name = %self.name(),
                pid,
                "process exited"
            );
            return Ok(WaitStatus::Exited);
        }

        self.state = ProcessState::Failed;
        let stderr = self.stderr_tail();
        error!(
            event = event_names::PROCESS_FAILED,
            name = %self.name(),
            pid,
            code = ?status.code(),
            stderr = %crate::logging::truncate_for_log(stderr.trim(), 512),
            "process failed"
        );
        Err(ProcessError::ProcessFailed {
            name: self.name().to_string(),
            pid,
            code: status.code(),
            stderr,
        })
    }

    /// Terminate the process: SIGTERM, bounded grace, then SIGKILL.
    ///
    /// Blocks until the process has been reaped. Exit caused by the stop
    /// request itself is not a failure; a non-zero exit that happened before
    /// the request is reported as `ProcessFailed`.
    pub fn stop(&mut self) -> Result<StopOutcome, ProcessError> {
        match self.state {
            ProcessState::NotStarted => {
                return Ok(StopOutcome {
                    status: None,
                    escalated: false,
                })
            }
            ProcessState::Stopped | ProcessState::Failed => {
                return Ok(StopOutcome {
                    status: self.exit,
                    escalated: false,
                })
            }
            ProcessState::Running | ProcessState::Stopping => {}
        }

        // A process that already exited on its own is judged by its status.
        if self.wait(Duration::ZERO)? == WaitStatus::Exited {
            return Ok(StopOutcome {
                status: self.exit,
                escalated: false,
            });
        }

        let Some(mut child) = self.child.take() else {
            self.state = ProcessState::Stopped;
            return Ok(StopOutcome {
                status: self.exit,
                escalated: false,
            });
        };
        let pid = child.id();
        self.state = ProcessState::Stopping;
        info!(name = %self.name(), pid, "stopping process");

        let result = terminate_with_grace(&mut child, self.options.stop_grace);
        self.drain_stderr(true);
        // Dropping stdout closes the pipe for a downstream stage.
        self.stdout_pipe = None;

        match result {
            Ok((status, escalated)) => {
                self.exit = Some(status);
                self.state = ProcessState::Stopped;
                if escalated {
                    warn!(
                        event = event_names::PROCESS_KILLED,
                        name = %self.name(),
                        pid,
                        "process ignored SIGTERM and was killed"
                    );
                }
                debug!(
                    event = event_names::PROCESS_STOPPED,
                    name = %self.name(),
                    pid,
                    code = ?status.code(),
                    "finished stopping process"
                );
                Ok(StopOutcome {
                    status: Some(status),
                    escalated,
                })
            }
            Err(source) => {
                self.state = ProcessState::Failed;
                error!(name = %self.name(), pid, error = %source, "failed to stop process");
                Err(ProcessError::Io {
                    name: self.name().to_string(),
                    source,
                })
            }
        }
    }

    fn drain_stderr(&mut self, final_read: bool) {
        let Some(pipe) = self.stderr_pipe.as_mut() else {
            return;
        };
        #[cfg(not(unix))]
        if !final_read {
            return;
        }
        match self.stderr.drain_from(pipe) {
            Ok(true) => self.stderr_pipe = None,
            Ok(false) => {}
            Err(e) => {
                if final_read {
                    debug!(name = %self.spec.name(), error = %e, "stderr read failed");
                }
                self.stderr_pipe = None;
            }
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                warn!(pid = child.id(), name = %self.spec.name(), "killing orphaned process on drop");
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Send SIGTERM, wait up to `grace`, then SIGKILL. Returns the reaped status
/// and whether escalation was needed.
#[cfg(unix)]
fn terminate_with_grace(child: &mut Child, grace: Duration) -> std::io::Result<(ExitStatus, bool)> {
    if let Some(status) = child.try_wait()? {
        return Ok((status, false));
    }

    let pid = child.id() as libc::pid_t;
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    debug!(pid, "sent SIGTERM");

    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            trace!(pid, "process exited after SIGTERM");
            return Ok((status, false));
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }

    child.kill()?;
    let status = child.wait()?;
    Ok((status, true))
}

#[cfg(not(unix))]
fn terminate_with_grace(child: &mut Child, _grace: Duration) -> std::io::Result<(ExitStatus, bool)> {
    if let Some(status) = child.try_wait()? {
        return Ok((status, false));
    }
    child.kill()?;
    Ok((child.wait()?, true))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn options() -> HandleOptions {
        HandleOptions {
            stderr_limit: 1024,
            stop_grace: Duration::from_millis(300),
        }
    }

    fn sh(name: &str, script: &str) -> ProcessHandle {
        ProcessHandle::new(ProcessSpec::new(name, ["sh", "-c", script]), options())
    }

    #[test]
    fn test_start_writes_capture_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("echo", "echo hello");
        handle.start(dir.path()).unwrap();
        assert_eq!(handle.state(), ProcessState::Running);
        assert!(handle.pid().is_some());

        let mut status = WaitStatus::Alive;
        for _ in 0..100 {
            status = handle.wait(Duration::from_millis(50)).unwrap();
            if status == WaitStatus::Exited {
                break;
            }
        }
        assert_eq!(status, WaitStatus::Exited);
        assert_eq!(handle.state(), ProcessState::Stopped);

        let path = handle.capture_path().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().ends_with("-echo.log"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
    }

    #[test]
    fn test_wait_on_live_process_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("sleeper", "sleep 30");
        handle.start(dir.path()).unwrap();

        let started = Instant::now();
        let status = handle.wait(Duration::from_millis(100)).unwrap();
        assert_eq!(status, WaitStatus::Alive);
        assert!(started.elapsed() < Duration::from_secs(2));

        handle.stop().unwrap();
        assert_eq!(handle.state(), ProcessState::Stopped);
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("failing", "echo 'no permission' >&2; exit 3");
        handle.start(dir.path()).unwrap();

        let mut outcome = Ok(WaitStatus::Alive);
        for _ in 0..100 {
            outcome = handle.wait(Duration::from_millis(50));
            if !matches!(outcome, Ok(WaitStatus::Alive)) {
                break;
            }
        }
        match outcome {
            Err(ProcessError::ProcessFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("no permission"));
            }
            other => panic!("expected ProcessFailed, got {:?}", other),
        }
        assert_eq!(handle.state(), ProcessState::Failed);
        // reported once
        assert_eq!(
            handle.wait(Duration::from_millis(10)).unwrap(),
            WaitStatus::Exited
        );
    }

    #[test]
    fn test_exit_before_stop_is_still_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("crashed", "echo boom >&2; exit 7");
        handle.start(dir.path()).unwrap();
        // exits while nobody is polling
        thread::sleep(Duration::from_millis(300));

        match handle.stop() {
            Err(ProcessError::ProcessFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(7));
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected ProcessFailed, got {:?}", other),
        }
        assert_eq!(handle.state(), ProcessState::Failed);
    }

    #[test]
    fn test_clean_exit_before_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("finished", "true");
        handle.start(dir.path()).unwrap();
        thread::sleep(Duration::from_millis(300));

        let outcome = handle.stop().unwrap();
        assert!(!outcome.escalated);
        assert_eq!(outcome.status.and_then(|s| s.code()), Some(0));
        assert_eq!(handle.state(), ProcessState::Stopped);
    }

    #[test]
    fn test_truncated_stderr_is_marked() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new(
            "chatty",
            ["sh", "-c", "i=0; while [ $i -lt 50 ]; do echo line-$i >&2; i=$((i+1)); done; exit 2"],
        );
        let mut handle = ProcessHandle::new(
            spec,
            HandleOptions {
                stderr_limit: 32,
                stop_grace: Duration::from_millis(300),
            },
        );
        handle.start(dir.path()).unwrap();

        let mut outcome = Ok(WaitStatus::Alive);
        for _ in 0..100 {
            outcome = handle.wait(Duration::from_millis(50));
            if !matches!(outcome, Ok(WaitStatus::Alive)) {
                break;
            }
        }
        match outcome {
            Err(ProcessError::ProcessFailed { stderr, .. }) => {
                assert!(stderr.starts_with("...(truncated) "));
                assert!(stderr.ends_with("line-49\n"));
            }
            other => panic!("expected ProcessFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_short_stderr_is_not_marked() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("quiet", "echo short >&2; exit 1");
        handle.start(dir.path()).unwrap();
        thread::sleep(Duration::from_millis(300));
        let _ = handle.stop();
        assert_eq!(handle.stderr_tail(), "short\n");
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::new(
            ProcessSpec::new("missing", ["/nonexistent/diagmon-tool"]),
            options(),
        );
        let err = handle.start(dir.path()).unwrap_err();
        assert!(matches!(err, ProcessError::SpawnFailed { .. }));
        assert_eq!(handle.state(), ProcessState::Failed);
    }

    #[test]
    fn test_wait_before_start() {
        let mut handle = sh("idle", "true");
        let err = handle.wait(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, ProcessError::NotStarted { .. }));
    }

    #[test]
    fn test_start_twice_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("twice", "sleep 5");
        handle.start(dir.path()).unwrap();
        let err = handle.start(dir.path()).unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyStarted { .. }));
        handle.stop().unwrap();
    }

    #[test]
    fn test_stop_escalates_when_sigterm_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("stubborn", "trap '' TERM; while true; do sleep 0.05; done");
        handle.start(dir.path()).unwrap();
        // give the shell time to install the trap
        let _ = handle.wait(Duration::from_millis(200));

        let started = Instant::now();
        let outcome = handle.stop().unwrap();
        assert!(outcome.escalated);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(handle.state(), ProcessState::Stopped);
        assert!(!handle.is_running());
    }

    #[test]
    fn test_stop_graceful() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("graceful", "sleep 30");
        handle.start(dir.path()).unwrap();
        let outcome = handle.stop().unwrap();
        assert!(!outcome.escalated);
        assert!(outcome.status.is_some());
        // stopping again is a no-op
        let again = handle.stop().unwrap();
        assert_eq!(again.status, outcome.status);
    }

    #[test]
    fn test_output_flag_capture() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.sh");
        std::fs::write(&script, "#!/bin/sh\n[ \"$1\" = \"-o\" ] && echo traced > \"$2\"\n").unwrap();
        let spec = ProcessSpec::new("flagged", ["sh".to_string(), script.display().to_string()])
            .with_capture(Capture::OutputFlag("-o".to_string()));
        let mut handle = ProcessHandle::new(spec, options());
        handle.start(dir.path()).unwrap();
        for _ in 0..100 {
            if handle.wait(Duration::from_millis(50)).unwrap() == WaitStatus::Exited {
                break;
            }
        }
        let path = handle.capture_path().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "traced\n");
    }

    #[test]
    fn test_env_and_cwd_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("env", ["sh", "-c", "echo \"$S_TIME_FORMAT\"; pwd"])
            .with_env("S_TIME_FORMAT", "ISO")
            .with_cwd(dir.path());
        let mut handle = ProcessHandle::new(spec, options());
        handle.start(dir.path()).unwrap();
        for _ in 0..100 {
            if handle.wait(Duration::from_millis(50)).unwrap() == WaitStatus::Exited {
                break;
            }
        }
        let out = std::fs::read_to_string(handle.capture_path().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("ISO"));
        let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_drop_kills_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = sh("dropped", "sleep 30");
        handle.start(dir.path()).unwrap();
        let pid = handle.pid().unwrap() as libc::pid_t;
        drop(handle);
        // reaped: signal 0 reports no such process
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive);
    }
}
