//! Monitoring session orchestration.
//!
//! A session owns every supervised source and the run context:
//!
//! 1. `start` creates the output directory (never reusing one) and opens
//!    the run
//! 2. `start_process` spawns each source's stages and registers them
//! 3. `run` polls every handle round-robin with bounded waits until the
//!    operator cancels or nothing is left running
//! 4. `finish` stops every handle, decodes every capture, stamps the run
//!    columns, writes one CSV per source plus `session.json`, and only then
//!    reports failures
//!
//! Failures of one source never prevent another source from being stopped
//! or persisted.

mod cancel;
mod harvest;

pub use cancel::CancelToken;

use chrono::Utc;
use dm_common::{RunContext, RunId};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ChildStdout, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::decode::{CountingSink, Decoder, DiagnosticSink, Diagnostics};
use crate::log_event;
use crate::logging::{event_names, Stage};
use crate::output::{write_manifest, SessionManifest, SourceEntry, MANIFEST_FILE};
use crate::process::{HandleOptions, ProcessError, ProcessHandle};
use crate::sources::SourceSpec;

/// Subdirectory holding raw capture files.
pub const RAW_DIR: &str = "raw";

/// Shortest wait given to one handle in a poll cycle.
const MIN_WAIT_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("output directory {path} already exists; refusing to overwrite a previous run")]
    OutputDirExists { path: PathBuf },

    #[error("session has not been started")]
    NotStarted,

    #[error("session was already started")]
    AlreadyStarted,

    #[error("failed to start source {source_name}: {error}")]
    Spawn {
        source_name: String,
        #[source]
        error: ProcessError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Run(#[from] dm_common::Error),

    #[error("{} failure(s) across sources: {}", failures.len(), summarize(failures))]
    Aggregate {
        failures: Vec<SourceFailure>,
        report: Box<SessionReport>,
    },
}

/// One stop or harvest failure, attributed to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

fn summarize(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why the poll loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The cancel token was set.
    Cancelled,
    /// Every process exited (or failed) on its own.
    AllExited,
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub output_dir: PathBuf,
    pub manifest: SessionManifest,
    pub manifest_path: Option<PathBuf>,
}

impl SessionReport {
    pub fn total_records(&self) -> usize {
        self.manifest.sources.iter().map(|s| s.records).sum()
    }

    pub fn total_decode_errors(&self) -> usize {
        self.manifest.sources.iter().map(|s| s.decode_errors).sum()
    }
}

/// A registered source: its process stages and its decoder.
struct SourceSlot {
    name: String,
    handles: Vec<ProcessHandle>,
    decoder: Box<dyn Decoder>,
    decode_errors: Arc<CountingSink>,
    failures: Vec<String>,
}

impl SourceSlot {
    /// The capture written by the last stage.
    fn capture_path(&self) -> Option<&Path> {
        self.handles.last().and_then(ProcessHandle::capture_path)
    }
}

pub struct Session {
    output_dir: PathBuf,
    config: MonitorConfig,
    sink: Arc<dyn DiagnosticSink>,
    cancel: CancelToken,
    run: Option<RunContext>,
    sources: Vec<SourceSlot>,
}

impl Session {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        config: MonitorConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Session {
            output_dir: output_dir.into(),
            config,
            sink,
            cancel: CancelToken::new(),
            run: None,
            sources: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.output_dir.join(RAW_DIR)
    }

    pub fn run_context(&self) -> Option<&RunContext> {
        self.run.as_ref()
    }

    /// Token that stops the poll loop when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Create the output directory and open the run.
    ///
    /// Fails with `OutputDirExists` if the directory is already there.
    pub fn start(&mut self) -> Result<&RunContext, SessionError> {
        if self.run.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        if let Some(parent) = self
            .output_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        match std::fs::create_dir(&self.output_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SessionError::OutputDirExists {
                    path: self.output_dir.clone(),
                })
            }
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.output_dir.clone(),
                    source,
                })
            }
        }
        let raw_dir = self.raw_dir();
        std::fs::create_dir(&raw_dir).map_err(|source| SessionError::Io {
            path: raw_dir.clone(),
            source,
        })?;

        let run = RunContext::begin();
        log_event!(
            run.run_id(),
            INFO,
            event_names::SESSION_STARTED,
            Stage::Init,
            "session started",
            output_dir = tracing::field::display(self.output_dir.display())
        );
        Ok(self.run.insert(run))
    }

    /// Spawn every stage of `source` and register it.
    ///
    /// A spawn failure is returned to the caller, and the source stays
    /// registered as degraded so shutdown still covers any stage that did
    /// start.
    pub fn start_process(&mut self, source: SourceSpec) -> Result<(), SessionError> {
        let run_id = self.run_id()?;
        let options = HandleOptions {
            stderr_limit: self.config.stderr_limit_bytes,
            stop_grace: self.config.stop_grace(),
        };
        let decode_errors = Arc::new(CountingSink::new(self.sink.clone()));
        let diagnostics =
            Diagnostics::new(decode_errors.clone()).with_radius(self.config.context_radius);

        let mut slot = SourceSlot {
            name: source.name().to_string(),
            handles: Vec::with_capacity(source.stages().len()),
            decoder: source.decoder().build(source.name(), diagnostics),
            decode_errors,
            failures: Vec::new(),
        };

        let raw_dir = self.raw_dir();
        let mut upstream: Option<ChildStdout> = None;
        let mut spawn_error = None;
        for spec in source.stages() {
            let mut handle = ProcessHandle::new(spec.clone(), options);
            let stdin = upstream.take().map(Stdio::from).unwrap_or_else(Stdio::null);
            let started = handle.start_with_stdin(&raw_dir, stdin);
            upstream = handle.take_stdout();
            slot.handles.push(handle);
            if let Err(err) = started {
                slot.failures.push(err.to_string());
                spawn_error = Some(err);
                break;
            }
        }
        self.sources.push(slot);

        match spawn_error {
            None => Ok(()),
            Some(error) => {
                log_event!(
                    run_id,
                    ERROR,
                    event_names::PROCESS_FAILED,
                    Stage::Supervise,
                    "source failed to start",
                    source_name = source.name(),
                    error = tracing::field::display(&error)
                );
                Err(SessionError::Spawn {
                    source_name: source.name().to_string(),
                    error,
                })
            }
        }
    }

    /// Poll every running handle until cancelled or nothing is left running.
    ///
    /// Each cycle gives every running handle a slice of the poll timeout, so
    /// one full cycle takes about `poll_timeout_ms`. A process that fails
    /// marks its source degraded; supervision of the others continues.
    pub fn run(&mut self) -> Result<RunOutcome, SessionError> {
        let run_id = self.run_id()?;
        let poll_timeout = self.config.poll_timeout();

        loop {
            if self.cancel.is_cancelled() {
                log_event!(
                    run_id,
                    INFO,
                    event_names::SESSION_CANCELLED,
                    Stage::Supervise,
                    "stop requested"
                );
                return Ok(RunOutcome::Cancelled);
            }

            let running = self
                .sources
                .iter()
                .flat_map(|s| s.handles.iter())
                .filter(|h| h.is_running())
                .count();
            if running == 0 {
                info!(run_id = %run_id, stage = %Stage::Supervise, "no source is running");
                return Ok(RunOutcome::AllExited);
            }
            let slice = (poll_timeout / running as u32).max(MIN_WAIT_SLICE);

            for slot in &mut self.sources {
                for handle in &mut slot.handles {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    if !handle.is_running() {
                        continue;
                    }
                    if let Err(err) = handle.wait(slice) {
                        warn!(source = %slot.name, error = %err, "source degraded");
                        slot.failures.push(err.to_string());
                    }
                }
            }
        }
    }

    /// Stop every source, then harvest and persist every capture.
    ///
    /// Every handle is stopped in registration order and every source is
    /// harvested even when earlier ones failed. Failures are reported as
    /// one `Aggregate` error after all tables and the manifest are written.
    pub fn finish(mut self) -> Result<SessionReport, SessionError> {
        let mut run = self.run.take().ok_or(SessionError::NotStarted)?;
        run.close(Utc::now())?;
        let run_id = run.run_id().clone();

        info!(
            run_id = %run_id,
            stage = %Stage::Shutdown,
            sources = self.sources.len(),
            "stopping sources"
        );
        for slot in &mut self.sources {
            for handle in &mut slot.handles {
                match handle.stop() {
                    Ok(outcome) if outcome.escalated => {
                        slot.failures.push(format!(
                            "{} ignored SIGTERM and was killed after {} ms",
                            handle.name(),
                            self.config.stop_grace_ms
                        ));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(source = %slot.name, error = %err, "failed to stop process");
                        slot.failures.push(err.to_string());
                    }
                }
            }
        }

        let entries = self.harvest_all(&run);

        let manifest = SessionManifest {
            run_id: run_id.to_string(),
            started_at: run.started_at(),
            ended_at: run.ended_at(),
            sources: entries,
        };
        let mut failures: Vec<SourceFailure> = manifest
            .sources
            .iter()
            .flat_map(|entry| {
                entry.failures.iter().map(|message| SourceFailure {
                    source: entry.name.clone(),
                    message: message.clone(),
                })
            })
            .collect();

        let manifest_path = match write_manifest(&self.output_dir, &manifest) {
            Ok(path) => Some(path),
            Err(err) => {
                error!(error = %err, "failed to write session manifest");
                failures.push(SourceFailure {
                    source: MANIFEST_FILE.to_string(),
                    message: err.to_string(),
                });
                None
            }
        };

        let report = SessionReport {
            output_dir: self.output_dir.clone(),
            manifest,
            manifest_path,
        };
        log_event!(
            run_id,
            INFO,
            event_names::SESSION_FINISHED,
            Stage::Harvest,
            "session finished",
            records = report.total_records(),
            decode_errors = report.total_decode_errors(),
            failures = failures.len()
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(SessionError::Aggregate {
                failures,
                report: Box::new(report),
            })
        }
    }

    fn harvest_all(&self, run: &RunContext) -> Vec<SourceEntry> {
        let output_dir = self.output_dir.as_path();
        if !self.config.parallel_harvest {
            return self
                .sources
                .iter()
                .map(|slot| harvest::harvest(slot, run, output_dir))
                .collect();
        }

        thread::scope(|s| {
            let workers: Vec<_> = self
                .sources
                .iter()
                .map(|slot| s.spawn(move || harvest::harvest(slot, run, output_dir)))
                .collect();
            workers
                .into_iter()
                .zip(&self.sources)
                .map(|(worker, slot)| {
                    worker.join().unwrap_or_else(|_| {
                        error!(source = %slot.name, "harvest thread panicked");
                        harvest::failed(slot, "harvest thread panicked")
                    })
                })
                .collect()
        })
    }

    fn run_id(&self) -> Result<RunId, SessionError> {
        self.run
            .as_ref()
            .map(|run| run.run_id().clone())
            .ok_or(SessionError::NotStarted)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("output_dir", &self.output_dir)
            .field("run", &self.run)
            .field("sources", &self.source_names())
            .finish_non_exhaustive()
    }
}
