//! diagmon - diagnostic sampler supervisor
//!
//! Starts the standard samplers, supervises them until Ctrl-C (or until
//! they all exit), then decodes every capture into one CSV per source.

use chrono::Local;
use clap::Parser;
use dm_core::config::MonitorConfig;
use dm_core::decode::{DiagnosticSink, TracingSink};
use dm_core::exit_codes::ExitCode;
use dm_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use dm_core::session::{Session, SessionError};
use dm_core::sources::{self, SourceSelection};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Supervise diagnostic samplers and tabulate their output
#[derive(Parser, Debug)]
#[command(name = "diagmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output directory for this run (must not exist)
    #[arg(long, short = 'o', env = "DIAGMON_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Also sample per-process network bandwidth (nethogs, needs root)
    #[arg(long)]
    include_network: bool,

    /// Trace the system calls of this process id (strace)
    #[arg(long, short = 'p')]
    pid: Option<u32>,

    /// Also sample NVIDIA GPU device and process statistics
    #[arg(long)]
    nvidia_gpu: bool,

    /// Path to a TOML tuning file
    #[arg(long, env = "DIAGMON_CONFIG")]
    config: Option<PathBuf>,

    /// Override the poll loop timeout (milliseconds)
    #[arg(long)]
    poll_timeout_ms: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Log format: human or jsonl
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(log_level, cli.log_format));

    let code = run(&cli);
    if code.is_error() {
        debug!(code = code.as_i32(), name = code.code_name(), "exiting");
    }
    code.into()
}

fn run(cli: &Cli) -> ExitCode {
    let mut config = match MonitorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::ArgsError;
        }
    };
    if let Some(ms) = cli.poll_timeout_ms {
        config.poll_timeout_ms = ms;
    }
    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::ArgsError;
    }

    let output_dir = cli.output_dir.clone().unwrap_or_else(default_output_dir);
    let selection = SourceSelection {
        include_network: cli.include_network,
        trace_pid: cli.pid,
        nvidia_gpu: cli.nvidia_gpu,
    };
    let max_samples = config.max_samples;

    let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
    let mut session = Session::new(output_dir, config, sink);
    if let Err(err) = session.start() {
        error!(error = %err, "failed to start session");
        return session_exit_code(&err);
    }

    let cancel = session.cancel_token();
    if let Err(err) = ctrlc::set_handler(move || cancel.cancel()) {
        error!(error = %err, "failed to install signal handler");
        return ExitCode::InternalError;
    }

    for source in sources::standard(&selection, max_samples) {
        match session.start_process(source) {
            Ok(()) => {}
            // The source stays registered as degraded; keep the others going.
            Err(SessionError::Spawn { source_name, error }) => {
                warn!(source = %source_name, error = %error, "source unavailable");
            }
            Err(err) => {
                error!(error = %err, "failed to register source");
                return session_exit_code(&err);
            }
        }
    }

    info!(
        output_dir = %session.output_dir().display(),
        sources = ?session.source_names(),
        "supervising; press Ctrl-C to stop"
    );
    if let Err(err) = session.run() {
        error!(error = %err, "poll loop failed");
        return session_exit_code(&err);
    }

    match session.finish() {
        Ok(report) => {
            info!(
                records = report.total_records(),
                decode_errors = report.total_decode_errors(),
                "run complete"
            );
            println!("{}", report.output_dir.display());
            ExitCode::Clean
        }
        Err(SessionError::Aggregate { failures, report }) => {
            for failure in &failures {
                warn!(source = %failure.source, "{}", failure.message);
            }
            let degraded: Vec<&str> = report
                .manifest
                .degraded_sources()
                .map(|entry| entry.name.as_str())
                .collect();
            warn!(sources = ?degraded, "run degraded");
            println!("{}", report.output_dir.display());
            ExitCode::Degraded
        }
        Err(err) => {
            error!(error = %err, "shutdown failed");
            session_exit_code(&err)
        }
    }
}

fn session_exit_code(err: &SessionError) -> ExitCode {
    match err {
        SessionError::OutputDirExists { .. }
        | SessionError::NotStarted
        | SessionError::AlreadyStarted => ExitCode::SessionError,
        SessionError::Io { .. } => ExitCode::IoError,
        SessionError::Spawn { .. } | SessionError::Aggregate { .. } => ExitCode::Degraded,
        SessionError::Run(_) => ExitCode::InternalError,
    }
}

/// `./diagmon-<local timestamp>`
fn default_output_dir() -> PathBuf {
    PathBuf::from(format!("diagmon-{}", Local::now().format("%Y%m%dT%H%M%S")))
}
