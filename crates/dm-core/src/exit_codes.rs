//! Exit codes for the diagmon CLI.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes (the run completed and tables were written)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

/// Exit codes for diagmon runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every source was supervised, stopped, and harvested cleanly.
    /// An operator stop (Ctrl-C) is the normal end of a run and lands here.
    Clean = 0,

    /// At least one source failed (spawn, non-zero exit, stop, or harvest);
    /// every other source's table was still written.
    Degraded = 3,

    /// Invalid arguments or configuration.
    ArgsError = 10,

    /// Output directory already exists or session setup failed.
    SessionError = 15,

    /// Internal error (bug).
    InternalError = 20,

    /// I/O error outside any single source.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Anything but a clean run.
    pub fn is_error(self) -> bool {
        self != ExitCode::Clean
    }

    /// Stable code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Degraded => "ERR_DEGRADED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::SessionError => "ERR_SESSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
