//! Stable event names and stages for lifecycle logging.
//!
//! Every lifecycle log line carries `event = <name>` and `stage = <stage>`
//! fields so JSONL output can be filtered without parsing messages.

use serde::{Deserialize, Serialize};

/// Phases of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Output directory and run context setup.
    Init,
    /// Spawning and polling monitored processes.
    Supervise,
    /// Stopping every monitored process.
    Shutdown,
    /// Decoding captures and persisting tables.
    Harvest,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Supervise => "supervise",
            Stage::Shutdown => "shutdown",
            Stage::Harvest => "harvest",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const SESSION_STARTED: &str = "session.started";
    pub const SESSION_CANCELLED: &str = "session.cancelled";
    pub const SESSION_FINISHED: &str = "session.finished";

    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_ALIVE: &str = "process.alive";
    pub const PROCESS_EXITED: &str = "process.exited";
    pub const PROCESS_FAILED: &str = "process.failed";
    pub const PROCESS_STOPPED: &str = "process.stopped";
    pub const PROCESS_KILLED: &str = "process.killed";

    pub const DECODE_ERROR: &str = "decode.error";
    pub const DECODE_FINISHED: &str = "decode.finished";

    pub const HARVEST_TABLE_WRITTEN: &str = "harvest.table_written";
    pub const HARVEST_FAILED: &str = "harvest.failed";
}
