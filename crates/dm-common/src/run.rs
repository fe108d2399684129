//! Run context shared by every record of a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::id::RunId;
use crate::record::{Record, Value};

/// Column carrying the run id on every persisted row.
pub const RUN_ID_FIELD: &str = "run_id";
/// Column carrying the session start on every persisted row.
pub const RUN_START_FIELD: &str = "session_start";
/// Column carrying the session end on every persisted row.
pub const RUN_END_FIELD: &str = "session_end";

/// Identity and time bounds of one monitoring session.
///
/// The run id and start are fixed at creation. The end is recorded exactly
/// once, when the session shuts down; after that the context is immutable
/// and is stamped verbatim onto every record the session produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    run_id: RunId,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunContext {
    /// Open a new run starting now.
    pub fn begin() -> Self {
        Self::with_start(RunId::new(), Utc::now())
    }

    pub fn with_start(run_id: RunId, started_at: DateTime<Utc>) -> Self {
        RunContext {
            run_id,
            started_at,
            ended_at: None,
        }
    }

    /// Record the end of the run. Fails if the run was already closed.
    pub fn close(&mut self, ended_at: DateTime<Utc>) -> Result<(), Error> {
        if self.ended_at.is_some() {
            return Err(Error::RunAlreadyClosed {
                run_id: self.run_id.to_string(),
            });
        }
        self.ended_at = Some(ended_at);
        Ok(())
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Attach run id, start, and end to a record.
    pub fn stamp(&self, record: &mut Record) {
        record.set(RUN_ID_FIELD, self.run_id.as_str());
        record.set(RUN_START_FIELD, Value::Timestamp(self.started_at.naive_utc()));
        record.set(
            RUN_END_FIELD,
            self.ended_at
                .map(|ts| Value::Timestamp(ts.naive_utc()))
                .unwrap_or(Value::Null),
        );
    }
}
