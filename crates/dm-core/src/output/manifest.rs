//! `session.json`: what a run produced and what went wrong.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{write_json_pretty_atomic, OutputError};

pub const MANIFEST_FILE: &str = "session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    /// The source failed to spawn, exited non-zero, failed to stop, or
    /// could not be harvested. Its table may still have been written.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub status: SourceStatus,
    pub capture_path: Option<PathBuf>,
    pub table_path: Option<PathBuf>,
    pub records: usize,
    pub decode_errors: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub sources: Vec<SourceEntry>,
}

impl SessionManifest {
    pub fn degraded_sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.sources
            .iter()
            .filter(|s| s.status == SourceStatus::Degraded)
    }
}

/// Write the manifest to `<dir>/session.json`.
pub fn write_manifest(dir: &Path, manifest: &SessionManifest) -> Result<PathBuf, OutputError> {
    let path = dir.join(MANIFEST_FILE);
    write_json_pretty_atomic(&path, manifest)?;
    Ok(path)
}
