//! Persistence of harvested tables and the session manifest.

mod manifest;
mod table;

pub use manifest::{write_manifest, SessionManifest, SourceEntry, SourceStatus, MANIFEST_FILE};
pub use table::{table_path, write_table};

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize JSON for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Write pretty JSON through a temp file and rename.
fn write_json_pretty_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let content = serde_json::to_vec_pretty(value).map_err(|e| OutputError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(MANIFEST_FILE);
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        use std::io::Write;
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| OutputError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        file.write_all(&content).map_err(|e| OutputError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
