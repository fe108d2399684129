//! Post-stop harvest: decode one source's capture and persist its table.

use dm_common::{RunContext, Table};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::SourceSlot;
use crate::decode::RawCapture;
use crate::logging::event_names;
use crate::output::{write_table, OutputError, SourceEntry, SourceStatus};

#[derive(Debug, Error)]
enum HarvestError {
    #[error("no capture file was produced")]
    NoCapture,

    #[error("failed to read capture {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Table(#[from] dm_common::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Decode, stamp, and write one source. Never fails; problems land in the
/// entry's `failures`.
pub(super) fn harvest(slot: &SourceSlot, run: &RunContext, output_dir: &Path) -> SourceEntry {
    let mut failures = slot.failures.clone();
    let capture_path = slot.capture_path().map(Path::to_path_buf);
    let mut table_path = None;
    let mut records = 0;

    match harvest_capture(slot, run, output_dir, capture_path.as_deref()) {
        Ok((path, count)) => {
            table_path = Some(path);
            records = count;
        }
        // A source that never started has already said why.
        Err(HarvestError::NoCapture) if !failures.is_empty() => {}
        Err(err) => {
            warn!(
                event = event_names::HARVEST_FAILED,
                source = %slot.name,
                error = %err,
                "harvest failed"
            );
            failures.push(err.to_string());
        }
    }

    SourceEntry {
        name: slot.name.clone(),
        status: if failures.is_empty() {
            SourceStatus::Ok
        } else {
            SourceStatus::Degraded
        },
        capture_path,
        table_path,
        records,
        decode_errors: slot.decode_errors.count(),
        failures,
    }
}

/// Entry for a source whose harvest could not run at all.
pub(super) fn failed(slot: &SourceSlot, message: &str) -> SourceEntry {
    let mut failures = slot.failures.clone();
    failures.push(message.to_string());
    SourceEntry {
        name: slot.name.clone(),
        status: SourceStatus::Degraded,
        capture_path: slot.capture_path().map(Path::to_path_buf),
        table_path: None,
        records: 0,
        decode_errors: slot.decode_errors.count(),
        failures,
    }
}

fn harvest_capture(
    slot: &SourceSlot,
    run: &RunContext,
    output_dir: &Path,
    capture_path: Option<&Path>,
) -> Result<(PathBuf, usize), HarvestError> {
    let path = capture_path.ok_or(HarvestError::NoCapture)?;
    let raw = RawCapture::read(path).map_err(|source| HarvestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = slot.decoder.decode(&raw);
    debug!(
        event = event_names::DECODE_FINISHED,
        source = %slot.name,
        records = records.len(),
        "capture decoded"
    );
    for record in &mut records {
        run.stamp(record);
    }
    let table = Table::from_records(slot.name.as_str(), records)?;
    let table_path = write_table(output_dir, &table)?;

    info!(
        event = event_names::HARVEST_TABLE_WRITTEN,
        source = %slot.name,
        records = table.len(),
        decode_errors = slot.decode_errors.count(),
        path = %table_path.display(),
        "table written"
    );
    Ok((table_path, table.len()))
}
