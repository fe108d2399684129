//! One CSV file per source.

use dm_common::{Table, RUN_END_FIELD, RUN_ID_FIELD, RUN_START_FIELD};
use std::path::{Path, PathBuf};

use super::OutputError;

/// `<dir>/<source>.csv`
pub fn table_path(dir: &Path, source: &str) -> PathBuf {
    dir.join(format!("{}.csv", source))
}

/// Write `table` to `<dir>/<source>.csv`, header first.
///
/// Missing fields and nulls are written as empty cells. A table with no
/// records still gets a header of the run columns.
pub fn write_table(dir: &Path, table: &Table) -> Result<PathBuf, OutputError> {
    let path = table_path(dir, table.source());
    let csv_err = |source: csv::Error| OutputError::Csv {
        path: path.clone(),
        source,
    };

    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    if table.columns().is_empty() {
        writer
            .write_record([RUN_ID_FIELD, RUN_START_FIELD, RUN_END_FIELD])
            .map_err(csv_err)?;
    } else {
        writer.write_record(table.columns()).map_err(csv_err)?;
    }
    for row in table.rows() {
        let cells: Vec<String> = row
            .into_iter()
            .map(|cell| cell.map(ToString::to_string).unwrap_or_default())
            .collect();
        writer.write_record(&cells).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
