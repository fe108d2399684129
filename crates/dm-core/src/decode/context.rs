//! Line-numbered diagnostics for decode failures.
//!
//! An [`ErrorContext`] is built only when a unit fails to decode. It is
//! logged, never persisted.
//!
//! ```text
//! vmstat: /out/raw/20261018T120000-vmstat.log:5
//!     3 | 1  0  0 8123456 ...
//!     4 | 0  0  0 8123000 ...
//! >   5 | 0  0  0 garbage
//!     6 | 2  0  0 8122000 ...
//! ```

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Longest raw line rendered in a context window.
const MAX_RENDERED_LINE: usize = 240;

/// One raw line inside a context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLine {
    /// 1-based line number in the capture file.
    pub number: usize,
    pub text: String,
    /// Whether this is the line that failed.
    pub failing: bool,
}

/// Where a decode failure happened and what surrounded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    pub source: String,
    pub path: PathBuf,
    /// 1-based line number of the failing unit.
    pub line_number: usize,
    pub window: Vec<ContextLine>,
}

impl ErrorContext {
    /// Build a context around `lines[index]` with `radius` lines either side.
    ///
    /// `index` is 0-based over every line of the capture, including header
    /// lines, so the reported line number matches the file.
    pub fn from_lines(
        source: impl Into<String>,
        path: impl AsRef<Path>,
        lines: &[&str],
        index: usize,
        radius: usize,
    ) -> Self {
        let start = index.saturating_sub(radius);
        let end = index.saturating_add(radius).saturating_add(1).min(lines.len());
        let window = (start..end)
            .map(|i| ContextLine {
                number: i + 1,
                text: lines[i].to_string(),
                failing: i == index,
            })
            .collect();

        ErrorContext {
            source: source.into(),
            path: path.as_ref().to_path_buf(),
            line_number: index + 1,
            window,
        }
    }

    /// Raw text of the failing line, when it lies inside the window.
    pub fn failing_line(&self) -> Option<&str> {
        self.window
            .iter()
            .find(|l| l.failing)
            .map(|l| l.text.as_str())
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{}",
            self.source,
            self.path.display(),
            self.line_number
        )?;
        let width = self
            .window
            .last()
            .map(|l| l.number.to_string().len())
            .unwrap_or(1);
        for line in &self.window {
            let marker = if line.failing { '>' } else { ' ' };
            let text = crate::logging::truncate_for_log(&line.text, MAX_RENDERED_LINE);
            write!(f, "\n{} {:>width$} | {}", marker, line.number, text, width = width)?;
        }
        Ok(())
    }
}
