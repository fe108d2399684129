//! Fault-isolated decoders: raw capture → typed records.
//!
//! A decoder never halts on a malformed unit. The failing line (or JSON
//! entry) is reported to the injected [`DiagnosticSink`] with an
//! [`ErrorContext`] and dropped; every other unit still decodes.

pub mod coerce;
pub mod context;
pub mod gpu;
pub mod iostat;
pub mod mpstat;
pub mod nethogs;
pub mod strace;
pub mod vmstat;

pub use coerce::{Coercion, Column};
pub use context::{ContextLine, ErrorContext};

use dm_common::Record;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

use crate::config::DEFAULT_CONTEXT_RADIUS;
use crate::logging::event_names;

/// Why a single unit failed to decode. Never escapes a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("column {column}: cannot parse {raw:?} as {kind}")]
    Coerce {
        column: String,
        raw: String,
        kind: &'static str,
    },

    #[error("malformed line: {0}")]
    Malformed(String),

    #[error("invalid JSON: {0}")]
    Json(String),
}

/// Raw output captured from one source.
#[derive(Debug, Clone)]
pub struct RawCapture {
    path: PathBuf,
    text: String,
}

impl RawCapture {
    /// Read a capture file. Invalid UTF-8 is replaced, not rejected.
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(RawCapture {
            path: path.to_path_buf(),
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        RawCapture {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }
}

/// Receives every decode failure.
pub trait DiagnosticSink: Send + Sync {
    fn decode_failed(&self, context: &ErrorContext, error: &DecodeError);
}

/// Logs decode failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn decode_failed(&self, context: &ErrorContext, error: &DecodeError) {
        warn!(
            event = event_names::DECODE_ERROR,
            source = %context.source,
            path = %context.path.display(),
            line = context.line_number,
            error = %error,
            "failed to decode line\n{}",
            context
        );
    }
}

/// Keeps every failure in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<(ErrorContext, DecodeError)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<(ErrorContext, DecodeError)> {
        match self.failures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.failures.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn decode_failed(&self, context: &ErrorContext, error: &DecodeError) {
        let entry = (context.clone(), error.clone());
        match self.failures.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Counts failures and forwards them to another sink.
pub struct CountingSink {
    inner: Arc<dyn DiagnosticSink>,
    count: AtomicUsize,
}

impl CountingSink {
    pub fn new(inner: Arc<dyn DiagnosticSink>) -> Self {
        CountingSink {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for CountingSink {
    fn decode_failed(&self, context: &ErrorContext, error: &DecodeError) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.decode_failed(context, error);
    }
}

/// Sink plus context radius, handed to every decoder at construction.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
    radius: usize,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Diagnostics {
            sink,
            radius: DEFAULT_CONTEXT_RADIUS,
        }
    }

    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = radius;
        self
    }

    /// Report a failure at `lines[index]` (0-based, header lines included).
    pub fn report(
        &self,
        source: &str,
        raw: &RawCapture,
        lines: &[&str],
        index: usize,
        error: &DecodeError,
    ) {
        let context = ErrorContext::from_lines(source, raw.path(), lines, index, self.radius);
        self.sink.decode_failed(&context, error);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("radius", &self.radius)
            .finish_non_exhaustive()
    }
}

/// Per-source transform from a raw capture to records.
pub trait Decoder: Send + Sync {
    /// Source name stamped on every record.
    fn source(&self) -> &str;

    /// Leading lines discarded before parsing.
    fn header_skip(&self) -> usize;

    fn decode(&self, raw: &RawCapture) -> Vec<Record>;
}

/// Drive a line-oriented decode.
///
/// The first `header_skip` lines and blank lines are ignored. `parse`
/// returns `Ok(Some(_))` for a record, `Ok(None)` for a line that is
/// legitimately not data, and `Err` for a malformed line, which is
/// reported and dropped.
pub(crate) fn decode_lines<F>(
    source: &str,
    raw: &RawCapture,
    header_skip: usize,
    diagnostics: &Diagnostics,
    mut parse: F,
) -> Vec<Record>
where
    F: FnMut(&str) -> Result<Option<Record>, DecodeError>,
{
    let lines = raw.lines();
    let mut records = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(header_skip) {
        if line.trim().is_empty() {
            continue;
        }
        match parse(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => diagnostics.report(source, raw, &lines, index, &err),
        }
    }
    records
}

/// Which concrete decoder a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    Vmstat,
    Mpstat,
    Iostat,
    Nethogs,
    Strace,
    NvidiaSmiQuery,
    NvidiaSmiDmon,
    NvidiaSmiPmon,
}

impl DecoderKind {
    pub fn build(self, source: &str, diagnostics: Diagnostics) -> Box<dyn Decoder> {
        match self {
            DecoderKind::Vmstat => Box::new(vmstat::VmstatDecoder::new(source, diagnostics)),
            DecoderKind::Mpstat => Box::new(mpstat::MpstatDecoder::new(source, diagnostics)),
            DecoderKind::Iostat => Box::new(iostat::SnapshotDecoder::iostat(source, diagnostics)),
            DecoderKind::Nethogs => Box::new(nethogs::NethogsDecoder::new(source, diagnostics)),
            DecoderKind::Strace => Box::new(strace::StraceDecoder::new(source, diagnostics)),
            DecoderKind::NvidiaSmiQuery => Box::new(gpu::GpuDecoder::new(
                source,
                gpu::GpuVariant::Query,
                diagnostics,
            )),
            DecoderKind::NvidiaSmiDmon => Box::new(gpu::GpuDecoder::new(
                source,
                gpu::GpuVariant::Dmon,
                diagnostics,
            )),
            DecoderKind::NvidiaSmiPmon => Box::new(gpu::GpuDecoder::new(
                source,
                gpu::GpuVariant::Pmon,
                diagnostics,
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn collecting() -> (Arc<CollectingSink>, Diagnostics) {
        let sink = Arc::new(CollectingSink::new());
        let diagnostics = Diagnostics::new(sink.clone());
        (sink, diagnostics)
    }

    pub fn capture(text: &str) -> RawCapture {
        RawCapture::from_text("/tmp/capture.log", text)
    }
}
