//! NVIDIA GPU samplers: `--query-gpu` CSV, `dmon`, and `pmon`.
//!
//! Idle GPUs and unsupported counters print `-`, `[N/A]` or
//! `[Not Supported]`; those coerce to null on every column except the
//! timestamp and GPU index.

use dm_common::Record;

use super::coerce::{coerce_row, Coercion, Column};
use super::{decode_lines, DecodeError, Decoder, Diagnostics, RawCapture};

const QUERY_COLUMNS: [Column; 17] = [
    Column::new("datetime", Coercion::Timestamp),
    Column::new("gpu", Coercion::Int),
    Column::nullable("pstate", Coercion::Text),
    Column::nullable("buffer_size", Coercion::Int),
    Column::nullable("total_memory", Coercion::Float),
    Column::nullable("free_memory", Coercion::Float),
    Column::nullable("used_memory", Coercion::Float),
    Column::nullable("compute_mode", Coercion::Text),
    Column::nullable("gpu_utilization", Coercion::Percent),
    Column::nullable("memory_utilization", Coercion::Percent),
    Column::nullable("encoder_sessions", Coercion::Int),
    Column::nullable("encoder_average_fps", Coercion::Int),
    Column::nullable("encoder_average_latency", Coercion::Int),
    Column::nullable("graphics_clock", Coercion::Float),
    Column::nullable("sm_clock", Coercion::Float),
    Column::nullable("memory_clock", Coercion::Float),
    Column::nullable("video_clock", Coercion::Float),
];

const DMON_COLUMNS: [Column; 20] = [
    Column::new("datetime", Coercion::Timestamp),
    Column::new("gpu", Coercion::Int),
    Column::nullable("power_watt", Coercion::Int),
    Column::nullable("gpu_temp", Coercion::Int),
    Column::nullable("memory_temp", Coercion::Int),
    Column::nullable("sm_utilization", Coercion::Percent),
    Column::nullable("memory_utilization", Coercion::Percent),
    Column::nullable("encoder_utilization", Coercion::Percent),
    Column::nullable("decoder_utilization", Coercion::Percent),
    Column::nullable("memory_clock", Coercion::Int),
    Column::nullable("processor_clock", Coercion::Int),
    Column::nullable("power_violation", Coercion::Float),
    Column::nullable("thermal_violation", Coercion::Float),
    Column::nullable("fb_memory", Coercion::Float),
    Column::nullable("bar1_memory", Coercion::Float),
    Column::nullable("single_bit_errors", Coercion::Int),
    Column::nullable("double_bit_errors", Coercion::Int),
    Column::nullable("pcie_errors", Coercion::Int),
    Column::nullable("pcie_rx_mb_s", Coercion::Float),
    Column::nullable("pcie_tx_mb_s", Coercion::Float),
];

const PMON_COLUMNS: [Column; 10] = [
    Column::new("datetime", Coercion::Timestamp),
    Column::new("gpu", Coercion::Int),
    Column::nullable("pid", Coercion::Int),
    Column::nullable("type", Coercion::Text),
    Column::nullable("sm_utilization", Coercion::Percent),
    Column::nullable("memory_utilization", Coercion::Percent),
    Column::nullable("encoder_utilization", Coercion::Percent),
    Column::nullable("decoder_utilization", Coercion::Percent),
    Column::nullable("fb_memory", Coercion::Float),
    Column::nullable("command", Coercion::Text),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVariant {
    /// Headerless CSV from `nvidia-smi --query-gpu`.
    Query,
    /// Device monitor (`nvidia-smi dmon -o DT`).
    Dmon,
    /// Process monitor (`nvidia-smi pmon -o DT`).
    Pmon,
}

impl GpuVariant {
    pub fn columns(&self) -> &'static [Column] {
        match self {
            GpuVariant::Query => &QUERY_COLUMNS,
            GpuVariant::Dmon => &DMON_COLUMNS,
            GpuVariant::Pmon => &PMON_COLUMNS,
        }
    }

    pub fn header_skip(&self) -> usize {
        match self {
            GpuVariant::Query => 0,
            GpuVariant::Dmon | GpuVariant::Pmon => 2,
        }
    }
}

#[derive(Debug)]
pub struct GpuDecoder {
    source: String,
    variant: GpuVariant,
    diagnostics: Diagnostics,
}

impl GpuDecoder {
    pub fn new(source: impl Into<String>, variant: GpuVariant, diagnostics: Diagnostics) -> Self {
        GpuDecoder {
            source: source.into(),
            variant,
            diagnostics,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Option<Record>, DecodeError> {
        match self.variant {
            GpuVariant::Query => {
                let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
                coerce_row(&self.source, self.variant.columns(), &tokens).map(Some)
            }
            GpuVariant::Dmon | GpuVariant::Pmon => {
                // dmon/pmon repeat their header block periodically
                if line.trim_start().starts_with('#') {
                    return Ok(None);
                }
                let tokens: Vec<&str> = line.split_whitespace().collect();
                let columns = self.variant.columns();
                if tokens.len() != columns.len() + 1 {
                    return Err(DecodeError::FieldCount {
                        expected: columns.len() + 1,
                        found: tokens.len(),
                    });
                }
                let datetime = format!("{} {}", tokens[0], tokens[1]);
                let mut row: Vec<&str> = Vec::with_capacity(columns.len());
                row.push(&datetime);
                row.extend_from_slice(&tokens[2..]);
                coerce_row(&self.source, columns, &row).map(Some)
            }
        }
    }
}

impl Decoder for GpuDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        self.variant.header_skip()
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        decode_lines(
            &self.source,
            raw,
            self.header_skip(),
            &self.diagnostics,
            |line| self.parse_line(line),
        )
    }
}
