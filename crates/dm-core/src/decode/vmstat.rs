//! `vmstat -t -n` decoder.

use dm_common::Record;

use super::coerce::{coerce_row, Coercion, Column};
use super::{decode_lines, DecodeError, Decoder, Diagnostics, RawCapture};

const HEADER_SKIP: usize = 2;

/// Numeric columns in vmstat order, followed by date and time tokens.
const NUMERIC_COLUMNS: usize = 17;

const COLUMNS: [Column; NUMERIC_COLUMNS + 1] = [
    Column::new("datetime", Coercion::Timestamp),
    Column::new("processes_waiting", Coercion::Int),
    Column::new("processes_sleeping", Coercion::Int),
    Column::new("virtual_memory", Coercion::Megabytes),
    Column::new("free_memory", Coercion::Megabytes),
    Column::new("buffered_memory", Coercion::Megabytes),
    Column::new("cached_memory", Coercion::Megabytes),
    Column::new("swap_in", Coercion::Megabytes),
    Column::new("swap_out", Coercion::Megabytes),
    Column::new("io_bytes_in", Coercion::Megabytes),
    Column::new("io_bytes_out", Coercion::Megabytes),
    Column::new("system_interrupts", Coercion::Int),
    Column::new("context_switches", Coercion::Int),
    Column::new("user_cpu", Coercion::Percent),
    Column::new("sys_cpu", Coercion::Percent),
    Column::new("idle_cpu", Coercion::Percent),
    Column::new("wait_cpu", Coercion::Percent),
    Column::new("stolen_cpu", Coercion::Percent),
];

#[derive(Debug)]
pub struct VmstatDecoder {
    source: String,
    diagnostics: Diagnostics,
}

impl VmstatDecoder {
    pub fn new(source: impl Into<String>, diagnostics: Diagnostics) -> Self {
        VmstatDecoder {
            source: source.into(),
            diagnostics,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Option<Record>, DecodeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != NUMERIC_COLUMNS + 2 {
            return Err(DecodeError::FieldCount {
                expected: NUMERIC_COLUMNS + 2,
                found: tokens.len(),
            });
        }
        let datetime = format!("{} {}", tokens[NUMERIC_COLUMNS], tokens[NUMERIC_COLUMNS + 1]);
        let mut row: Vec<&str> = Vec::with_capacity(COLUMNS.len());
        row.push(&datetime);
        row.extend_from_slice(&tokens[..NUMERIC_COLUMNS]);
        coerce_row(&self.source, &COLUMNS, &row).map(Some)
    }
}

impl Decoder for VmstatDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        HEADER_SKIP
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        decode_lines(&self.source, raw, self.header_skip(), &self.diagnostics, |line| {
            self.parse_line(line)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::NaiveDate;
    use dm_common::Value;

    const BANNER: &str = "\
procs -----------memory---------- ---swap-- -----io---- -system-- ------cpu----- -----timestamp-----
 r  b   swpd   free   buff  cache   si   so    bi    bo   in   cs us sy id wa st                 UTC
";

    #[test]
    fn test_banner_three_rows_one_corrupt() {
        let text = format!(
            "{}{}{}{}{}",
            BANNER,
            " 1  0      0 8123456 204800 3145728    0    0     5    12  230  410  3  1 95  1  0 2026-10-18 12:00:01\n",
            " 0  0      0 8120000 204800 3145728    0    0     0     8  210  380  2  1 96  1  0 2026-10-18 12:00:02\n",
            " 0  0      0 8119000 204800 3145728    0    0\n",
            " 2  1      0 8118000 204800 3145728    0    0     0    40  260  450 12  4 80  4  0 2026-10-18 12:00:03\n",
        );
        let (sink, diagnostics) = collecting();
        let records = VmstatDecoder::new("vmstat", diagnostics).decode(&capture(&text));

        assert_eq!(records.len(), 3);
        let first = &records[0];
        assert_eq!(
            first.get("datetime"),
            Some(&Value::Timestamp(
                NaiveDate::from_ymd_opt(2026, 10, 18)
                    .unwrap()
                    .and_hms_opt(12, 0, 1)
                    .unwrap()
            ))
        );
        assert_eq!(first.get("free_memory"), Some(&Value::Float(8.12)));
        assert_eq!(first.get("cached_memory"), Some(&Value::Float(3.15)));
        assert_eq!(first.get("user_cpu"), Some(&Value::Float(0.03)));
        assert_eq!(first.get("idle_cpu"), Some(&Value::Float(0.95)));
        assert_eq!(first.get("context_switches"), Some(&Value::Int(410)));
        assert_eq!(records[2].get("wait_cpu"), Some(&Value::Float(0.04)));
        assert_eq!(first.field_names().next(), Some("datetime"));

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.line_number, 5);
        assert!(matches!(
            failures[0].1,
            DecodeError::FieldCount {
                expected: 19,
                found: 8
            }
        ));
    }

    #[test]
    fn test_non_numeric_value_drops_only_that_row() {
        let text = format!(
            "{}{}{}",
            BANNER,
            " 1  0      0 lots 204800 3145728    0    0     5    12  230  410  3  1 95  1  0 2026-10-18 12:00:01\n",
            " 1  0      0 8123456 204800 3145728    0    0     5    12  230  410  3  1 95  1  0 2026-10-18 12:00:02\n",
        );
        let (sink, diagnostics) = collecting();
        let records = VmstatDecoder::new("vmstat", diagnostics).decode(&capture(&text));
        assert_eq!(records.len(), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.failures()[0].0.line_number, 3);
    }

    #[test]
    fn test_banner_is_skipped_even_if_numeric() {
        let row = " 1  0      0 8123456 204800 3145728    0    0     5    12  230  410  3  1 95  1  0 2026-10-18 12:00:01\n";
        let text = format!("{row}{row}{row}");
        let (sink, diagnostics) = collecting();
        let records = VmstatDecoder::new("vmstat", diagnostics).decode(&capture(&text));
        assert_eq!(records.len(), 1);
        assert!(sink.is_empty());
    }
}
