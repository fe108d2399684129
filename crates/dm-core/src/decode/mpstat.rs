//! `mpstat -P ALL` text decoder.
//!
//! Rows carry only a time of day; the date comes from the banner line.
//! When a row's time is earlier than the previous row's, the date rolls
//! over to the next day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dm_common::{Record, Value};

use super::coerce::{Coercion, Column};
use super::{decode_lines, DecodeError, Decoder, Diagnostics, RawCapture};

/// Banner, blank line, first column header.
const HEADER_SKIP: usize = 3;

// Two-digit years first: `%Y` would read "26" as year 26.
const BANNER_DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

const CPU_COLUMNS: [Column; 10] = [
    Column::new("usr", Coercion::Percent),
    Column::new("nice", Coercion::Percent),
    Column::new("sys", Coercion::Percent),
    Column::new("iowait", Coercion::Percent),
    Column::new("irq", Coercion::Percent),
    Column::new("soft", Coercion::Percent),
    Column::new("steal", Coercion::Percent),
    Column::new("guest", Coercion::Percent),
    Column::new("gnice", Coercion::Percent),
    Column::new("idle", Coercion::Percent),
];

#[derive(Debug)]
pub struct MpstatDecoder {
    source: String,
    diagnostics: Diagnostics,
}

impl MpstatDecoder {
    pub fn new(source: impl Into<String>, diagnostics: Diagnostics) -> Self {
        MpstatDecoder {
            source: source.into(),
            diagnostics,
        }
    }
}

impl Decoder for MpstatDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        HEADER_SKIP
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        let lines = raw.lines();
        let Some(date) = lines.first().and_then(|banner| banner_date(banner)) else {
            if !lines.is_empty() {
                let err = DecodeError::Malformed("banner carries no date".to_string());
                self.diagnostics.report(&self.source, raw, &lines, 0, &err);
            }
            return Vec::new();
        };

        let mut rows = RowClock::new(date);
        decode_lines(&self.source, raw, self.header_skip(), &self.diagnostics, |line| {
            parse_row(&self.source, line, &mut rows)
        })
    }
}

/// Tracks the current date across rows.
struct RowClock {
    date: NaiveDate,
    last: Option<NaiveTime>,
}

impl RowClock {
    fn new(date: NaiveDate) -> Self {
        RowClock { date, last: None }
    }

    fn stamp(&mut self, time: NaiveTime) -> NaiveDateTime {
        if let Some(last) = self.last {
            if time < last {
                self.date += Duration::days(1);
            }
        }
        self.last = Some(time);
        self.date.and_time(time)
    }
}

fn banner_date(banner: &str) -> Option<NaiveDate> {
    banner.split_whitespace().find_map(|token| {
        BANNER_DATE_LAYOUTS
            .iter()
            .find_map(|layout| NaiveDate::parse_from_str(token, layout).ok())
    })
}

fn parse_row(
    source: &str,
    line: &str,
    clock: &mut RowClock,
) -> Result<Option<Record>, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() == Some(&"Average:") {
        return Ok(None);
    }

    let (time, rest) = match tokens.as_slice() {
        [t, meridiem, rest @ ..] if is_meridiem(meridiem) => (
            NaiveTime::parse_from_str(&format!("{} {}", t, meridiem), "%I:%M:%S %p"),
            rest,
        ),
        [t, rest @ ..] => (NaiveTime::parse_from_str(t, "%H:%M:%S"), rest),
        [] => return Ok(None),
    };

    // column header repeated before every sample
    if rest.first() == Some(&"CPU") {
        return Ok(None);
    }

    let time = time.map_err(|_| DecodeError::Coerce {
        column: "datetime".to_string(),
        raw: tokens[0].to_string(),
        kind: "time of day",
    })?;
    if rest.len() != CPU_COLUMNS.len() + 1 {
        return Err(DecodeError::FieldCount {
            expected: CPU_COLUMNS.len() + 1,
            found: rest.len(),
        });
    }

    let mut record = Record::new(source);
    record.set("datetime", Value::Timestamp(clock.stamp(time)));
    record.set("cpu", rest[0]);
    for (column, raw) in CPU_COLUMNS.iter().zip(&rest[1..]) {
        record.set(column.name, column.coerce(raw)?);
    }
    Ok(Some(record))
}

fn is_meridiem(token: &str) -> bool {
    token.eq_ignore_ascii_case("AM") || token.eq_ignore_ascii_case("PM")
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    const BANNER: &str = "Linux 6.1.0-18-amd64 (node-7) \t2026-10-18 \t_x86_64_\t(2 CPU)\n\n";
    const HEADER: &str = "23:59:58     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle\n";

    fn ts(day: u32, h: u32, m: u32, s: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(2026, 10, day)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
        )
    }

    #[test]
    fn test_rows_with_repeated_headers_and_rollover() {
        let text = format!(
            "{BANNER}{HEADER}{}{}\n{}{}{}\n{}",
            "23:59:59     all    2.00    0.00    1.00    0.50    0.00    0.00    0.00    0.00    0.00   96.50\n",
            "23:59:59       0    4.00    0.00    2.00    1.00    0.00    0.00    0.00    0.00    0.00   93.00\n",
            "23:59:59     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle\n",
            "00:00:00     all    1.00    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00   98.00\n",
            "00:00:00       0    bad    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00   98.00\n",
            "Average:     all    1.50    0.00    1.00    0.25    0.00    0.00    0.00    0.00    0.00   97.25\n",
        );
        let (sink, diagnostics) = collecting();
        let records = MpstatDecoder::new("mpstat", diagnostics).decode(&capture(&text));

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("datetime"), Some(&ts(18, 23, 59, 59)));
        assert_eq!(records[0].get("cpu"), Some(&Value::from("all")));
        assert_eq!(records[0].get("usr"), Some(&Value::Float(0.02)));
        assert_eq!(records[0].get("idle"), Some(&Value::Float(0.965)));
        assert_eq!(records[1].get("cpu"), Some(&Value::from("0")));
        assert_eq!(records[2].get("datetime"), Some(&ts(19, 0, 0, 0)));

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.line_number, 9);
    }

    #[test]
    fn test_twelve_hour_clock() {
        let text = format!(
            "Linux 6.1.0 (node-7) \t10/18/26 \t_x86_64_\t(2 CPU)\n\n{}{}",
            "01:00:00 PM  CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle\n",
            "01:00:01 PM  all   10.00    0.00    1.00    0.00    0.00    0.00    0.00    0.00    0.00   89.00\n",
        );
        let (sink, diagnostics) = collecting();
        let records = MpstatDecoder::new("mpstat", diagnostics).decode(&capture(&text));
        assert!(sink.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("datetime"), Some(&ts(18, 13, 0, 1)));
        assert_eq!(records[0].get("usr"), Some(&Value::Float(0.1)));
    }

    #[test]
    fn test_missing_banner_date_reports_once() {
        let (sink, diagnostics) = collecting();
        let text = format!("garbage\n\n{HEADER}{}", "23:59:59 all 1 0 0 0 0 0 0 0 0 99\n");
        let records = MpstatDecoder::new("mpstat", diagnostics).decode(&capture(&text));
        assert!(records.is_empty());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.failures()[0].0.line_number, 1);
    }
}
