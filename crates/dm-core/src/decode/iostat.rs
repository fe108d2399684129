//! Structured snapshot decoder (`iostat -o JSON` and similarly shaped tools).
//!
//! Input shape:
//!
//! ```text
//! {"sysstat": {"hosts": [{ ..., "statistics": [
//!     {"timestamp": "...", "disk": [{"disk_device": "sda", ...}, ...]},
//!     ...
//! ]}]}}
//! ```
//!
//! Output is one record per (timestamp, device). The statistics array is
//! read entry by entry, so a document truncated mid-write (the sampler is
//! killed on stop) still yields every complete entry.

use dm_common::{Record, Value};
use serde_json::Value as JsonValue;

use super::coerce::parse_timestamp;
use super::{DecodeError, Decoder, Diagnostics, RawCapture};

const STATISTICS_KEY: &str = "\"statistics\"";

#[derive(Debug)]
pub struct SnapshotDecoder {
    source: String,
    array_key: &'static str,
    diagnostics: Diagnostics,
}

impl SnapshotDecoder {
    pub fn new(source: impl Into<String>, array_key: &'static str, diagnostics: Diagnostics) -> Self {
        SnapshotDecoder {
            source: source.into(),
            array_key,
            diagnostics,
        }
    }

    /// Per-device disk statistics.
    pub fn iostat(source: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self::new(source, "disk", diagnostics)
    }

    fn report_at(&self, raw: &RawCapture, lines: &[&str], offset: usize, err: DecodeError) {
        let index = line_index(raw.text(), offset).min(lines.len().saturating_sub(1));
        self.diagnostics.report(&self.source, raw, lines, index, &err);
    }

    fn flatten_entry(&self, entry: &JsonValue) -> Result<Vec<Record>, DecodeError> {
        let timestamp = entry
            .get("timestamp")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| DecodeError::Json("entry has no timestamp".to_string()))?;
        let datetime = parse_timestamp(timestamp).ok_or_else(|| DecodeError::Coerce {
            column: "datetime".to_string(),
            raw: timestamp.to_string(),
            kind: "timestamp",
        })?;
        let items = entry
            .get(self.array_key)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| DecodeError::Json(format!("entry has no {:?} array", self.array_key)))?;

        items
            .iter()
            .map(|item| -> Result<Record, DecodeError> {
                let fields = item.as_object().ok_or_else(|| {
                    DecodeError::Json(format!("{} item is not an object", self.array_key))
                })?;
                let mut record = Record::new(&self.source);
                record.set("datetime", Value::Timestamp(datetime));
                for (key, value) in fields {
                    record.set(key.as_str(), json_scalar(value));
                }
                Ok(record)
            })
            .collect()
    }
}

impl Decoder for SnapshotDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        0
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        let text = raw.text();
        let lines = raw.lines();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let Some(mut pos) = statistics_start(text) else {
            self.report_at(
                raw,
                &lines,
                0,
                DecodeError::Json("no statistics array".to_string()),
            );
            return Vec::new();
        };

        let mut records = Vec::new();
        loop {
            pos += leading_separators(&text[pos..]);
            if pos >= text.len() || text[pos..].starts_with(']') {
                break;
            }

            let mut stream =
                serde_json::Deserializer::from_str(&text[pos..]).into_iter::<JsonValue>();
            match stream.next() {
                Some(Ok(entry)) => {
                    match self.flatten_entry(&entry) {
                        Ok(mut flattened) => records.append(&mut flattened),
                        Err(err) => self.report_at(raw, &lines, pos, err),
                    }
                    pos += stream.byte_offset();
                }
                Some(Err(err)) => {
                    // truncated or corrupt tail; nothing after it is recoverable
                    self.report_at(raw, &lines, pos, DecodeError::Json(err.to_string()));
                    break;
                }
                None => break,
            }
        }
        records
    }
}

/// Byte offset just past the `[` opening the statistics array.
fn statistics_start(text: &str) -> Option<usize> {
    let key = text.find(STATISTICS_KEY)? + STATISTICS_KEY.len();
    let rest = &text[key..];
    let colon = rest.find(':')?;
    if !rest[..colon].trim().is_empty() {
        return None;
    }
    let after_colon = &rest[colon + 1..];
    let bracket = after_colon.find('[')?;
    if !after_colon[..bracket].trim().is_empty() {
        return None;
    }
    Some(key + colon + 1 + bracket + 1)
}

fn leading_separators(text: &str) -> usize {
    text.len()
        - text
            .trim_start_matches(|c: char| c.is_whitespace() || c == ',')
            .len()
}

fn line_index(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

fn json_scalar(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Int(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    const COMPLETE: &str = r#"{"sysstat": {
	"hosts": [
		{
			"nodename": "node-7",
			"statistics": [
				{
					"timestamp": "2026-10-18T12:00:01+0000",
					"disk": [
						{"disk_device": "sda", "r/s": 1.5, "w/s": 2, "util": 0.4},
						{"disk_device": "sdb", "r/s": 0.0, "w/s": 0, "util": 0.0}
					]
				},
				{
					"timestamp": "2026-10-18T12:00:02+0000",
					"disk": [
						{"disk_device": "sda", "r/s": 3.25, "w/s": 4, "util": 1.2}
					]
				}
			]
		}
	]
}}
"#;

    #[test]
    fn test_flattens_timestamp_device_pairs() {
        let (sink, diagnostics) = collecting();
        let records = SnapshotDecoder::iostat("iostat", diagnostics).decode(&capture(COMPLETE));
        assert!(sink.is_empty());
        assert_eq!(records.len(), 3);

        let devices: Vec<_> = records
            .iter()
            .map(|r| r.get("disk_device").and_then(Value::as_text).unwrap().to_string())
            .collect();
        assert_eq!(devices, vec!["sda", "sdb", "sda"]);
        assert_eq!(records[0].get("r/s"), Some(&Value::Float(1.5)));
        assert_eq!(records[0].get("w/s"), Some(&Value::Int(2)));
        assert_eq!(
            records[2].get("datetime").map(ToString::to_string),
            Some("2026-10-18T12:00:02".to_string())
        );
        assert_eq!(records[0].field_names().next(), Some("datetime"));
    }

    #[test]
    fn test_truncated_document_keeps_complete_entries() {
        let cut = COMPLETE.find("\"2026-10-18T12:00:02").unwrap() + 10;
        let truncated = &COMPLETE[..cut];

        let (sink, diagnostics) = collecting();
        let records = SnapshotDecoder::iostat("iostat", diagnostics).decode(&capture(truncated));
        assert_eq!(records.len(), 2);

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, DecodeError::Json(_)));
        assert_eq!(failures[0].0.line_number, 13);
    }

    #[test]
    fn test_bad_entry_is_isolated() {
        let text = COMPLETE.replace("\"2026-10-18T12:00:01+0000\"", "\"not a time\"");
        let (sink, diagnostics) = collecting();
        let records = SnapshotDecoder::iostat("iostat", diagnostics).decode(&capture(&text));
        assert_eq!(records.len(), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.failures()[0].0.line_number, 6);
    }

    #[test]
    fn test_not_json_is_one_error() {
        let (sink, diagnostics) = collecting();
        let records = SnapshotDecoder::iostat("iostat", diagnostics)
            .decode(&capture("iostat: command failed\n"));
        assert!(records.is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_empty_capture_is_silent() {
        let (sink, diagnostics) = collecting();
        let records = SnapshotDecoder::iostat("iostat", diagnostics).decode(&capture(""));
        assert!(records.is_empty());
        assert!(sink.is_empty());
    }
}
