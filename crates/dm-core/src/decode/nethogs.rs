//! `nethogs -t` decoder (piped through `ts`).
//!
//! Everything before the first `Refreshing:` line is start-up noise. After
//! it, each line is `<timestamp> <process...> <sent> <received>`. Process
//! names repeat across samples, so a content hash of the name is the
//! identity key.

use dm_common::{Record, Value};
use sha2::{Digest, Sha256};

use super::coerce::{parse_timestamp, round_to};
use super::{decode_lines, DecodeError, Decoder, Diagnostics, RawCapture};

const SENTINEL: &str = "Refreshing:";
const VALUE_PLACES: i32 = 5;

#[derive(Debug)]
pub struct NethogsDecoder {
    source: String,
    diagnostics: Diagnostics,
}

impl NethogsDecoder {
    pub fn new(source: impl Into<String>, diagnostics: Diagnostics) -> Self {
        NethogsDecoder {
            source: source.into(),
            diagnostics,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Option<Record>, DecodeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            // ts stamps the blank line closing each refresh block
            [_] => Ok(None),
            [timestamp, process @ .., sent, received] if !process.is_empty() => {
                let datetime = parse_timestamp(timestamp).ok_or_else(|| DecodeError::Coerce {
                    column: "datetime".to_string(),
                    raw: timestamp.to_string(),
                    kind: "timestamp",
                })?;
                let process = process.join(" ");
                let mut record = Record::new(&self.source);
                record.set("datetime", Value::Timestamp(datetime));
                record.set("process_hash", process_hash(&process));
                record.set("process", process);
                record.set("net_kb_sent", parse_kb("net_kb_sent", sent)?);
                record.set("net_kb_received", parse_kb("net_kb_received", received)?);
                Ok(Some(record))
            }
            _ => Err(DecodeError::FieldCount {
                expected: 4,
                found: tokens.len(),
            }),
        }
    }
}

impl Decoder for NethogsDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        0
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        let mut refreshing = false;
        decode_lines(&self.source, raw, self.header_skip(), &self.diagnostics, |line| {
            if line.contains(SENTINEL) {
                refreshing = true;
                return Ok(None);
            }
            if !refreshing {
                return Ok(None);
            }
            self.parse_line(line)
        })
    }
}

/// Stable identity key for a process name.
pub fn process_hash(process: &str) -> String {
    hex::encode(Sha256::digest(process.as_bytes()))
}

fn parse_kb(column: &str, raw: &str) -> Result<f64, DecodeError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| round_to(v, VALUE_PLACES))
        .ok_or_else(|| DecodeError::Coerce {
            column: column.to_string(),
            raw: raw.to_string(),
            kind: "float",
        })
}
