//! `strace -tttTvxC -o <file>` decoder.
//!
//! Line shape: `<epoch> <name>(<args>) = <return> [<error>] <<timing>>`.
//! Signal and exit banners (`---`, `+++`) are dropped, and the `-C`
//! summary table ends the trace.

use chrono::DateTime;
use dm_common::{Record, Value};

use super::{decode_lines, DecodeError, Decoder, Diagnostics, RawCapture};

const BANNER_PREFIXES: &[&str] = &["+++", "---"];
const SUMMARY_MARKER: &str = "% time";
const INCOMPLETE_MARKERS: &[&str] = &["<detached ...>", "<unfinished ...>"];
const RESUMED_PREFIX: &str = "<... ";
const RESUMED_SUFFIX: &str = " resumed>";

#[derive(Debug)]
pub struct StraceDecoder {
    source: String,
    diagnostics: Diagnostics,
}

impl StraceDecoder {
    pub fn new(source: impl Into<String>, diagnostics: Diagnostics) -> Self {
        StraceDecoder {
            source: source.into(),
            diagnostics,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Option<Record>, DecodeError> {
        let line = line.trim();
        let (stamp, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| DecodeError::Malformed(line.to_string()))?;
        let rest = rest.trim();
        if BANNER_PREFIXES.iter().any(|p| rest.starts_with(p)) {
            return Ok(None);
        }

        let mut record = Record::new(&self.source);
        record.set("datetime", Value::Timestamp(parse_epoch(stamp)?));

        if let Some(call) = INCOMPLETE_MARKERS
            .iter()
            .find_map(|marker| rest.strip_suffix(marker))
        {
            let (name, args) = split_call(call.trim_end())?;
            record.set("fn", name);
            record.set("args", args.trim_end().trim_end_matches(','));
            record.set("return_code", Value::Null);
            record.set("error_msg", Value::Null);
            record.set("timing", Value::Null);
            return Ok(Some(record));
        }

        let (body, timing) = split_timing(rest)?;
        let (call, outcome) = body
            .rsplit_once(" = ")
            .ok_or_else(|| DecodeError::Malformed(format!("no return value: {}", rest)))?;

        let (name, args) = match call.strip_prefix(RESUMED_PREFIX) {
            Some(resumed) => resumed
                .split_once(RESUMED_SUFFIX)
                .map(|(name, args)| (name.trim(), args.trim()))
                .ok_or_else(|| DecodeError::Malformed(call.to_string()))?,
            None => split_call(call.trim_end())?,
        };
        let args = args.strip_suffix(')').unwrap_or(args);

        let mut outcome = outcome.split_whitespace();
        let return_code = parse_return_code(outcome.next().unwrap_or(""))?;
        let error_msg = outcome.collect::<Vec<_>>().join(" ");

        record.set("fn", name);
        record.set("args", args);
        record.set("return_code", return_code);
        record.set(
            "error_msg",
            if error_msg.is_empty() {
                Value::Null
            } else {
                Value::Text(error_msg)
            },
        );
        record.set("timing", timing.map(Value::Float).unwrap_or(Value::Null));
        Ok(Some(record))
    }
}

impl Decoder for StraceDecoder {
    fn source(&self) -> &str {
        &self.source
    }

    fn header_skip(&self) -> usize {
        0
    }

    fn decode(&self, raw: &RawCapture) -> Vec<Record> {
        let mut in_summary = false;
        decode_lines(&self.source, raw, self.header_skip(), &self.diagnostics, |line| {
            if in_summary || line.trim_start().starts_with(SUMMARY_MARKER) {
                in_summary = true;
                return Ok(None);
            }
            self.parse_line(line)
        })
    }
}

/// `name(args...` → (`name`, `args...`).
fn split_call(call: &str) -> Result<(&str, &str), DecodeError> {
    let (name, args) = call
        .split_once('(')
        .ok_or_else(|| DecodeError::Malformed(format!("no call: {}", call)))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(DecodeError::Malformed(format!("no call: {}", call)));
    }
    Ok((name, args))
}

/// Strip a trailing `<seconds>` timing, if present.
fn split_timing(rest: &str) -> Result<(&str, Option<f64>), DecodeError> {
    let Some(body) = rest.strip_suffix('>') else {
        return Ok((rest, None));
    };
    let Some(open) = body.rfind('<') else {
        return Ok((rest, None));
    };
    let raw = &body[open + 1..];
    let timing = raw.parse::<f64>().map_err(|_| DecodeError::Coerce {
        column: "timing".to_string(),
        raw: raw.to_string(),
        kind: "float",
    })?;
    Ok((body[..open].trim_end(), Some(timing)))
}

fn parse_return_code(raw: &str) -> Result<Value, DecodeError> {
    if raw == "?" {
        return Ok(Value::Null);
    }
    let parsed = if let Some(hex) = raw.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok().map(|v| v as i64)
    } else {
        raw.parse::<i64>().ok()
    };
    parsed.map(Value::Int).ok_or_else(|| DecodeError::Coerce {
        column: "return_code".to_string(),
        raw: raw.to_string(),
        kind: "integer",
    })
}

/// `1729252801.123456` → naive UTC timestamp.
fn parse_epoch(raw: &str) -> Result<chrono::NaiveDateTime, DecodeError> {
    let err = || DecodeError::Coerce {
        column: "datetime".to_string(),
        raw: raw.to_string(),
        kind: "epoch timestamp",
    };
    let (secs, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let secs: i64 = secs.parse().map_err(|_| err())?;
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac).parse().map_err(|_| err())?
    };
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    const TRACE: &str = r#"1792324801.000100 read(3, "\x00\x01abc", 4096) = 5 <0.000012>
1792324801.000200 openat(AT_FDCWD, "/etc/missing", O_RDONLY|O_CLOEXEC) = -1 ENOENT (No such file or directory) <0.000010>
1792324801.000300 --- SIGCHLD {si_signo=SIGCHLD, si_code=CLD_EXITED, si_pid=42} ---
1792324801.000400 mmap(NULL, 8192, PROT_READ|PROT_WRITE, MAP_PRIVATE|MAP_ANONYMOUS, -1, 0) = 0x7f12ab000000 <0.000011>
1792324801.000500 read(0,  <unfinished ...>
1792324801.000600 <... read resumed>"hello\n", 1024) = 6 <0.500000>
1792324801.000700 wait4(-1, 0x7ffd, 0, NULL) = ? <garbage>
1792324801.000800 exit_group(0)                     = ?
1792324801.000900 +++ exited with 0 +++
% time     seconds  usecs/call     calls    errors syscall
------ ----------- ----------- --------- --------- ----------------
 61.54    0.000008           8         1           read
"#;

    fn decode(text: &str) -> (Vec<Record>, std::sync::Arc<super::super::CollectingSink>) {
        let (sink, diagnostics) = collecting();
        let records = StraceDecoder::new("strace-42", diagnostics).decode(&capture(text));
        (records, sink)
    }

    #[test]
    fn test_trace_lines() {
        let (records, sink) = decode(TRACE);
        assert_eq!(records.len(), 6);

        let read = &records[0];
        assert_eq!(read.get("fn"), Some(&Value::from("read")));
        assert_eq!(read.get("args"), Some(&Value::from(r#"3, "\x00\x01abc", 4096"#)));
        assert_eq!(read.get("return_code"), Some(&Value::Int(5)));
        assert_eq!(read.get("error_msg"), Some(&Value::Null));
        assert_eq!(read.get("timing"), Some(&Value::Float(0.000012)));
        assert_eq!(
            read.get("datetime").map(ToString::to_string),
            Some("2026-10-18T12:00:01.000100".to_string())
        );

        let open = &records[1];
        assert_eq!(open.get("return_code"), Some(&Value::Int(-1)));
        assert_eq!(
            open.get("error_msg"),
            Some(&Value::from("ENOENT (No such file or directory)"))
        );

        assert_eq!(records[2].get("fn"), Some(&Value::from("mmap")));
        assert_eq!(records[2].get("return_code"), Some(&Value::Int(0x7f12ab000000)));

        let unfinished = &records[3];
        assert_eq!(unfinished.get("fn"), Some(&Value::from("read")));
        assert_eq!(unfinished.get("return_code"), Some(&Value::Null));
        assert_eq!(unfinished.get("timing"), Some(&Value::Null));

        let resumed = &records[4];
        assert_eq!(resumed.get("fn"), Some(&Value::from("read")));
        assert_eq!(resumed.get("args"), Some(&Value::from(r#""hello\n", 1024"#)));
        assert_eq!(resumed.get("return_code"), Some(&Value::Int(6)));

        let exit = &records[5];
        assert_eq!(exit.get("fn"), Some(&Value::from("exit_group")));
        assert_eq!(exit.get("return_code"), Some(&Value::Null));
        assert_eq!(exit.get("timing"), Some(&Value::Null));

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.line_number, 7);
    }

    #[test]
    fn test_detached_line_nulls_outcome() {
        let (records, sink) = decode("1792324801.5 epoll_wait(4,  <detached ...>\n");
        assert!(sink.is_empty());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("fn"), Some(&Value::from("epoll_wait")));
        assert_eq!(record.get("args"), Some(&Value::from("4")));
        assert_eq!(record.get("return_code"), Some(&Value::Null));
        assert_eq!(record.get("timing"), Some(&Value::Null));
        assert_eq!(record.get("error_msg"), Some(&Value::Null));
        assert!(record.get("datetime").and_then(Value::as_timestamp).is_some());
    }

    #[test]
    fn test_unparseable_lines_are_reported() {
        let (records, sink) = decode("not-a-time read(3) = 1 <0.1>\n1792324801.1 garbage\n");
        assert!(records.is_empty());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_column_order() {
        let (records, _) = decode("1792324801.1 close(3) = 0 <0.000004>\n");
        let names: Vec<_> = records[0].field_names().collect();
        assert_eq!(
            names,
            vec!["datetime", "fn", "args", "return_code", "error_msg", "timing"]
        );
    }
}
