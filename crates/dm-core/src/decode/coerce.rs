//! Column-wise field coercion.
//!
//! Each decoder declares its columns as `(name, coercion)` pairs. A failed
//! coercion invalidates only the record being built.

use chrono::{DateTime, NaiveDateTime};
use dm_common::{Record, Value};

use super::DecodeError;

/// Raw tokens tools print for "no value".
const NULL_MARKERS: &[&str] = &["", "-", "N/A", "n/a", "[N/A]", "[Not Supported]"];

/// Timestamp layouts seen in sampler output, tried in order.
const TIMESTAMP_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y%m%d %H:%M:%S",
    // `%Y` also accepts two digits, so the short-year forms go first.
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Layouts carrying a UTC offset; the instant is normalized to UTC.
const OFFSET_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// How a raw token becomes a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Int,
    Float,
    Timestamp,
    /// Percentage in `[0, 100]` → fraction in `[0, 1]`.
    Percent,
    /// Bytes → megabytes (10^6), two decimals.
    Megabytes,
    Text,
}

impl Coercion {
    pub fn kind(&self) -> &'static str {
        match self {
            Coercion::Int => "integer",
            Coercion::Float => "float",
            Coercion::Timestamp => "timestamp",
            Coercion::Percent => "percentage",
            Coercion::Megabytes => "byte count",
            Coercion::Text => "text",
        }
    }

    /// Coerce a raw token, returning `None` if it does not parse.
    pub fn apply(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Coercion::Int => raw.parse::<i64>().ok().map(Value::Int),
            Coercion::Float => parse_f64(raw).map(Value::Float),
            Coercion::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
            Coercion::Percent => parse_f64(raw).map(|v| Value::Float(percent_to_fraction(v))),
            Coercion::Megabytes => parse_f64(raw).map(|v| Value::Float(bytes_to_megabytes(v))),
            Coercion::Text => Some(Value::Text(raw.to_string())),
        }
    }
}

/// A named column with its coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub coercion: Coercion,
    /// Null markers (`-`, `[N/A]`, ...) coerce to null instead of failing.
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, coercion: Coercion) -> Self {
        Column {
            name,
            coercion,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, coercion: Coercion) -> Self {
        Column {
            name,
            coercion,
            nullable: true,
        }
    }

    pub fn coerce(&self, raw: &str) -> Result<Value, DecodeError> {
        if self.nullable && is_null_marker(raw) {
            return Ok(Value::Null);
        }
        self.coercion
            .apply(raw)
            .ok_or_else(|| DecodeError::Coerce {
                column: self.name.to_string(),
                raw: raw.to_string(),
                kind: self.coercion.kind(),
            })
    }
}

/// Coerce exactly one token per column into a record.
pub fn coerce_row(source: &str, columns: &[Column], tokens: &[&str]) -> Result<Record, DecodeError> {
    if tokens.len() != columns.len() {
        return Err(DecodeError::FieldCount {
            expected: columns.len(),
            found: tokens.len(),
        });
    }
    let mut record = Record::new(source);
    for (column, raw) in columns.iter().zip(tokens) {
        record.set(column.name, column.coerce(raw)?);
    }
    Ok(record)
}

pub fn is_null_marker(raw: &str) -> bool {
    NULL_MARKERS.contains(&raw.trim())
}

/// Parse a timestamp in any layout sampler tools emit.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            OFFSET_LAYOUTS
                .iter()
                .find_map(|layout| DateTime::parse_from_str(raw, layout).ok())
                .or_else(|| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.naive_utc())
        })
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn percent_to_fraction(value: f64) -> f64 {
    round_to(value / 100.0, 4)
}

pub fn bytes_to_megabytes(value: f64) -> f64 {
    round_to(value / 1e6, 2)
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_int_and_float() {
        assert_eq!(Coercion::Int.apply("42"), Some(Value::Int(42)));
        assert_eq!(Coercion::Int.apply("4.2"), None);
        assert_eq!(Coercion::Float.apply(" 4.25 "), Some(Value::Float(4.25)));
        assert_eq!(Coercion::Float.apply("nan"), None);
        assert_eq!(Coercion::Float.apply("abc"), None);
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(Coercion::Percent.apply("5"), Some(Value::Float(0.05)));
        assert_eq!(Coercion::Percent.apply("100"), Some(Value::Float(1.0)));
        assert_eq!(Coercion::Percent.apply("12.34"), Some(Value::Float(0.1234)));
        assert_eq!(
            Coercion::Megabytes.apply("8123456"),
            Some(Value::Float(8.12))
        );
        assert_eq!(Coercion::Megabytes.apply("0"), Some(Value::Float(0.0)));
    }

    #[test]
    fn test_timestamp_layouts() {
        let expected = at(12, 0, 1);
        for raw in [
            "2026-10-18T12:00:01",
            "2026-10-18 12:00:01",
            "2026/10/18 12:00:01.000",
            "20261018 12:00:01",
            "10/18/2026 12:00:01",
            "10/18/26 12:00:01",
            "10/18/26 12:00:01 PM",
            "2026-10-18T12:00:01+0000",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "layout {}", raw);
        }
        assert_eq!(parse_timestamp("2026-10-18T12:00:01+02:00"), Some(at(10, 0, 1)));
        assert_eq!(parse_timestamp("2026-10-18T12:00:01-0130"), Some(at(13, 30, 1)));
        assert_eq!(
            parse_timestamp("2026-10-18T12:00:01.250"),
            Some(at(12, 0, 1) + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_nullable_column() {
        let strict = Column::new("pid", Coercion::Int);
        let lenient = Column::nullable("pid", Coercion::Int);
        assert!(strict.coerce("-").is_err());
        assert_eq!(lenient.coerce("-").unwrap(), Value::Null);
        assert_eq!(lenient.coerce("[N/A]").unwrap(), Value::Null);
        assert_eq!(lenient.coerce("123").unwrap(), Value::Int(123));
        // a real value that fails to parse is still an error
        assert!(lenient.coerce("12x").is_err());
    }

    #[test]
    fn test_coerce_row_checks_count() {
        let columns = [
            Column::new("a", Coercion::Int),
            Column::new("b", Coercion::Text),
        ];
        let record = coerce_row("t", &columns, &["1", "x"]).unwrap();
        assert_eq!(record.get("a"), Some(&Value::Int(1)));
        assert_eq!(record.get("b"), Some(&Value::from("x")));

        let err = coerce_row("t", &columns, &["1"]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::FieldCount {
                expected: 2,
                found: 1
            }
        ));

        let err = coerce_row("t", &columns, &["one", "x"]).unwrap_err();
        match err {
            DecodeError::Coerce { column, raw, kind } => {
                assert_eq!(column, "a");
                assert_eq!(raw, "one");
                assert_eq!(kind, "integer");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_percent_fraction_in_unit_interval(pct in 0u32..=100) {
            let value = Coercion::Percent.apply(&pct.to_string()).unwrap();
            let fraction = value.as_float().unwrap();
            prop_assert!((0.0..=1.0).contains(&fraction));
            prop_assert!((fraction * 100.0 - pct as f64).abs() < 1e-9);
        }

        #[test]
        fn prop_megabytes_never_exceed_bytes(bytes in 0u64..10_000_000_000) {
            let mb = Coercion::Megabytes.apply(&bytes.to_string()).unwrap().as_float().unwrap();
            prop_assert!(mb >= 0.0);
            prop_assert!((mb - bytes as f64 / 1e6).abs() <= 0.005 + 1e-9);
        }
    }
}
