//! Error types shared by diagmon crates.

use thiserror::Error;

/// Result type alias for dm-common operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for shared record and run handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid run id: {0}")]
    InvalidRunId(String),

    #[error("run {run_id} already closed")]
    RunAlreadyClosed { run_id: String },

    #[error("record from source {actual} cannot join table for {expected}")]
    SourceMismatch { expected: String, actual: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SourceMismatch {
            expected: "vmstat".into(),
            actual: "iostat".into(),
        };
        assert_eq!(
            err.to_string(),
            "record from source iostat cannot join table for vmstat"
        );
    }
}
