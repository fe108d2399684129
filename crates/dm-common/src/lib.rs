//! diagmon common types, IDs, and errors.
//!
//! This crate provides the foundational types shared across dm-core modules:
//! - Run identity and time bounds attached to every record
//! - Typed record values and per-source tables
//! - Common error types

pub mod error;
pub mod id;
pub mod record;
pub mod run;

pub use error::{Error, Result};
pub use id::RunId;
pub use record::{Record, Table, Value, TIMESTAMP_FORMAT};
pub use run::{RunContext, RUN_END_FIELD, RUN_ID_FIELD, RUN_START_FIELD};
