//! diagmon core library.
//!
//! Supervises external diagnostic samplers and turns their raw captures
//! into per-source tables:
//! - `process`: one handle per spawned tool (start, bounded wait, stop)
//! - `decode`: fault-isolated decoders, one per source format
//! - `sources`: the standard sampler catalog
//! - `session`: poll loop, shutdown, and harvest
//! - `output`: CSV tables and the session manifest
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod decode;
pub mod exit_codes;
pub mod logging;
pub mod output;
pub mod process;
pub mod session;
pub mod sources;

pub use session::{RunOutcome, Session, SessionError, SessionReport, SourceFailure};
