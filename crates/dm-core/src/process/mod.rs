//! Process supervision primitives.
//!
//! - [`ProcessSpec`]: immutable command description (name, argv, cwd, env,
//!   capture target)
//! - [`ProcessHandle`]: one spawned OS process with bounded-timeout polling
//!   and SIGTERM → SIGKILL termination
//! - [`StderrTail`]: bounded stderr retention

mod handle;
mod spec;
mod stderr;

pub use handle::{HandleOptions, ProcessError, ProcessHandle, ProcessState, StopOutcome, WaitStatus};
pub use spec::{Capture, ProcessSpec};
pub use stderr::StderrTail;
