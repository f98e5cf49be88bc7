//! Process execution for compiler and artifact runs.
//!
//! ```text
//! Command ──► ProcessRunner::run
//!                 │
//!                 ├── child (stdin null, stdout/stderr piped)
//!                 │       ├── stdout reader task ──┐
//!                 │       └── stderr reader task ──┴─► channel ─► OutputSink
//!                 │
//!                 └── CancelHandle::cancel ─► kill + reap ─► RunStatus::Cancelled
//! ```
//!
//! Ordering is preserved within each stream. The interleaving of stdout and
//! stderr lines is whatever the scheduler delivers.

mod process;

pub use process::{
    CancelHandle, DiscardOutput, OutputSink, OutputStream, ProcessOutput, ProcessRunner, RunStatus,
};
