//! Core engine for the kiln multi-toolchain build runner.
//!
//! This crate provides:
//! - Toolchain configuration (profiles, library locations, JSON persistence)
//! - Command synthesis for GCC, Clang, MSVC, CSC and JAVAC
//! - Child process execution with streamed output and cancellation
//! - Diagnostic triage of compiler output
//! - The build orchestrator state machine and its event stream

pub mod compile;
pub mod diagnostics;
pub mod error;
pub mod execute;
pub mod orchestrator;
pub mod request;
pub mod toolchain;

pub use compile::{Command, CommandSynthesizer, Invocation, Synthesis, derive_output_path};
pub use diagnostics::{Category, Diagnostic, Severity, classify, render_summary};
pub use error::{Error, Result};
pub use execute::{CancelHandle, OutputSink, OutputStream, ProcessOutput, ProcessRunner, RunStatus};
pub use orchestrator::{
    ArtifactRun, BuildEvent, BuildOrchestrator, BuildOutcome, BuildPhase, BuildResult, BuildState,
    EventDispatcher, SharedStore, shared_store,
};
pub use request::{BuildRequest, BuildType, CompilerId, Language, Library};
pub use toolchain::{LibrarySpec, LinkNameForm, ToolchainProfile, ToolchainProfileStore};
