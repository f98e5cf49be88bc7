//! Build lifecycle states and results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{self, Diagnostic};
use crate::execute::ProcessOutput;

/// Lifecycle of one build.
///
/// `Idle → Validating → Synthesizing → Running → {Succeeded, Failed,
/// LaunchFailed, Stopped} → Idle`. A failed validation or synthesis returns
/// straight to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    #[default]
    Idle,
    Validating,
    Synthesizing,
    Running,
    Succeeded,
    Failed,
    LaunchFailed,
    Stopped,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::LaunchFailed | Self::Stopped
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Validating | Self::Synthesizing | Self::Running)
    }
}

/// Captured compiler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildResult {
    /// Classify stderr then stdout of a finished compiler run.
    pub(crate) fn from_output(exit_code: i32, output: ProcessOutput) -> Self {
        let diagnostics = diagnostics::classify_lines(output.stderr.lines().chain(output.stdout.lines()));
        Self {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            diagnostics,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of running a produced artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactRun {
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Stopped,
    LaunchFailed {
        message: String,
    },
    Missing {
        path: PathBuf,
    },
}

/// Final result of [`super::BuildOrchestrator::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Compiler exited 0. `run` is set when auto-run executed the artifact.
    Succeeded {
        result: BuildResult,
        run: Option<ArtifactRun>,
    },
    /// Compiler exited non-zero.
    Failed { result: BuildResult },
    /// The compiler could not be started.
    LaunchFailed { message: String },
    /// Cancelled while the compiler was running.
    Stopped,
    Unsupported { reason: String },
}

impl BuildOutcome {
    pub fn state(&self) -> BuildState {
        match self {
            Self::Succeeded { .. } => BuildState::Succeeded,
            Self::Failed { .. } => BuildState::Failed,
            Self::LaunchFailed { .. } => BuildState::LaunchFailed,
            Self::Stopped => BuildState::Stopped,
            Self::Unsupported { .. } => BuildState::Idle,
        }
    }

    pub fn result(&self) -> Option<&BuildResult> {
        match self {
            Self::Succeeded { result, .. } | Self::Failed { result } => Some(result),
            _ => None,
        }
    }
}
