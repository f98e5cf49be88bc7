//! Error types for kiln-core.

use thiserror::Error;

/// Result type for kiln-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kiln-core.
///
/// A compiler that runs and exits non-zero is not an error: that is reported
/// through [`crate::orchestrator::BuildOutcome::Failed`].
#[derive(Debug, Error)]
pub enum Error {
    /// The request or toolchain configuration is incomplete. The build never starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operating system refused to start the process.
    #[error("failed to launch '{program}': {message}")]
    Launch { program: String, message: String },

    /// A build or run is already in flight.
    #[error("a build is already running")]
    Busy,

    /// A value could not be parsed (compiler id, language, ...).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// A short recovery hint for the user, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Configuration(msg) if msg.contains("compiler path") => Some(
                "set the executable with `kiln config set-compiler <id> <path>` or run `kiln config detect --apply`",
            ),
            Self::Configuration(_) => Some("check the source/output paths and the selected compiler"),
            Self::Launch { .. } => Some("verify the executable exists and is runnable"),
            Self::Busy => Some("wait for the current build to finish or cancel it"),
            _ => None,
        }
    }

    /// Format the error followed by its hint on a second line.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
