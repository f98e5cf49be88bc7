//! Events emitted to the UI layer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::state::BuildState;
use crate::diagnostics::Diagnostic;
use crate::execute::{OutputSink, OutputStream};

/// Which process an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    /// The compiler.
    Build,
    /// The produced artifact.
    Run,
}

/// Lifecycle notifications, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    StateChanged {
        state: BuildState,
    },

    /// A process is about to be spawned. `command` is the preview form.
    Started {
        phase: BuildPhase,
        command: String,
    },

    OutputLine {
        phase: BuildPhase,
        stream: OutputStream,
        line: String,
    },

    /// The process ran to completion. For the build phase this means exit 0.
    Finished {
        phase: BuildPhase,
        exit_code: i32,
        diagnostics: Vec<Diagnostic>,
    },

    /// Non-zero compiler exit (`exit_code` set) or launch failure (`exit_code` unset).
    Failed {
        phase: BuildPhase,
        exit_code: Option<i32>,
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    Stopped {
        phase: BuildPhase,
    },

    Unsupported {
        reason: String,
    },
}

/// Delivers events into the UI's own context.
///
/// The orchestrator calls `dispatch` from its worker task; implementations
/// must not touch UI state directly.
pub trait EventDispatcher: Send + Sync + 'static {
    fn dispatch(&self, event: BuildEvent);
}

impl EventDispatcher for mpsc::UnboundedSender<BuildEvent> {
    fn dispatch(&self, event: BuildEvent) {
        // A closed receiver means the UI has gone away.
        let _ = self.send(event);
    }
}

/// Forwards process output as [`BuildEvent::OutputLine`].
pub(crate) struct PhaseSink<'a> {
    pub(crate) dispatcher: &'a dyn EventDispatcher,
    pub(crate) phase: BuildPhase,
}

impl OutputSink for PhaseSink<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        self.dispatcher.dispatch(BuildEvent::OutputLine {
            phase: self.phase,
            stream,
            line: line.to_string(),
        });
    }
}
