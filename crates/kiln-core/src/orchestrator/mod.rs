//! Build lifecycle: validate, synthesize, run, optionally run the artifact.
//!
//! The orchestrator owns one [`ProcessRunner`] and a busy flag, so at most one
//! build (and, serially, its artifact run) is in flight. Every observable step
//! is reported through an [`EventDispatcher`].

mod events;
mod state;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

pub use events::{BuildEvent, BuildPhase, EventDispatcher};
pub use state::{ArtifactRun, BuildOutcome, BuildResult, BuildState};

use events::PhaseSink;

use crate::compile::{Command, CommandSynthesizer, Synthesis};
use crate::error::{Error, Result};
use crate::execute::{CancelHandle, ProcessOutput, ProcessRunner, RunStatus};
use crate::request::BuildRequest;
use crate::toolchain::ToolchainProfileStore;

/// Toolchain configuration shared between the UI and the orchestrator.
pub type SharedStore = Arc<RwLock<ToolchainProfileStore>>;

/// Wrap a store for sharing.
pub fn shared_store(store: ToolchainProfileStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

/// Releases the orchestrator's busy flag when dropped.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives builds and reports their progress.
pub struct BuildOrchestrator {
    store: SharedStore,
    dispatcher: Box<dyn EventDispatcher>,
    runner: ProcessRunner,
    busy: Arc<AtomicBool>,
    state: Mutex<BuildState>,
}

impl BuildOrchestrator {
    pub fn new(store: SharedStore, dispatcher: impl EventDispatcher) -> Self {
        Self {
            store,
            dispatcher: Box::new(dispatcher),
            runner: ProcessRunner::new(),
            busy: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(BuildState::Idle),
        }
    }

    /// Orchestrator whose events are delivered on a channel.
    pub fn with_channel(store: SharedStore) -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(store, tx), rx)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn state(&self) -> BuildState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Kill whatever process is running. Returns `false` if none was.
    pub fn cancel(&self) -> bool {
        self.runner.cancel()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.runner.cancel_handle()
    }

    /// Run a build to completion.
    ///
    /// Returns `Err` only for [`Error::Busy`] and [`Error::Configuration`];
    /// every other end of the build is a [`BuildOutcome`].
    pub async fn submit(&self, request: BuildRequest) -> Result<BuildOutcome> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        self.execute(request).await
    }

    /// Start a build on a background task.
    ///
    /// The busy flag is taken before returning, so a second `spawn` is
    /// rejected immediately with [`Error::Busy`].
    pub fn spawn(self: &Arc<Self>, request: BuildRequest) -> Result<JoinHandle<Result<BuildOutcome>>> {
        let busy = BusyGuard::acquire(&self.busy)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _busy = busy;
            this.execute(request).await
        }))
    }

    /// Run the artifact of a previous build.
    pub async fn run_artifact(&self, request: &BuildRequest) -> Result<ArtifactRun> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        request.validate()?;
        let request = request.clone().resolved()?;
        let store = self.store.read().await.clone();
        match self.run_produced(&request, &store).await? {
            Some(run) => Ok(run),
            None => Err(Error::config(format!(
                "{} {} builds produce nothing to run",
                request.language, request.build_type
            ))),
        }
    }

    async fn execute(&self, request: BuildRequest) -> Result<BuildOutcome> {
        self.set_state(BuildState::Validating);
        let request = match prepare(request) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Build rejected: {}", e);
                self.set_state(BuildState::Idle);
                return Err(e);
            }
        };

        self.set_state(BuildState::Synthesizing);
        // Snapshot so no lock is held while the compiler runs.
        let store = self.store.read().await.clone();
        let command = match CommandSynthesizer::new(&store).synthesize(&request) {
            Ok(Synthesis::Command(command)) => command,
            Ok(Synthesis::Unsupported { reason }) => {
                tracing::info!("Unsupported request: {}", reason);
                self.dispatcher.dispatch(BuildEvent::Unsupported { reason: reason.clone() });
                self.set_state(BuildState::Idle);
                return Ok(BuildOutcome::Unsupported { reason });
            }
            Err(e) => {
                tracing::warn!("Synthesis failed: {}", e);
                self.set_state(BuildState::Idle);
                return Err(e);
            }
        };

        self.set_state(BuildState::Running);
        let output = match self.run_phase(BuildPhase::Build, &command, request.source_dir()).await {
            Ok(output) => output,
            Err(message) => {
                self.finish(BuildState::LaunchFailed);
                return Ok(BuildOutcome::LaunchFailed { message });
            }
        };

        let code = match output.status {
            RunStatus::Cancelled => {
                self.dispatcher.dispatch(BuildEvent::Stopped { phase: BuildPhase::Build });
                self.finish(BuildState::Stopped);
                return Ok(BuildOutcome::Stopped);
            }
            RunStatus::Exited(code) => code,
        };

        let result = BuildResult::from_output(code, output);
        if !result.success() {
            self.dispatcher.dispatch(BuildEvent::Failed {
                phase: BuildPhase::Build,
                exit_code: Some(code),
                message: format!("Build failed with exit code {code}"),
                diagnostics: result.diagnostics.clone(),
            });
            self.finish(BuildState::Failed);
            return Ok(BuildOutcome::Failed { result });
        }

        self.dispatcher.dispatch(BuildEvent::Finished {
            phase: BuildPhase::Build,
            exit_code: code,
            diagnostics: result.diagnostics.clone(),
        });
        self.set_state(BuildState::Succeeded);

        let run = if request.auto_run {
            match self.run_produced(&request, &store).await {
                Ok(run) => run,
                Err(e) => Some(self.report_run_failure(e.to_string())),
            }
        } else {
            None
        };

        self.set_state(BuildState::Idle);
        Ok(BuildOutcome::Succeeded { result, run })
    }

    /// Run the produced artifact as a separate process. `Ok(None)` when the
    /// build type has nothing to run.
    async fn run_produced(&self, request: &BuildRequest, store: &ToolchainProfileStore) -> Result<Option<ArtifactRun>> {
        let Some(invocation) = CommandSynthesizer::new(store).run_invocation(request)? else {
            return Ok(None);
        };

        if !invocation.artifact.exists() {
            let message = format!("Artifact not found: {}", invocation.artifact.display());
            self.dispatcher.dispatch(BuildEvent::Failed {
                phase: BuildPhase::Run,
                exit_code: None,
                message,
                diagnostics: Vec::new(),
            });
            return Ok(Some(ArtifactRun::Missing {
                path: invocation.artifact,
            }));
        }

        self.set_state(BuildState::Running);
        let output = match self
            .run_phase(BuildPhase::Run, &invocation.command, &invocation.working_dir)
            .await
        {
            Ok(output) => output,
            Err(message) => {
                self.finish(BuildState::LaunchFailed);
                return Ok(Some(ArtifactRun::LaunchFailed { message }));
            }
        };

        let run = match output.status {
            RunStatus::Cancelled => {
                self.dispatcher.dispatch(BuildEvent::Stopped { phase: BuildPhase::Run });
                self.finish(BuildState::Stopped);
                ArtifactRun::Stopped
            }
            RunStatus::Exited(exit_code) => {
                self.dispatcher.dispatch(BuildEvent::Finished {
                    phase: BuildPhase::Run,
                    exit_code,
                    diagnostics: Vec::new(),
                });
                self.finish(BuildState::Succeeded);
                ArtifactRun::Completed {
                    exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                }
            }
        };
        Ok(Some(run))
    }

    /// Spawn one process, streaming its output. A launch failure is reported
    /// as a `Failed` event and returned as its message.
    async fn run_phase(
        &self,
        phase: BuildPhase,
        command: &Command,
        working_dir: &Path,
    ) -> std::result::Result<ProcessOutput, String> {
        self.dispatcher.dispatch(BuildEvent::Started {
            phase,
            command: command.preview(),
        });
        let sink = PhaseSink {
            dispatcher: self.dispatcher.as_ref(),
            phase,
        };
        match self.runner.run(command, Some(working_dir), &sink).await {
            Ok(output) => Ok(output),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("{:?} phase failed to start: {}", phase, message);
                self.dispatcher.dispatch(BuildEvent::Failed {
                    phase,
                    exit_code: None,
                    message: message.clone(),
                    diagnostics: Vec::new(),
                });
                Err(message)
            }
        }
    }

    fn report_run_failure(&self, message: String) -> ArtifactRun {
        tracing::warn!("Auto-run skipped: {}", message);
        self.dispatcher.dispatch(BuildEvent::Failed {
            phase: BuildPhase::Run,
            exit_code: None,
            message: message.clone(),
            diagnostics: Vec::new(),
        });
        ArtifactRun::LaunchFailed { message }
    }

    /// Enter a terminal state, then return to idle.
    fn finish(&self, terminal: BuildState) {
        self.set_state(terminal);
        self.set_state(BuildState::Idle);
    }

    fn set_state(&self, next: BuildState) {
        let changed = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *state != next;
            *state = next;
            changed
        };
        if changed {
            tracing::debug!("Build state -> {:?}", next);
            self.dispatcher.dispatch(BuildEvent::StateChanged { state: next });
        }
    }
}

/// Request invariants, absolute paths and a source existence check.
fn prepare(request: BuildRequest) -> Result<BuildRequest> {
    request.validate()?;
    let request = request.resolved()?;
    if !request.source_path.exists() {
        return Err(Error::config(format!(
            "Source file does not exist: {}",
            request.source_path.display()
        )));
    }
    Ok(request)
}
