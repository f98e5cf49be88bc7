//! Child process execution with streamed output and hard cancellation.
//!
//! Each run spawns exactly one child with piped stdout/stderr. Two reader
//! tasks forward decoded lines through a channel to the run loop, which
//! captures them and hands them to an [`OutputSink`]. A [`CancelHandle`]
//! kills the child from any thread; the run then resolves with
//! [`RunStatus::Cancelled`] after the child has been reaped.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::compile::Command;
use crate::error::{Error, Result};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives output lines as they arrive.
///
/// Called from the task driving the run; implementations that touch UI state
/// must marshal to their own context.
pub trait OutputSink: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(OutputStream, &str) + Send + Sync,
{
    fn on_line(&self, stream: OutputStream, line: &str) {
        self(stream, line)
    }
}

/// Sink that drops every line.
pub struct DiscardOutput;

impl OutputSink for DiscardOutput {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum RunStatus {
    /// Exit code; `-1` when the child was terminated by a signal.
    Exited(i32),
    Cancelled,
}

/// Everything captured from one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            RunStatus::Exited(code) => Some(code),
            RunStatus::Cancelled => None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == RunStatus::Exited(0)
    }
}

type CurrentRun = Arc<Mutex<Option<Arc<Notify>>>>;

fn lock(current: &CurrentRun) -> MutexGuard<'_, Option<Arc<Notify>>> {
    current.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe handle for killing the runner's in-flight process.
#[derive(Clone)]
pub struct CancelHandle {
    current: CurrentRun,
}

impl CancelHandle {
    /// Request termination of the current child.
    ///
    /// Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match lock(&self.current).as_ref() {
            Some(notify) => {
                // A stored permit survives until the run loop polls for it.
                notify.notify_one();
                true
            }
            None => false,
        }
    }
}

/// Runs one child process at a time.
#[derive(Default)]
pub struct ProcessRunner {
    busy: Arc<AtomicBool>,
    current: CurrentRun,
}

/// Holds the busy flag and the current cancel slot for the duration of a run.
struct RunGuard {
    busy: Arc<AtomicBool>,
    current: CurrentRun,
}

impl RunGuard {
    fn acquire(runner: &ProcessRunner, cancel: Arc<Notify>) -> Result<Self> {
        // Flag and cancel slot change together under the lock.
        let mut current = lock(&runner.current);
        runner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        *current = Some(cancel);
        drop(current);
        Ok(Self {
            busy: Arc::clone(&runner.busy),
            current: Arc::clone(&runner.current),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *lock(&self.current) = None;
        self.busy.store(false, Ordering::Release);
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// Kill the in-flight process, if any.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run `command` to completion or cancellation.
    ///
    /// Fails with [`Error::Busy`] if another run is in flight and with
    /// [`Error::Launch`] if the process cannot be started. A non-zero exit is
    /// a normal [`RunStatus::Exited`].
    pub async fn run(
        &self,
        command: &Command,
        working_dir: Option<&Path>,
        sink: &dyn OutputSink,
    ) -> Result<ProcessOutput> {
        let cancel = Arc::new(Notify::new());
        let _guard = RunGuard::acquire(self, Arc::clone(&cancel))?;

        let mut cmd = tokio::process::Command::new(&command.executable);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(windows)]
        cmd.creation_flags(windows_sys::Win32::System::Threading::CREATE_NO_WINDOW);

        let mut child = cmd.spawn().map_err(|e| Error::Launch {
            program: command.executable.clone(),
            message: e.to_string(),
        })?;
        tracing::info!("Spawned {} (pid {:?})", command.executable, child.id());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let readers = [
            spawn_reader(child.stdout.take(), OutputStream::Stdout, tx.clone()),
            spawn_reader(child.stderr.take(), OutputStream::Stderr, tx),
        ];

        let mut stdout = String::new();
        let mut stderr = String::new();

        let cancelled = cancel.notified();
        tokio::pin!(cancelled);

        // Pump output until both pipes close.
        let mut was_cancelled = loop {
            tokio::select! {
                biased;
                _ = &mut cancelled => break true,
                message = rx.recv() => match message {
                    Some((stream, line)) => {
                        let buffer = match stream {
                            OutputStream::Stdout => &mut stdout,
                            OutputStream::Stderr => &mut stderr,
                        };
                        buffer.push_str(&line);
                        buffer.push('\n');
                        sink.on_line(stream, &line);
                    }
                    None => break false,
                },
            }
        };

        let mut exit_status = None;
        if !was_cancelled {
            tokio::select! {
                biased;
                _ = &mut cancelled => was_cancelled = true,
                status = child.wait() => exit_status = Some(status?),
            }
        }

        if was_cancelled {
            tracing::info!("Cancelling {}", command.executable);
            if let Err(e) = child.start_kill() {
                tracing::debug!("start_kill failed: {}", e);
            }
            // Reap so no zombie is left behind.
            let reaped = child.wait().await;
            tracing::debug!("Reaped cancelled child: {:?}", reaped);
            for reader in &readers {
                reader.abort();
            }
            return Ok(ProcessOutput {
                status: RunStatus::Cancelled,
                stdout,
                stderr,
            });
        }

        let code = exit_status.and_then(|status| status.code()).unwrap_or(-1);
        tracing::info!("{} exited with code {}", command.executable, code);
        Ok(ProcessOutput {
            status: RunStatus::Exited(code),
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<R>(
    pipe: Option<R>,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<(OutputStream, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(pipe) = pipe else {
            return;
        };
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send((stream, decode_line(&buf))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Error reading {:?}: {}", stream, e);
                    break;
                }
            }
        }
    })
}

/// Lossy UTF-8 without the trailing line terminator.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[test]
    fn test_cancel_without_run_is_noop() {
        let runner = ProcessRunner::new();
        assert!(!runner.cancel());
        assert!(!runner.is_busy());
    }

    #[tokio::test]
    async fn test_launch_error_names_program() {
        let runner = ProcessRunner::new();
        let command = Command::new("/definitely/not/a/compiler");
        let err = runner.run(&command, None, &DiscardOutput).await.unwrap_err();
        assert!(matches!(err, Error::Launch { ref program, .. } if program == "/definitely/not/a/compiler"));
        assert!(!runner.is_busy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_both_streams() {
        let runner = ProcessRunner::new();
        let command = Command::new("sh").arg("-c").arg("echo out; echo err >&2; exit 3");
        let output = runner.run(&command, None, &DiscardOutput).await.unwrap();
        assert_eq!(output.status, RunStatus::Exited(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }
}
