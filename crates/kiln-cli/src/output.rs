//! Rendering of build events for the terminal.

use kiln_core::{ArtifactRun, BuildEvent, BuildOutcome, BuildPhase, OutputStream, render_summary};

use crate::colors;

/// Prints events either as colored text or as JSON lines.
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event(&self, event: &BuildEvent) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        match event {
            BuildEvent::StateChanged { state } => tracing::debug!("state: {:?}", state),
            BuildEvent::Started { phase, command } => {
                println!(
                    "{}{}{} {}{}{}",
                    colors::BOLD,
                    phase_verb(*phase),
                    colors::RESET,
                    colors::DIM,
                    command,
                    colors::RESET
                );
                println!("{}", "─".repeat(50));
            }
            BuildEvent::OutputLine { stream, line, .. } => match stream {
                OutputStream::Stdout => println!("{line}"),
                OutputStream::Stderr => eprintln!("{line}"),
            },
            BuildEvent::Finished {
                phase: BuildPhase::Build,
                diagnostics,
                ..
            } => {
                println!("{}", "─".repeat(50));
                println!("{}Build succeeded{}", colors::GREEN, colors::RESET);
                if !diagnostics.is_empty() {
                    println!("{}", render_summary(diagnostics));
                }
            }
            BuildEvent::Finished {
                phase: BuildPhase::Run,
                exit_code,
                ..
            } => {
                println!("{}", "─".repeat(50));
                println!(
                    "{}Program finished with exit code {}{}",
                    colors::CYAN,
                    exit_code,
                    colors::RESET
                );
            }
            BuildEvent::Failed {
                message,
                diagnostics,
                exit_code,
                ..
            } => {
                println!("{}", "─".repeat(50));
                println!("{}{}{}", colors::RED, message, colors::RESET);
                // Launch failures carry no compiler output to triage.
                if exit_code.is_some() {
                    println!("{}Error summary:{}", colors::BOLD, colors::RESET);
                    println!("{}", render_summary(diagnostics));
                }
            }
            BuildEvent::Stopped { phase } => {
                println!("{}{} stopped{}", colors::YELLOW, phase_noun(*phase), colors::RESET);
            }
            BuildEvent::Unsupported { reason } => {
                println!("{}{}{}", colors::YELLOW, reason, colors::RESET);
            }
        }
        Ok(())
    }

    /// Final line for JSON consumers; human output already said everything.
    pub fn outcome(&self, outcome: &BuildOutcome) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(outcome)?);
        }
        Ok(())
    }

    pub fn artifact_run(&self, run: &ArtifactRun) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(run)?);
        }
        Ok(())
    }
}

fn phase_verb(phase: BuildPhase) -> &'static str {
    match phase {
        BuildPhase::Build => "Building",
        BuildPhase::Run => "Running",
    }
}

fn phase_noun(phase: BuildPhase) -> &'static str {
    match phase {
        BuildPhase::Build => "Build",
        BuildPhase::Run => "Program",
    }
}
