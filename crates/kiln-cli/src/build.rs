//! Build, preview and run commands.

use std::future::Future;
use std::path::Path;
use std::process::ExitCode;

use kiln_core::compile::{output_dir, output_file_name};
use kiln_core::{
    BuildEvent, BuildOrchestrator, BuildOutcome, BuildRequest, BuildType, CommandSynthesizer,
    Language, Synthesis, ToolchainProfileStore, shared_store,
};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::BuildArgs;
use crate::colors;
use crate::output::Printer;

/// Exit status when the build was interrupted (128 + SIGINT).
const EXIT_STOPPED: u8 = 130;

/// Compile a source file, optionally running the result.
pub async fn execute(config_path: &Path, args: &BuildArgs, run: bool, json: bool) -> anyhow::Result<ExitCode> {
    let store = ToolchainProfileStore::load_or_default(config_path)?;
    let request = to_request(args)?.with_auto_run(run).with_derived_output()?;
    let printer = Printer::new(json);

    let (orchestrator, mut rx) = BuildOrchestrator::with_channel(shared_store(store));
    let outcome = drive(&orchestrator, &mut rx, &printer, orchestrator.submit(request)).await?;
    printer.outcome(&outcome)?;

    Ok(match outcome {
        BuildOutcome::Succeeded { .. } => ExitCode::SUCCESS,
        BuildOutcome::Failed { .. } => ExitCode::from(1),
        BuildOutcome::LaunchFailed { .. } => ExitCode::from(2),
        BuildOutcome::Unsupported { .. } => ExitCode::from(3),
        BuildOutcome::Stopped => ExitCode::from(EXIT_STOPPED),
    })
}

/// Run the artifact of a previous build.
pub async fn run(config_path: &Path, args: &BuildArgs, json: bool) -> anyhow::Result<ExitCode> {
    let store = ToolchainProfileStore::load_or_default(config_path)?;
    let request = to_request(args)?.with_derived_output()?;
    let printer = Printer::new(json);

    let (orchestrator, mut rx) = BuildOrchestrator::with_channel(shared_store(store));
    let run = drive(&orchestrator, &mut rx, &printer, orchestrator.run_artifact(&request)).await?;
    printer.artifact_run(&run)?;

    Ok(match run {
        kiln_core::ArtifactRun::Completed { exit_code, .. } => {
            ExitCode::from(u8::try_from(exit_code).unwrap_or(1))
        }
        kiln_core::ArtifactRun::Stopped => ExitCode::from(EXIT_STOPPED),
        kiln_core::ArtifactRun::LaunchFailed { .. } => ExitCode::from(2),
        kiln_core::ArtifactRun::Missing { .. } => ExitCode::from(1),
    })
}

/// Print the command a build would run.
pub fn preview(config_path: &Path, args: &BuildArgs) -> anyhow::Result<ExitCode> {
    let store = ToolchainProfileStore::load_or_default(config_path)?;
    let mut request = to_request(args)?;
    if request.output_path.as_os_str().is_empty() {
        // Preview must not create the output directory.
        let stem = request
            .source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        request.output_path = output_dir(&request.source_path, request.compiler).join(output_file_name(
            &stem,
            request.compiler,
            request.language,
            request.build_type,
        ));
    }

    let request = request.resolved()?;
    match CommandSynthesizer::new(&store).synthesize(&request)? {
        Synthesis::Command(command) => println!("{}", command.preview()),
        Synthesis::Unsupported { reason } => {
            println!("{}{}{}", colors::YELLOW, reason, colors::RESET);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Forward events to the printer until `task` finishes. Ctrl-C cancels the
/// running process; the task then resolves on its own.
async fn drive<T>(
    orchestrator: &BuildOrchestrator,
    rx: &mut UnboundedReceiver<BuildEvent>,
    printer: &Printer,
    task: impl Future<Output = kiln_core::Result<T>>,
) -> anyhow::Result<T> {
    tokio::pin!(task);
    let result = loop {
        tokio::select! {
            Some(event) = rx.recv() => printer.event(&event)?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, cancelling");
                orchestrator.cancel();
            }
            result = &mut task => break result,
        }
    };
    while let Ok(event) = rx.try_recv() {
        printer.event(&event)?;
    }
    Ok(result?)
}

/// Build a request from command-line options.
fn to_request(args: &BuildArgs) -> anyhow::Result<BuildRequest> {
    let language = match args.language {
        Some(language) => language,
        None => infer_language(&args.source).ok_or_else(|| {
            anyhow::anyhow!(
                "Cannot infer the language of {}; pass --language",
                args.source.display()
            )
        })?,
    };
    let compiler = args.compiler.unwrap_or_else(|| language.default_compiler());
    let build_type = if args.shared {
        BuildType::SharedLibrary
    } else {
        BuildType::Executable
    };

    let mut request = BuildRequest::new(language, compiler, &args.source)
        .with_build_type(build_type)
        .with_library(args.library)
        .with_flags(!args.no_debug, !args.no_optimize);
    if let Some(output) = &args.output {
        request = request.with_output(output);
    }
    Ok(request)
}

fn infer_language(source: &Path) -> Option<Language> {
    let ext = source.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "cpp" | "cc" | "cxx" | "c" => Some(Language::Cpp),
        "cs" => Some(Language::CSharp),
        "java" => Some(Language::Java),
        _ => None,
    }
}
