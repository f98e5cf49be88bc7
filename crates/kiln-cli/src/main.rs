//! Kiln CLI - build and run single source files with any configured toolchain.

mod build;
mod colors;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use kiln_core::{CompilerId, Language, Library, ToolchainProfileStore};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Multi-toolchain build runner for C++, C# and Java sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to compiler_config.json (default: $KILN_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Options shared by every command that describes a build.
#[derive(Args, Clone)]
pub struct BuildArgs {
    /// Source file to compile
    pub source: PathBuf,

    /// Source language (cpp, csharp, java, jni); inferred from the extension if omitted
    #[arg(long)]
    pub language: Option<Language>,

    /// Compiler (gcc, clang, msvc, csc, javac); defaults to the first valid one
    #[arg(short, long)]
    pub compiler: Option<CompilerId>,

    /// Build a shared library instead of an executable
    #[arg(long)]
    pub shared: bool,

    /// Cryptography library to link (none, cryptopp, openssl)
    #[arg(long, default_value = "none")]
    pub library: Library,

    /// Output path; derived as <sourceDir>/<compiler>/<name> if omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not emit debug information
    #[arg(long)]
    pub no_debug: bool,

    /// Disable optimizations
    #[arg(long)]
    pub no_optimize: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file
    Build {
        #[command(flatten)]
        target: BuildArgs,

        /// Run the produced executable after a successful build
        #[arg(long)]
        run: bool,

        /// Print one JSON event per line
        #[arg(long)]
        json: bool,
    },

    /// Print the command a build would run, without running it
    Preview {
        #[command(flatten)]
        target: BuildArgs,
    },

    /// Run the artifact of a previous build
    Run {
        #[command(flatten)]
        target: BuildArgs,

        /// Print one JSON event per line
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit the toolchain configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location
    Path,

    /// Print the effective configuration (file merged onto defaults)
    Show,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set a compiler executable (gcc, clang, msvc, csc, javac or java)
    SetCompiler { id: String, executable: String },

    /// Set a path entry such as cryptopp_root or openssl_lib_gcc
    SetPath { key: String, value: String },

    /// Look for compilers on PATH
    Detect {
        /// Store detected compilers for profiles that are unset or broken
        #[arg(long)]
        apply: bool,
    },

    /// Check that a library's include and lib directories exist
    CheckLib { library: Library, compiler: CompilerId },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Helper to format kiln-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(kiln_err) = err.downcast_ref::<kiln_core::Error>() {
            anyhow::anyhow!("{}", kiln_err.with_hint())
        } else {
            err
        }
    };

    let config_path = match cli.config {
        Some(path) => path,
        None => ToolchainProfileStore::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine a config directory; pass --config"))?,
    };

    let code = match cli.command {
        Commands::Build { target, run, json } => {
            build::execute(&config_path, &target, run, json).await.map_err(format_error)?
        }
        Commands::Preview { target } => build::preview(&config_path, &target).map_err(format_error)?,
        Commands::Run { target, json } => {
            build::run(&config_path, &target, json).await.map_err(format_error)?
        }
        Commands::Config { action } => {
            config::execute(&config_path, action).await.map_err(format_error)?
        }
    };

    Ok(code)
}
