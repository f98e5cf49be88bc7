//! `kiln config` subcommands.

use std::path::Path;
use std::process::ExitCode;

use kiln_core::toolchain::{JAVA_RUNTIME, check_library, detect_toolchains};
use kiln_core::{CompilerId, ToolchainProfileStore};

use crate::ConfigCommand;
use crate::colors;

pub async fn execute(config_path: &Path, action: ConfigCommand) -> anyhow::Result<ExitCode> {
    match action {
        ConfigCommand::Path => {
            println!("{}", config_path.display());
        }

        ConfigCommand::Show => {
            let store = ToolchainProfileStore::load_or_default(config_path)?;
            println!("{}", store.to_json()?);
        }

        ConfigCommand::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            ToolchainProfileStore::defaults().save(config_path)?;
            println!("{}Wrote{} {}", colors::GREEN, colors::RESET, config_path.display());
        }

        ConfigCommand::SetCompiler { id, executable } => {
            let key = compiler_key(&id)?;
            let mut store = ToolchainProfileStore::load_or_default(config_path)?;
            store.set_executable(&key, executable.as_str());
            store.save(config_path)?;
            println!("{key} = {executable}");
        }

        ConfigCommand::SetPath { key, value } => {
            let mut store = ToolchainProfileStore::load_or_default(config_path)?;
            store.set_path(&key, value.as_str());
            store.save(config_path)?;
            println!("{key} = {value}");
        }

        ConfigCommand::Detect { apply } => {
            let detected = detect_toolchains().await;
            if detected.is_empty() {
                println!("{}No compilers found on PATH{}", colors::YELLOW, colors::RESET);
                return Ok(ExitCode::SUCCESS);
            }

            println!("{}Detected compilers:{}", colors::BOLD, colors::RESET);
            for found in &detected {
                println!(
                    "  {}{:<6}{} {} {}{}{}",
                    colors::CYAN,
                    found.compiler,
                    colors::RESET,
                    found.path.display(),
                    colors::DIM,
                    found.version.as_deref().unwrap_or(""),
                    colors::RESET
                );
            }

            if apply {
                let mut store = ToolchainProfileStore::load_or_default(config_path)?;
                let updated = store.apply_detected(&detected);
                if updated.is_empty() {
                    println!("Configured compilers already resolve; nothing changed");
                } else {
                    store.save(config_path)?;
                    println!(
                        "{}Updated:{} {}",
                        colors::GREEN,
                        colors::RESET,
                        updated.join(", ")
                    );
                }
            }
        }

        ConfigCommand::CheckLib { library, compiler } => {
            let store = ToolchainProfileStore::load_or_default(config_path)?;
            let check = check_library(&store, library, compiler).ok_or_else(|| {
                anyhow::anyhow!(
                    "{:?} is not configured for {}",
                    library,
                    compiler.display_name()
                )
            })?;

            let mark = |found: bool| {
                if found {
                    format!("{}found{}", colors::GREEN, colors::RESET)
                } else {
                    format!("{}missing{}", colors::RED, colors::RESET)
                }
            };
            println!("include {} [{}]", check.include_dir, mark(check.include_found));
            println!("lib     {} [{}]", check.lib_dir, mark(check.lib_found));

            if !check.is_ok() {
                return Ok(ExitCode::from(1));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Normalize a compiler id, accepting the Java runtime as well.
fn compiler_key(id: &str) -> anyhow::Result<String> {
    if id.eq_ignore_ascii_case(JAVA_RUNTIME) {
        return Ok(JAVA_RUNTIME.to_string());
    }
    let compiler: CompilerId = id.parse()?;
    Ok(compiler.as_str().to_string())
}
