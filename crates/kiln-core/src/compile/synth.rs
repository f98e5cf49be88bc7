//! Command synthesis.
//!
//! Maps a [`BuildRequest`] and the current toolchain configuration to the
//! exact argument vector each compiler family expects. Synthesis is pure:
//! the same request against the same store always yields the same command.

use std::path::{Path, PathBuf};

use crate::compile::Command;
use crate::error::{Error, Result};
use crate::request::{BuildRequest, BuildType, CompilerId, Language};
use crate::toolchain::{LibrarySpec, ToolchainProfile, ToolchainProfileStore};

/// Message shown for JNI requests.
pub const JNI_UNSUPPORTED: &str = "JNI build requires multiple steps. Use the full JNI workflow.";

/// Result of synthesizing a build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    Command(Command),
    /// The request shape is recognized but not buildable here. Never executed.
    Unsupported { reason: String },
}

impl Synthesis {
    pub fn command(&self) -> Option<&Command> {
        match self {
            Self::Command(cmd) => Some(cmd),
            Self::Unsupported { .. } => None,
        }
    }

    /// Preview text, or the unsupported reason.
    pub fn preview(&self) -> String {
        match self {
            Self::Command(cmd) => cmd.preview(),
            Self::Unsupported { reason } => reason.clone(),
        }
    }
}

/// How to run a produced artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub working_dir: PathBuf,
    /// File that must exist before the run can start.
    pub artifact: PathBuf,
}

/// Builds compiler invocations from a toolchain store.
pub struct CommandSynthesizer<'a> {
    store: &'a ToolchainProfileStore,
}

impl<'a> CommandSynthesizer<'a> {
    pub fn new(store: &'a ToolchainProfileStore) -> Self {
        Self { store }
    }

    /// Synthesize the compiler invocation for `request`.
    ///
    /// Fails with [`Error::Configuration`] when the request is incomplete or
    /// the selected compiler has no executable configured.
    pub fn synthesize(&self, request: &BuildRequest) -> Result<Synthesis> {
        request.validate()?;

        if request.language == Language::Jni {
            return Ok(Synthesis::Unsupported {
                reason: JNI_UNSUPPORTED.to_string(),
            });
        }

        let profile = self
            .store
            .profile(request.compiler)
            .filter(|profile| profile.is_configured())
            .ok_or_else(|| {
                Error::config(format!("Please configure {} compiler path", request.compiler))
            })?;

        let library = self.store.library_spec(request.library, request.compiler);
        let command = match request.compiler {
            CompilerId::Gcc | CompilerId::Clang => gcc_family(request, profile, library.as_ref()),
            CompilerId::Msvc => msvc(request, profile, library.as_ref()),
            CompilerId::Csc => csc(request, profile),
            CompilerId::Javac => javac(request, profile),
        };

        tracing::debug!("Synthesized: {}", command.preview());
        Ok(Synthesis::Command(command))
    }

    /// Invocation that runs the artifact of a successful build.
    ///
    /// `Ok(None)` for shared libraries and JNI, which have nothing to run.
    pub fn run_invocation(&self, request: &BuildRequest) -> Result<Option<Invocation>> {
        if request.build_type == BuildType::SharedLibrary && request.language != Language::Java {
            return Ok(None);
        }

        match request.language {
            Language::Jni => Ok(None),
            Language::Cpp | Language::CSharp => {
                let artifact = &request.output_path;
                let working_dir = match artifact.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                Ok(Some(Invocation {
                    command: Command::new(path_arg(artifact)),
                    working_dir,
                    artifact: artifact.clone(),
                }))
            }
            Language::Java => {
                let java = self
                    .store
                    .java_runtime()
                    .filter(|profile| profile.is_configured())
                    .ok_or_else(|| Error::config("Please configure Java runtime path"))?;
                let class_name = request
                    .source_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                // javac writes the class file next to the source.
                let class_dir = request.source_dir().to_path_buf();
                Ok(Some(Invocation {
                    artifact: class_dir.join(format!("{class_name}.class")),
                    command: Command::new(&java.executable)
                        .arg("-cp")
                        .arg(path_arg(&class_dir))
                        .arg(class_name),
                    working_dir: class_dir,
                }))
            }
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn gcc_family(request: &BuildRequest, profile: &ToolchainProfile, library: Option<&LibrarySpec>) -> Command {
    let mut cmd = Command::new(&profile.executable);

    if request.debug {
        cmd.push("-g2");
    }
    if request.optimize {
        cmd = cmd.args(["-O3", "-DNDEBUG"]);
    } else {
        cmd = cmd.args(["-O0", "-DDEBUG"]);
    }

    cmd = cmd
        .arg(path_arg(&request.source_path))
        .arg("-o")
        .arg(path_arg(&request.output_path));
    if request.build_type == BuildType::SharedLibrary {
        cmd.push("-shared");
    }
    cmd = cmd
        .args(["-D_WIN32_WINNT=0x0501", "-lpthread", "-Wall", "-std=c++17"])
        .args(profile.default_flags.iter().cloned());

    if let Some(spec) = library {
        if !spec.include_dir.is_empty() {
            cmd.push(format!("-I{}", spec.include_dir));
        }
        if !spec.lib_dir.is_empty() {
            cmd.push(format!("-L{}", spec.lib_dir));
            for name in spec.link_names.names() {
                if name.starts_with("-l") {
                    cmd.push(name);
                } else {
                    cmd.push(format!("-l{name}"));
                }
            }
            cmd = cmd.args(profile.link_libs.iter().cloned());
        }
    }

    cmd
}

fn msvc(request: &BuildRequest, profile: &ToolchainProfile, library: Option<&LibrarySpec>) -> Command {
    let out_dir = match request.output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => path_arg(dir),
        _ => ".".to_string(),
    };

    let mut cmd = Command::new(&profile.executable).args(["/MTd", "/GS", "/W4", "/Zi", "/nologo", "/EHsc"]);
    if request.optimize {
        cmd.push("/O2");
    }
    cmd = cmd
        .args(profile.default_flags.iter().cloned())
        .arg(format!("/Fo{out_dir}\\"))
        .arg(format!("/Fd{out_dir}\\vc140.pdb"))
        .arg(path_arg(&request.source_path));

    // Compiler options must precede /link.
    if let Some(spec) = library.filter(|spec| !spec.include_dir.is_empty()) {
        cmd.push(format!("/I{}", spec.include_dir));
    }

    cmd = cmd
        .arg("/link")
        .arg(format!("/OUT:{}", path_arg(&request.output_path)));
    if request.build_type == BuildType::SharedLibrary {
        cmd.push("/DLL");
    }

    if let Some(spec) = library.filter(|spec| !spec.lib_dir.is_empty()) {
        cmd = cmd
            .arg(format!("/LIBPATH:{}", spec.lib_dir))
            .args(spec.link_names.names())
            .args(profile.link_libs.iter().cloned())
            .arg("/MACHINE:X64");
    }

    cmd
}

fn csc(request: &BuildRequest, profile: &ToolchainProfile) -> Command {
    let mut cmd = Command::new(&profile.executable).arg("/nologo");
    if request.debug {
        cmd.push("/debug");
    }
    if request.optimize {
        cmd.push("/optimize+");
    }
    cmd.arg("/warn:4")
        .args(profile.default_flags.iter().cloned())
        .arg(path_arg(&request.source_path))
        .arg(format!("/out:{}", path_arg(&request.output_path)))
}

fn javac(request: &BuildRequest, profile: &ToolchainProfile) -> Command {
    Command::new(&profile.executable)
        .args(profile.default_flags.iter().cloned())
        .arg(path_arg(&request.source_path))
}
