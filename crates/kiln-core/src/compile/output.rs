//! Output artifact naming.
//!
//! Every compiler writes into its own `<sourceDir>/<compilerId>/` directory so
//! building the same source with several toolchains never collides.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::request::{BuildType, CompilerId, Language};

/// Artifact file name for a source stem.
pub fn output_file_name(stem: &str, compiler: CompilerId, language: Language, build_type: BuildType) -> String {
    match (language, build_type) {
        (Language::Java, _) => format!("{stem}.class"),
        (Language::CSharp, _) => format!("{stem}_cs.exe"),
        (Language::Cpp | Language::Jni, BuildType::Executable) => format!("{stem}_{}.exe", compiler.as_str()),
        (Language::Cpp | Language::Jni, BuildType::SharedLibrary) => format!("{stem}_{}.dll", compiler.as_str()),
    }
}

/// Per-compiler output directory for a source file.
pub fn output_dir(source: &Path, compiler: CompilerId) -> PathBuf {
    let source_dir = match source.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    source_dir.join(compiler.as_str())
}

/// Derive the output path for a build, creating the output directory.
pub fn derive_output_path(
    source: &Path,
    compiler: CompilerId,
    language: Language,
    build_type: BuildType,
) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::config("Please select a source file"))?;

    let dir = output_dir(source, compiler);
    fs::create_dir_all(&dir)?;

    let path = dir.join(output_file_name(&stem, compiler, language, build_type));
    tracing::debug!("Derived output path {}", path.display());
    Ok(path)
}
