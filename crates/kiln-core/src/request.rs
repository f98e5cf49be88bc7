//! Build request value object.
//!
//! A [`BuildRequest`] is created once per build and never mutated after
//! synthesis begins. The enums here are the closed vocabularies the rest of
//! the engine matches on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source language of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    CSharp,
    Java,
    Jni,
}

impl Language {
    pub const ALL: [Language; 4] = [Self::Cpp, Self::CSharp, Self::Java, Self::Jni];

    /// Compilers that may be paired with this language.
    pub fn valid_compilers(self) -> &'static [CompilerId] {
        match self {
            Self::Cpp | Self::Jni => &[CompilerId::Gcc, CompilerId::Clang, CompilerId::Msvc],
            Self::CSharp => &[CompilerId::Csc],
            Self::Java => &[CompilerId::Javac],
        }
    }

    /// Default compiler when the user does not pick one.
    pub fn default_compiler(self) -> CompilerId {
        self.valid_compilers()[0]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Java => "java",
            Self::Jni => "jni",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Cpp => "C++",
            Self::CSharp => "C#",
            Self::Java => "Java",
            Self::Jni => "JNI",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpp" | "c++" | "cxx" => Ok(Self::Cpp),
            "csharp" | "c#" | "cs" => Ok(Self::CSharp),
            "java" => Ok(Self::Java),
            "jni" => Ok(Self::Jni),
            other => Err(Error::InvalidValue(format!("unknown language '{other}'"))),
        }
    }
}

/// Compiler identity. The lowercase id doubles as the configuration key and
/// as the per-compiler output directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerId {
    Gcc,
    Clang,
    Msvc,
    Csc,
    Javac,
}

impl CompilerId {
    pub const ALL: [CompilerId; 5] = [Self::Gcc, Self::Clang, Self::Msvc, Self::Csc, Self::Javac];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
            Self::Msvc => "msvc",
            Self::Csc => "csc",
            Self::Javac => "javac",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Gcc => "GCC",
            Self::Clang => "Clang",
            Self::Msvc => "MSVC",
            Self::Csc => "CSC",
            Self::Javac => "JAVAC",
        }
    }

    /// Whether this compiler belongs to the C++ family (the only family that
    /// links against the cryptography libraries).
    pub fn is_native(self) -> bool {
        matches!(self, Self::Gcc | Self::Clang | Self::Msvc)
    }
}

impl fmt::Display for CompilerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CompilerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gcc" | "g++" => Ok(Self::Gcc),
            "clang" | "clang++" => Ok(Self::Clang),
            "msvc" | "cl" => Ok(Self::Msvc),
            "csc" => Ok(Self::Csc),
            "javac" => Ok(Self::Javac),
            other => Err(Error::InvalidValue(format!("unknown compiler '{other}'"))),
        }
    }
}

/// Artifact kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildType {
    #[default]
    Executable,
    SharedLibrary,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Executable => "executable",
            Self::SharedLibrary => "shared library",
        })
    }
}

impl FromStr for BuildType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "executable" | "exe" => Ok(Self::Executable),
            "shared_library" | "shared" | "dll" => Ok(Self::SharedLibrary),
            other => Err(Error::InvalidValue(format!("unknown build type '{other}'"))),
        }
    }
}

/// Cryptography library to link against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    #[default]
    None,
    CryptoPP,
    OpenSsl,
}

impl Library {
    /// Configuration key, or `None` for [`Library::None`].
    pub fn id(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::CryptoPP => Some("cryptopp"),
            Self::OpenSsl => Some("openssl"),
        }
    }
}

impl FromStr for Library {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "cryptopp" | "crypto++" => Ok(Self::CryptoPP),
            "openssl" => Ok(Self::OpenSsl),
            other => Err(Error::InvalidValue(format!("unknown library '{other}'"))),
        }
    }
}

/// Everything needed to compile one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub language: Language,
    pub compiler: CompilerId,
    pub build_type: BuildType,
    pub library: Library,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub debug: bool,
    pub optimize: bool,
    pub auto_run: bool,
}

impl BuildRequest {
    /// Create a request with the front-end defaults: executable, no library,
    /// debug and optimize on, auto-run off, output not yet chosen.
    pub fn new(language: Language, compiler: CompilerId, source_path: impl Into<PathBuf>) -> Self {
        Self {
            language,
            compiler,
            build_type: BuildType::Executable,
            library: Library::None,
            source_path: source_path.into(),
            output_path: PathBuf::new(),
            debug: true,
            optimize: true,
            auto_run: false,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    pub fn with_library(mut self, library: Library) -> Self {
        self.library = library;
        self
    }

    pub fn with_flags(mut self, debug: bool, optimize: bool) -> Self {
        self.debug = debug;
        self.optimize = optimize;
        self
    }

    pub fn with_auto_run(mut self, auto_run: bool) -> Self {
        self.auto_run = auto_run;
        self
    }

    /// Fill in the output path from the output filename policy when none was chosen.
    ///
    /// Creates the per-compiler output directory.
    pub fn with_derived_output(mut self) -> Result<Self> {
        if self.output_path.as_os_str().is_empty() {
            self.output_path = crate::compile::derive_output_path(
                &self.source_path,
                self.compiler,
                self.language,
                self.build_type,
            )?;
        }
        Ok(self)
    }

    /// Make the source and output paths absolute against the current directory.
    ///
    /// The compiler runs inside the source directory, so relative paths
    /// would otherwise be resolved twice.
    pub fn resolved(mut self) -> Result<Self> {
        for path in [&mut self.source_path, &mut self.output_path] {
            if !path.as_os_str().is_empty() {
                *path = std::path::absolute(&*path)?;
            }
        }
        Ok(self)
    }

    /// Directory the source lives in (`.` for a bare file name).
    pub fn source_dir(&self) -> &Path {
        match self.source_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Check the structural invariants required before synthesis.
    pub fn validate(&self) -> Result<()> {
        if !self.language.valid_compilers().contains(&self.compiler) {
            return Err(Error::config(format!(
                "{} is not a valid compiler for {}",
                self.compiler, self.language
            )));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::config("Please select a source file"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::config("Please select an output file"));
        }
        Ok(())
    }
}
