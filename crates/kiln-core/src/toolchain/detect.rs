//! Compiler discovery on `PATH` and library presence checks.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use super::store::{JAVA_RUNTIME, ToolchainProfileStore};
use crate::request::{CompilerId, Library};

/// Executable names probed for each configuration key, in preference order.
const CANDIDATES: &[(&str, &[&str])] = &[
    ("gcc", &["g++", "gcc"]),
    ("clang", &["clang++", "clang"]),
    ("msvc", &["cl"]),
    ("csc", &["csc", "mcs"]),
    ("javac", &["javac"]),
    (JAVA_RUNTIME, &["java"]),
];

/// A compiler found on the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedToolchain {
    /// Configuration key (`gcc`, ..., `java`).
    pub compiler: String,
    pub path: PathBuf,
    /// First line of `--version` output, if the tool printed one.
    pub version: Option<String>,
}

/// How long a compiler may take to answer `--version`.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe `PATH` for every known compiler.
pub async fn detect_toolchains() -> Vec<DetectedToolchain> {
    let mut detected = Vec::new();
    for (key, names) in CANDIDATES {
        let Some(path) = names.iter().find_map(|name| which::which(name).ok()) else {
            continue;
        };
        let version = query_version(&path).await;
        tracing::debug!("Detected {} at {} ({:?})", key, path.display(), version);
        detected.push(DetectedToolchain {
            compiler: (*key).to_string(),
            path,
            version,
        });
    }
    detected
}

/// First non-empty line the tool prints for `--version`.
///
/// `javac` and `java` historically print their version on stderr, so both
/// streams are consulted. A tool that does not answer within
/// [`VERSION_TIMEOUT`] is killed and reports no version.
pub async fn query_version(executable: &Path) -> Option<String> {
    let query = Command::new(executable)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = match tokio::time::timeout(VERSION_TIMEOUT, query).await {
        Ok(result) => result.ok()?,
        Err(_) => {
            tracing::warn!("{} --version timed out", executable.display());
            return None;
        }
    };

    let first_line = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    };
    first_line(&output.stdout).or_else(|| first_line(&output.stderr))
}

/// Whether a configured executable can be found and run.
pub fn executable_resolves(executable: &str) -> bool {
    !executable.trim().is_empty() && which::which(executable).is_ok()
}

impl ToolchainProfileStore {
    /// Fill profiles whose executable is empty or no longer resolves.
    ///
    /// Returns the keys that were updated.
    pub fn apply_detected(&mut self, detected: &[DetectedToolchain]) -> Vec<String> {
        let mut updated = Vec::new();
        for found in detected {
            let current = self
                .compilers
                .get(&found.compiler)
                .map(|profile| profile.executable.as_str())
                .unwrap_or_default();
            if executable_resolves(current) {
                continue;
            }
            let path = found.path.to_string_lossy().into_owned();
            tracing::info!("Using detected {} at {}", found.compiler, path);
            self.set_executable(&found.compiler, path);
            updated.push(found.compiler.clone());
        }
        updated
    }
}

/// Presence of a library's directories for one compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryCheck {
    pub library: Library,
    pub compiler: CompilerId,
    pub include_dir: String,
    pub include_found: bool,
    pub lib_dir: String,
    pub lib_found: bool,
}

impl LibraryCheck {
    pub fn is_ok(&self) -> bool {
        self.include_found && self.lib_found
    }
}

/// Check that the resolved include and lib directories exist.
///
/// Returns `None` when the library is not configured for the compiler.
pub fn check_library(
    store: &ToolchainProfileStore,
    library: Library,
    compiler: CompilerId,
) -> Option<LibraryCheck> {
    let spec = store.library_spec(library, compiler)?;
    let exists = |dir: &str| !dir.is_empty() && Path::new(dir).is_dir();
    Some(LibraryCheck {
        library,
        compiler,
        include_found: exists(&spec.include_dir),
        lib_found: exists(&spec.lib_dir),
        include_dir: spec.include_dir,
        lib_dir: spec.lib_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cover_every_compiler() {
        for compiler in CompilerId::ALL {
            assert!(CANDIDATES.iter().any(|(key, _)| *key == compiler.as_str()));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_version_reads_first_line() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-cc");
        std::fs::write(&tool, "#!/bin/sh\necho\necho 'fake-cc 1.2.3'\necho 'second line'\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(query_version(&tool).await.as_deref(), Some("fake-cc 1.2.3"));
        assert_eq!(query_version(&dir.path().join("absent")).await, None);
    }

    #[test]
    fn test_empty_executable_does_not_resolve() {
        assert!(!executable_resolves(""));
        assert!(!executable_resolves("/definitely/not/a/compiler"));
    }

    #[test]
    fn test_apply_detected_fills_only_unresolved() {
        let mut store = ToolchainProfileStore::default();
        store.set_executable("msvc", "");
        store.set_executable("gcc", "/definitely/not/g++");

        let detected = vec![
            DetectedToolchain {
                compiler: "msvc".to_string(),
                path: PathBuf::from("/tools/cl"),
                version: None,
            },
            DetectedToolchain {
                compiler: "gcc".to_string(),
                path: PathBuf::from("/tools/g++"),
                version: Some("g++ 14.2.0".to_string()),
            },
        ];
        let updated = store.apply_detected(&detected);

        assert_eq!(updated, vec!["msvc", "gcc"]);
        assert_eq!(store.profile(CompilerId::Msvc).unwrap().executable, "/tools/cl");
        assert_eq!(store.profile(CompilerId::Gcc).unwrap().executable, "/tools/g++");
    }

    #[test]
    fn test_check_library_reports_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let include = dir.path().join("include");
        std::fs::create_dir(&include).unwrap();

        let mut store = ToolchainProfileStore::defaults();
        store.set_path("cryptopp_include_gcc", include.to_string_lossy());
        store.set_path("cryptopp_lib_gcc", dir.path().join("lib").to_string_lossy());

        let check = check_library(&store, Library::CryptoPP, CompilerId::Gcc).unwrap();
        assert!(check.include_found);
        assert!(!check.lib_found);
        assert!(!check.is_ok());

        assert!(check_library(&store, Library::CryptoPP, CompilerId::Csc).is_none());
    }
}
