//! End-to-end tests for the kiln CLI.
//!
//! Every test points `--config` at a file inside its own temp directory so
//! the user's configuration is never read or written.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Temp directory holding a config file and source files.
struct TestProject {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestProject {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("compiler_config.json");
        Self {
            temp_dir,
            config_path,
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn source(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, contents).expect("Failed to write source");
        path
    }

    /// `kiln --config <file> <args...>`
    fn kiln(&self) -> Command {
        let mut cmd = Command::cargo_bin("kiln").expect("Failed to find kiln binary");
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }

    fn set_compiler(&self, id: &str, executable: &str) {
        self.kiln()
            .args(["config", "set-compiler", id, executable])
            .assert()
            .success();
    }

    fn config_json(&self) -> serde_json::Value {
        let text = fs::read_to_string(&self.config_path).expect("Failed to read config");
        serde_json::from_str(&text).expect("Config is not valid JSON")
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
fn test_config_path_prints_override() {
    let project = TestProject::new();
    project
        .kiln()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("compiler_config.json"));
}

#[test]
fn test_config_init_writes_defaults_once() {
    let project = TestProject::new();
    project.kiln().args(["config", "init"]).assert().success();

    let json = project.config_json();
    assert!(json["paths"].is_object());
    assert!(json["compilers"]["gcc"]["executable"].is_string());
    assert!(json["libraries"]["openssl"].is_object());

    project
        .kiln()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    project.kiln().args(["config", "init", "--force"]).assert().success();
}

#[test]
fn test_config_set_compiler_persists() {
    let project = TestProject::new();
    project.set_compiler("g++", "/opt/gcc/bin/g++");

    let json = project.config_json();
    assert_eq!(json["compilers"]["gcc"]["executable"], "/opt/gcc/bin/g++");

    project
        .kiln()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/opt/gcc/bin/g++"));
}

#[test]
fn test_config_set_compiler_rejects_unknown_id() {
    let project = TestProject::new();
    project
        .kiln()
        .args(["config", "set-compiler", "rustc", "/usr/bin/rustc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown compiler"));
    assert!(!project.config_path.exists());
}

#[test]
fn test_config_set_path_persists() {
    let project = TestProject::new();
    project
        .kiln()
        .args(["config", "set-path", "cryptopp_root", "/opt/cryptopp"])
        .assert()
        .success();
    assert_eq!(project.config_json()["paths"]["cryptopp_root"], "/opt/cryptopp");
}

#[test]
fn test_check_lib_reports_found_directories() {
    let project = TestProject::new();
    let include = project.path().join("ssl-include");
    let lib = project.path().join("ssl-lib");
    fs::create_dir_all(&include).unwrap();
    fs::create_dir_all(&lib).unwrap();

    for (key, value) in [("openssl_include_gcc", &include), ("openssl_lib_gcc", &lib)] {
        project
            .kiln()
            .args(["config", "set-path", key])
            .arg(value)
            .assert()
            .success();
    }

    project
        .kiln()
        .args(["config", "check-lib", "openssl", "gcc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("found"));
}

#[test]
fn test_check_lib_fails_for_missing_directories() {
    let project = TestProject::new();
    project
        .kiln()
        .args(["config", "set-path", "openssl_include_gcc", "/nonexistent/kiln/include"])
        .assert()
        .success();
    project
        .kiln()
        .args(["config", "set-path", "openssl_lib_gcc", "/nonexistent/kiln/lib"])
        .assert()
        .success();

    project
        .kiln()
        .args(["config", "check-lib", "openssl", "gcc"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing"));
}

// =============================================================================
// Preview Command Tests
// =============================================================================

#[test]
fn test_preview_gcc_command() {
    let project = TestProject::new();
    project.set_compiler("gcc", "/opt/g++");
    let source = project.source("main.cpp", "int main() { return 0; }\n");

    project
        .kiln()
        .arg("preview")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\"/opt/g++\" -g2 -O3 -DNDEBUG"))
        .stdout(predicate::str::contains("main_gcc.exe"))
        .stdout(predicate::str::contains("-std=c++17"));

    // Preview never creates the derived output directory.
    assert!(!project.path().join("gcc").exists());
}

#[test]
fn test_preview_without_optimization() {
    let project = TestProject::new();
    project.set_compiler("clang", "/opt/clang++");
    let source = project.source("main.cpp", "int main() { return 0; }\n");

    project
        .kiln()
        .args(["preview", "-c", "clang", "--no-debug", "--no-optimize"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\"/opt/clang++\" -O0 -DDEBUG"));
}

#[test]
fn test_preview_jni_is_unsupported() {
    let project = TestProject::new();
    let source = project.source("Native.java", "class Native {}\n");

    project
        .kiln()
        .args(["preview", "--language", "jni", "-c", "gcc"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("JNI build requires multiple steps"));
}

#[test]
fn test_preview_rejects_invalid_compiler_pair() {
    let project = TestProject::new();
    let source = project.source("Main.java", "class Main {}\n");

    project
        .kiln()
        .args(["preview", "-c", "gcc"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid compiler for Java"));
}

#[test]
fn test_unknown_extension_requires_language() {
    let project = TestProject::new();
    let source = project.source("script.py", "print('hi')\n");

    project
        .kiln()
        .arg("preview")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--language"));
}

#[test]
fn test_unconfigured_compiler_shows_hint() {
    let project = TestProject::new();
    project.set_compiler("gcc", "");
    let source = project.source("main.cpp", "int main() { return 0; }\n");

    project
        .kiln()
        .arg("preview")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please configure GCC compiler path"))
        .stderr(predicate::str::contains("set-compiler"));
}

// =============================================================================
// Build Command Tests
// =============================================================================

#[test]
fn test_build_missing_source_fails() {
    let project = TestProject::new();
    project.set_compiler("gcc", "/opt/g++");

    project
        .kiln()
        .arg("build")
        .arg(project.path().join("absent.cpp"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source file does not exist"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Compiler that writes a runnable shell script to the `-o` path.
    const FAKE_GCC: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "-o" ]; then out="$arg"; fi
    prev="$arg"
    case "$arg" in
        *.cpp) [ -f "$arg" ] || { echo "$arg: No such file or directory" >&2; exit 1; } ;;
    esac
done
printf '#!/bin/sh\necho hello from artifact\n' > "$out"
chmod +x "$out"
"#;

    const BROKEN_GCC: &str = r#"#!/bin/sh
echo "main.cpp: fatal error: missing.h: No such file or directory" >&2
exit 1
"#;

    fn install(project: &TestProject, name: &str, body: &str) -> PathBuf {
        let path = project.path().join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        project.set_compiler("gcc", path.to_str().unwrap());
        path
    }

    #[test]
    fn test_build_and_run() {
        let project = TestProject::new();
        install(&project, "fake-gcc", FAKE_GCC);
        let source = project.source("main.cpp", "int main() { return 0; }\n");

        project
            .kiln()
            .args(["build", "--run"])
            .arg(&source)
            .assert()
            .success()
            .stdout(predicate::str::contains("Build succeeded"))
            .stdout(predicate::str::contains("hello from artifact"))
            .stdout(predicate::str::contains("Program finished with exit code 0"));

        assert!(project.path().join("gcc").join("main_gcc.exe").exists());
    }

    #[test]
    fn test_build_relative_source_from_project_dir() {
        let project = TestProject::new();
        install(&project, "fake-gcc", FAKE_GCC);
        fs::create_dir_all(project.path().join("src")).unwrap();
        project.source("src/main.cpp", "int main() { return 0; }\n");

        project
            .kiln()
            .current_dir(project.path())
            .args(["build", "--run", "src/main.cpp"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello from artifact"));

        assert!(project.path().join("src").join("gcc").join("main_gcc.exe").exists());
    }

    #[test]
    fn test_run_previous_artifact() {
        let project = TestProject::new();
        install(&project, "fake-gcc", FAKE_GCC);
        let source = project.source("main.cpp", "int main() { return 0; }\n");

        // Nothing built yet.
        project.kiln().arg("run").arg(&source).assert().failure();

        project.kiln().arg("build").arg(&source).assert().success();
        project
            .kiln()
            .arg("run")
            .arg(&source)
            .assert()
            .success()
            .stdout(predicate::str::contains("hello from artifact"));
    }

    #[test]
    fn test_failed_build_prints_summary() {
        let project = TestProject::new();
        install(&project, "broken-gcc", BROKEN_GCC);
        let source = project.source("main.cpp", "#include \"missing.h\"\n");

        project
            .kiln()
            .arg("build")
            .arg(&source)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Error summary:"))
            .stdout(predicate::str::contains("Missing file/header"));
    }

    #[test]
    fn test_build_json_events() {
        let project = TestProject::new();
        install(&project, "fake-gcc", FAKE_GCC);
        let source = project.source("main.cpp", "int main() { return 0; }\n");

        let output = project
            .kiln()
            .args(["build", "--json"])
            .arg(&source)
            .output()
            .unwrap();
        assert!(output.status.success());

        let lines: Vec<serde_json::Value> = String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
            .collect();

        assert!(lines.iter().any(|v| v["type"] == "started"));
        assert!(lines.iter().any(|v| v["type"] == "finished"));
        assert_eq!(lines.last().unwrap()["outcome"], "succeeded");
    }
}
