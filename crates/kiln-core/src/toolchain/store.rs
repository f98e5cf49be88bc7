//! Persisted toolchain configuration.
//!
//! The JSON document has three sections: `paths` (free-form string map),
//! `compilers` (one [`ToolchainProfile`] per compiler id, plus the `java`
//! runtime) and `libraries` (per-compiler link names for each cryptography
//! library). Loading deep-merges the file onto the built-in defaults so a
//! partial document is always complete after load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::request::{CompilerId, Library};

/// Key of the Java runtime entry in `compilers`.
pub const JAVA_RUNTIME: &str = "java";

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "compiler_config.json";

const WINDOWS_PATHS: &[(&str, &str)] = &[
    ("cryptopp_root", r"D:\cryptopp-libs"),
    ("openssl_root", r"D:\openssl350"),
    ("msys64_root", r"C:\msys64"),
    ("source_dir", "."),
];

const WINDOWS_EXECUTABLES: &[(&str, &str)] = &[
    ("gcc", r"C:\msys64\mingw64\bin\g++.exe"),
    ("clang", r"C:\msys64\mingw64\bin\clang++.exe"),
    ("msvc", "cl.exe"),
    ("csc", "csc.exe"),
    ("javac", "javac"),
    (JAVA_RUNTIME, "java"),
];

const UNIX_PATHS: &[(&str, &str)] = &[
    ("cryptopp_include", "/usr/include/cryptopp"),
    ("cryptopp_lib_gcc", "/usr/lib/x86_64-linux-gnu"),
    ("cryptopp_lib_clang", "/usr/lib/x86_64-linux-gnu"),
    ("openssl_include_gcc", "/usr/include/openssl"),
    ("openssl_include_clang", "/usr/include/openssl"),
    ("openssl_lib_gcc", "/usr/lib/x86_64-linux-gnu"),
    ("openssl_lib_clang", "/usr/lib/x86_64-linux-gnu"),
    ("source_dir", "."),
];

// An empty executable marks the compiler as unconfigured.
const UNIX_EXECUTABLES: &[(&str, &str)] = &[
    ("gcc", "/usr/bin/g++"),
    ("clang", "/usr/bin/clang++"),
    ("msvc", ""),
    ("csc", "/usr/bin/mcs"),
    ("javac", "/usr/bin/javac"),
    (JAVA_RUNTIME, "/usr/bin/java"),
];

/// Executable path and extra flags for one compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainProfile {
    #[serde(default)]
    pub executable: String,

    /// Extra flags appended after the compiler family's fixed template.
    #[serde(default, rename = "flags")]
    pub default_flags: Vec<String>,

    /// Extra link libraries, emitted after the library's own link names.
    #[serde(default, rename = "libs")]
    pub link_libs: Vec<String>,
}

impl ToolchainProfile {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.executable.trim().is_empty()
    }
}

/// One combined library name, or several names linked in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkNameForm {
    Single(String),
    Multiple(Vec<String>),
}

impl LinkNameForm {
    /// Link names in emission order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names: &[String] = match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Multiple(names) => names,
        };
        names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names().all(|name| name.trim().is_empty())
    }
}

/// Per-compiler link names for one library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcc_lib: Option<LinkNameForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clang_lib: Option<LinkNameForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msvc_lib: Option<LinkNameForm>,
}

impl LibraryLinks {
    pub fn for_compiler(&self, compiler: CompilerId) -> Option<&LinkNameForm> {
        match compiler {
            CompilerId::Gcc => self.gcc_lib.as_ref(),
            CompilerId::Clang => self.clang_lib.as_ref(),
            CompilerId::Msvc => self.msvc_lib.as_ref(),
            CompilerId::Csc | CompilerId::Javac => None,
        }
    }
}

/// Resolved library locations for one (library, compiler) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySpec {
    pub include_dir: String,
    pub lib_dir: String,
    pub link_names: LinkNameForm,
}

/// All toolchain and library configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainProfileStore {
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    #[serde(default)]
    pub compilers: BTreeMap<String, ToolchainProfile>,
    #[serde(default)]
    pub libraries: BTreeMap<String, LibraryLinks>,
}

impl ToolchainProfileStore {
    /// Built-in defaults for the current platform.
    pub fn defaults() -> Self {
        let mut store = Self::default();

        let (paths, executables) = if cfg!(windows) {
            (WINDOWS_PATHS, WINDOWS_EXECUTABLES)
        } else {
            (UNIX_PATHS, UNIX_EXECUTABLES)
        };

        for (key, value) in paths {
            store.paths.insert((*key).to_string(), (*value).to_string());
        }
        for (id, exe) in executables {
            store.compilers.insert((*id).to_string(), ToolchainProfile::new(*exe));
        }
        if let Some(msvc) = store.compilers.get_mut("msvc") {
            msvc.link_libs = vec!["crypt32.lib".to_string(), "ws2_32.lib".to_string()];
        }

        store.libraries.insert(
            "cryptopp".to_string(),
            LibraryLinks {
                gcc_lib: Some(LinkNameForm::Single("cryptopp".to_string())),
                clang_lib: Some(LinkNameForm::Single("cryptopp".to_string())),
                msvc_lib: Some(LinkNameForm::Single("cryptlib.lib".to_string())),
            },
        );
        let ssl = || LinkNameForm::Multiple(vec!["ssl".to_string(), "crypto".to_string()]);
        store.libraries.insert(
            "openssl".to_string(),
            LibraryLinks {
                gcc_lib: Some(ssl()),
                clang_lib: Some(ssl()),
                msvc_lib: Some(LinkNameForm::Multiple(vec![
                    "libssl.lib".to_string(),
                    "libcrypto.lib".to_string(),
                ])),
            },
        );

        store
    }

    /// Parse a configuration document and merge it onto the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let overlay: Value = serde_json::from_str(json)?;
        let mut document = serde_json::to_value(Self::defaults())?;
        merge_values(&mut document, overlay);
        Ok(serde_json::from_value(document)?)
    }

    /// Serialize the whole document, pretty-printed.
    ///
    /// Default entries missing from this store are written as `null` so the
    /// removal survives the merge onto defaults at load time.
    pub fn to_json(&self) -> Result<String> {
        let mut document = serde_json::to_value(self)?;
        mark_removed(&mut document, &serde_json::to_value(Self::defaults())?);
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::defaults());
        }
        let text = fs::read_to_string(path)?;
        let store = Self::from_json(&text)?;
        tracing::info!("Loaded toolchain config from {}", path.display());
        Ok(store)
    }

    /// Overwrite `path` with the full document.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        tracing::info!("Saved toolchain config to {}", path.display());
        Ok(())
    }

    /// `$KILN_CONFIG`, else `<config dir>/kiln/compiler_config.json`.
    pub fn default_config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("KILN_CONFIG") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("kiln").join(CONFIG_FILE_NAME))
    }

    pub fn profile(&self, compiler: CompilerId) -> Option<&ToolchainProfile> {
        self.compilers.get(compiler.as_str())
    }

    /// Profile of the Java runtime used to run `.class` artifacts.
    pub fn java_runtime(&self) -> Option<&ToolchainProfile> {
        self.compilers.get(JAVA_RUNTIME)
    }

    /// Set the executable for a compiler id (or `java`), creating the entry if needed.
    pub fn set_executable(&mut self, key: &str, executable: impl Into<String>) {
        self.compilers.entry(key.to_string()).or_default().executable = executable.into();
    }

    pub fn set_path(&mut self, key: &str, value: impl Into<String>) {
        self.paths.insert(key.to_string(), value.into());
    }

    /// Non-empty value of a `paths` entry.
    pub fn path(&self, key: &str) -> Option<&str> {
        self.paths
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Resolve include/lib directories and link names for a library.
    ///
    /// Returns `None` when no library is selected, the compiler is not a C++
    /// compiler, or no link names are configured for it.
    pub fn library_spec(&self, library: Library, compiler: CompilerId) -> Option<LibrarySpec> {
        let lib = library.id()?;
        if !compiler.is_native() {
            return None;
        }
        let link_names = self.libraries.get(lib)?.for_compiler(compiler)?;
        if link_names.is_empty() {
            return None;
        }

        let id = compiler.as_str();
        let root = self.path(&format!("{lib}_root")).map(Path::new);

        let include_dir = self
            .path(&format!("{lib}_include_{id}"))
            .or_else(|| self.path(&format!("{lib}_include")))
            .map(str::to_string)
            .or_else(|| root.map(|root| root_include_dir(library, root, compiler)))
            .unwrap_or_default();

        let lib_dir = self
            .path(&format!("{lib}_lib_{id}"))
            .map(str::to_string)
            .or_else(|| root.map(|root| root_lib_dir(library, root, compiler)))
            .unwrap_or_default();

        Some(LibrarySpec {
            include_dir,
            lib_dir,
            link_names: link_names.clone(),
        })
    }
}

fn root_include_dir(library: Library, root: &Path, compiler: CompilerId) -> String {
    let dir = match library {
        Library::OpenSsl => root.join(compiler.as_str()).join("include"),
        _ => root.join("include"),
    };
    dir.to_string_lossy().into_owned()
}

fn root_lib_dir(library: Library, root: &Path, compiler: CompilerId) -> String {
    let dir = match library {
        Library::OpenSsl if compiler == CompilerId::Msvc => root.join(compiler.as_str()).join("lib"),
        Library::OpenSsl => root.join(compiler.as_str()).join("lib64"),
        _ => root.join("lib").join(compiler.as_str()),
    };
    dir.to_string_lossy().into_owned()
}

/// Objects merge key by key and a `null` member deletes the key; anything
/// else replaces the base value.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    base.remove(&key);
                    continue;
                }
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

/// Insert `null` for every object member of `defaults` absent from `document`.
fn mark_removed(document: &mut Value, defaults: &Value) {
    let (Value::Object(document), Value::Object(defaults)) = (document, defaults) else {
        return;
    };
    for (key, default) in defaults {
        match document.get_mut(key) {
            Some(value) => mark_removed(value, default),
            None => {
                document.insert(key.clone(), Value::Null);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_compiler() {
        let store = ToolchainProfileStore::defaults();
        for compiler in CompilerId::ALL {
            assert!(store.profile(compiler).is_some(), "missing {compiler}");
        }
        assert!(store.java_runtime().is_some());
        assert_eq!(
            store.profile(CompilerId::Msvc).unwrap().link_libs,
            vec!["crypt32.lib", "ws2_32.lib"]
        );
    }

    #[test]
    fn test_partial_compiler_entry_keeps_default_fields() {
        let json = r#"{
            "compilers": { "msvc": { "executable": "C:/VS/cl.exe" } },
            "theme": "dark"
        }"#;
        let store = ToolchainProfileStore::from_json(json).unwrap();
        let msvc = store.profile(CompilerId::Msvc).unwrap();
        assert_eq!(msvc.executable, "C:/VS/cl.exe");
        assert_eq!(msvc.link_libs, vec!["crypt32.lib", "ws2_32.lib"]);
        assert!(store.profile(CompilerId::Gcc).unwrap().is_configured());
    }

    #[test]
    fn test_arrays_replace_instead_of_merging() {
        let json = r#"{ "libraries": { "openssl": { "gccLib": "ssl3" } } }"#;
        let store = ToolchainProfileStore::from_json(json).unwrap();
        let links = &store.libraries["openssl"];
        assert_eq!(links.gcc_lib, Some(LinkNameForm::Single("ssl3".to_string())));
        assert!(matches!(links.clang_lib, Some(LinkNameForm::Multiple(_))));
    }

    #[test]
    fn test_library_spec_prefers_compiler_specific_keys() {
        let mut store = ToolchainProfileStore::default();
        store.libraries.insert(
            "cryptopp".to_string(),
            LibraryLinks {
                gcc_lib: Some(LinkNameForm::Single("cryptopp".to_string())),
                ..LibraryLinks::default()
            },
        );
        store.set_path("cryptopp_include", "/opt/cryptopp/include");
        store.set_path("cryptopp_include_gcc", "/opt/gcc/include");
        store.set_path("cryptopp_lib_gcc", "/opt/gcc/lib");

        let spec = store.library_spec(Library::CryptoPP, CompilerId::Gcc).unwrap();
        assert_eq!(spec.include_dir, "/opt/gcc/include");
        assert_eq!(spec.lib_dir, "/opt/gcc/lib");

        assert!(store.library_spec(Library::CryptoPP, CompilerId::Clang).is_none());
        assert!(store.library_spec(Library::None, CompilerId::Gcc).is_none());
    }

    #[test]
    fn test_library_spec_derives_from_root() {
        let mut store = ToolchainProfileStore::default();
        store.libraries = ToolchainProfileStore::defaults().libraries;
        store.set_path("openssl_root", "/opt/ssl");
        store.set_path("cryptopp_root", "/opt/cpp");

        let ssl = store.library_spec(Library::OpenSsl, CompilerId::Msvc).unwrap();
        assert_eq!(Path::new(&ssl.include_dir), Path::new("/opt/ssl/msvc/include"));
        assert_eq!(Path::new(&ssl.lib_dir), Path::new("/opt/ssl/msvc/lib"));

        let ssl = store.library_spec(Library::OpenSsl, CompilerId::Clang).unwrap();
        assert_eq!(Path::new(&ssl.lib_dir), Path::new("/opt/ssl/clang/lib64"));

        let cpp = store.library_spec(Library::CryptoPP, CompilerId::Gcc).unwrap();
        assert_eq!(Path::new(&cpp.include_dir), Path::new("/opt/cpp/include"));
        assert_eq!(Path::new(&cpp.lib_dir), Path::new("/opt/cpp/lib/gcc"));
    }

    #[test]
    fn test_library_spec_ignores_managed_compilers() {
        let store = ToolchainProfileStore::defaults();
        assert!(store.library_spec(Library::OpenSsl, CompilerId::Csc).is_none());
        assert!(store.library_spec(Library::CryptoPP, CompilerId::Javac).is_none());
    }

    #[test]
    fn test_null_member_deletes_default() {
        let json = r#"{
            "compilers": { "java": null },
            "libraries": { "openssl": { "msvcLib": null } }
        }"#;
        let store = ToolchainProfileStore::from_json(json).unwrap();
        assert!(store.java_runtime().is_none());
        assert_eq!(store.libraries["openssl"].msvc_lib, None);
        assert!(store.libraries["openssl"].gcc_lib.is_some());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ToolchainProfileStore::from_json("{ not json").is_err());
        assert!(ToolchainProfileStore::from_json(r#"{"compilers": {"gcc": {"flags": "-O2"}}}"#).is_err());
    }
}
