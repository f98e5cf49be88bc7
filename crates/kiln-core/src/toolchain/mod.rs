//! Toolchain configuration and discovery.

mod detect;
mod store;

pub use detect::{
    DetectedToolchain, LibraryCheck, check_library, detect_toolchains, executable_resolves,
    query_version,
};
pub use store::{
    CONFIG_FILE_NAME, JAVA_RUNTIME, LibraryLinks, LibrarySpec, LinkNameForm, ToolchainProfile,
    ToolchainProfileStore,
};
