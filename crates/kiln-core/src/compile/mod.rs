//! Turning build requests into compiler invocations.

mod command;
mod output;
mod synth;

pub use command::Command;
pub use output::{derive_output_path, output_dir, output_file_name};
pub use synth::{CommandSynthesizer, Invocation, JNI_UNSUPPORTED, Synthesis};
