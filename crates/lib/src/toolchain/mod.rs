//! Ahead-of-time compiler toolchain detection.
//!
//! [`detect`] turns the text printed by `native-image --version` into a
//! [`Version`], which the rest of the crate uses to gate flags and to reject
//! toolchains older than [`MINIMUM`].

mod parse;
mod version;

use thiserror::Error;

pub use parse::detect;
pub use version::{CURRENT, Distribution, MINIMUM, UNDEFINED, Version};

/// Errors raised while reading a toolchain version.
#[derive(Debug, Error)]
pub enum VersionError {
  /// Neither the structured nor the legacy banner format matched.
  #[error("unable to parse the toolchain version from:\n{output}")]
  Unrecognized { output: String },
}
