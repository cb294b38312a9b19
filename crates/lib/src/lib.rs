//! nativeforge-lib: native executable builds for packaged JVM applications
//!
//! This crate drives an external ahead-of-time compiler (`native-image`):
//! - `toolchain`: detect and gate the compiler version
//! - `runner`: local, local-container and remote-container build backends
//! - `command`: assemble the compiler command line
//! - `process`: run tools with concurrent stream draining
//! - `report`: rewrite misleading call paths from the compiler's call-tree report
//! - `native`: orchestrate a build end to end
//! - `steps`: compression and startup archive post-processing

pub mod build_lock;
pub mod command;
pub mod config;
pub mod consts;
pub mod container;
pub mod native;
pub mod platform;
pub mod process;
pub mod report;
pub mod runner;
pub mod steps;
pub mod toolchain;
#[cfg(test)]
pub(crate) mod util;
