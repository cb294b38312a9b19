//! Container engine support for containerized builds.

mod adapter;
mod runtime;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;

pub use adapter::{ContainerAdapter, Mount, RunOptions, UserIds};
pub use runtime::{ContainerRuntime, Engine, detect_engine, detect_rootless, resolve_runtime};

#[derive(Debug, Error)]
pub enum ContainerError {
  #[error("no container runtime found; install docker or podman, or build with a local toolchain")]
  NotFound,

  #[error("cannot mount {} into the container: {source}", .path.display())]
  VolumePath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Process(#[from] ProcessError),
}
