use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::command::AssemblyError;
use crate::consts::OOM_EXIT_CODE;
use crate::runner::RunnerError;
use crate::steps::StepError;

/// Where in the pipeline a build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
  Resolve,
  Setup,
  VersionCheck,
  Assemble,
  PreBuild,
  Build,
  DebugSymbols,
  Finalize,
  Compression,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Resolve => "resolve",
      Self::Setup => "setup",
      Self::VersionCheck => "version-check",
      Self::Assemble => "assemble",
      Self::PreBuild => "pre-build",
      Self::Build => "build",
      Self::DebugSymbols => "debug-symbols",
      Self::Finalize => "finalize",
      Self::Compression => "compression",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum BuildErrorKind {
  #[error("{0}")]
  InvalidInput(String),

  #[error(transparent)]
  Runner(#[from] RunnerError),

  #[error("toolchain {version} is too old; {minimum} or newer is required (JDK level is compared before the release)")]
  Obsolete { version: String, minimum: String },

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(
    "image generation was killed with exit code {code}, most likely because it ran out of memory. {}",
    oom_hint(.containerized)
  )]
  OutOfMemory { code: i32, containerized: bool },

  #[error("image generation failed with exit code {code}")]
  GenerationFailed { code: i32 },

  #[error("the build succeeded but {} was not produced", .path.display())]
  MissingExecutable { path: PathBuf },

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Step(#[from] StepError),
}

fn oom_hint(containerized: &bool) -> &'static str {
  if *containerized {
    "Increase the memory available to the container engine (for Docker Desktop or Podman machine, \
     raise the VM memory limit) or lower native-image-xmx"
  } else {
    "Free up memory on this machine or set native-image-xmx to bound the compiler heap"
  }
}

/// The single error surfaced by a native build.
#[derive(Debug, Error)]
#[error("native build failed at {stage}: {kind}")]
pub struct BuildError {
  pub stage: Stage,
  pub kind: BuildErrorKind,
}

impl BuildError {
  pub fn new(stage: Stage, kind: impl Into<BuildErrorKind>) -> Self {
    Self {
      stage,
      kind: kind.into(),
    }
  }

  /// Exit code of the compiler, when it ran and failed.
  pub fn exit_code(&self) -> Option<i32> {
    match &self.kind {
      BuildErrorKind::OutOfMemory { code, .. } | BuildErrorKind::GenerationFailed { code } => Some(*code),
      _ => None,
    }
  }

  pub fn is_out_of_memory(&self) -> bool {
    matches!(self.kind, BuildErrorKind::OutOfMemory { .. })
  }
}

/// Failure kind for a compiler exit code, or `None` on success.
pub fn classify_exit(code: i32, containerized: bool) -> Option<BuildErrorKind> {
  match code {
    0 => None,
    OOM_EXIT_CODE => Some(BuildErrorKind::OutOfMemory { code, containerized }),
    code => Some(BuildErrorKind::GenerationFailed { code }),
  }
}
