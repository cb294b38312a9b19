//! Build backends.
//!
//! Every way of running the compiler implements [`BuildRunner`]. The
//! orchestrator drives a runner through
//! `setup → query_version → pre_build → build → post_build`; `post_build`
//! runs even when an earlier step failed. [`resolve_runner`] is the single
//! place that decides which backend a configuration gets.

mod deferred;
mod local;
mod local_container;
mod noop;
mod remote_container;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::BuildCommand;
use crate::config::{Backend, NativeConfig};
use crate::consts::NATIVE_IMAGE;
use crate::container::ContainerError;
use crate::platform::os::Os;
use crate::platform::paths::ToolEnv;
use crate::process::{CaptureMode, Launcher, ProcessError};
use crate::steps::{StepError, ToolHost, file_arg, find_local_tool, parent_dir};
use crate::toolchain::{Version, VersionError};

pub use deferred::DeferredRunner;
pub use local::LocalRunner;
pub use local_container::LocalContainerRunner;
pub use noop::NoopRunner;
pub use remote_container::RemoteContainerRunner;

const OBJCOPY: &str = "objcopy";

/// A backend resolution failure, kept as data until a build needs the backend.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
  #[error(
    "cannot find native-image; searched {}. Set GRAALVM_HOME or build in a container",
    display_paths(.searched)
  )]
  ToolchainNotFound { searched: Vec<PathBuf> },

  #[error(
    "no local native-image was found and container builds are not selected automatically on {host}; \
     set GRAALVM_HOME or select the container backend"
  )]
  NoFallback { host: Os },
}

fn display_paths(paths: &[PathBuf]) -> String {
  if paths.is_empty() {
    return "nothing (no GRAALVM_HOME, JAVA_HOME or PATH)".to_string();
  }
  paths
    .iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join(", ")
}

#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("this backend only writes the build arguments and is not meant to build")]
  NotMeantToBuild,

  #[error(transparent)]
  Resolution(#[from] ResolutionError),

  #[error(transparent)]
  Version(#[from] VersionError),

  #[error(transparent)]
  Container(#[from] ContainerError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Step(#[from] StepError),

  #[error("{step} exited with code {code}")]
  StepFailed { step: &'static str, code: i32 },

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerKind {
  Local,
  LocalContainer,
  RemoteContainer,
  Noop,
  Deferred,
}

impl RunnerKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Local => "local",
      Self::LocalContainer => "local-container",
      Self::RemoteContainer => "remote-container",
      Self::Noop => "noop",
      Self::Deferred => "deferred",
    }
  }
}

impl fmt::Display for RunnerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What the orchestrator hands a runner for one compilation.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
  /// Directory holding the jar; the compiler runs here and writes its output here.
  pub build_dir: &'a Path,
  pub name: &'a str,
  pub command: &'a BuildCommand,
  pub mode: CaptureMode,
  /// Where the compiler writes its call-tree report, when reports are enabled.
  pub reports_dir: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
  pub exit_code: i32,
  /// Present only when the compiler succeeded and the file exists.
  pub executable: Option<PathBuf>,
}

impl BuildResult {
  pub(crate) fn collect(exit_code: i32, executable: PathBuf) -> Self {
    let executable = (exit_code == 0 && executable.is_file()).then_some(executable);
    Self { exit_code, executable }
  }
}

/// Shared inputs for building runners.
#[derive(Clone)]
pub struct RunnerContext {
  pub launcher: Arc<dyn Launcher>,
  pub env: ToolEnv,
  pub host_os: Os,
}

#[async_trait]
pub trait BuildRunner: Send + Sync {
  fn kind(&self) -> RunnerKind;

  fn is_containerized(&self) -> bool;

  /// Where auxiliary tools for this backend run, if anywhere.
  fn tool_host(&self) -> Option<ToolHost<'_>>;

  /// File name the compiler gives an executable called `name`.
  fn executable_file_name(&self, name: &str) -> String {
    name.to_string()
  }

  async fn setup(&self) -> Result<(), RunnerError> {
    Ok(())
  }

  async fn query_version(&self) -> Result<Version, RunnerError>;

  async fn pre_build(&self, _request: &BuildRequest<'_>) -> Result<(), RunnerError> {
    Ok(())
  }

  async fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError>;

  /// Cleanup. Runs after any earlier step, failed or not, and must not fail
  /// the build.
  async fn post_build(&self, _build_dir: &Path) {}

  /// Split debug info from `executable` into `<executable>.debug` when `split`
  /// is set, then strip it. Returns the debug file path.
  ///
  /// A missing `objcopy` is logged and skipped.
  async fn extract_debug_symbols(&self, executable: &Path, split: bool) -> Result<Option<PathBuf>, RunnerError> {
    let host = self.tool_host().ok_or(RunnerError::NotMeantToBuild)?;
    split_debug_symbols(&host, executable, split).await
  }
}

pub(crate) async fn split_debug_symbols(
  host: &ToolHost<'_>,
  executable: &Path,
  split: bool,
) -> Result<Option<PathBuf>, RunnerError> {
  let workdir = parent_dir(executable)?;
  let Some(objcopy) = host.locate(OBJCOPY, workdir).await? else {
    warn!(location = %host.describe(), "objcopy not found, leaving debug info in the executable");
    return Ok(None);
  };

  let exe = file_arg(executable);
  let debug_file = format!("{}.debug", exe);

  let mut steps: Vec<Vec<String>> = Vec::new();
  if split {
    steps.push(vec!["--only-keep-debug".to_string(), exe.clone(), debug_file.clone()]);
    steps.push(vec![format!("--add-gnu-debuglink={}", debug_file), exe.clone()]);
  }
  steps.push(vec!["--strip-debug".to_string(), exe.clone()]);

  for args in steps {
    let argv: Vec<String> = objcopy.iter().cloned().chain(args).collect();
    debug!(cmd = ?argv, "objcopy");
    let code = host.run(&argv, workdir).await?;
    if code != 0 {
      return Err(RunnerError::StepFailed { step: OBJCOPY, code });
    }
  }

  let debug_path = workdir.join(&debug_file);
  Ok((split && debug_path.is_file()).then_some(debug_path))
}

/// The `native-image` executable for a local build: the configured or
/// environment GraalVM home, then the Java home, then `PATH`.
pub fn resolve_native_image(config: &NativeConfig, env: &ToolEnv, os: Os) -> Result<PathBuf, ResolutionError> {
  let env = ToolEnv {
    graalvm_home: config.graalvm_home.clone().or_else(|| env.graalvm_home.clone()),
    java_home: config.java_home.clone().or_else(|| env.java_home.clone()),
    path: env.path.clone(),
  };

  if let Some(found) = find_local_tool(&env, NATIVE_IMAGE, os) {
    debug!(path = %found.display(), "found native-image");
    return Ok(found);
  }

  let searched = [env.graalvm_home.as_ref(), env.java_home.as_ref()]
    .into_iter()
    .flatten()
    .map(|home| home.join("bin"))
    .chain(env.path_dirs())
    .collect();
  Err(ResolutionError::ToolchainNotFound { searched })
}

/// Choose the backend for `config`.
///
/// Never fails: a backend that cannot be resolved becomes a
/// [`DeferredRunner`] that reports the failure when it is first used.
pub fn resolve_runner(config: &NativeConfig, ctx: &RunnerContext) -> Box<dyn BuildRunner> {
  if config.sources_only {
    return Box::new(NoopRunner);
  }

  match config.backend {
    Backend::Remote => Box::new(RemoteContainerRunner::new(config, ctx)),
    Backend::Container => Box::new(LocalContainerRunner::new(config, ctx)),
    Backend::Local => match LocalRunner::new(config, ctx) {
      Ok(runner) => Box::new(runner),
      Err(err) => Box::new(DeferredRunner::new(err)),
    },
    Backend::Auto => match LocalRunner::new(config, ctx) {
      Ok(runner) => Box::new(runner),
      Err(err) if ctx.host_os == Os::Linux => {
        warn!(error = %err, "no local toolchain, falling back to a container build");
        Box::new(LocalContainerRunner::new(config, ctx))
      }
      Err(err) => {
        info!(error = %err, "no local toolchain and no automatic container fallback on this host");
        Box::new(DeferredRunner::new(ResolutionError::NoFallback { host: ctx.host_os }))
      }
    },
  }
}

/// Parse a `native-image --version` probe, whatever its exit code.
pub(crate) fn version_from_probe(captured: &crate::process::Captured) -> Result<Version, RunnerError> {
  if !captured.success() {
    debug!(code = captured.code, "version probe exited non-zero, parsing output anyway");
  }
  Ok(crate::toolchain::detect(&captured.merged())?)
}
