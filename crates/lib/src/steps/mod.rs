//! One-shot tool invocations around the main build.
//!
//! Compression, startup archive generation and debug symbol splitting all
//! follow the same shape: find the tool on the host or in the builder image,
//! run one short command through the process harness, then check that the
//! expected file exists.

pub mod compress;
pub mod startup_archive;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::container::{ContainerAdapter, ContainerError, RunOptions};
use crate::platform::os::Os;
use crate::platform::paths::{ToolEnv, is_executable, tool_file_name};
use crate::process::{CaptureMode, Launcher, ProcessError};

#[derive(Debug, Error)]
pub enum StepError {
  #[error("{tool} was requested but is not available {location}")]
  ToolUnavailable { tool: &'static str, location: String },

  #[error("{tool} exited with code {code}")]
  Failed { tool: &'static str, code: i32 },

  #[error("{tool} exited successfully but {} was not produced", .path.display())]
  MissingOutput { tool: &'static str, path: PathBuf },

  #[error("cannot determine the Java version from:\n{output}")]
  JavaVersion { output: String },

  #[error("{} has no parent directory", .path.display())]
  NoParent { path: PathBuf },

  #[error("failed to remove stale {}: {source}", .path.display())]
  RemoveStale {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Container(#[from] ContainerError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

/// Where auxiliary tools are looked up and run.
pub enum ToolHost<'a> {
  /// Installed on this machine, found through the discovery environment.
  Local {
    env: &'a ToolEnv,
    launcher: &'a dyn Launcher,
    os: Os,
  },
  /// Shipped in the builder image, run with the working directory mounted.
  Container {
    adapter: &'a ContainerAdapter,
    image: &'a str,
    runtime_options: &'a [String],
  },
}

impl ToolHost<'_> {
  pub fn launcher(&self) -> &dyn Launcher {
    match self {
      Self::Local { launcher, .. } => *launcher,
      Self::Container { adapter, .. } => adapter.launcher().as_ref(),
    }
  }

  pub fn is_container(&self) -> bool {
    matches!(self, Self::Container { .. })
  }

  /// Human readable location, for error messages.
  pub fn describe(&self) -> String {
    match self {
      Self::Local { .. } => "on this host (GRAALVM_HOME, JAVA_HOME or PATH)".to_string(),
      Self::Container { image, .. } => format!("in builder image {}", image),
    }
  }

  /// Command prefix that starts `tool` with `workdir` as working directory,
  /// or `None` if the tool cannot be found.
  ///
  /// Arguments naming files in `workdir` should be passed as bare file names.
  pub async fn locate(&self, tool: &'static str, workdir: &Path) -> Result<Option<Vec<String>>, StepError> {
    match self {
      Self::Local { env, os, .. } => Ok(find_local_tool(env, tool, *os).map(|path| vec![path.display().to_string()])),
      Self::Container {
        adapter,
        image,
        runtime_options,
      } => {
        let options = RunOptions {
          runtime_options: runtime_options.to_vec(),
          entrypoint: Some(tool.to_string()),
          ..Default::default()
        };
        let prefix = adapter.run_prefix(Some(workdir), image, &options).await?;

        let mut probe = prefix.clone();
        probe.push("--version".to_string());
        match adapter.launcher().capture(&probe, Some(workdir)).await {
          Ok(captured) if captured.success() => Ok(Some(prefix)),
          Ok(captured) => {
            debug!(tool, code = captured.code, "tool probe failed in builder image");
            Ok(None)
          }
          Err(err) => {
            debug!(tool, error = %err, "tool probe failed in builder image");
            Ok(None)
          }
        }
      }
    }
  }

  /// Run a located command in `workdir` and return its exit code.
  pub async fn run(&self, argv: &[String], workdir: &Path) -> Result<i32, StepError> {
    Ok(
      self
        .launcher()
        .execute(argv, workdir, CaptureMode::Discard, None)
        .await?,
    )
  }
}

/// Look for `tool` under `GRAALVM_HOME/bin`, then `JAVA_HOME/bin`, then on `PATH`.
pub fn find_local_tool(env: &ToolEnv, tool: &str, os: Os) -> Option<PathBuf> {
  let file_name = tool_file_name(tool, os);
  [env.graalvm_home.as_ref(), env.java_home.as_ref()]
    .into_iter()
    .flatten()
    .map(|home| home.join("bin").join(&file_name))
    .find(|candidate| is_executable(candidate))
    .or_else(|| env.find_on_path(&file_name))
}

/// Directory containing `path`, as the working directory for a tool acting on it.
pub(crate) fn parent_dir(path: &Path) -> Result<&Path, StepError> {
  path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .ok_or_else(|| StepError::NoParent {
      path: path.to_path_buf(),
    })
}

/// File name component of `path` as an argument.
pub(crate) fn file_arg(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}
