//! Subprocess launching.
//!
//! Everything in the crate that starts an external program goes through the
//! [`Launcher`] trait: short probes (`--version`, `id -ur`, `docker info`) use
//! [`Launcher::capture`], long-running tool invocations use
//! [`Launcher::execute`], which streams through the [`harness`](super::harness).

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use super::harness;
use super::{ProcessError, exit_code};

/// Destination for filtered compiler stderr.
pub type ErrorSink = Arc<Mutex<dyn Write + Send>>;

/// How a long-running tool's regular output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
  /// Forward stdout and stderr to the caller's streams.
  Inherit,
  /// Drain both streams without printing; only the held error report is written.
  #[default]
  Discard,
}

impl CaptureMode {
  pub fn from_verbose(verbose: bool) -> Self {
    if verbose { Self::Inherit } else { Self::Discard }
  }
}

/// Output of a short probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
  pub code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl Captured {
  pub fn success(&self) -> bool {
    self.code == 0
  }

  /// Stdout followed by stderr.
  pub fn merged(&self) -> String {
    let mut text = self.stdout.clone();
    if !self.stderr.is_empty() {
      if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
      }
      text.push_str(&self.stderr);
    }
    text
  }
}

#[async_trait]
pub trait Launcher: Send + Sync {
  /// Run `argv` to completion and collect its output.
  async fn capture(&self, argv: &[String], cwd: Option<&Path>) -> Result<Captured, ProcessError>;

  /// Run `argv` in `cwd`, streaming its output, and return the exit code.
  ///
  /// `reports_dir` is where the compiler writes its call-tree report.
  async fn execute(
    &self,
    argv: &[String],
    cwd: &Path,
    mode: CaptureMode,
    reports_dir: Option<&Path>,
  ) -> Result<i32, ProcessError>;
}

/// [`Launcher`] backed by real OS processes.
#[derive(Clone)]
pub struct SystemLauncher {
  sink: ErrorSink,
}

impl SystemLauncher {
  /// Launcher writing filtered stderr to this process's stderr.
  pub fn new() -> Self {
    Self::with_sink(Arc::new(Mutex::new(std::io::stderr())))
  }

  pub fn with_sink(sink: ErrorSink) -> Self {
    Self { sink }
  }
}

impl Default for SystemLauncher {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Launcher for SystemLauncher {
  async fn capture(&self, argv: &[String], cwd: Option<&Path>) -> Result<Captured, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

    let mut command = Command::new(program);
    command
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(dir) = cwd {
      command.current_dir(dir);
    }

    debug!(program = %program, args = ?args, "probing");
    let output = command.output().await.map_err(|source| ProcessError::Spawn {
      program: program.clone(),
      source,
    })?;

    let captured = Captured {
      code: exit_code(output.status),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    trace!(code = captured.code, output = %captured.merged(), "probe finished");
    Ok(captured)
  }

  async fn execute(
    &self,
    argv: &[String],
    cwd: &Path,
    mode: CaptureMode,
    reports_dir: Option<&Path>,
  ) -> Result<i32, ProcessError> {
    harness::run(argv, cwd, mode, reports_dir, self.sink.clone()).await
  }
}
