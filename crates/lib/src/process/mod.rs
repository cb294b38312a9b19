//! External process execution.

pub mod harness;
mod launcher;

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

pub use launcher::{CaptureMode, Captured, ErrorSink, Launcher, SystemLauncher};

/// Errors from starting or supervising a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("cannot run an empty command line")]
  EmptyCommand,

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed waiting for {program}: {source}")]
  Wait {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("child {0} was not captured")]
  MissingPipe(&'static str),

  #[error("stderr processing stopped before completion")]
  ReportAborted,

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Numeric exit code, mapping signal terminations to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
  if let Some(code) = status.code() {
    return code;
  }

  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
      return 128 + signal;
    }
  }

  -1
}

/// Render a command line for logging, escaping `$` so it can be pasted into a shell.
pub fn display_command(argv: &[String]) -> String {
  argv.join(" ").replace('$', "\\$")
}

/// Turn string slices into an owned argument vector.
pub fn to_argv<S: AsRef<str>>(parts: &[S]) -> Vec<String> {
  parts.iter().map(|p| p.as_ref().to_string()).collect()
}
