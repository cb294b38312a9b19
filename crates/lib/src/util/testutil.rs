//! Test utilities for nativeforge-lib.
//!
//! Provides cross-platform shell helpers, an in-memory error sink and a
//! scripted [`Launcher`] that records every subprocess the code under test
//! would have started.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::process::{CaptureMode, Captured, ErrorSink, Launcher, ProcessError};

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Owned argument vector from string literals.
pub fn argv(parts: &[&str]) -> Vec<String> {
  parts.iter().map(|p| p.to_string()).collect()
}

/// Write a file (creating parents) and mark it executable on Unix.
pub fn write_executable(path: &Path, contents: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, contents).unwrap();

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
}

/// Three-line banner as printed by `native-image --version`.
pub fn banner(java: &str, vendor: &str) -> String {
  format!(
    "native-image {java} 2024-01-16\n\
     OpenJDK Runtime Environment {vendor} (build {java}+9)\n\
     OpenJDK 64-Bit Server VM {vendor} (build {java}+9, mixed mode)\n"
  )
}

/// In-memory [`ErrorSink`].
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  pub fn sink(&self) -> ErrorSink {
    Arc::new(Mutex::new(BufferWriter(self.0.clone())))
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl Write for BufferWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

type ExecuteHook = Box<dyn Fn(&[String], &Path) + Send + Sync>;

/// Scripted [`Launcher`].
///
/// `capture` answers with the first registered response whose prefix matches
/// the space-joined command line; unmatched probes fail as if the program did
/// not exist. `execute` runs the optional hook and returns the configured exit
/// code.
#[derive(Default)]
pub struct FakeLauncher {
  responses: Vec<(String, Option<Captured>)>,
  exit_code: i32,
  hook: Option<ExecuteHook>,
  captures: Mutex<Vec<Vec<String>>>,
  executions: Mutex<Vec<(Vec<String>, PathBuf)>>,
}

impl FakeLauncher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Answer probes starting with `prefix`.
  pub fn respond(mut self, prefix: &str, code: i32, stdout: &str) -> Self {
    self.responses.push((
      prefix.to_string(),
      Some(Captured {
        code,
        stdout: stdout.to_string(),
        stderr: String::new(),
      }),
    ));
    self
  }

  /// Make probes starting with `prefix` fail to spawn.
  pub fn fail(mut self, prefix: &str) -> Self {
    self.responses.push((prefix.to_string(), None));
    self
  }

  pub fn exit_with(mut self, code: i32) -> Self {
    self.exit_code = code;
    self
  }

  pub fn on_execute(mut self, hook: impl Fn(&[String], &Path) + Send + Sync + 'static) -> Self {
    self.hook = Some(Box::new(hook));
    self
  }

  pub fn captures(&self) -> Vec<Vec<String>> {
    self.captures.lock().unwrap().clone()
  }

  pub fn executions(&self) -> Vec<Vec<String>> {
    self
      .executions
      .lock()
      .unwrap()
      .iter()
      .map(|(argv, _)| argv.clone())
      .collect()
  }

  pub fn execution_dirs(&self) -> Vec<PathBuf> {
    self
      .executions
      .lock()
      .unwrap()
      .iter()
      .map(|(_, cwd)| cwd.clone())
      .collect()
  }
}

#[async_trait]
impl Launcher for FakeLauncher {
  async fn capture(&self, argv: &[String], _cwd: Option<&Path>) -> Result<Captured, ProcessError> {
    self.captures.lock().unwrap().push(argv.to_vec());
    let line = argv.join(" ");

    match self.responses.iter().find(|(prefix, _)| line.starts_with(prefix.as_str())) {
      Some((_, Some(captured))) => Ok(captured.clone()),
      _ => Err(ProcessError::Spawn {
        program: argv.first().cloned().unwrap_or_default(),
        source: io::Error::new(io::ErrorKind::NotFound, "not scripted"),
      }),
    }
  }

  async fn execute(
    &self,
    argv: &[String],
    cwd: &Path,
    _mode: CaptureMode,
    _reports_dir: Option<&Path>,
  ) -> Result<i32, ProcessError> {
    self.executions.lock().unwrap().push((argv.to_vec(), cwd.to_path_buf()));
    if let Some(hook) = &self.hook {
      hook(argv, cwd);
    }
    Ok(self.exit_code)
  }
}
