//! Tool discovery on the host.
//!
//! The compiler, `objcopy`, `upx` and `java` are all located the same way:
//! an explicit install directory first, then `JAVA_HOME`, then every entry of
//! `PATH`. The environment is captured once into a [`ToolEnv`] so lookups can
//! be exercised without touching the process environment.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::os::Os;

/// Environment variable naming an explicit GraalVM/Mandrel installation.
pub const GRAALVM_HOME: &str = "GRAALVM_HOME";

/// Environment variable naming the JDK installation.
pub const JAVA_HOME: &str = "JAVA_HOME";

/// Environment variable holding the executable search path.
pub const PATH: &str = "PATH";

/// Snapshot of the environment variables used for tool discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnv {
  pub graalvm_home: Option<PathBuf>,
  pub java_home: Option<PathBuf>,
  pub path: Option<OsString>,
}

impl ToolEnv {
  /// Capture the discovery variables from the current process environment.
  ///
  /// Empty values are treated as unset.
  pub fn from_process() -> Self {
    Self {
      graalvm_home: non_empty_var(GRAALVM_HOME).map(PathBuf::from),
      java_home: non_empty_var(JAVA_HOME).map(PathBuf::from),
      path: non_empty_var(PATH),
    }
  }

  /// The directories listed in `PATH`, in order.
  pub fn path_dirs(&self) -> Vec<PathBuf> {
    self
      .path
      .as_ref()
      .map(|p| std::env::split_paths(p).collect())
      .unwrap_or_default()
  }

  /// Search `PATH` for an executable named `name`.
  pub fn find_on_path(&self, name: &str) -> Option<PathBuf> {
    self
      .path_dirs()
      .into_iter()
      .filter(|dir| dir.is_dir())
      .map(|dir| dir.join(name))
      .find(|candidate| is_executable(candidate))
  }
}

fn non_empty_var(key: &str) -> Option<OsString> {
  std::env::var_os(key).filter(|v| !v.is_empty())
}

/// Name of a launcher script or binary on the given OS.
///
/// `native-image` ships as a `.cmd` script on Windows, other JDK tools as `.exe`.
pub fn tool_file_name(tool: &str, os: Os) -> String {
  match (os, tool) {
    (Os::Windows, "native-image") => format!("{}.cmd", tool),
    (Os::Windows, _) => format!("{}.exe", tool),
    _ => tool.to_string(),
  }
}

/// Whether `path` points at a file this process could execute.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  std::fs::metadata(path)
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

/// Whether `path` points at a file this process could execute.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
  path.is_file()
}

/// Translate a host path into the form container engines accept for `-v`.
///
/// On Windows `C:\work\app` becomes `/c/work/app`; other hosts pass through.
pub fn to_volume_path(path: &Path, os: Os) -> String {
  let raw = path.to_string_lossy();
  if os != Os::Windows {
    return raw.into_owned();
  }

  let unified = raw.replace('\\', "/");
  let mut chars = unified.chars();
  match (chars.next(), chars.next()) {
    (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
      format!("/{}{}", drive.to_ascii_lowercase(), chars.as_str())
    }
    _ => unified,
  }
}
