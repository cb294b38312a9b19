//! Container engine detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ContainerError;
use crate::process::{Launcher, to_argv};

/// Supported container engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
  Docker,
  Podman,
}

impl Engine {
  /// Executable name of the engine's CLI.
  pub fn executable(&self) -> &'static str {
    match self {
      Self::Docker => "docker",
      Self::Podman => "podman",
    }
  }
}

impl fmt::Display for Engine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.executable())
  }
}

impl FromStr for Engine {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "docker" => Ok(Self::Docker),
      "podman" => Ok(Self::Podman),
      other => Err(format!("unknown container runtime: {}", other)),
    }
  }
}

/// A detected engine together with its rootless state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerRuntime {
  pub engine: Engine,
  pub rootless: bool,
}

impl ContainerRuntime {
  pub fn new(engine: Engine, rootless: bool) -> Self {
    Self { engine, rootless }
  }

  pub fn executable(&self) -> &'static str {
    self.engine.executable()
  }
}

impl fmt::Display for ContainerRuntime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.rootless {
      write!(f, "{} (rootless)", self.engine)
    } else {
      write!(f, "{}", self.engine)
    }
  }
}

/// Trimmed `--version` output of `engine`, or `None` if the probe failed.
async fn probe_version(launcher: &dyn Launcher, engine: Engine) -> Option<String> {
  match launcher.capture(&to_argv(&[engine.executable(), "--version"]), None).await {
    Ok(captured) if captured.success() => Some(captured.merged().trim().to_string()),
    Ok(captured) => {
      debug!(engine = %engine, code = captured.code, "version probe failed");
      None
    }
    Err(err) => {
      debug!(engine = %engine, error = %err, "version probe failed");
      None
    }
  }
}

/// Pick the container engine available on this host.
///
/// `docker` is commonly installed as an alias of `podman`; when both probes
/// print the same text, podman is the engine really answering.
pub async fn detect_engine(launcher: &dyn Launcher) -> Result<Engine, ContainerError> {
  let docker = probe_version(launcher, Engine::Docker).await;
  let podman = probe_version(launcher, Engine::Podman).await;

  let engine = match (docker, podman) {
    (Some(d), Some(p)) if d == p => Engine::Podman,
    (Some(d), _) if d.contains("Docker") => Engine::Docker,
    (_, Some(_)) => Engine::Podman,
    (Some(_), None) => Engine::Docker,
    (None, None) => return Err(ContainerError::NotFound),
  };

  debug!(engine = %engine, "detected container engine");
  Ok(engine)
}

/// Whether `engine` runs rootless, read from `<engine> info`.
///
/// A failing probe is treated as rootful.
pub async fn detect_rootless(launcher: &dyn Launcher, engine: Engine) -> bool {
  let captured = match launcher.capture(&to_argv(&[engine.executable(), "info"]), None).await {
    Ok(captured) if captured.success() => captured,
    Ok(captured) => {
      warn!(engine = %engine, code = captured.code, "could not query container engine info, assuming rootful");
      return false;
    }
    Err(err) => {
      warn!(engine = %engine, error = %err, "could not query container engine info, assuming rootful");
      return false;
    }
  };

  let info = captured.merged();
  match engine {
    Engine::Docker => info.contains("rootless"),
    Engine::Podman => info.lines().any(|line| line.trim() == "rootless: true"),
  }
}

/// Resolve the runtime to use, honouring an explicit engine choice.
pub async fn resolve_runtime(
  launcher: &dyn Launcher,
  requested: Option<Engine>,
) -> Result<ContainerRuntime, ContainerError> {
  let engine = match requested {
    Some(engine) => engine,
    None => detect_engine(launcher).await?,
  };
  let rootless = detect_rootless(launcher, engine).await;
  Ok(ContainerRuntime::new(engine, rootless))
}
