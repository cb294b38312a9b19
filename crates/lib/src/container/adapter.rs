//! Container invocation prefixes.
//!
//! Builds the `<engine> run ...` and `<engine> create ...` token lists shared
//! by every containerized tool invocation. The detected runtime and the host
//! user ids are probed once per adapter and cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::ContainerError;
use super::runtime::{ContainerRuntime, Engine, resolve_runtime};
use crate::consts::CONTAINER_PROJECT_DIR;
use crate::platform::os::Os;
use crate::platform::paths::to_volume_path;
use crate::process::{Launcher, to_argv};

/// Additional bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub host: PathBuf,
  pub container: String,
}

/// Per-invocation options appended after the engine's own flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
  pub extra_mounts: Vec<Mount>,
  /// Raw options passed through from configuration (`--cpus=4`, `--memory=8g`, ...).
  pub runtime_options: Vec<String>,
  pub publish_port: Option<u16>,
  pub entrypoint: Option<String>,
}

/// Numeric user and group of the invoking user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIds {
  pub uid: u32,
  pub gid: u32,
}

pub struct ContainerAdapter {
  launcher: Arc<dyn Launcher>,
  requested: Option<Engine>,
  host_os: Os,
  runtime: OnceCell<ContainerRuntime>,
  user_ids: OnceCell<Option<UserIds>>,
}

impl ContainerAdapter {
  pub fn new(launcher: Arc<dyn Launcher>, requested: Option<Engine>, host_os: Os) -> Self {
    Self {
      launcher,
      requested,
      host_os,
      runtime: OnceCell::new(),
      user_ids: OnceCell::new(),
    }
  }

  pub fn launcher(&self) -> &Arc<dyn Launcher> {
    &self.launcher
  }

  /// The container runtime, detected on first use.
  pub async fn runtime(&self) -> Result<ContainerRuntime, ContainerError> {
    self
      .runtime
      .get_or_try_init(|| resolve_runtime(self.launcher.as_ref(), self.requested))
      .await
      .copied()
  }

  /// `[engine, run, ...flags, image]`, with `mount` (when given) bound to the project directory.
  pub async fn run_prefix(
    &self,
    mount: Option<&Path>,
    image: &str,
    options: &RunOptions,
  ) -> Result<Vec<String>, ContainerError> {
    let runtime = self.runtime().await?;

    let mut tokens = to_argv(&[runtime.executable(), "run", "--env", "LANG=C", "--rm"]);
    if let Some(dir) = mount {
      tokens.push("-v".to_string());
      tokens.push(format!("{}:{}:z", self.volume_path(dir)?, CONTAINER_PROJECT_DIR));
    }
    for mount in &options.extra_mounts {
      tokens.push("-v".to_string());
      tokens.push(format!("{}:{}:z", self.volume_path(&mount.host)?, mount.container));
    }
    tokens.push("-w".to_string());
    tokens.push(CONTAINER_PROJECT_DIR.to_string());

    self.push_identity_and_options(&mut tokens, runtime, options).await;
    tokens.push(image.to_string());

    debug!(prefix = ?tokens, "container run prefix");
    Ok(tokens)
  }

  /// `[engine, create, --name, NAME, ...flags, image]` for engines without bind mounts.
  pub async fn create_prefix(
    &self,
    name: &str,
    image: &str,
    options: &RunOptions,
  ) -> Result<Vec<String>, ContainerError> {
    let runtime = self.runtime().await?;

    let mut tokens = to_argv(&[runtime.executable(), "create", "--name", name, "--env", "LANG=C"]);
    tokens.push("-w".to_string());
    tokens.push(CONTAINER_PROJECT_DIR.to_string());

    self.push_identity_and_options(&mut tokens, runtime, options).await;
    tokens.push(image.to_string());

    debug!(prefix = ?tokens, "container create prefix");
    Ok(tokens)
  }

  async fn push_identity_and_options(
    &self,
    tokens: &mut Vec<String>,
    runtime: ContainerRuntime,
    options: &RunOptions,
  ) {
    if self.host_os == Os::Linux {
      let rootless_docker = runtime.engine == Engine::Docker && runtime.rootless;
      if !rootless_docker && let Some(ids) = self.user_ids().await {
        tokens.push("--user".to_string());
        tokens.push(format!("{}:{}", ids.uid, ids.gid));
      }
      if runtime.engine == Engine::Podman && runtime.rootless {
        tokens.push("--userns=keep-id".to_string());
      }
    }

    tokens.extend(options.runtime_options.iter().cloned());

    if let Some(port) = options.publish_port {
      tokens.push("--publish".to_string());
      tokens.push(format!("{}:{}", port, port));
    }
    if let Some(entrypoint) = &options.entrypoint {
      tokens.push("--entrypoint".to_string());
      tokens.push(entrypoint.clone());
    }
  }

  /// The invoking user's ids, or `None` if `id` could not be run.
  pub async fn user_ids(&self) -> Option<UserIds> {
    *self
      .user_ids
      .get_or_init(|| async {
        let uid = self.probe_id("-ur").await;
        let gid = self.probe_id("-gr").await;
        match (uid, gid) {
          (Some(uid), Some(gid)) => Some(UserIds { uid, gid }),
          _ => {
            warn!("could not determine the host user and group ids; the container will run as its default user");
            None
          }
        }
      })
      .await
  }

  async fn probe_id(&self, flag: &str) -> Option<u32> {
    let captured = self.launcher.capture(&to_argv(&["id", flag]), None).await.ok()?;
    if !captured.success() {
      return None;
    }
    captured.stdout.trim().parse().ok()
  }

  fn volume_path(&self, path: &Path) -> Result<String, ContainerError> {
    let canonical = dunce::canonicalize(path).map_err(|source| ContainerError::VolumePath {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(to_volume_path(&canonical, self.host_os))
  }
}
