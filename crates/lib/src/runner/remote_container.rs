use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::local_container::{pull_image, query_container_version};
use super::{BuildRequest, BuildResult, BuildRunner, RunnerContext, RunnerError, RunnerKind};
use crate::config::NativeConfig;
use crate::consts::{BUILD_STATS_SUFFIX, CONTAINER_PROJECT_DIR, DEBUG_BUILD_PROCESS_PORT, NATIVE_IMAGE};
use crate::container::{ContainerAdapter, RunOptions};
use crate::platform::os::Os;
use crate::platform::paths::ToolEnv;
use crate::process::{Launcher, display_command, to_argv};
use crate::steps::ToolHost;
use crate::toolchain::Version;

/// Builds in a long-lived container for engines that cannot bind-mount host
/// directories. Inputs are copied in with `cp`, the build runs attached to the
/// pre-created container, and results are copied back out.
pub struct RemoteContainerRunner {
  adapter: ContainerAdapter,
  image: String,
  runtime_options: Vec<String>,
  publish_port: Option<u16>,
  container_name: String,
  created: AtomicBool,
  launcher: Arc<dyn Launcher>,
  env: ToolEnv,
  host_os: Os,
}

impl RemoteContainerRunner {
  pub fn new(config: &NativeConfig, ctx: &RunnerContext) -> Self {
    Self {
      adapter: ContainerAdapter::new(ctx.launcher.clone(), config.container_runtime, ctx.host_os),
      image: config.builder_image.clone(),
      runtime_options: config.container_runtime_options.clone(),
      publish_port: config.publishes_debug_port().then_some(DEBUG_BUILD_PROCESS_PORT),
      container_name: unique_container_name(),
      created: AtomicBool::new(false),
      launcher: ctx.launcher.clone(),
      env: ctx.env.clone(),
      host_os: ctx.host_os,
    }
  }

  pub fn container_name(&self) -> &str {
    &self.container_name
  }

  async fn engine(&self) -> Result<&'static str, RunnerError> {
    Ok(self.adapter.runtime().await?.executable())
  }

  /// Run a short engine command, failing the build on a non-zero exit.
  async fn engine_step(&self, step: &'static str, argv: Vec<String>) -> Result<(), RunnerError> {
    debug!(cmd = %display_command(&argv), step, "container step");
    let captured = self.launcher.capture(&argv, None).await?;
    if !captured.success() {
      warn!(step, output = %captured.merged().trim(), "container step failed");
      return Err(RunnerError::StepFailed {
        step,
        code: captured.code,
      });
    }
    Ok(())
  }

  fn in_container(&self, file: &str) -> String {
    format!("{}:{}/{}", self.container_name, CONTAINER_PROJECT_DIR, file)
  }

  async fn copy_out(&self, file: &str, build_dir: &Path) -> Result<(), RunnerError> {
    let engine = self.engine().await?;
    let target = build_dir.join(file).display().to_string();
    self
      .engine_step("container cp", to_argv(&[engine, "cp", &self.in_container(file), &target]))
      .await
  }
}

fn unique_container_name() -> String {
  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_nanos())
    .unwrap_or_default();
  format!("nativeforge-build-{}-{}", std::process::id(), nanos)
}

#[async_trait]
impl BuildRunner for RemoteContainerRunner {
  fn kind(&self) -> RunnerKind {
    RunnerKind::RemoteContainer
  }

  fn is_containerized(&self) -> bool {
    true
  }

  /// The remote engine cannot mount the output directory, so post-processing
  /// tools run on this host.
  fn tool_host(&self) -> Option<ToolHost<'_>> {
    Some(ToolHost::Local {
      env: &self.env,
      launcher: self.launcher.as_ref(),
      os: self.host_os,
    })
  }

  async fn setup(&self) -> Result<(), RunnerError> {
    pull_image(&self.adapter, &self.image).await
  }

  async fn query_version(&self) -> Result<Version, RunnerError> {
    query_container_version(&self.adapter, &self.image, &self.runtime_options).await
  }

  async fn pre_build(&self, request: &BuildRequest<'_>) -> Result<(), RunnerError> {
    let options = RunOptions {
      runtime_options: self.runtime_options.clone(),
      publish_port: self.publish_port,
      entrypoint: Some(NATIVE_IMAGE.to_string()),
      ..Default::default()
    };
    let prefix = self
      .adapter
      .create_prefix(&self.container_name, &self.image, &options)
      .await?;
    let create = request.command.with_prefix(&prefix);
    info!(container = %self.container_name, cmd = %display_command(&create), "creating build container");
    self.engine_step("container create", create).await?;
    self.created.store(true, Ordering::SeqCst);

    let engine = self.engine().await?;
    let source = format!("{}/.", request.build_dir.display());
    let target = format!("{}:{}/", self.container_name, CONTAINER_PROJECT_DIR);
    self
      .engine_step("container cp", to_argv(&[engine, "cp", &source, &target]))
      .await
  }

  async fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
    let engine = self.engine().await?;
    let argv = to_argv(&[engine, "start", "--attach", &self.container_name]);
    info!(cmd = %display_command(&argv), "running native-image in a remote container");

    let code = self
      .launcher
      .execute(&argv, request.build_dir, request.mode, None)
      .await?;

    if code == 0 {
      self.copy_out(request.name, request.build_dir).await?;

      let stats = format!("{}{}", request.name, BUILD_STATS_SUFFIX);
      if let Err(err) = self.copy_out(&stats, request.build_dir).await {
        debug!(error = %err, "no build statistics to copy back");
      }
    }

    Ok(BuildResult::collect(code, request.build_dir.join(request.name)))
  }

  async fn post_build(&self, _build_dir: &Path) {
    if !self.created.swap(false, Ordering::SeqCst) {
      return;
    }
    let engine = match self.engine().await {
      Ok(engine) => engine,
      Err(err) => {
        warn!(container = %self.container_name, error = %err, "cannot remove build container");
        return;
      }
    };

    let argv = to_argv(&[engine, "container", "rm", "--volumes", &self.container_name]);
    match self.launcher.capture(&argv, None).await {
      Ok(captured) if captured.success() => debug!(container = %self.container_name, "removed build container"),
      Ok(captured) => warn!(
        container = %self.container_name,
        code = captured.code,
        "failed to remove build container"
      ),
      Err(err) => warn!(container = %self.container_name, error = %err, "failed to remove build container"),
    }
  }
}
