use async_trait::async_trait;
use tracing::{info, warn};

use super::{BuildRequest, BuildResult, BuildRunner, RunnerContext, RunnerError, RunnerKind, version_from_probe};
use crate::config::NativeConfig;
use crate::consts::{DEBUG_BUILD_PROCESS_PORT, NATIVE_IMAGE};
use crate::container::{ContainerAdapter, RunOptions};
use crate::process::{display_command, to_argv};
use crate::steps::ToolHost;
use crate::toolchain::Version;

/// Runs `native-image` from the builder image with the build directory bind-mounted.
pub struct LocalContainerRunner {
  adapter: ContainerAdapter,
  image: String,
  runtime_options: Vec<String>,
  publish_port: Option<u16>,
}

impl LocalContainerRunner {
  pub fn new(config: &NativeConfig, ctx: &RunnerContext) -> Self {
    Self {
      adapter: ContainerAdapter::new(ctx.launcher.clone(), config.container_runtime, ctx.host_os),
      image: config.builder_image.clone(),
      runtime_options: config.container_runtime_options.clone(),
      publish_port: config.publishes_debug_port().then_some(DEBUG_BUILD_PROCESS_PORT),
    }
  }

  fn build_options(&self) -> RunOptions {
    RunOptions {
      runtime_options: self.runtime_options.clone(),
      publish_port: self.publish_port,
      entrypoint: Some(NATIVE_IMAGE.to_string()),
      ..Default::default()
    }
  }
}

/// `native-image --version` in a throwaway container.
pub(super) async fn query_container_version(
  adapter: &ContainerAdapter,
  image: &str,
  runtime_options: &[String],
) -> Result<Version, RunnerError> {
  let options = RunOptions {
    runtime_options: runtime_options.to_vec(),
    entrypoint: Some(NATIVE_IMAGE.to_string()),
    ..Default::default()
  };
  let mut argv = adapter.run_prefix(None, image, &options).await?;
  argv.push("--version".to_string());

  let captured = adapter.launcher().capture(&argv, None).await?;
  version_from_probe(&captured)
}

/// Pull `image` up front so the version probe does not look stuck on a
/// large download. Failure is only logged; a cached image may still work.
pub(super) async fn pull_image(adapter: &ContainerAdapter, image: &str) -> Result<(), RunnerError> {
  let runtime = adapter.runtime().await?;
  info!(image, engine = %runtime.engine, "pulling builder image");

  let argv = to_argv(&[runtime.executable(), "pull", image]);
  match adapter.launcher().capture(&argv, None).await {
    Ok(captured) if captured.success() => {}
    Ok(captured) => warn!(image, code = captured.code, output = %captured.merged().trim(), "failed to pull builder image"),
    Err(err) => warn!(image, error = %err, "failed to pull builder image"),
  }
  Ok(())
}

#[async_trait]
impl BuildRunner for LocalContainerRunner {
  fn kind(&self) -> RunnerKind {
    RunnerKind::LocalContainer
  }

  fn is_containerized(&self) -> bool {
    true
  }

  fn tool_host(&self) -> Option<ToolHost<'_>> {
    Some(ToolHost::Container {
      adapter: &self.adapter,
      image: &self.image,
      runtime_options: &self.runtime_options,
    })
  }

  async fn setup(&self) -> Result<(), RunnerError> {
    pull_image(&self.adapter, &self.image).await
  }

  async fn query_version(&self) -> Result<Version, RunnerError> {
    query_container_version(&self.adapter, &self.image, &self.runtime_options).await
  }

  async fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
    let prefix = self
      .adapter
      .run_prefix(Some(request.build_dir), &self.image, &self.build_options())
      .await?;
    let argv = request.command.with_prefix(&prefix);
    info!(cmd = %display_command(&argv), "running native-image in a container");

    let code = self
      .adapter
      .launcher()
      .execute(&argv, request.build_dir, request.mode, request.reports_dir)
      .await?;

    Ok(BuildResult::collect(code, request.build_dir.join(request.name)))
  }
}
