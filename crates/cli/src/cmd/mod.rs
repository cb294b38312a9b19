mod archive;
mod build;
mod info;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use nativeforge_lib::config::NativeConfig;
use nativeforge_lib::platform::os::Os;
use nativeforge_lib::platform::paths::ToolEnv;
use nativeforge_lib::process::SystemLauncher;
use nativeforge_lib::runner::RunnerContext;

pub use archive::cmd_archive;
pub use build::{BuildArgs, cmd_build};
pub use info::cmd_info;

/// Configuration from `path`, or the defaults.
fn load_config(path: Option<&Path>) -> Result<NativeConfig> {
  match path {
    Some(path) => Ok(NativeConfig::load(path)?),
    None => Ok(NativeConfig::default()),
  }
}

fn runner_context() -> Result<RunnerContext> {
  let host_os = Os::current().context("Unsupported host operating system")?;
  Ok(RunnerContext {
    launcher: Arc::new(SystemLauncher::new()),
    env: ToolEnv::from_process(),
    host_os,
  })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
