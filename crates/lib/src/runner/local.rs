use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{
  BuildRequest, BuildResult, BuildRunner, ResolutionError, RunnerContext, RunnerError, RunnerKind, resolve_native_image,
  version_from_probe,
};
use crate::config::NativeConfig;
use crate::platform::os::Os;
use crate::platform::paths::ToolEnv;
use crate::process::{Launcher, display_command};
use crate::steps::ToolHost;
use crate::toolchain::Version;

/// Runs an installed `native-image` directly.
pub struct LocalRunner {
  native_image: PathBuf,
  launcher: Arc<dyn Launcher>,
  env: ToolEnv,
  os: Os,
}

impl LocalRunner {
  /// Fails when no `native-image` can be found.
  pub fn new(config: &NativeConfig, ctx: &RunnerContext) -> Result<Self, ResolutionError> {
    let native_image = resolve_native_image(config, &ctx.env, ctx.host_os)?;
    Ok(Self {
      native_image,
      launcher: ctx.launcher.clone(),
      env: ctx.env.clone(),
      os: ctx.host_os,
    })
  }

  pub fn native_image(&self) -> &std::path::Path {
    &self.native_image
  }

  fn program(&self) -> String {
    self.native_image.display().to_string()
  }
}

#[async_trait]
impl BuildRunner for LocalRunner {
  fn kind(&self) -> RunnerKind {
    RunnerKind::Local
  }

  fn is_containerized(&self) -> bool {
    false
  }

  fn tool_host(&self) -> Option<ToolHost<'_>> {
    Some(ToolHost::Local {
      env: &self.env,
      launcher: self.launcher.as_ref(),
      os: self.os,
    })
  }

  fn executable_file_name(&self, name: &str) -> String {
    if self.os == Os::Windows {
      format!("{}.exe", name)
    } else {
      name.to_string()
    }
  }

  async fn query_version(&self) -> Result<Version, RunnerError> {
    let argv = vec![self.program(), "--version".to_string()];
    let captured = self.launcher.capture(&argv, None).await?;
    version_from_probe(&captured)
  }

  async fn build(&self, request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
    let argv = request.command.with_prefix(&[self.program()]);
    info!(cmd = %display_command(&argv), "running native-image");

    let code = self
      .launcher
      .execute(&argv, request.build_dir, request.mode, request.reports_dir)
      .await?;

    let executable = request.build_dir.join(self.executable_file_name(request.name));
    Ok(BuildResult::collect(code, executable))
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::command::{AssemblyContext, assemble};
  use crate::process::CaptureMode;
  use crate::toolchain::CURRENT;
  use crate::util::testutil::{FakeLauncher, banner, write_executable};
  use tempfile::TempDir;

  fn runner(launcher: FakeLauncher) -> (TempDir, Arc<FakeLauncher>, LocalRunner) {
    let graal = TempDir::new().unwrap();
    write_executable(&graal.path().join("bin/native-image"), "#!/bin/sh\n");
    let launcher = Arc::new(launcher);
    let ctx = RunnerContext {
      launcher: launcher.clone(),
      env: ToolEnv {
        graalvm_home: Some(graal.path().to_path_buf()),
        ..Default::default()
      },
      host_os: Os::Linux,
    };
    let runner = LocalRunner::new(&NativeConfig::default(), &ctx).unwrap();
    (graal, launcher, runner)
  }

  #[tokio::test]
  async fn version_probe_uses_resolved_binary() {
    let (graal, launcher, runner) = runner(
      FakeLauncher::new().respond("/", 0, &banner("21.0.2", "GraalVM CE 21.0.2+13.1")),
    );

    let version = runner.query_version().await.unwrap();

    assert_eq!(version.java_feature(), 21);
    assert_eq!(
      launcher.captures(),
      vec![vec![
        graal.path().join("bin/native-image").display().to_string(),
        "--version".to_string()
      ]]
    );
  }

  #[tokio::test]
  async fn build_runs_in_build_dir_and_collects_executable() {
    let dir = TempDir::new().unwrap();
    let (graal, launcher, runner) = runner(
      FakeLauncher::new().on_execute(|_, cwd| std::fs::write(cwd.join("app"), b"elf").unwrap()),
    );

    let command = assemble(
      &NativeConfig::default(),
      &CURRENT,
      &AssemblyContext {
        name: "app",
        jar: "app-runner.jar",
        build_dir: dir.path(),
        containerized: false,
        host_os: Os::Linux,
      },
    )
    .unwrap();
    let request = BuildRequest {
      build_dir: dir.path(),
      name: "app",
      command: &command,
      mode: CaptureMode::Discard,
      reports_dir: None,
    };

    let result = runner.build(&request).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.executable, Some(dir.path().join("app")));
    let argv = &launcher.executions()[0];
    assert_eq!(argv[0], graal.path().join("bin/native-image").display().to_string());
    assert_eq!(&argv[argv.len() - 3..], &["-jar", "app-runner.jar", "app"]);
    assert_eq!(launcher.execution_dirs(), vec![dir.path().to_path_buf()]);
  }

  #[tokio::test]
  async fn failed_build_has_no_executable() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app"), b"stale").unwrap();
    let (_graal, _launcher, runner) = runner(FakeLauncher::new().exit_with(1));
    let command = assemble(
      &NativeConfig::default(),
      &CURRENT,
      &AssemblyContext {
        name: "app",
        jar: "app.jar",
        build_dir: dir.path(),
        containerized: false,
        host_os: Os::Linux,
      },
    )
    .unwrap();

    let result = runner
      .build(&BuildRequest {
        build_dir: dir.path(),
        name: "app",
        command: &command,
        mode: CaptureMode::Discard,
        reports_dir: None,
      })
      .await
      .unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.executable, None);
  }

  #[test]
  fn windows_executables_get_exe_suffix() {
    let graal = TempDir::new().unwrap();
    write_executable(&graal.path().join("bin/native-image.cmd"), "@echo off\n");
    let ctx = RunnerContext {
      launcher: Arc::new(FakeLauncher::new()),
      env: ToolEnv {
        graalvm_home: Some(graal.path().to_path_buf()),
        ..Default::default()
      },
      host_os: Os::Windows,
    };

    let runner = LocalRunner::new(&NativeConfig::default(), &ctx).unwrap();
    assert_eq!(runner.native_image(), graal.path().join("bin/native-image.cmd"));
    assert_eq!(runner.executable_file_name("app"), "app.exe");
  }
}
