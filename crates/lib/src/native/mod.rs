//! Native image build orchestration.
//!
//! [`NativeImageBuilder`] owns one configuration and the backend resolved for
//! it, and drives a build through the runner lifecycle: the toolchain version
//! is queried and gated, the command line assembled against it, the compiler
//! run, its exit code classified, and the executable moved into place before
//! the optional debug-symbol and compression steps.

mod error;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

pub use error::{BuildError, BuildErrorKind, Stage, classify_exit};

use crate::command::{AssemblyContext, BuildCommand, assemble};
use crate::config::NativeConfig;
use crate::consts::{ARGS_FILE, BUILD_STATS_SUFFIX, REPORTS_DIR};
use crate::platform::os::Os;
use crate::process::CaptureMode;
use crate::runner::{BuildRequest, BuildResult, BuildRunner, RunnerContext, RunnerError, RunnerKind, resolve_runner};
use crate::steps::compress::compress;
use crate::toolchain::{CURRENT, MINIMUM, Version};

/// Input artifact and output location of one build.
#[derive(Debug, Clone)]
pub struct NativeImageRequest<'a> {
  /// Runnable jar. Its directory is the native-sources directory the compiler runs in.
  pub jar: &'a Path,
  /// Where the final executable is placed.
  pub output_dir: &'a Path,
  /// Executable base name; defaults to the jar's file stem.
  pub name: Option<&'a str>,
  pub verbose: bool,
}

/// A compiled executable.
#[derive(Debug, Clone, Serialize)]
pub struct NativeImage {
  pub path: PathBuf,
  pub debug_symbols: Option<PathBuf>,
  pub build_stats: Option<PathBuf>,
  pub compressed: bool,
  pub runner: RunnerKind,
  pub version: Version,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuildOutput {
  Image(NativeImage),
  /// Sources-only build: the compiler arguments were written, nothing was compiled.
  Sources { args_file: PathBuf, command: BuildCommand },
}

pub struct NativeImageBuilder {
  config: NativeConfig,
  runner: Box<dyn BuildRunner>,
  host_os: Os,
}

impl NativeImageBuilder {
  /// Builder with the backend [`resolve_runner`] picks for `config`.
  pub fn new(config: NativeConfig, ctx: &RunnerContext) -> Self {
    let runner = resolve_runner(&config, ctx);
    debug!(runner = %runner.kind(), "resolved build backend");
    Self::with_runner(config, runner, ctx.host_os)
  }

  pub fn with_runner(config: NativeConfig, runner: Box<dyn BuildRunner>, host_os: Os) -> Self {
    Self {
      config,
      runner,
      host_os,
    }
  }

  pub fn config(&self) -> &NativeConfig {
    &self.config
  }

  pub fn runner(&self) -> &dyn BuildRunner {
    self.runner.as_ref()
  }

  pub async fn build(&self, request: &NativeImageRequest<'_>) -> Result<BuildOutput, BuildError> {
    let build_dir = request
      .jar
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .ok_or_else(|| invalid(format!("{} has no parent directory", request.jar.display())))?;
    let jar = request
      .jar
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(|| invalid(format!("{} is not a file", request.jar.display())))?;
    let name = match request.name {
      Some(name) => name.to_string(),
      None => default_name(request.jar)?,
    };

    let mut assembly = AssemblyContext {
      name: &name,
      jar: &jar,
      build_dir,
      containerized: self.config.is_containerized(),
      host_os: self.host_os,
    };

    if self.runner.kind() == RunnerKind::Noop {
      return self.write_sources(build_dir, &assembly);
    }

    let mode = CaptureMode::from_verbose(request.verbose);
    let outcome = self.compile(&mut assembly, mode).await;
    self.runner.post_build(build_dir).await;
    let (version, result) = outcome?;

    let containerized = self.runner.is_containerized();
    if let Some(kind) = classify_exit(result.exit_code, containerized) {
      return Err(BuildError::new(Stage::Build, kind));
    }
    let built = result.executable.ok_or_else(|| {
      BuildError::new(
        Stage::Build,
        BuildErrorKind::MissingExecutable {
          path: build_dir.join(self.runner.executable_file_name(&name)),
        },
      )
    })?;

    let path = place_executable(&built, request.output_dir)?;
    info!(path = %path.display(), "native executable built");

    let debug_symbols = if containerized || self.host_os == Os::Linux {
      self
        .runner
        .extract_debug_symbols(&path, self.config.debug.enabled)
        .await
        .map_err(|e| BuildError::new(Stage::DebugSymbols, e))?
    } else {
      None
    };

    let stats = build_dir.join(format!("{}{}", name, BUILD_STATS_SUFFIX));
    let build_stats = stats.is_file().then_some(stats);

    let compressed = self.compress(&path).await?;

    Ok(BuildOutput::Image(NativeImage {
      path,
      debug_symbols,
      build_stats,
      compressed,
      runner: self.runner.kind(),
      version,
    }))
  }

  /// Everything from `setup` to `build`. The caller runs `post_build` after
  /// this whatever it returns.
  async fn compile(
    &self,
    assembly: &mut AssemblyContext<'_>,
    mode: CaptureMode,
  ) -> Result<(Version, BuildResult), BuildError> {
    self
      .runner
      .setup()
      .await
      .map_err(|e| BuildError::new(Stage::Setup, e))?;
    let version = self
      .runner
      .query_version()
      .await
      .map_err(|e| BuildError::new(Stage::VersionCheck, e))?;
    check_version(&version)?;

    assembly.containerized = self.runner.is_containerized();
    let command = assemble(&self.config, &version, assembly).map_err(|e| BuildError::new(Stage::Assemble, e))?;

    let reports_dir = self.config.enable_reports.then(|| assembly.build_dir.join(REPORTS_DIR));
    let request = BuildRequest {
      build_dir: assembly.build_dir,
      name: assembly.name,
      command: &command,
      mode,
      reports_dir: reports_dir.as_deref(),
    };

    self
      .runner
      .pre_build(&request)
      .await
      .map_err(|e| BuildError::new(Stage::PreBuild, e))?;
    let result = self
      .runner
      .build(&request)
      .await
      .map_err(|e| BuildError::new(Stage::Build, e))?;
    Ok((version, result))
  }

  async fn compress(&self, executable: &Path) -> Result<bool, BuildError> {
    let settings = &self.config.compression;
    if !settings.request.is_enabled() {
      return Ok(false);
    }
    let host = self
      .runner
      .tool_host()
      .ok_or_else(|| BuildError::new(Stage::Compression, RunnerError::NotMeantToBuild))?;

    let compressed = compress(&host, executable, settings)
      .await
      .map_err(|e| BuildError::new(Stage::Compression, e))?;
    Ok(compressed.is_some())
  }

  /// Sources-only build: assemble against the current toolchain version and
  /// write the arguments next to the jar.
  fn write_sources(&self, build_dir: &Path, ctx: &AssemblyContext<'_>) -> Result<BuildOutput, BuildError> {
    let command = assemble(&self.config, &CURRENT, ctx).map_err(|e| BuildError::new(Stage::Assemble, e))?;

    let args_file = build_dir.join(ARGS_FILE);
    std::fs::write(&args_file, command.to_args_file()).map_err(|source| {
      BuildError::new(
        Stage::Finalize,
        BuildErrorKind::Io {
          context: format!("failed to write {}", args_file.display()),
          source,
        },
      )
    })?;

    info!(path = %args_file.display(), "wrote native-image arguments");
    Ok(BuildOutput::Sources { args_file, command })
  }
}

fn invalid(message: String) -> BuildError {
  BuildError::new(Stage::Resolve, BuildErrorKind::InvalidInput(message))
}

fn default_name(jar: &Path) -> Result<String, BuildError> {
  jar
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .filter(|s| !s.is_empty())
    .ok_or_else(|| invalid(format!("cannot derive an executable name from {}", jar.display())))
}

/// Obsolete toolchains are rejected; older-than-current ones only warn.
fn check_version(version: &Version) -> Result<(), BuildError> {
  if version.is_obsolete() {
    return Err(BuildError::new(
      Stage::VersionCheck,
      BuildErrorKind::Obsolete {
        version: version.to_string(),
        minimum: MINIMUM.to_string(),
      },
    ));
  }
  if !version.is_supported() {
    warn!(
      version = %version,
      current = %CURRENT,
      "this toolchain is older than the current supported release; consider upgrading"
    );
  }
  info!(version = %version, "using toolchain");
  Ok(())
}

/// Move `built` into `output_dir`, keeping its file name.
fn place_executable(built: &Path, output_dir: &Path) -> Result<PathBuf, BuildError> {
  let io_err = |context: String| {
    move |source| {
      BuildError::new(
        Stage::Finalize,
        BuildErrorKind::Io { context, source },
      )
    }
  };

  std::fs::create_dir_all(output_dir).map_err(io_err(format!("failed to create {}", output_dir.display())))?;
  let file_name = built
    .file_name()
    .ok_or_else(|| invalid(format!("{} is not a file", built.display())))?;
  let target = output_dir.join(file_name);
  if target == built {
    return Ok(target);
  }

  let context = format!("failed to move {} to {}", built.display(), target.display());
  if std::fs::rename(built, &target).is_err() {
    // rename fails across filesystems
    std::fs::copy(built, &target).map_err(io_err(context.clone()))?;
    std::fs::remove_file(built).map_err(io_err(context))?;
  }
  Ok(target)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::config::{Backend, StepRequest};
  use crate::platform::paths::ToolEnv;
  use crate::util::testutil::{FakeLauncher, banner, write_executable};
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::TempDir;

  struct Fixture {
    _graal: TempDir,
    sources: TempDir,
    output: TempDir,
    launcher: Arc<FakeLauncher>,
    ctx: RunnerContext,
  }

  fn fixture(launcher: FakeLauncher) -> Fixture {
    let graal = TempDir::new().unwrap();
    write_executable(&graal.path().join("bin/native-image"), "#!/bin/sh\n");
    let sources = TempDir::new().unwrap();
    std::fs::write(sources.path().join("app-runner.jar"), b"PK").unwrap();
    let launcher = Arc::new(launcher);
    let ctx = RunnerContext {
      launcher: launcher.clone(),
      env: ToolEnv {
        graalvm_home: Some(graal.path().to_path_buf()),
        ..Default::default()
      },
      host_os: Os::Linux,
    };
    Fixture {
      _graal: graal,
      sources,
      output: TempDir::new().unwrap(),
      launcher,
      ctx,
    }
  }

  fn local() -> NativeConfig {
    NativeConfig {
      backend: Backend::Local,
      ..Default::default()
    }
  }

  impl Fixture {
    async fn build(&self, config: NativeConfig) -> Result<BuildOutput, BuildError> {
      let jar = self.sources.path().join("app-runner.jar");
      let builder = NativeImageBuilder::new(config, &self.ctx);
      builder
        .build(&NativeImageRequest {
          jar: &jar,
          output_dir: self.output.path(),
          name: None,
          verbose: false,
        })
        .await
    }
  }

  fn current_banner() -> String {
    banner("21.0.2", "GraalVM CE 21.0.2+13.1")
  }

  #[tokio::test]
  async fn obsolete_toolchain_never_starts_the_compiler() {
    let f = fixture(FakeLauncher::new().respond(
      "/",
      0,
      "GraalVM Version 21.3.0 (Java Version 11.0.13+7)",
    ));

    let err = f.build(local()).await.unwrap_err();

    assert_eq!(err.stage, Stage::VersionCheck);
    assert!(matches!(err.kind, BuildErrorKind::Obsolete { .. }));
    assert!(f.launcher.executions().is_empty());
  }

  #[tokio::test]
  #[tracing_test::traced_test]
  async fn older_than_current_only_warns() {
    let f = fixture(
      FakeLauncher::new()
        .respond("/", 0, &banner("17.0.9", "Mandrel-23.0.2.1-Final"))
        .on_execute(|argv, cwd| std::fs::write(cwd.join(argv.last().unwrap()), b"elf").unwrap()),
    );

    let output = f.build(local()).await.unwrap();

    assert!(matches!(output, BuildOutput::Image(_)));
    assert!(logs_contain("older than the current supported release"));
  }

  #[tokio::test]
  async fn successful_build_moves_executable_and_reports_stats() {
    let f = fixture(
      FakeLauncher::new()
        .respond("/", 0, &current_banner())
        .on_execute(|argv, cwd| {
          let name = argv.last().unwrap();
          std::fs::write(cwd.join(name), b"elf").unwrap();
          std::fs::write(cwd.join(format!("{}-build-output-stats.json", name)), b"{}").unwrap();
        }),
    );

    let BuildOutput::Image(image) = f.build(local()).await.unwrap() else {
      panic!("expected an image");
    };

    assert_eq!(image.path, f.output.path().join("app-runner"));
    assert!(image.path.is_file());
    assert!(!f.sources.path().join("app-runner").exists());
    assert_eq!(
      image.build_stats,
      Some(f.sources.path().join("app-runner-build-output-stats.json"))
    );
    assert_eq!(image.runner, RunnerKind::Local);
    assert_eq!(image.version.java_feature(), 21);
    assert!(!image.compressed);
    // objcopy is not on the fixture's PATH
    assert_eq!(image.debug_symbols, None);
    assert_eq!(f.launcher.executions().len(), 1);
  }

  #[tokio::test]
  async fn exit_137_is_out_of_memory() {
    let f = fixture(
      FakeLauncher::new()
        .respond("/", 0, &current_banner())
        .exit_with(137),
    );

    let err = f.build(local()).await.unwrap_err();

    assert_eq!(err.stage, Stage::Build);
    assert!(err.is_out_of_memory());
    assert_eq!(err.exit_code(), Some(137));
    assert!(err.to_string().contains("Free up memory"));
  }

  #[tokio::test]
  async fn other_exit_codes_are_generation_failures() {
    let f = fixture(FakeLauncher::new().respond("/", 0, &current_banner()).exit_with(1));

    let err = f.build(local()).await.unwrap_err();

    assert!(matches!(err.kind, BuildErrorKind::GenerationFailed { code: 1 }));
  }

  #[tokio::test]
  async fn zero_exit_without_executable_is_an_error() {
    let f = fixture(FakeLauncher::new().respond("/", 0, &current_banner()));

    let err = f.build(local()).await.unwrap_err();

    assert!(matches!(err.kind, BuildErrorKind::MissingExecutable { .. }));
  }

  #[tokio::test]
  async fn unresolved_backend_fails_at_setup() {
    let f = fixture(FakeLauncher::new());
    let config = NativeConfig {
      backend: Backend::Local,
      graalvm_home: Some(PathBuf::from("/nonexistent/graalvm")),
      ..Default::default()
    };
    let mut ctx = f.ctx.clone();
    ctx.env = ToolEnv::default();

    let jar = f.sources.path().join("app-runner.jar");
    let err = NativeImageBuilder::new(config, &ctx)
      .build(&NativeImageRequest {
        jar: &jar,
        output_dir: f.output.path(),
        name: Some("app"),
        verbose: false,
      })
      .await
      .unwrap_err();

    assert_eq!(err.stage, Stage::Setup);
    assert!(matches!(err.kind, BuildErrorKind::Runner(RunnerError::Resolution(_))));
    assert!(f.launcher.captures().is_empty());
  }

  #[tokio::test]
  async fn sources_only_writes_args_file_without_subprocesses() {
    let f = fixture(FakeLauncher::new());
    let config = NativeConfig {
      sources_only: true,
      additional_build_args: vec!["-H:+PrintClassInitialization".to_string()],
      ..Default::default()
    };

    let BuildOutput::Sources { args_file, command } = f.build(config).await.unwrap() else {
      panic!("expected sources");
    };

    assert_eq!(args_file, f.sources.path().join("native-image.args"));
    let written = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(written, command.to_args_file());
    assert!(written.contains("-H:+PrintClassInitialization\n"));
    assert!(written.ends_with("-jar\napp-runner.jar\napp-runner\n"));
    assert!(f.launcher.captures().is_empty());
    assert!(f.launcher.executions().is_empty());
  }

  #[tokio::test]
  async fn required_compression_without_upx_fails_after_build() {
    let f = fixture(
      FakeLauncher::new()
        .respond("/", 0, &current_banner())
        .on_execute(|argv, cwd| std::fs::write(cwd.join(argv.last().unwrap()), b"elf").unwrap()),
    );
    let mut config = local();
    config.compression.request = StepRequest::Required;
    config.compression.level = Some(5);

    let err = f.build(config).await.unwrap_err();

    assert_eq!(err.stage, Stage::Compression);
    assert!(f.output.path().join("app-runner").is_file());
  }

  #[tokio::test]
  async fn reports_dir_is_passed_when_enabled() {
    let f = fixture(
      FakeLauncher::new()
        .respond("/", 0, &current_banner())
        .on_execute(|argv, cwd| std::fs::write(cwd.join(argv.last().unwrap()), b"elf").unwrap()),
    );
    let mut config = local();
    config.enable_reports = true;

    f.build(config).await.unwrap();

    let argv = &f.launcher.executions()[0];
    assert_eq!(
      &argv[argv.len() - 7..],
      &[
        "-J-Dfile.encoding=UTF-8",
        "-H:+UnlockExperimentalVMOptions",
        "-H:ReportsPath=reports",
        "-H:-UnlockExperimentalVMOptions",
        "-jar",
        "app-runner.jar",
        "app-runner",
      ]
    );
  }

  /// Reports a fixed toolchain banner and counts lifecycle calls.
  struct CountingRunner {
    banner: String,
    fail_setup: bool,
    post_builds: Arc<AtomicUsize>,
    builds: Arc<AtomicUsize>,
  }

  impl CountingRunner {
    fn new(banner: impl Into<String>) -> Self {
      Self {
        banner: banner.into(),
        fail_setup: false,
        post_builds: Arc::new(AtomicUsize::new(0)),
        builds: Arc::new(AtomicUsize::new(0)),
      }
    }
  }

  #[async_trait::async_trait]
  impl BuildRunner for CountingRunner {
    fn kind(&self) -> RunnerKind {
      RunnerKind::Local
    }

    fn is_containerized(&self) -> bool {
      false
    }

    fn tool_host(&self) -> Option<crate::steps::ToolHost<'_>> {
      None
    }

    async fn setup(&self) -> Result<(), RunnerError> {
      if self.fail_setup {
        return Err(RunnerError::StepFailed { step: "setup", code: 125 });
      }
      Ok(())
    }

    async fn query_version(&self) -> Result<Version, RunnerError> {
      Ok(crate::toolchain::detect(&self.banner)?)
    }

    async fn build(&self, _request: &BuildRequest<'_>) -> Result<BuildResult, RunnerError> {
      self.builds.fetch_add(1, Ordering::SeqCst);
      Ok(BuildResult {
        exit_code: 1,
        executable: None,
      })
    }

    async fn post_build(&self, _build_dir: &Path) {
      self.post_builds.fetch_add(1, Ordering::SeqCst);
    }
  }

  async fn build_with(runner: CountingRunner) -> (Result<BuildOutput, BuildError>, usize, usize) {
    let sources = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let jar = sources.path().join("app-runner.jar");
    std::fs::write(&jar, b"PK").unwrap();
    let post_builds = runner.post_builds.clone();
    let builds = runner.builds.clone();

    let result = NativeImageBuilder::with_runner(local(), Box::new(runner), Os::Linux)
      .build(&NativeImageRequest {
        jar: &jar,
        output_dir: output.path(),
        name: None,
        verbose: false,
      })
      .await;
    (
      result,
      post_builds.load(Ordering::SeqCst),
      builds.load(Ordering::SeqCst),
    )
  }

  #[tokio::test]
  async fn cleanup_runs_when_the_version_gate_rejects() {
    let runner = CountingRunner::new("GraalVM Version 21.3.0 (Java Version 11.0.13+7)");

    let (result, post_builds, builds) = build_with(runner).await;

    assert_eq!(result.unwrap_err().stage, Stage::VersionCheck);
    assert_eq!(builds, 0);
    assert_eq!(post_builds, 1);
  }

  #[tokio::test]
  async fn cleanup_runs_when_setup_fails() {
    let mut runner = CountingRunner::new("GraalVM Version 21.3.0 (Java Version 11.0.13+7)");
    runner.fail_setup = true;

    let (result, post_builds, builds) = build_with(runner).await;

    assert_eq!(result.unwrap_err().stage, Stage::Setup);
    assert_eq!(builds, 0);
    assert_eq!(post_builds, 1);
  }

  #[tokio::test]
  async fn cleanup_runs_once_after_a_failed_compile() {
    let runner = CountingRunner::new(current_banner());

    let (result, post_builds, builds) = build_with(runner).await;

    assert!(matches!(result.unwrap_err().kind, BuildErrorKind::GenerationFailed { code: 1 }));
    assert_eq!(builds, 1);
    assert_eq!(post_builds, 1);
  }
}
