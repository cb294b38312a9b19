//! Shared helpers for integration tests.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nativeforge_lib::config::{Backend, NativeConfig};
use nativeforge_lib::native::{BuildError, BuildOutput, NativeImageBuilder, NativeImageRequest};
use nativeforge_lib::platform::os::Os;
use nativeforge_lib::platform::paths::ToolEnv;
use nativeforge_lib::process::{ErrorSink, SystemLauncher};
use nativeforge_lib::runner::RunnerContext;
use tempfile::TempDir;

pub const JAR: &str = "app-runner.jar";

pub const CURRENT_BANNER: &str = "\
echo 'native-image 21.0.2 2024-01-16'
echo 'GraalVM Runtime Environment GraalVM CE 21.0.2+13.1 (build 21.0.2+13-jvmci-23.1-b30)'
echo 'Substrate VM GraalVM CE 21.0.2+13.1 (build 21.0.2+13, serial gc)'";

pub const OBSOLETE_BANNER: &str = "echo 'GraalVM Version 21.3.0 (Java Version 11.0.13+7)'";

/// Captures what the harness writes as filtered compiler stderr.
#[derive(Clone, Default)]
pub struct CapturedStderr(Arc<Mutex<Vec<u8>>>);

impl CapturedStderr {
  pub fn sink(&self) -> ErrorSink {
    Arc::new(Mutex::new(self.clone()))
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl Write for CapturedStderr {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// A project with a jar, a fake GraalVM install and an output directory.
pub struct Project {
  pub graal: TempDir,
  pub sources: TempDir,
  pub output: TempDir,
  pub stderr: CapturedStderr,
}

impl Project {
  /// `banner` runs for `--version`; `build` runs for everything else, with
  /// `$last` set to the requested executable name.
  pub fn new(banner: &str, build: &str) -> Self {
    let graal = TempDir::new().unwrap();
    let script = format!(
      "#!/bin/sh\n\
       if [ \"$1\" = \"--version\" ]; then\n{}\nexit 0\nfi\n\
       for last; do :; done\n\
       {}\n",
      banner, build
    );
    write_executable(&graal.path().join("bin/native-image"), &script);

    let sources = TempDir::new().unwrap();
    std::fs::write(sources.path().join(JAR), b"PK").unwrap();

    Self {
      graal,
      sources,
      output: TempDir::new().unwrap(),
      stderr: CapturedStderr::default(),
    }
  }

  pub fn config(&self) -> NativeConfig {
    NativeConfig {
      backend: Backend::Local,
      ..Default::default()
    }
  }

  pub fn sources_path(&self, file: &str) -> PathBuf {
    self.sources.path().join(file)
  }

  pub async fn build(&self, config: NativeConfig) -> Result<BuildOutput, BuildError> {
    let ctx = RunnerContext {
      launcher: Arc::new(SystemLauncher::with_sink(self.stderr.sink())),
      env: ToolEnv {
        graalvm_home: Some(self.graal.path().to_path_buf()),
        ..Default::default()
      },
      host_os: Os::Linux,
    };
    let jar = self.sources_path(JAR);
    NativeImageBuilder::new(config, &ctx)
      .build(&NativeImageRequest {
        jar: &jar,
        output_dir: self.output.path(),
        name: None,
        verbose: false,
      })
      .await
  }
}

pub fn write_executable(path: &Path, contents: &str) {
  use std::os::unix::fs::PermissionsExt;

  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, contents).unwrap();
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
