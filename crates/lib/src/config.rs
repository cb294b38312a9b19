//! Typed build configuration.
//!
//! A [`NativeConfig`] is usually read from a TOML file and then adjusted by
//! command line flags. Every key is optional:
//!
//! ```toml
//! backend = "container"
//! builder-image = "quay.io/quarkus/ubi9-quarkus-mandrel-builder-image:jdk-21"
//! additional-build-args = ["-H:+PrintClassInitialization"]
//!
//! [debug]
//! enabled = true
//!
//! [compression]
//! request = "required"
//! level = 7
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_BUILDER_IMAGE;
use crate::container::Engine;
use crate::platform::os::Os;
use crate::steps::startup_archive::ArchiveKind;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Where the compiler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
  /// Local toolchain if one is found, otherwise a local container on Linux.
  #[default]
  Auto,
  Local,
  Container,
  /// Container engine without bind mount support; inputs are copied in and out.
  Remote,
}

/// Whether an auxiliary step runs, and whether a missing tool is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepRequest {
  #[default]
  Off,
  /// Run when the tool is available, skip with a warning otherwise.
  Auto,
  /// Fail the build when the tool is missing.
  Required,
}

impl StepRequest {
  pub fn is_enabled(self) -> bool {
    self != Self::Off
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DebugConfig {
  /// Emit debug info (`-g`) and split it into a `.debug` file.
  pub enabled: bool,
  /// Start the compiler JVM with a JDWP agent listening on port 5005.
  pub debug_build_process: bool,
  /// Publish the JDWP port from the builder container.
  pub publish_debug_build_process_port: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompressionConfig {
  pub request: StepRequest,
  /// 1 to 9, or 10 for `--best`.
  pub level: Option<u8>,
  pub additional_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StartupArchiveConfig {
  pub request: StepRequest,
  /// Forces an archive kind instead of choosing from the runtime version.
  pub kind: Option<ArchiveKind>,
  pub jvm_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NativeConfig {
  pub backend: Backend,
  /// Only write the compiler arguments; do not compile.
  pub sources_only: bool,
  pub graalvm_home: Option<PathBuf>,
  pub java_home: Option<PathBuf>,
  pub container_runtime: Option<Engine>,
  pub builder_image: String,
  pub container_runtime_options: Vec<String>,
  pub additional_build_args: Vec<String>,
  pub system_properties: BTreeMap<String, String>,
  pub user_language: String,
  pub user_country: Option<String>,
  pub add_all_charsets: bool,
  pub enable_http_url_handler: bool,
  pub enable_https_url_handler: bool,
  pub enable_fallback_images: bool,
  pub initialize_at_build_time: Vec<String>,
  pub native_image_xmx: Option<String>,
  pub debug: DebugConfig,
  pub enable_reports: bool,
  pub report_exception_stack_traces: bool,
  pub full_stack_traces: bool,
  pub monitoring: Vec<String>,
  pub march: Option<String>,
  pub target_os: Option<Os>,
  pub minimum_java_version: Option<i32>,
  pub compression: CompressionConfig,
  pub startup_archive: StartupArchiveConfig,
}

impl Default for NativeConfig {
  fn default() -> Self {
    Self {
      backend: Backend::Auto,
      sources_only: false,
      graalvm_home: None,
      java_home: None,
      container_runtime: None,
      builder_image: DEFAULT_BUILDER_IMAGE.to_string(),
      container_runtime_options: Vec::new(),
      additional_build_args: Vec::new(),
      system_properties: BTreeMap::new(),
      user_language: "en".to_string(),
      user_country: None,
      add_all_charsets: false,
      enable_http_url_handler: true,
      enable_https_url_handler: false,
      enable_fallback_images: false,
      initialize_at_build_time: Vec::new(),
      native_image_xmx: None,
      debug: DebugConfig::default(),
      enable_reports: false,
      report_exception_stack_traces: true,
      full_stack_traces: true,
      monitoring: Vec::new(),
      march: None,
      target_os: None,
      minimum_java_version: None,
      compression: CompressionConfig::default(),
      startup_archive: StartupArchiveConfig::default(),
    }
  }
}

impl NativeConfig {
  /// Read and validate a TOML config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if let Some(level) = self.compression.level
      && !(1..=10).contains(&level)
    {
      return Err(ConfigError::Invalid(format!(
        "compression level must be between 1 and 10, got {}",
        level
      )));
    }
    if self.builder_image.trim().is_empty() {
      return Err(ConfigError::Invalid("builder-image must not be empty".to_string()));
    }
    Ok(())
  }

  pub fn is_containerized(&self) -> bool {
    matches!(self.backend, Backend::Container | Backend::Remote)
  }

  /// Whether the debug agent port should be published from the builder container.
  pub fn publishes_debug_port(&self) -> bool {
    self.debug.debug_build_process && self.debug.publish_debug_build_process_port
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn empty_file_gives_defaults() {
    let config: NativeConfig = toml::from_str("").unwrap();
    assert_eq!(config, NativeConfig::default());
    assert_eq!(config.builder_image, DEFAULT_BUILDER_IMAGE);
    assert!(config.enable_http_url_handler);
  }

  #[test]
  fn kebab_case_keys_and_tables() {
    let config: NativeConfig = toml::from_str(
      r#"
backend = "remote"
container-runtime = "podman"
additional-build-args = ["-H:+PrintClassInitialization"]
target-os = "linux"

[system-properties]
"app.mode" = "native"

[debug]
enabled = true
debug-build-process = true
publish-debug-build-process-port = true

[compression]
request = "required"
level = 10

[startup-archive]
request = "auto"
kind = "aot"
"#,
    )
    .unwrap();

    assert_eq!(config.backend, Backend::Remote);
    assert!(config.is_containerized());
    assert_eq!(config.container_runtime, Some(Engine::Podman));
    assert_eq!(config.target_os, Some(Os::Linux));
    assert_eq!(config.system_properties.get("app.mode").map(String::as_str), Some("native"));
    assert!(config.publishes_debug_port());
    assert_eq!(config.compression.request, StepRequest::Required);
    assert_eq!(config.compression.level, Some(10));
    assert_eq!(config.startup_archive.kind, Some(ArchiveKind::Aot));
  }

  #[test]
  fn load_rejects_bad_compression_level() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nativeforge.toml");
    std::fs::write(&path, "[compression]\nlevel = 12\n").unwrap();

    let err = NativeConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
  }

  #[test]
  fn load_reports_parse_errors_with_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nativeforge.toml");
    std::fs::write(&path, "backend = 3\n").unwrap();

    let err = NativeConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("nativeforge.toml"));
  }

  #[test]
  fn missing_file_is_a_read_error() {
    let err = NativeConfig::load(Path::new("/no/such/nativeforge.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }
}
