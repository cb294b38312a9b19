//! Startup archive generation.
//!
//! The application jar is started once with a JVM flag that dumps either a
//! class-data-sharing archive (`-XX:ArchiveClassesAtExit`) or, on JDK 25 and
//! newer, an ahead-of-time cache (`-XX:AOTCacheOutput`). Which one is used is
//! decided by [`ArchiveKind::select`] alone.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{StepError, ToolHost, file_arg, parent_dir};
use crate::config::{StartupArchiveConfig, StepRequest};

const JAVA: &str = "java";

/// First JDK feature release with `-XX:AOTCacheOutput`.
pub const AOT_CACHE_MIN_FEATURE: i32 = 25;

static JAVA_VERSION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"version "(\d+)(?:\.(\d+))?"#).expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
  /// Application class-data sharing.
  Cds,
  /// JDK 25+ ahead-of-time cache.
  Aot,
}

impl ArchiveKind {
  /// The archive kind for a runtime of `java_feature`, unless `requested` overrides it.
  pub fn select(requested: Option<ArchiveKind>, java_feature: i32) -> Self {
    match requested {
      Some(kind) => kind,
      None if java_feature >= AOT_CACHE_MIN_FEATURE => Self::Aot,
      None => Self::Cds,
    }
  }

  pub fn file_name(&self) -> &'static str {
    match self {
      Self::Cds => "app-cds.jsa",
      Self::Aot => "app.aot",
    }
  }

  /// The JVM flag that writes the archive to `file_name()`.
  pub fn dump_flag(&self) -> String {
    match self {
      Self::Cds => format!("-XX:ArchiveClassesAtExit={}", self.file_name()),
      Self::Aot => format!("-XX:AOTCacheOutput={}", self.file_name()),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Cds => "cds",
      Self::Aot => "aot",
    }
  }
}

impl std::fmt::Display for ArchiveKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for ArchiveKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "cds" | "appcds" => Ok(Self::Cds),
      "aot" => Ok(Self::Aot),
      other => Err(format!("unknown archive kind: {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupArchive {
  pub kind: ArchiveKind,
  pub path: PathBuf,
  pub java_feature: i32,
}

/// Feature release from `java -version` output. `1.8` style versions report
/// the minor number.
pub fn parse_java_feature(output: &str) -> Option<i32> {
  let caps = JAVA_VERSION.captures(output)?;
  let major: i32 = caps.get(1)?.as_str().parse().ok()?;
  if major == 1 {
    return caps.get(2)?.as_str().parse().ok();
  }
  Some(major)
}

/// Dump a startup archive for `jar`, next to it.
///
/// Returns `Ok(None)` when the step is off, or when no `java` was found and
/// the step was not required.
pub async fn generate(
  host: &ToolHost<'_>,
  jar: &Path,
  config: &StartupArchiveConfig,
) -> Result<Option<StartupArchive>, StepError> {
  if !config.request.is_enabled() {
    return Ok(None);
  }

  let workdir = parent_dir(jar)?;
  let Some(java) = host.locate(JAVA, workdir).await? else {
    if config.request == StepRequest::Required {
      return Err(StepError::ToolUnavailable {
        tool: JAVA,
        location: host.describe(),
      });
    }
    warn!(location = %host.describe(), "java not found, skipping startup archive");
    return Ok(None);
  };

  let java_feature = probe_java_feature(host, &java, workdir).await?;
  let kind = ArchiveKind::select(config.kind, java_feature);
  debug!(java_feature, %kind, "selected startup archive kind");

  let mut argv = java;
  argv.push(kind.dump_flag());
  argv.extend(config.jvm_args.iter().cloned());
  argv.push("-jar".to_string());
  argv.push(file_arg(jar));

  // an archive from an earlier run must not pass the output check
  let path = workdir.join(kind.file_name());
  match std::fs::remove_file(&path) {
    Ok(()) => debug!(path = %path.display(), "removed stale startup archive"),
    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
    Err(source) => return Err(StepError::RemoveStale { path, source }),
  }

  info!(jar = %jar.display(), %kind, "generating startup archive");
  let code = host.run(&argv, workdir).await?;
  if code != 0 {
    return Err(StepError::Failed { tool: JAVA, code });
  }

  if !path.is_file() {
    return Err(StepError::MissingOutput { tool: JAVA, path });
  }

  Ok(Some(StartupArchive {
    kind,
    path,
    java_feature,
  }))
}

async fn probe_java_feature(host: &ToolHost<'_>, java: &[String], workdir: &Path) -> Result<i32, StepError> {
  let mut probe = java.to_vec();
  probe.push("-version".to_string());
  let captured = host.launcher().capture(&probe, Some(workdir)).await?;

  // `java -version` writes to stderr
  let output = captured.merged();
  parse_java_feature(&output).ok_or(StepError::JavaVersion { output })
}
