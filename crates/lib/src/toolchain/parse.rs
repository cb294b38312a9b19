//! Banner parsing for `native-image --version`.
//!
//! Two banner formats are in the wild. Current toolchains print three lines:
//!
//! ```text
//! native-image 21.0.1 2023-10-17
//! GraalVM Runtime Environment Liberica-NIK-23.1.1-1 (build 21.0.1+12-LTS)
//! Substrate VM Liberica-NIK-23.1.1-1 (build 21.0.1+12-LTS, serial gc)
//! ```
//!
//! Older ones print a single line such as
//! `GraalVM Version 20.1.0 (Java Version 11.0.7)`.

use std::sync::LazyLock;

use regex::Regex;

use super::VersionError;
use super::version::{Distribution, UNDEFINED, Version};

static RUNTIME_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"Runtime Environment (.*?)\s*\(build ([^)]+)\)").expect("valid regex"));

static JAVA_VERSION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+)\.(\d+))?").expect("valid regex"));

static MANDREL_RELEASE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"Mandrel-(\d+(?:\.\d+)*)").expect("valid regex"));

static LIBERICA_RELEASE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"Liberica-NIK-(\d+(?:\.\d+)*)").expect("valid regex"));

static JVMCI_RELEASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"jvmci-(\d+\.\d+)").expect("valid regex"));

static LEGACY_LINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?:GraalVM|native-image)(?: Version)? (\d+(?:\.\d+)+)(.*)$").expect("valid regex")
});

static LEGACY_JAVA: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\(Java Version (\d+)(?:\.\d+\.(\d+))?").expect("valid regex"));

/// Parse the merged stdout/stderr of a `--version` probe.
///
/// Lines preceding the banner (for example image pull progress from a
/// container engine) are ignored.
pub fn detect(output: &str) -> Result<Version, VersionError> {
  let lines: Vec<&str> = output
    .lines()
    .map(str::trim)
    .skip_while(|line| !is_banner_start(line))
    .collect();

  parse_structured(&lines)
    .or_else(|| parse_legacy(&lines))
    .ok_or_else(|| VersionError::Unrecognized {
      output: output.trim().to_string(),
    })
}

fn is_banner_start(line: &str) -> bool {
  line.starts_with("GraalVM") || line.starts_with("native-image")
}

fn parse_structured(lines: &[&str]) -> Option<Version> {
  let [first, runtime, vm, ..] = lines else {
    return None;
  };
  if !runtime.contains("Runtime Environment") || !vm.contains("VM") {
    return None;
  }

  let caps = RUNTIME_LINE.captures(runtime)?;
  let vendor = caps.get(1)?.as_str();
  let build = caps.get(2)?.as_str();

  let java = JAVA_VERSION.captures(build)?;
  let java_feature: i32 = java.get(1)?.as_str().parse().ok()?;
  let java_update: i32 = java.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);

  let release = vendor_release(runtime).or_else(|| release_for_java_feature(java_feature))?;
  let raw = [*first, *runtime, *vm].join("\n");

  Some(Version::new(
    raw,
    &release,
    vendor.contains("-dev"),
    java_feature,
    java_update,
    Distribution::from_banner(runtime),
  ))
}

/// Release number embedded in the runtime line, if the vendor publishes one.
fn vendor_release(runtime: &str) -> Option<Vec<u32>> {
  [&MANDREL_RELEASE, &LIBERICA_RELEASE, &JVMCI_RELEASE]
    .into_iter()
    .find_map(|re| re.captures(runtime))
    .and_then(|caps| caps.get(1))
    .map(|m| split_release(m.as_str()))
}

/// Release number implied by the JDK level for banners without a vendor release.
///
/// From JDK 25 on, releases follow the JDK numbering.
fn release_for_java_feature(feature: i32) -> Option<Vec<u32>> {
  let release = match feature {
    20 => vec![23, 0],
    21 => vec![23, 1],
    22 => vec![24, 0],
    23 => vec![24, 1],
    24 => vec![24, 2],
    f if f >= 25 => vec![u32::try_from(f).ok()?, 0],
    _ => return None,
  };
  Some(release)
}

fn parse_legacy(lines: &[&str]) -> Option<Version> {
  lines.iter().find_map(|line| {
    let caps = LEGACY_LINE.captures(line)?;
    let release = split_release(caps.get(1)?.as_str());
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let (java_feature, java_update) = match LEGACY_JAVA.captures(rest) {
      Some(java) => (
        java.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(UNDEFINED),
        java.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(UNDEFINED),
      ),
      None => (UNDEFINED, UNDEFINED),
    };

    Some(Version::new(
      *line,
      &release,
      rest.contains("-dev"),
      java_feature,
      java_update,
      Distribution::from_banner(line),
    ))
  })
}

fn split_release(text: &str) -> Vec<u32> {
  text.split('.').filter_map(|part| part.parse().ok()).take(4).collect()
}
