//! Toolchain version model.
//!
//! A [`Version`] pairs the JDK level the compiler is built on with the vendor
//! release number (`23.1.1`, `24.0`, ...). Ordering looks at the JDK level first,
//! then at the release.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// Sentinel for JDK feature/update numbers missing from older banners.
pub const UNDEFINED: i32 = -1;

/// Oldest toolchain accepted for builds. Anything below is rejected.
///
/// Ordering compares the JDK level before the release, so the release part only
/// decides between toolchains on JDK 17.0.0: a 22.3 build on JDK 17.0.7 passes.
pub const MINIMUM: Version = Version::constant("GraalVM 23.0 (JDK 17)", [23, 0, 0, 0], 17, 0);

/// Toolchain level the flag set is tuned for. Older toolchains still build with a warning.
pub const CURRENT: Version = Version::constant("GraalVM 23.1 (JDK 21)", [23, 1, 0, 0], 21, 0);

/// Vendor family of a toolchain, recognised from marker strings in its banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
  GraalVm,
  Mandrel,
  Liberica,
}

impl Distribution {
  /// Classify a banner by vendor marker.
  pub fn from_banner(text: &str) -> Self {
    if text.contains("Mandrel") {
      Self::Mandrel
    } else if text.contains("Liberica") {
      Self::Liberica
    } else {
      Self::GraalVm
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::GraalVm => "GraalVM",
      Self::Mandrel => "Mandrel",
      Self::Liberica => "Liberica NIK",
    }
  }
}

impl fmt::Display for Distribution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Parsed version of an ahead-of-time compiler installation.
///
/// Immutable once parsed. Equality and ordering ignore the raw text, the
/// distribution and the dev flag.
#[derive(Debug, Clone, Serialize)]
pub struct Version {
  raw: Cow<'static, str>,
  release: [u32; 4],
  dev: bool,
  java_feature: i32,
  java_update: i32,
  distribution: Distribution,
}

impl Version {
  const fn constant(raw: &'static str, release: [u32; 4], java_feature: i32, java_update: i32) -> Self {
    Self {
      raw: Cow::Borrowed(raw),
      release,
      dev: false,
      java_feature,
      java_update,
      distribution: Distribution::GraalVm,
    }
  }

  pub(crate) fn new(
    raw: impl Into<String>,
    release: &[u32],
    dev: bool,
    java_feature: i32,
    java_update: i32,
    distribution: Distribution,
  ) -> Self {
    let mut padded = [0u32; 4];
    for (slot, part) in padded.iter_mut().zip(release) {
      *slot = *part;
    }

    Self {
      raw: Cow::Owned(raw.into()),
      release: padded,
      dev,
      java_feature,
      java_update,
      distribution,
    }
  }

  /// The text this version was parsed from.
  pub fn raw(&self) -> &str {
    &self.raw
  }

  pub fn distribution(&self) -> Distribution {
    self.distribution
  }

  pub fn java_feature(&self) -> i32 {
    self.java_feature
  }

  pub fn java_update(&self) -> i32 {
    self.java_update
  }

  pub fn is_dev(&self) -> bool {
    self.dev
  }

  /// Release number without trailing zero components, keeping at least `major.minor`.
  pub fn release_string(&self) -> String {
    let mut len = self.release.len();
    while len > 2 && self.release[len - 1] == 0 {
      len -= 1;
    }
    let joined = self.release[..len]
      .iter()
      .map(u32::to_string)
      .collect::<Vec<_>>()
      .join(".");
    if self.dev { format!("{}-dev", joined) } else { joined }
  }

  /// Whether the vendor release is at least `parts` (missing components count as zero).
  pub fn release_at_least(&self, parts: &[u32]) -> bool {
    let mut other = [0u32; 4];
    for (slot, part) in other.iter_mut().zip(parts) {
      *slot = *part;
    }
    self.release >= other
  }

  /// Whether the toolchain runs on at least the given JDK feature release.
  pub fn java_at_least(&self, feature: i32) -> bool {
    self.java_feature >= feature
  }

  /// Below [`MINIMUM`]; builds must not proceed.
  pub fn is_obsolete(&self) -> bool {
    *self < MINIMUM
  }

  /// At or above [`CURRENT`].
  pub fn is_supported(&self) -> bool {
    *self >= CURRENT
  }

  pub fn is_newer_than(&self, other: &Version) -> bool {
    self > other
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .java_feature
      .cmp(&other.java_feature)
      .then(self.java_update.cmp(&other.java_update))
      .then(self.release.cmp(&other.release))
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.distribution, self.release_string())?;
    if self.java_feature != UNDEFINED {
      write!(f, " (JDK {}", self.java_feature)?;
      if self.java_update > 0 {
        write!(f, ".0.{}", self.java_update)?;
      }
      write!(f, ")")?;
    }
    Ok(())
  }
}
