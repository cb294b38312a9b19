//! Host platform detection and tool lookup.
//!
//! A native executable runs only on the platform it was compiled on: local
//! builds target the host, containerized builds target Linux on the host's
//! architecture.

pub mod arch;
pub mod os;
pub mod paths;

use arch::Arch;
use os::Os;
use std::fmt;

/// Architecture and OS pair, e.g. `x86_64-linux`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// The host, or `None` on an unsupported OS or architecture.
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Platform of executables built by the given kind of backend on this host.
  pub fn build_target(&self, containerized: bool) -> Platform {
    if containerized {
      Platform::new(self.arch, Os::Linux)
    } else {
      *self
    }
  }

  /// Engine `--platform` value of a builder container on this host.
  pub fn container_platform(&self) -> String {
    format!("linux/{}", self.arch.container_name())
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
