//! Compiler command line assembly.
//!
//! Arguments are emitted in a fixed order:
//!
//! 1. flags derived from configuration and gated on the toolchain version,
//! 2. user supplied `additional-build-args`, so they override the above,
//! 3. a short tail the user cannot override,
//! 4. `-jar <jar> <name>`, which the compiler expects at the end.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NativeConfig;
use crate::consts::{
  BUILD_STATS_SUFFIX, CONTAINER_PROJECT_DIR, DEBUG_BUILD_PROCESS_PORT, REPORTS_DIR, TRUST_STORE_FILE,
  TRUST_STORE_PROPERTY,
};
use crate::platform::os::Os;
use crate::toolchain::Version;

const UNLOCK_EXPERIMENTAL: &str = "-H:+UnlockExperimentalVMOptions";
const LOCK_EXPERIMENTAL: &str = "-H:-UnlockExperimentalVMOptions";

/// Module system flags the compiler's own JVM needs on JDK 11+.
const MODULE_FLAGS: [&str; 6] = [
  "-J--add-exports=java.security.jgss/sun.security.krb5=ALL-UNNAMED",
  "-J--add-exports=java.security.jgss/sun.security.jgss=ALL-UNNAMED",
  "-J--add-opens=java.base/java.text=ALL-UNNAMED",
  "-J--add-opens=java.base/java.io=ALL-UNNAMED",
  "-J--add-opens=java.base/java.lang.invoke=ALL-UNNAMED",
  "-J--add-opens=java.base/java.util=ALL-UNNAMED",
];

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("target OS {target} is not supported by {backend} builds (supported: {supported})")]
  UnsupportedTarget {
    target: Os,
    backend: &'static str,
    supported: Os,
  },

  #[error("unable to copy trust store {} into the build directory: {source}", .path.display())]
  TrustStore {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Inputs to [`assemble`] that come from the build rather than from configuration.
#[derive(Debug, Clone)]
pub struct AssemblyContext<'a> {
  /// Base name of the executable to produce.
  pub name: &'a str,
  /// Jar file name, relative to `build_dir`.
  pub jar: &'a str,
  /// Directory the compiler runs in; mounted into containers.
  pub build_dir: &'a Path,
  pub containerized: bool,
  pub host_os: Os,
}

/// Ordered compiler arguments, without the compiler executable itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildCommand {
  args: Vec<String>,
}

impl BuildCommand {
  pub fn args(&self) -> &[String] {
    &self.args
  }

  /// `prefix` followed by the arguments.
  pub fn with_prefix(&self, prefix: &[String]) -> Vec<String> {
    prefix.iter().chain(self.args.iter()).cloned().collect()
  }

  /// Contents of an `@argfile` for the compiler: one argument per line,
  /// quoted when it contains whitespace.
  pub fn to_args_file(&self) -> String {
    let mut out = String::new();
    for arg in &self.args {
      if arg.chars().any(char::is_whitespace) {
        out.push('"');
        out.push_str(&arg.replace('\\', "\\\\").replace('"', "\\\""));
        out.push('"');
      } else {
        out.push_str(arg);
      }
      out.push('\n');
    }
    out
  }
}

/// Build the compiler arguments for `config` against toolchain `version`.
pub fn assemble(
  config: &NativeConfig,
  version: &Version,
  ctx: &AssemblyContext<'_>,
) -> Result<BuildCommand, AssemblyError> {
  check_target(config, ctx)?;

  if let Some(minimum) = config.minimum_java_version
    && version.java_feature() < minimum
  {
    warn!(
      requested = minimum,
      toolchain = version.java_feature(),
      "the toolchain targets an older JDK than the requested minimum Java version"
    );
  }

  let mut args = internal_flags(config, version, ctx);

  for arg in &config.additional_build_args {
    let arg = arg.trim();
    if arg.is_empty() {
      continue;
    }
    if ctx.containerized && arg.contains(TRUST_STORE_PROPERTY) {
      args.push(relocate_trust_store(arg, ctx.build_dir)?);
    } else {
      args.push(arg.to_string());
    }
  }

  args.push("-J-Dfile.encoding=UTF-8".to_string());
  if config.enable_reports {
    push_experimental(&mut args, version, vec![format!("-H:ReportsPath={}", REPORTS_DIR)]);
  }

  args.push("-jar".to_string());
  args.push(ctx.jar.to_string());
  args.push(ctx.name.to_string());

  debug!(count = args.len(), "assembled compiler arguments");
  Ok(BuildCommand { args })
}

fn check_target(config: &NativeConfig, ctx: &AssemblyContext<'_>) -> Result<(), AssemblyError> {
  let Some(target) = config.target_os else {
    return Ok(());
  };

  let (backend, supported) = if ctx.containerized {
    ("container", Os::Linux)
  } else {
    ("local", ctx.host_os)
  };

  if target != supported {
    return Err(AssemblyError::UnsupportedTarget {
      target,
      backend,
      supported,
    });
  }
  Ok(())
}

fn internal_flags(config: &NativeConfig, version: &Version, ctx: &AssemblyContext<'_>) -> Vec<String> {
  let mut args = Vec::new();

  for (key, value) in &config.system_properties {
    if value.is_empty() {
      args.push(format!("-J-D{}", key));
    } else {
      args.push(format!("-J-D{}={}", key, value));
    }
  }
  args.push(format!("-J-Duser.language={}", config.user_language));
  if let Some(country) = &config.user_country {
    args.push(format!("-J-Duser.country={}", country));
  }

  if version.java_at_least(11) {
    args.extend(MODULE_FLAGS.iter().map(|f| f.to_string()));
  }

  args.push(format!(
    "--initialize-at-build-time={}",
    config.initialize_at_build_time.join(",")
  ));
  if !config.enable_fallback_images {
    args.push("--no-fallback".to_string());
  }

  let protocols: Vec<&str> = [
    (config.enable_http_url_handler, "http"),
    (config.enable_https_url_handler, "https"),
  ]
  .into_iter()
  .filter_map(|(enabled, name)| enabled.then_some(name))
  .collect();
  if !protocols.is_empty() {
    args.push(format!("--enable-url-protocols={}", protocols.join(",")));
  }

  args.push(if config.add_all_charsets {
    "-H:+AddAllCharsets".to_string()
  } else {
    "-H:-AddAllCharsets".to_string()
  });

  if let Some(xmx) = &config.native_image_xmx {
    args.push(format!("-J-Xmx{}", xmx));
  }

  if config.debug.enabled {
    args.push("-g".to_string());
  }
  if config.debug.debug_build_process {
    let host = if ctx.containerized { "0.0.0.0:" } else { "" };
    args.push(format!(
      "-J-Xrunjdwp:transport=dt_socket,address={}{},server=y,suspend=y",
      host, DEBUG_BUILD_PROCESS_PORT
    ));
  }

  if !config.monitoring.is_empty() {
    if version.release_at_least(&[22, 3]) {
      args.push(format!("--enable-monitoring={}", config.monitoring.join(",")));
    } else {
      args.push("-H:+AllowVMInspection".to_string());
    }
  }

  if let Some(march) = &config.march {
    if version.release_at_least(&[23, 0]) {
      args.push(format!("-march={}", march));
    } else {
      warn!(march = %march, version = %version, "-march requires toolchain release 23.0 or newer, ignoring");
    }
  }

  let mut experimental = Vec::new();
  if config.enable_reports {
    experimental.push("-H:+PrintAnalysisCallTree".to_string());
  }
  if config.report_exception_stack_traces {
    experimental.push("-H:+ReportExceptionStackTraces".to_string());
  }
  experimental.push(if config.full_stack_traces {
    "-H:+StackTrace".to_string()
  } else {
    "-H:-StackTrace".to_string()
  });
  if version.release_at_least(&[23, 0]) {
    experimental.push(format!("-H:BuildOutputJSONFile={}{}", ctx.name, BUILD_STATS_SUFFIX));
  }
  push_experimental(&mut args, version, experimental);

  args
}

/// Append hosted options, bracketed by the experimental unlock on JDK 21+ toolchains.
fn push_experimental(args: &mut Vec<String>, version: &Version, options: Vec<String>) {
  if options.is_empty() {
    return;
  }
  let bracket = version.java_at_least(21);
  if bracket {
    args.push(UNLOCK_EXPERIMENTAL.to_string());
  }
  args.extend(options);
  if bracket {
    args.push(LOCK_EXPERIMENTAL.to_string());
  }
}

/// Copy the trust store named in `arg` into `build_dir` and point the argument
/// at its in-container location.
fn relocate_trust_store(arg: &str, build_dir: &Path) -> Result<String, AssemblyError> {
  let Some(index) = arg.find(TRUST_STORE_PROPERTY) else {
    return Ok(arg.to_string());
  };
  let host_path = PathBuf::from(&arg[index + TRUST_STORE_PROPERTY.len()..]);

  std::fs::copy(&host_path, build_dir.join(TRUST_STORE_FILE)).map_err(|source| AssemblyError::TrustStore {
    path: host_path.clone(),
    source,
  })?;
  debug!(from = %host_path.display(), "copied trust store into build directory");

  Ok(format!(
    "{}{}{}/{}",
    &arg[..index],
    TRUST_STORE_PROPERTY,
    CONTAINER_PROJECT_DIR,
    TRUST_STORE_FILE
  ))
}
