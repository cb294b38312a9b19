//! Implementation of the `nforge archive` command.

use std::path::Path;

use anyhow::{Context, Result};

use nativeforge_lib::config::StepRequest;
use nativeforge_lib::container::ContainerAdapter;
use nativeforge_lib::steps::ToolHost;
use nativeforge_lib::steps::startup_archive::{ArchiveKind, generate};

use super::{load_config, runner_context, runtime};
use crate::output::{format_bytes, print_stat, print_success};

/// Dump a startup archive next to `jar`, using the JVM on this host or the
/// one in `image`.
pub fn cmd_archive(jar: &Path, config: Option<&Path>, image: Option<String>, kind: Option<ArchiveKind>) -> Result<()> {
  let jar = dunce::canonicalize(jar).with_context(|| format!("Jar not found: {}", jar.display()))?;

  let mut config = load_config(config)?;
  // asking for an archive makes a missing java fatal
  config.startup_archive.request = StepRequest::Required;
  if kind.is_some() {
    config.startup_archive.kind = kind;
  }

  let ctx = runner_context()?;
  let rt = runtime()?;

  let archive = match image {
    Some(image) => {
      let adapter = ContainerAdapter::new(ctx.launcher.clone(), config.container_runtime, ctx.host_os);
      let host = ToolHost::Container {
        adapter: &adapter,
        image: &image,
        runtime_options: &config.container_runtime_options,
      };
      rt.block_on(generate(&host, &jar, &config.startup_archive))?
    }
    None => {
      let host = ToolHost::Local {
        env: &ctx.env,
        launcher: ctx.launcher.as_ref(),
        os: ctx.host_os,
      };
      rt.block_on(generate(&host, &jar, &config.startup_archive))?
    }
  };

  let archive = archive.context("No startup archive was produced")?;
  print_success(&format!("Startup archive written: {}", archive.path.display()));
  print_stat("Kind", archive.kind.as_str());
  print_stat("Java", &archive.java_feature.to_string());
  if let Ok(metadata) = std::fs::metadata(&archive.path) {
    print_stat("Size", &format_bytes(metadata.len()));
  }

  Ok(())
}
