//! Implementation of the `nforge build` command.
//!
//! Resolves a build backend for the jar's configuration, compiles it with the
//! ahead-of-time compiler and prints where the executable landed. The output
//! directory is locked for the duration of the build.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use nativeforge_lib::build_lock::BuildLock;
use nativeforge_lib::config::{Backend, NativeConfig, StepRequest};
use nativeforge_lib::container::Engine;
use nativeforge_lib::native::{BuildOutput, NativeImage, NativeImageBuilder, NativeImageRequest};

use super::{load_config, runner_context, runtime};
use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub struct BuildArgs {
  pub jar: PathBuf,
  pub config: Option<PathBuf>,
  pub image: Option<String>,
  pub output: Option<PathBuf>,
  pub name: Option<String>,
  pub container: bool,
  pub remote: bool,
  pub runtime: Option<Engine>,
  pub sources_only: bool,
  pub compress: Option<u8>,
  pub format: OutputFormat,
  pub verbose: bool,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();

  let jar = dunce::canonicalize(&args.jar).with_context(|| format!("Jar not found: {}", args.jar.display()))?;
  let output_dir = match &args.output {
    Some(dir) => dir.clone(),
    None => jar
      .parent()
      .map(Path::to_path_buf)
      .context("Jar has no parent directory")?,
  };

  let mut config = load_config(args.config.as_deref())?;
  apply_overrides(&mut config, &args);
  config.validate()?;

  let command_line = std::env::args().collect::<Vec<_>>().join(" ");
  let lock = BuildLock::acquire(&output_dir, &command_line).context("Failed to lock output directory")?;
  debug!(lock = %lock.lock_path().display(), "acquired build lock");

  let ctx = runner_context()?;
  let builder = NativeImageBuilder::new(config, &ctx);
  let request = NativeImageRequest {
    jar: &jar,
    output_dir: &output_dir,
    name: args.name.as_deref(),
    verbose: args.verbose,
  };

  let output = runtime()?.block_on(builder.build(&request))?;

  if args.format.is_json() {
    return print_json(&output);
  }

  match &output {
    BuildOutput::Image(image) => print_image(image),
    BuildOutput::Sources { args_file, command } => {
      print_success("Native sources written");
      print_stat("Arguments", &args_file.display().to_string());
      print_stat("Argument count", &command.args().len().to_string());
      print_info(&format!(
        "Run `native-image @{}` in {} to compile",
        args_file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        args_file.parent().map(|p| p.display().to_string()).unwrap_or_default()
      ));
    }
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

/// Command line flags win over the configuration file.
fn apply_overrides(config: &mut NativeConfig, args: &BuildArgs) {
  if args.remote {
    config.backend = Backend::Remote;
  } else if args.container {
    config.backend = Backend::Container;
  }
  if args.runtime.is_some() {
    config.container_runtime = args.runtime;
  }
  if let Some(image) = &args.image {
    config.builder_image = image.clone();
  }
  if args.sources_only {
    config.sources_only = true;
  }
  if let Some(level) = args.compress {
    config.compression.request = StepRequest::Required;
    config.compression.level = Some(level);
  }
}

fn print_image(image: &NativeImage) {
  print_success(&format!("Native executable built: {}", image.path.display()));
  print_stat("Toolchain", &image.version.to_string());
  print_stat("Backend", image.runner.as_str());
  if let Ok(metadata) = std::fs::metadata(&image.path) {
    print_stat("Size", &format_bytes(metadata.len()));
  }
  if image.compressed {
    print_stat("Compressed", "yes");
  }
  if let Some(debug) = &image.debug_symbols {
    print_stat("Debug symbols", &debug.display().to_string());
  }
  if let Some(stats) = &image.build_stats {
    print_stat("Build statistics", &stats.display().to_string());
  }
}
