mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nativeforge_lib::container::Engine;
use nativeforge_lib::steps::startup_archive::ArchiveKind;

use crate::cmd::{BuildArgs, cmd_archive, cmd_build, cmd_info};
use crate::output::{OutputFormat, print_error};

/// nforge - native executables for packaged JVM applications
#[derive(Parser)]
#[command(name = "nforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Stream compiler output and enable debug logs
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a runnable jar into a native executable
  Build {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory the executable is placed in (default: the jar's directory)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Executable name (default: the jar's file stem)
    #[arg(long)]
    name: Option<String>,

    /// Build inside a local container
    #[arg(long, conflicts_with = "remote")]
    container: bool,

    /// Build inside a container on a remote engine, copying files in and out
    #[arg(long)]
    remote: bool,

    /// Container runtime to use instead of detecting one
    #[arg(long)]
    runtime: Option<Engine>,

    /// Only write the compiler arguments, do not compile
    #[arg(long)]
    sources_only: bool,

    /// Compress the executable with upx at this level (1-10)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    compress: Option<u8>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output_format: OutputFormat,
  },

  /// Dump a startup archive (CDS or AOT cache) for a runnable jar
  Archive {
    #[command(flatten)]
    common: CommonArgs,

    /// Archive kind (default: chosen from the JVM's feature version)
    #[arg(long)]
    kind: Option<ArchiveKind>,
  },

  /// Show the host platform, toolchain and container runtime
  Info,
}

#[derive(Args)]
struct CommonArgs {
  /// Runnable jar to process
  #[arg(long)]
  jar: PathBuf,

  /// TOML configuration file
  #[arg(long)]
  config: Option<PathBuf>,

  /// Builder image; runs the tools in a container
  #[arg(long)]
  image: Option<String>,
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  if let Err(err) = run(cli) {
    print_error(&err);
    std::process::exit(1);
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Build {
      common,
      output,
      name,
      container,
      remote,
      runtime,
      sources_only,
      compress,
      output_format,
    } => cmd_build(BuildArgs {
      jar: common.jar,
      config: common.config,
      image: common.image,
      output,
      name,
      container,
      remote,
      runtime,
      sources_only,
      compress,
      format: output_format,
      verbose: cli.verbose,
    }),
    Commands::Archive { common, kind } => cmd_archive(&common.jar, common.config.as_deref(), common.image, kind),
    Commands::Info => cmd_info(),
  }
}
