//! CLI output formatting.
//!
//! Build summaries go to stdout as colored status lines followed by aligned
//! `label: value` stats; errors go to stderr. Compiler output and logs share
//! stderr, so nothing here writes to stderr except [`print_error`].

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const CAUSE: &str = "↳";
}

/// Width stat labels are padded to.
const LABEL_WIDTH: usize = 16;

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  match bytes {
    b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
    b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
    b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
    b => format!("{} B", b),
  }
}

/// Native builds take minutes; sub-second precision only matters for short steps.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  match secs {
    s if s >= 3600 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    s if s >= 60 => format!("{}m {}s", s / 60, s % 60),
    s if s > 0 => format!("{}.{:02}s", s, duration.subsec_millis() / 10),
    _ => format!("{}ms", duration.subsec_millis()),
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

/// Print an error and its causes, one per line.
pub fn print_error(err: &anyhow::Error) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    err.to_string().if_supports_color(Stream::Stderr, |s| s.red())
  );
  for cause in err.chain().skip(1) {
    eprintln!(
      "  {} {}",
      symbols::CAUSE.if_supports_color(Stream::Stderr, |s| s.dimmed()),
      cause
    );
  }
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  let label = format!("{:<width$}", format!("{}:", label), width = LABEL_WIDTH);
  println!("  {} {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize build result")?;
  println!("{}", json);
  Ok(())
}
