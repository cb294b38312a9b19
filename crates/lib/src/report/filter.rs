//! Line filter for compiler stderr.
//!
//! On reachability failures the compiler prints a "theoretical" call path that
//! often names an arbitrary implementation of an interface. Everything from the
//! first such marker on is held back until the stream ends; the held block is
//! then replayed with each call path replaced by one resolved from the
//! call-tree report, or verbatim when no report was written.

use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::call_tree::CallTree;

/// Prefix of the lines introducing a call path.
pub const CALL_PATH_MARKER: &str = "Call path from entry point to ";

const FRAME_PREFIX: &str = "\tat ";

const BANNER: &str = "The call path above was computed from a single arbitrary implementation and may be misleading. \
Call paths resolved from the analysis call tree follow.";

/// Stateful filter over stderr lines.
pub struct ErrorReportFilter<W: Write> {
  out: W,
  passthrough: bool,
  held: Option<Vec<String>>,
}

impl<W: Write> ErrorReportFilter<W> {
  /// Creates a filter writing to `out`.
  ///
  /// With `passthrough` off, lines before the marker are dropped. The held
  /// error block is written either way.
  pub fn new(out: W, passthrough: bool) -> Self {
    Self {
      out,
      passthrough,
      held: None,
    }
  }

  pub fn push_line(&mut self, line: &str) -> io::Result<()> {
    if let Some(held) = self.held.as_mut() {
      held.push(line.to_string());
      return Ok(());
    }

    if line.starts_with(CALL_PATH_MARKER) {
      debug!("holding back compiler call path report");
      self.held = Some(vec![line.to_string()]);
      return Ok(());
    }

    if self.passthrough {
      writeln!(self.out, "{}", line)?;
    }
    Ok(())
  }

  /// Whether a call path marker has been seen.
  pub fn is_holding(&self) -> bool {
    self.held.is_some()
  }

  /// Flush the held block, rewriting it against the call-tree report found in
  /// `reports_dir` when there is one. Returns the underlying writer.
  pub fn finish(mut self, reports_dir: Option<&Path>) -> io::Result<W> {
    let Some(held) = self.held.take() else {
      self.out.flush()?;
      return Ok(self.out);
    };

    let tree = reports_dir.and_then(CallTree::find).and_then(|path| match CallTree::load(&path) {
      Ok(tree) => Some(tree),
      Err(err) => {
        warn!(path = %path.display(), error = %err, "failed to read call tree report");
        None
      }
    });

    match tree {
      Some(tree) if !tree.is_empty() => self.write_resolved(&held, &tree)?,
      _ => self.write_verbatim(&held)?,
    }

    self.out.flush()?;
    Ok(self.out)
  }

  fn write_verbatim(&mut self, held: &[String]) -> io::Result<()> {
    for line in held {
      writeln!(self.out, "{}", line)?;
    }
    Ok(())
  }

  fn write_resolved(&mut self, held: &[String], tree: &CallTree) -> io::Result<()> {
    let mut banner_written = false;
    let mut skipping_frames = false;

    for line in held {
      if let Some(target) = line.strip_prefix(CALL_PATH_MARKER) {
        let target = target.trim().trim_end_matches(':');
        match tree.analyse(target) {
          Some(chain) => {
            if !banner_written {
              writeln!(self.out, "{}", BANNER)?;
              banner_written = true;
            }
            writeln!(self.out, "{}{}:", CALL_PATH_MARKER, target)?;
            for method in chain.iter().rev() {
              writeln!(self.out, "{}{}", FRAME_PREFIX, method)?;
            }
            skipping_frames = true;
          }
          None => {
            writeln!(self.out, "{}", line)?;
            skipping_frames = false;
          }
        }
        continue;
      }

      if skipping_frames && line.starts_with(FRAME_PREFIX) {
        continue;
      }
      skipping_frames = false;
      writeln!(self.out, "{}", line)?;
    }
    Ok(())
  }
}
