//! Executable compression with UPX.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::{StepError, ToolHost, file_arg, parent_dir};
use crate::config::{CompressionConfig, StepRequest};

const UPX: &str = "upx";

/// Highest numeric level; maps to `--best`.
pub const BEST_LEVEL: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compressed {
  pub path: PathBuf,
  pub level: Option<u8>,
}

/// UPX flag for a compression level: `-1` to `-9`, or `--best`.
pub fn level_flag(level: u8) -> String {
  if level >= BEST_LEVEL {
    "--best".to_string()
  } else {
    format!("-{}", level.max(1))
  }
}

/// Compress `executable` in place.
///
/// Returns `Ok(None)` when compression is off, or when UPX is missing and
/// compression was not required.
pub async fn compress(
  host: &ToolHost<'_>,
  executable: &Path,
  config: &CompressionConfig,
) -> Result<Option<Compressed>, StepError> {
  if !config.request.is_enabled() {
    return Ok(None);
  }

  let workdir = parent_dir(executable)?;
  let Some(mut argv) = host.locate(UPX, workdir).await? else {
    if config.request == StepRequest::Required {
      return Err(StepError::ToolUnavailable {
        tool: UPX,
        location: host.describe(),
      });
    }
    warn!(location = %host.describe(), "upx not found, skipping compression");
    return Ok(None);
  };

  if let Some(level) = config.level {
    argv.push(level_flag(level));
  }
  argv.extend(config.additional_args.iter().cloned());
  argv.push(file_arg(executable));

  info!(path = %executable.display(), level = ?config.level, "compressing executable");
  let code = host.run(&argv, workdir).await?;
  if code != 0 {
    return Err(StepError::Failed { tool: UPX, code });
  }
  if !executable.is_file() {
    return Err(StepError::MissingOutput {
      tool: UPX,
      path: executable.to_path_buf(),
    });
  }

  Ok(Some(Compressed {
    path: executable.to_path_buf(),
    level: config.level,
  }))
}
