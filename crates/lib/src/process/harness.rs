//! Streaming execution of long-running tools.
//!
//! Stdout is drained on the calling task while stderr is fed line by line
//! through an [`ErrorReportFilter`] on a spawned task. Both pipes are drained
//! concurrently so the child never blocks on a full pipe. The stderr task
//! reports completion over a oneshot channel, and [`run`] only returns once
//! the child has exited and the filtered report has been flushed.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::launcher::{CaptureMode, ErrorSink};
use super::{ProcessError, exit_code};
use crate::report::ErrorReportFilter;

/// Run `argv` in `cwd` and return its exit code.
///
/// A child terminated by a signal reports `128 + signal`.
pub async fn run(
  argv: &[String],
  cwd: &Path,
  mode: CaptureMode,
  reports_dir: Option<&Path>,
  sink: ErrorSink,
) -> Result<i32, ProcessError> {
  let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

  let mut command = Command::new(program);
  command
    .args(args)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stderr(Stdio::piped())
    .stdout(match mode {
      CaptureMode::Inherit => Stdio::inherit(),
      CaptureMode::Discard => Stdio::piped(),
    });

  debug!(program = %program, cwd = ?cwd, mode = ?mode, "spawning process");
  let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
    program: program.clone(),
    source,
  })?;

  let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"))?;
  let passthrough = mode == CaptureMode::Inherit;
  let reports_dir = reports_dir.map(Path::to_path_buf);
  let (done_tx, done_rx) = oneshot::channel();

  tokio::spawn(async move {
    let result = filter_stderr(stderr, sink, passthrough, reports_dir).await;
    let _ = done_tx.send(result);
  });

  if let Some(stdout) = child.stdout.take()
    && let Err(err) = drain_stdout(stdout, &mut child).await
  {
    let _ = done_rx.await;
    return Err(err.into());
  }

  let status = child.wait().await.map_err(|source| ProcessError::Wait {
    program: program.clone(),
    source,
  })?;

  done_rx.await.map_err(|_| ProcessError::ReportAborted)??;

  let code = exit_code(status);
  debug!(program = %program, code, "process exited");
  Ok(code)
}

/// Drain the child's stdout. On a read error the child is killed and reaped
/// before the error is returned.
async fn drain_stdout<R: AsyncRead + Unpin>(stdout: R, child: &mut Child) -> io::Result<()> {
  match drain(stdout).await {
    Ok(discarded) => {
      trace!(bytes = discarded, "drained stdout");
      Ok(())
    }
    Err(err) => {
      debug!(error = %err, "stdout read failed, killing child");
      if let Err(kill) = child.kill().await {
        debug!(error = %kill, "failed to kill child");
      }
      Err(err)
    }
  }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<u64> {
  let mut total = 0u64;
  let mut buf = [0u8; 8192];
  loop {
    let n = reader.read(&mut buf).await?;
    if n == 0 {
      return Ok(total);
    }
    total += n as u64;
  }
}

async fn filter_stderr<R: AsyncRead + Unpin>(
  stderr: R,
  sink: ErrorSink,
  passthrough: bool,
  reports_dir: Option<PathBuf>,
) -> Result<(), ProcessError> {
  let mut reader = BufReader::new(stderr);
  let mut filter = ErrorReportFilter::new(SinkWriter(sink), passthrough);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }
    let line = String::from_utf8_lossy(&buf);
    filter.push_line(line.trim_end_matches(['\n', '\r']))?;
  }

  filter.finish(reports_dir.as_deref())?;
  Ok(())
}

/// [`Write`] adapter over the shared error sink.
struct SinkWriter(ErrorSink);

impl Write for SinkWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self
      .0
      .lock()
      .map_err(|_| io::Error::other("error sink poisoned"))?
      .write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self
      .0
      .lock()
      .map_err(|_| io::Error::other("error sink poisoned"))?
      .flush()
  }
}
