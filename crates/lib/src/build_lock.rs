//! Exclusive lock on a build output directory.
//!
//! Two builds writing the same output directory would race on the compiler's
//! work files and on the final executable, so the CLI holds a [`BuildLock`]
//! for the whole build. The lock file records who holds it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCK_FILENAME: &str = ".nativeforge.lock";

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub output_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "output directory is locked by another build: {command} (PID {pid}, started at Unix time {started_at_unix})\n\
     If no build is running, remove the lock file:\n  {}",
    .lock_path.display()
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "output directory is locked by another build (could not read lock metadata)\n\
     If no build is running, remove the lock file:\n  {}",
    .lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create output directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for as long as the value lives; released on drop.
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
}

impl BuildLock {
  /// Lock `output_dir`, creating it if needed. Fails immediately if another
  /// build holds the lock.
  pub fn acquire(output_dir: &Path, command: &str) -> Result<Self, BuildLockError> {
    std::fs::create_dir_all(output_dir).map_err(BuildLockError::CreateDir)?;
    let lock_path = output_dir.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(BuildLockError::OpenFile)?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(read_contention_error(&lock_path));
      }
      return Err(BuildLockError::LockFailed(err));
    }

    write_metadata(&file, command, output_dir)?;
    Ok(Self { file, lock_path })
  }

  /// Metadata read back through the held handle. Opening the file again
  /// would fail on Windows, where the lock is mandatory.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, command: &str, output_dir: &Path) -> Result<(), BuildLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    output_dir: output_dir.to_path_buf(),
  };

  file.set_len(0).map_err(BuildLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| BuildLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(BuildLockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> BuildLockError {
  if let Ok(mut file) = File::open(lock_path) {
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_ok()
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      return BuildLockError::Contention {
        command: metadata.command,
        pid: metadata.pid,
        started_at_unix: metadata.started_at_unix,
        lock_path: lock_path.to_path_buf(),
      };
    }
  }

  BuildLockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized,
  // and `handle` is a valid open file handle.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
