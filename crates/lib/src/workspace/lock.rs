//! File-based workspace locking for cross-process mutual exclusion.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::WorkspaceError;
use crate::consts::WORKSPACE_LOCK_VERSION;
use crate::work::Identity;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub identity: Identity,
}

/// An exclusive lock on one workspace, released on drop.
pub struct WorkspaceLock {
  file: File,
  lock_path: PathBuf,
}

impl WorkspaceLock {
  /// Block until the lock at `lock_path` is held.
  pub fn acquire(lock_path: &Path, identity: &Identity) -> Result<Self, WorkspaceError> {
    let file = open_lock_file(lock_path)?;
    lock(&file, true).map_err(WorkspaceError::LockFailed)?;
    write_metadata(&file, identity)?;

    Ok(Self {
      file,
      lock_path: lock_path.to_path_buf(),
    })
  }

  /// Take the lock only if nobody holds it.
  ///
  /// Contention is reported with the holder's metadata when it can be read.
  pub fn try_acquire(lock_path: &Path, identity: &Identity) -> Result<Self, WorkspaceError> {
    let file = open_lock_file(lock_path)?;

    if let Err(err) = lock(&file, false) {
      if is_contention(&err) {
        return Err(read_contention_error(lock_path));
      }
      return Err(WorkspaceError::LockFailed(err));
    }
    write_metadata(&file, identity)?;

    Ok(Self {
      file,
      lock_path: lock_path.to_path_buf(),
    })
  }

  /// Read the lock metadata through the held handle.
  ///
  /// Opening a second handle would fail on Windows while the lock is held.
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

fn open_lock_file(lock_path: &Path) -> Result<File, WorkspaceError> {
  if let Some(parent) = lock_path.parent()
    && !parent.exists()
  {
    std::fs::create_dir_all(parent).map_err(WorkspaceError::CreateDir)?;
  }

  OpenOptions::new()
    .read(true)
    .write(true)
    .create(true)
    .truncate(false)
    .open(lock_path)
    .map_err(WorkspaceError::OpenLock)
}

fn write_metadata(file: &File, identity: &Identity) -> Result<(), WorkspaceError> {
  let metadata = LockMetadata {
    version: WORKSPACE_LOCK_VERSION,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    identity: identity.clone(),
  };

  file.set_len(0).map_err(WorkspaceError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| WorkspaceError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(WorkspaceError::WriteMetadata)?;

  Ok(())
}

fn read_contention_error(lock_path: &Path) -> WorkspaceError {
  if let Ok(mut file) = File::open(lock_path) {
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_ok()
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      return WorkspaceError::Contention {
        identity: metadata.identity,
        pid: metadata.pid,
        started_at: format!("Unix timestamp {}", metadata.started_at_unix),
        lock_path: lock_path.to_path_buf(),
      };
    }
  }

  WorkspaceError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn is_contention(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn is_contention(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;

  err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}

#[cfg(unix)]
fn lock(file: &File, blocking: bool) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = if blocking {
    FlockOperation::LockExclusive
  } else {
    FlockOperation::NonBlockingLockExclusive
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn lock(file: &File, blocking: bool) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = if blocking {
    LOCKFILE_EXCLUSIVE_LOCK
  } else {
    LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY
  };

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
