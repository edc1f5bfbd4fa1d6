//! Advisory lock serializing pipeline runs per build directory.
//!
//! The lock file lives at `<build>/kindle/build.lock`. It is created on first
//! use and never deleted; the Clean step skips it explicitly. Acquisition blocks
//! until the current holder finishes, and the lock is released when the
//! [`BuildLock`] guard is dropped, on every exit path.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{LOCK_FILENAME, METADATA_DIR};

/// Diagnostic record written into the lock file by the holder.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub target: String,
  pub build_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "Build directory is locked by another process: target {target} (PID {pid}, started Unix timestamp {started_at_unix})\n\
     If you're sure no kindle process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    target: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "Build directory is locked (could not read lock metadata)\n\
     If you're sure no kindle process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create lock directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open lock file {path}: {source}")]
  OpenFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock {path}: {source}")]
  LockFailed {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Exclusive hold on a build directory. Released on drop.
#[derive(Debug)]
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
}

/// Path of the lock file for `build_dir`.
pub fn lock_path(build_dir: &Path) -> PathBuf {
  build_dir.join(METADATA_DIR).join(LOCK_FILENAME)
}

impl BuildLock {
  /// Acquires the lock for `build_dir`, waiting for any other holder to release it.
  pub fn acquire(build_dir: &Path, target: &str) -> Result<Self, BuildLockError> {
    let (file, lock_path) = open_lock_file(build_dir)?;

    match try_lock(&file) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
        let holder = read_contention_error(&lock_path);
        info!(lock = %lock_path.display(), "waiting for build lock: {}", holder_summary(&holder));
        lock_blocking(&file).map_err(|source| BuildLockError::LockFailed {
          path: lock_path.clone(),
          source,
        })?;
      }
      Err(source) => {
        return Err(BuildLockError::LockFailed {
          path: lock_path.clone(),
          source,
        });
      }
    }

    write_metadata(&file, target, build_dir)?;
    debug!(lock = %lock_path.display(), target_name = target, "acquired build lock");
    Ok(BuildLock { file, lock_path })
  }

  /// Acquires the lock only if it is free right now.
  pub fn try_acquire(build_dir: &Path, target: &str) -> Result<Self, BuildLockError> {
    let (file, lock_path) = open_lock_file(build_dir)?;

    if let Err(err) = try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(read_contention_error(&lock_path));
      }
      return Err(BuildLockError::LockFailed { path: lock_path, source: err });
    }

    write_metadata(&file, target, build_dir)?;
    Ok(BuildLock { file, lock_path })
  }

  /// Reads the metadata through the held handle.
  ///
  /// Opening a second handle would fail on Windows while the lock is held.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
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

impl Drop for BuildLock {
  fn drop(&mut self) {
    debug!(lock = %self.lock_path.display(), "releasing build lock");
  }
}

fn open_lock_file(build_dir: &Path) -> Result<(File, PathBuf), BuildLockError> {
  let lock_path = lock_path(build_dir);
  if let Some(dir) = lock_path.parent() {
    std::fs::create_dir_all(dir).map_err(|source| BuildLockError::CreateDir {
      path: dir.to_path_buf(),
      source,
    })?;
  }

  let file = OpenOptions::new()
    .read(true)
    .write(true)
    .create(true)
    .truncate(false)
    .open(&lock_path)
    .map_err(|source| BuildLockError::OpenFile {
      path: lock_path.clone(),
      source,
    })?;

  Ok((file, lock_path))
}

fn write_metadata(file: &File, target: &str, build_dir: &Path) -> Result<(), BuildLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    target: target.to_string(),
    build_dir: build_dir.to_path_buf(),
  };

  file.set_len(0).map_err(BuildLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0)).map_err(BuildLockError::WriteMetadata)?;
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
        target: metadata.target,
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

fn holder_summary(err: &BuildLockError) -> String {
  match err {
    BuildLockError::Contention { target, pid, .. } => format!("held by PID {pid} building {target}"),
    _ => "holder unknown".to_string(),
  }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  flock(file, rustix::fs::FlockOperation::NonBlockingLockExclusive)
}

#[cfg(unix)]
fn lock_blocking(file: &File) -> io::Result<()> {
  flock(file, rustix::fs::FlockOperation::LockExclusive)
}

#[cfg(unix)]
fn flock(file: &File, operation: rustix::fs::FlockOperation) -> io::Result<()> {
  use std::os::unix::io::AsFd;

  loop {
    match rustix::fs::flock(file.as_fd(), operation) {
      Ok(()) => return Ok(()),
      Err(rustix::io::Errno::INTR) => continue,
      Err(e) => return Err(io::Error::from_raw_os_error(e.raw_os_error())),
    }
  }
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};
  lock_file_ex(file, LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK)
}

#[cfg(windows)]
fn lock_blocking(file: &File) -> io::Result<()> {
  use windows_sys::Win32::Storage::FileSystem::LOCKFILE_EXCLUSIVE_LOCK;
  lock_file_ex(file, LOCKFILE_EXCLUSIVE_LOCK)
}

#[cfg(windows)]
fn lock_file_ex(file: &File, flags: u32) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::LockFileEx;

  let handle = file.as_raw_handle() as HANDLE;

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
