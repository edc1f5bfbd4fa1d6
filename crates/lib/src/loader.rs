//! Where built artifacts become visible to the host that loads them.
//!
//! The trigger owns a [`LoadContext`] and hands it to the pipeline. The Publish
//! step appends the artifact's directory to the module search path and registers
//! the extra library directories the artifact depends on. On Windows each
//! registration is also made with the OS loader (`AddDllDirectory`) and undone
//! when the context is dropped.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Module search path plus registered library directories for one host.
#[derive(Debug, Default)]
pub struct LoadContext {
  search_paths: Vec<PathBuf>,
  library_dirs: Vec<LibraryDirHandle>,
}

impl LoadContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends `dir` unless it is already on the search path. Returns whether it was added.
  pub fn add_search_path(&mut self, dir: &Path) -> bool {
    if self.search_paths.iter().any(|existing| existing == dir) {
      return false;
    }
    debug!(dir = %dir.display(), "adding module search path");
    self.search_paths.push(dir.to_path_buf());
    true
  }

  pub fn search_paths(&self) -> &[PathBuf] {
    &self.search_paths
  }

  /// Registers a library directory. Only existing absolute directories are accepted.
  ///
  /// Returns whether a new registration was made; registering the same directory
  /// twice is a no-op.
  pub fn register_library_dir(&mut self, dir: &Path) -> bool {
    if !dir.is_absolute() || !dir.is_dir() {
      warn!(dir = %dir.display(), "ignoring library directory that is not an existing absolute path");
      return false;
    }
    if self.library_dirs.iter().any(|handle| handle.dir == dir) {
      return false;
    }

    match LibraryDirHandle::register(dir) {
      Some(handle) => {
        debug!(dir = %dir.display(), "registered library directory");
        self.library_dirs.push(handle);
        true
      }
      None => {
        warn!(dir = %dir.display(), "OS loader rejected library directory");
        false
      }
    }
  }

  pub fn library_dirs(&self) -> impl Iterator<Item = &Path> {
    self.library_dirs.iter().map(|handle| handle.dir.as_path())
  }

  /// Drops the registration for `dir`. Returns whether one existed.
  pub fn release_library_dir(&mut self, dir: &Path) -> bool {
    let before = self.library_dirs.len();
    self.library_dirs.retain(|handle| handle.dir != dir);
    before != self.library_dirs.len()
  }
}

/// A library directory registration, undone on drop.
#[derive(Debug)]
struct LibraryDirHandle {
  dir: PathBuf,
  #[cfg(windows)]
  cookie: *mut core::ffi::c_void,
}

#[cfg(not(windows))]
impl LibraryDirHandle {
  fn register(dir: &Path) -> Option<Self> {
    Some(Self { dir: dir.to_path_buf() })
  }
}

#[cfg(windows)]
impl LibraryDirHandle {
  fn register(dir: &Path) -> Option<Self> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::System::LibraryLoader::AddDllDirectory;

    let wide: Vec<u16> = dir.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    // SAFETY: `wide` is a valid NUL-terminated UTF-16 string that outlives the call.
    let cookie = unsafe { AddDllDirectory(wide.as_ptr()) };
    if cookie.is_null() {
      return None;
    }
    Some(Self {
      dir: dir.to_path_buf(),
      cookie,
    })
  }
}

#[cfg(windows)]
impl Drop for LibraryDirHandle {
  fn drop(&mut self) {
    use windows_sys::Win32::System::LibraryLoader::RemoveDllDirectory;

    // SAFETY: the cookie came from a successful AddDllDirectory call and is removed once.
    unsafe {
      RemoveDllDirectory(self.cookie);
    }
    debug!(dir = %self.dir.display(), "released library directory");
  }
}
