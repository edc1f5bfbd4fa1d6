//! File layout of the persisted step state.
//!
//! ```text
//! <build>/
//! ├── .gitignore
//! └── kindle/
//!     ├── build.lock
//!     ├── version.txt
//!     ├── configure_command.txt
//!     ├── configure_passed.txt            written by the project's build scripts
//!     ├── status_configure.txt
//!     ├── status_compile.txt
//!     ├── status_stubgen.txt
//!     └── <build_type>/
//!         ├── checksum.txt
//!         ├── artifact_location.txt       written by the project's build scripts
//!         └── extra_library_search_paths.txt
//! ```

use std::path::{Path, PathBuf};

use crate::config::ResolvedConfig;
use crate::consts::{IGNORE_FILENAME, METADATA_DIR};

pub const STATUS_CONFIGURE: &str = "status_configure";
pub const STATUS_COMPILE: &str = "status_compile";
pub const STATUS_STUBGEN: &str = "status_stubgen";
pub const VERSION: &str = "version";
pub const CONFIGURE_COMMAND: &str = "configure_command";
pub const CHECKSUM: &str = "checksum";
pub const ARTIFACT_LOCATION: &str = "artifact_location";
pub const EXTRA_LIBRARY_SEARCH_PATHS: &str = "extra_library_search_paths";

/// Paths derived from one build directory and build type.
#[derive(Debug, Clone)]
pub struct Layout {
  build_dir: PathBuf,
  metadata_dir: PathBuf,
  build_type: String,
}

impl Layout {
  pub fn new(build_dir: &Path, build_type: &str) -> Self {
    Self {
      build_dir: build_dir.to_path_buf(),
      metadata_dir: build_dir.join(METADATA_DIR),
      build_type: build_type.to_string(),
    }
  }

  pub fn for_config(config: &ResolvedConfig) -> Self {
    Self::new(&config.build_dir, &config.build_type)
  }

  pub fn build_dir(&self) -> &Path {
    &self.build_dir
  }

  pub fn metadata_dir(&self) -> &Path {
    &self.metadata_dir
  }

  pub fn ignore_file(&self) -> PathBuf {
    self.build_dir.join(IGNORE_FILENAME)
  }

  pub fn lock_file(&self) -> PathBuf {
    crate::build_lock::lock_path(&self.build_dir)
  }

  /// Marker the project's configure scripts write once configuration succeeded.
  pub fn configure_passed(&self) -> PathBuf {
    self.metadata_dir.join("configure_passed.txt")
  }

  /// File backing a store key. Per-build-type keys live in a subdirectory.
  pub fn key_path(&self, key: &str) -> PathBuf {
    match key {
      CHECKSUM | ARTIFACT_LOCATION | EXTRA_LIBRARY_SEARCH_PATHS => {
        self.metadata_dir.join(&self.build_type).join(format!("{key}.txt"))
      }
      _ => self.metadata_dir.join(format!("{key}.txt")),
    }
  }
}
