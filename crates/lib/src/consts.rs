//! Names shared between the pipeline, its on-disk layout and the environment.

pub const APP_NAME: &str = "kindle";

/// Metadata subdirectory inside every build directory.
pub const METADATA_DIR: &str = "kindle";

pub const LOCK_FILENAME: &str = "build.lock";

/// Marker convention consumed by version-control tooling to ignore the build directory.
pub const IGNORE_FILENAME: &str = ".gitignore";

pub const DEFAULT_BUILD_TYPE: &str = "RelWithDebInfo";

/// Version of this crate, persisted by the Initialize step.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_FORCE_CLEAN_BUILD: &str = "KINDLE_FORCE_CLEAN_BUILD";
pub const ENV_FORCE_STUBS_INVALID_OK: &str = "KINDLE_FORCE_STUBS_INVALID_OK";
pub const ENV_FORCE_VERBOSE: &str = "KINDLE_FORCE_VERBOSE";

/// Build option names owned by the pipeline itself. Matched as substrings of user option keys.
pub const RESERVED_BUILD_OPTIONS: &[&str] = &[
  "KINDLE_",
  "CMAKE_CONFIGURATION_TYPES",
  "CMAKE_PREFIX_PATH",
  "CMAKE_PROJECT_TOP_LEVEL_INCLUDES",
];

/// Separator used in `extra_library_search_paths.txt`.
pub const LIBRARY_PATH_SEPARATOR: char = ';';
