//! Per-target build configuration.
//!
//! A [`Config`] is what the user writes down. [`Config::resolve`] validates it,
//! applies the `KINDLE_FORCE_*` environment overrides and fills in the default
//! build directory, producing the immutable [`ResolvedConfig`] the pipeline runs on.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  APP_NAME, DEFAULT_BUILD_TYPE, ENV_FORCE_CLEAN_BUILD, ENV_FORCE_STUBS_INVALID_OK, ENV_FORCE_VERBOSE, METADATA_DIR,
  RESERVED_BUILD_OPTIONS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("project directory must be an absolute path: {path}")]
  ProjectDirNotAbsolute { path: PathBuf },

  #[error("project directory {path} does not exist: {source}")]
  ProjectDirMissing {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("build directory must be an absolute path: {path}")]
  BuildDirNotAbsolute { path: PathBuf },

  #[error("stubs directory must be an absolute path: {path}")]
  StubsDirNotAbsolute { path: PathBuf },

  #[error("build option `{key}` is reserved: options matching `{reserved}` are set by kindle itself")]
  ReservedOption { key: String, reserved: &'static str },

  #[error("environment variable {var} has invalid value \"{value}\", expected one of 1/on/yes/true/y or 0/off/no/false/n")]
  InvalidEnvFlag { var: &'static str, value: String },

  #[error("cannot determine the current executable: {0}")]
  CurrentExe(#[source] io::Error),
}

/// Extra `-D` options passed to the configure command, in insertion order with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions(Vec<(String, String)>);

impl BuildOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets `key`, keeping its original position when it already exists.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
    let key = key.into();
    let value = value.into();
    match self.0.iter_mut().find(|(existing, _)| *existing == key) {
      Some(entry) => entry.1 = value,
      None => self.0.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildOptions {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut options = BuildOptions::new();
    for (key, value) in iter {
      options.insert(key, value);
    }
    options
  }
}

/// User-facing configuration for one target.
#[derive(Debug, Clone)]
pub struct Config {
  project_dir: PathBuf,
  build_dir: Option<PathBuf>,
  clean_build: bool,
  build_type: String,
  options: BuildOptions,
  stubs_dir: Option<PathBuf>,
  stubs_invalid_ok: bool,
  verbose: bool,
}

impl Config {
  pub fn new(project_dir: impl Into<PathBuf>) -> Self {
    Self {
      project_dir: project_dir.into(),
      build_dir: None,
      clean_build: false,
      build_type: DEFAULT_BUILD_TYPE.to_string(),
      options: BuildOptions::new(),
      stubs_dir: None,
      stubs_invalid_ok: false,
      verbose: false,
    }
  }

  pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.build_dir = Some(dir.into());
    self
  }

  pub fn clean_build(mut self, clean: bool) -> Self {
    self.clean_build = clean;
    self
  }

  pub fn build_type(mut self, build_type: impl Into<String>) -> Self {
    self.build_type = build_type.into();
    self
  }

  pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.options.insert(key, value);
    self
  }

  pub fn options(mut self, options: BuildOptions) -> Self {
    self.options = options;
    self
  }

  pub fn stubs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.stubs_dir = Some(dir.into());
    self
  }

  pub fn stubs_invalid_ok(mut self, ok: bool) -> Self {
    self.stubs_invalid_ok = ok;
    self
  }

  pub fn verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }

  /// Validates the configuration for `target` and applies environment overrides.
  pub fn resolve(&self, target: &str) -> Result<ResolvedConfig, ConfigError> {
    if !self.project_dir.is_absolute() {
      return Err(ConfigError::ProjectDirNotAbsolute {
        path: self.project_dir.clone(),
      });
    }
    let project_dir = dunce::canonicalize(&self.project_dir).map_err(|source| ConfigError::ProjectDirMissing {
      path: self.project_dir.clone(),
      source,
    })?;

    let build_dir = match &self.build_dir {
      Some(dir) if !dir.is_absolute() => {
        return Err(ConfigError::BuildDirNotAbsolute { path: dir.clone() });
      }
      Some(dir) => dir.clone(),
      None => default_build_dir(target, &project_dir)?,
    };

    if let Some(dir) = &self.stubs_dir
      && !dir.is_absolute()
    {
      return Err(ConfigError::StubsDirNotAbsolute { path: dir.clone() });
    }

    for (key, _) in self.options.iter() {
      if let Some(reserved) = RESERVED_BUILD_OPTIONS.iter().copied().find(|reserved| key.contains(*reserved)) {
        return Err(ConfigError::ReservedOption {
          key: key.to_string(),
          reserved,
        });
      }
    }

    let resolved = ResolvedConfig {
      project_dir,
      build_dir,
      clean_build: env_flag(ENV_FORCE_CLEAN_BUILD)?.unwrap_or(self.clean_build),
      build_type: self.build_type.clone(),
      options: self.options.clone(),
      stubs_dir: self.stubs_dir.clone(),
      stubs_invalid_ok: env_flag(ENV_FORCE_STUBS_INVALID_OK)?.unwrap_or(self.stubs_invalid_ok),
      verbose: env_flag(ENV_FORCE_VERBOSE)?.unwrap_or(self.verbose),
    };
    debug!(target_name = target, config = ?resolved, "resolved configuration");
    Ok(resolved)
  }
}

/// Immutable settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
  pub project_dir: PathBuf,
  pub build_dir: PathBuf,
  pub clean_build: bool,
  pub build_type: String,
  pub options: BuildOptions,
  pub stubs_dir: Option<PathBuf>,
  pub stubs_invalid_ok: bool,
  pub verbose: bool,
}

impl ResolvedConfig {
  /// `<build>/kindle`, where every persisted value and the lock live.
  pub fn metadata_dir(&self) -> PathBuf {
    self.build_dir.join(METADATA_DIR)
  }
}

/// `<tmp>/kindle-of-<user>/<target>_build_<hash>`, stable per project and executable.
pub fn default_build_dir(target: &str, project_dir: &Path) -> Result<PathBuf, ConfigError> {
  let executable = env::current_exe().map_err(ConfigError::CurrentExe)?;

  let mut hasher = Sha256::new();
  hasher.update(project_dir.to_string_lossy().as_bytes());
  hasher.update(executable.to_string_lossy().as_bytes());
  let digest = hasher.finalize();
  let suffix = URL_SAFE.encode(&digest[..6]);

  Ok(
    env::temp_dir()
      .join(format!("{}-of-{}", APP_NAME, whoami::username()))
      .join(format!("{target}_build_{suffix}")),
  )
}

/// Reads a boolean override. Unset means no override.
fn env_flag(var: &'static str) -> Result<Option<bool>, ConfigError> {
  let value = match env::var(var) {
    Ok(value) => value,
    Err(env::VarError::NotPresent) => return Ok(None),
    Err(env::VarError::NotUnicode(raw)) => {
      return Err(ConfigError::InvalidEnvFlag {
        var,
        value: raw.to_string_lossy().into_owned(),
      });
    }
  };

  match parse_flag(&value) {
    Some(flag) => {
      debug!(var, flag, "environment override");
      Ok(Some(flag))
    }
    None => Err(ConfigError::InvalidEnvFlag { var, value }),
  }
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "on" | "yes" | "true" | "y" => Some(true),
    "0" | "off" | "no" | "false" | "n" => Some(false),
    _ => None,
  }
}
