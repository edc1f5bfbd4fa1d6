use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Step, StepEnv};
use crate::pipeline::layout::{STATUS_CONFIGURE, VERSION};
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::{KeyedStore, StoreError};
use crate::version;

/// Wipes the build directory when its contents can no longer be trusted.
pub struct CleanStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
}

impl<'a> CleanStep<'a> {
  pub fn new(env: StepEnv<'a>) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<StepStatus>(&mut store, STATUS_CONFIGURE);
    env.connect::<String>(&mut store, VERSION);
    Self { env, store }
  }

  /// Why the build directory must be wiped, if it must.
  fn reason(&self) -> Result<Option<&'static str>, PipelineError> {
    if self.env.config.clean_build {
      return Ok(Some("clean build requested"));
    }

    let stored_version = match self.store.get_or(VERSION, self.env.version.to_string()) {
      Ok(stored_version) => stored_version,
      Err(StoreError::Read { .. } | StoreError::Decode { .. }) => return Ok(Some("stored version is unreadable")),
      Err(err) => return Err(err.into()),
    };
    if !version::is_compatible(&stored_version, self.env.version) {
      return Ok(Some("build directory written by an incompatible version"));
    }

    match self.store.get_or(STATUS_CONFIGURE, StepStatus::Skipped) {
      Ok(StepStatus::Failed) => Ok(Some("previous configure failed")),
      Ok(_) => Ok(None),
      Err(StoreError::Read { .. } | StoreError::Decode { .. }) => Ok(Some("stored configure status is unreadable")),
      Err(err) => Err(err.into()),
    }
  }
}

impl Step for CleanStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::Clean
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    let Some(reason) = self.reason()? else {
      debug!(build_dir = %self.env.layout.build_dir().display(), "build directory is reusable");
      return Ok(StepStatus::Skipped);
    };

    info!(build_dir = %self.env.layout.build_dir().display(), reason, "cleaning build directory");
    let (files, directories) = wipe(self.env.layout.build_dir(), &self.env.layout.lock_file())?;
    info!(files, directories, "removed build state");

    Ok(StepStatus::Successful)
  }
}

/// Deletes everything under `root` except `keep`, depth-first. Returns removed file and directory counts.
fn wipe(root: &Path, keep: &Path) -> Result<(usize, usize), PipelineError> {
  let mut files = 0;
  let mut directories = 0;

  for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
    let entry = entry.map_err(|err| {
      let path = err.path().unwrap_or(root).to_path_buf();
      PipelineError::io(path, io::Error::from(err))
    })?;
    let path = entry.path();

    if path == keep {
      continue;
    }

    if entry.file_type().is_dir() {
      let is_empty = fs::read_dir(path)
        .map_err(|source| PipelineError::io(path, source))?
        .next()
        .is_none();
      if is_empty {
        fs::remove_dir(path).map_err(|source| PipelineError::io(path, source))?;
        directories += 1;
      }
    } else {
      fs::remove_file(path).map_err(|source| PipelineError::io(path, source))?;
      files += 1;
    }
  }

  Ok((files, directories))
}
