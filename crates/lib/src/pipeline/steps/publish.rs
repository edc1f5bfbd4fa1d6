use std::path::{Path, PathBuf};

use tracing::info;

use super::{Step, StepEnv};
use crate::consts::LIBRARY_PATH_SEPARATOR;
use crate::loader::LoadContext;
use crate::pipeline::layout::{ARTIFACT_LOCATION, EXTRA_LIBRARY_SEARCH_PATHS};
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::KeyedStore;

/// Makes the artifact loadable through the caller's [`LoadContext`].
pub struct PublishStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
  ctx: &'a mut LoadContext,
}

impl<'a> PublishStep<'a> {
  pub fn new(env: StepEnv<'a>, ctx: &'a mut LoadContext) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<PathBuf>(&mut store, ARTIFACT_LOCATION);
    env.connect::<String>(&mut store, EXTRA_LIBRARY_SEARCH_PATHS);
    Self { env, store, ctx }
  }
}

impl Step for PublishStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::Publish
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    let artifact: PathBuf = self.store.get(ARTIFACT_LOCATION)?;
    if let Some(dir) = artifact.parent() {
      self.ctx.add_search_path(dir);
    }

    let extra = self.store.get_or(EXTRA_LIBRARY_SEARCH_PATHS, String::new())?;
    let mut registered = 0;
    for entry in extra.split(LIBRARY_PATH_SEPARATOR).map(str::trim).filter(|entry| !entry.is_empty()) {
      if self.ctx.register_library_dir(Path::new(entry)) {
        registered += 1;
      }
    }

    if registered > 0 {
      info!(target_name = self.env.target, registered, "registered library directories");
    }

    Ok(StepStatus::Successful)
  }
}
