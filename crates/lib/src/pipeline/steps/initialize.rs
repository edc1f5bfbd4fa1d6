use std::fs;

use tracing::debug;

use super::{Step, StepEnv};
use crate::pipeline::layout::VERSION;
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::KeyedStore;

/// Stamps the build directory with the current version and hides it from version control.
pub struct InitializeStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
}

impl<'a> InitializeStep<'a> {
  pub fn new(env: StepEnv<'a>) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<String>(&mut store, VERSION);
    Self { env, store }
  }
}

impl Step for InitializeStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::Initialize
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    self.store.set(VERSION, &self.env.version.to_string())?;

    let ignore = self.env.layout.ignore_file();
    fs::write(&ignore, "*").map_err(|source| PipelineError::io(&ignore, source))?;
    debug!(version = self.env.version, ignore = %ignore.display(), "initialized build directory");

    Ok(StepStatus::Successful)
  }
}
