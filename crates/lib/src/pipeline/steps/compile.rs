use tracing::warn;

use super::{Step, StepEnv, posix};
use crate::pipeline::layout::{STATUS_COMPILE, STATUS_CONFIGURE};
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::KeyedStore;

/// Drives the build tool. Always runs; the tool itself decides what is out of date.
pub struct CompileStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
}

impl<'a> CompileStep<'a> {
  pub fn new(env: StepEnv<'a>) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<StepStatus>(&mut store, STATUS_CONFIGURE);
    env.connect::<StepStatus>(&mut store, STATUS_COMPILE);
    Self { env, store }
  }

  pub fn command(&self) -> Vec<String> {
    vec![
      self.env.toolchain.cmake.clone(),
      "--build".to_string(),
      posix(&self.env.config.build_dir),
      "--config".to_string(),
      self.env.config.build_type.clone(),
      "--parallel".to_string(),
    ]
  }
}

impl Step for CompileStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::Compile
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    let result = self.env.runner.run(&self.command(), self.env.config.verbose)?;

    // The build tool may re-run configuration itself. Without the marker that
    // configuration did not finish, so the failure belongs to Configure.
    if result.status == StepStatus::Failed && !self.env.layout.configure_passed().exists() {
      warn!(target_name = self.env.target, "compile failed during implicit reconfiguration");
      self.store.set(STATUS_CONFIGURE, &StepStatus::Failed)?;
      return Err(PipelineError::Configure { log: result.log });
    }

    self.store.set(STATUS_COMPILE, &result.status)?;
    if result.status == StepStatus::Failed {
      return Err(PipelineError::Build { log: result.log });
    }

    Ok(result.status)
  }
}
