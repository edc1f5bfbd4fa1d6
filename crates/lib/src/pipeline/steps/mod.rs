//! The six pipeline steps.
//!
//! Every step owns a [`KeyedStore`] binding only the keys it reads or writes, so
//! a step cannot touch state it did not declare. Steps that run a tool decide
//! through [`ProcessRunner::run_if`] whether anything changed since the last run.

mod clean;
mod compile;
mod configure;
mod initialize;
mod publish;
mod stubgen;

use std::path::Path;

use crate::config::ResolvedConfig;
use crate::pipeline::layout::Layout;
use crate::pipeline::toolchain::Toolchain;
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::{ProcessRunner, StepStatus};
use crate::store::{KeyedStore, Persist};

pub use clean::CleanStep;
pub use compile::CompileStep;
pub use configure::ConfigureStep;
pub use initialize::InitializeStep;
pub use publish::PublishStep;
pub use stubgen::StubGenerateStep;

pub trait Step {
  fn kind(&self) -> StepKind;

  fn run(&mut self) -> Result<StepStatus, PipelineError>;
}

/// Everything a step needs to know about the current run.
#[derive(Debug, Clone, Copy)]
pub struct StepEnv<'a> {
  pub target: &'a str,
  pub config: &'a ResolvedConfig,
  pub layout: &'a Layout,
  pub toolchain: &'a Toolchain,
  pub runner: &'a ProcessRunner,
  /// Version written to and compared against `version.txt`.
  pub version: &'a str,
}

impl StepEnv<'_> {
  fn connect<T: Persist>(&self, store: &mut KeyedStore, key: &str) {
    store.connect::<T>(key, self.layout.key_path(key));
  }
}

/// Path in forward-slash form, as the build tools expect on every platform.
pub(crate) fn posix(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}
