//! The incremental build pipeline.
//!
//! [`Pipeline::build`] runs six steps against one build directory while holding
//! its [`BuildLock`]:
//!
//! 1. **Clean** wipes the directory when it cannot be trusted
//! 2. **Initialize** stamps it with the current version
//! 3. **Configure** re-runs the generator only when its command line changed
//! 4. **Compile** drives the build tool
//! 5. **Stub Generation** regenerates stubs only when the artifact changed
//! 6. **Publish** exposes the artifact through the caller's [`LoadContext`]
//!
//! The first failing step aborts the run. Whatever it stored stays on disk so the
//! next run can react to it.

pub mod layout;
pub mod steps;
pub mod toolchain;
pub mod types;

use std::any::Any;
use std::fs;
use std::time::Instant;

use tracing::{debug, info};

use crate::build_lock::BuildLock;
use crate::config::ResolvedConfig;
use crate::consts::CURRENT_VERSION;
use crate::loader::LoadContext;
use crate::process::ProcessRunner;

pub use layout::Layout;
pub use steps::Step;
pub use toolchain::Toolchain;
pub use types::{BuildReport, PipelineError, StepKind};

use steps::{CleanStep, CompileStep, ConfigureStep, InitializeStep, PublishStep, StepEnv, StubGenerateStep};

#[derive(Debug)]
pub struct Pipeline {
  toolchain: Toolchain,
  runner: ProcessRunner,
  version: String,
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new(Toolchain::default())
  }
}

impl Pipeline {
  pub fn new(toolchain: Toolchain) -> Self {
    Self {
      toolchain,
      runner: ProcessRunner::new(),
      version: CURRENT_VERSION.to_string(),
    }
  }

  pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
    self.runner = runner;
    self
  }

  /// Overrides the version stamped into and compared against build directories.
  pub fn with_version(mut self, version: impl Into<String>) -> Self {
    self.version = version.into();
    self
  }

  pub fn toolchain(&self) -> &Toolchain {
    &self.toolchain
  }

  /// Builds `target` with a configuration supplied by an untyped trigger.
  ///
  /// `config` must be a [`ResolvedConfig`]; anything else fails with
  /// [`PipelineError::InvalidConfigType`] before the build directory is touched.
  pub fn build(&self, ctx: &mut LoadContext, target: &str, config: &dyn Any) -> Result<BuildReport, PipelineError> {
    let config = config
      .downcast_ref::<ResolvedConfig>()
      .ok_or_else(|| PipelineError::InvalidConfigType {
        target: target.to_string(),
      })?;
    self.build_resolved(ctx, target, config)
  }

  pub fn build_resolved(
    &self,
    ctx: &mut LoadContext,
    target: &str,
    config: &ResolvedConfig,
  ) -> Result<BuildReport, PipelineError> {
    let layout = Layout::for_config(config);
    fs::create_dir_all(layout.metadata_dir()).map_err(|source| PipelineError::io(layout.metadata_dir(), source))?;

    let _lock = BuildLock::acquire(&config.build_dir, target)?;
    let started = Instant::now();
    info!(target_name = target, build_dir = %config.build_dir.display(), "building");

    let env = StepEnv {
      target,
      config,
      layout: &layout,
      toolchain: &self.toolchain,
      runner: &self.runner,
      version: &self.version,
    };
    let mut steps: Vec<Box<dyn Step + '_>> = vec![
      Box::new(CleanStep::new(env)),
      Box::new(InitializeStep::new(env)),
      Box::new(ConfigureStep::new(env)),
      Box::new(CompileStep::new(env)),
      Box::new(StubGenerateStep::new(env)),
      Box::new(PublishStep::new(env, ctx)),
    ];

    let total = steps.len();
    let mut report = BuildReport {
      target: target.to_string(),
      steps: Vec::with_capacity(total),
    };
    for (index, step) in steps.iter_mut().enumerate() {
      info!("[{}/{}] {}", index + 1, total, step.kind());
      let status = step.run()?;
      debug!(step = %step.kind(), %status, "step finished");
      report.steps.push((step.kind(), status));
    }

    info!(target_name = target, elapsed_ms = started.elapsed().as_millis() as u64, "build finished");
    Ok(report)
  }
}
