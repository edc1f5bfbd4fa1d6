use tracing::debug;

use super::{Step, StepEnv, posix};
use crate::pipeline::layout::{CONFIGURE_COMMAND, STATUS_CONFIGURE};
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::KeyedStore;

/// Runs the build-system generator when its command line changed or its last run failed.
pub struct ConfigureStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
}

impl<'a> ConfigureStep<'a> {
  pub fn new(env: StepEnv<'a>) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<StepStatus>(&mut store, STATUS_CONFIGURE);
    env.connect::<String>(&mut store, CONFIGURE_COMMAND);
    Self { env, store }
  }

  /// The full configure command line. Its space-joined form is the stored fingerprint.
  pub fn command(&self) -> Vec<String> {
    let config = self.env.config;
    let toolchain = self.env.toolchain;

    let mut args = vec![
      toolchain.cmake.clone(),
      format!("-DCMAKE_CONFIGURATION_TYPES={}", config.build_type),
    ];
    if let Some(prefix) = &toolchain.prefix_path {
      args.push(format!("-DCMAKE_PREFIX_PATH={}", posix(prefix)));
    }
    if let Some(include) = &toolchain.project_include {
      args.push(format!("-DCMAKE_PROJECT_TOP_LEVEL_INCLUDES={}", posix(include)));
    }
    args.push("-DKINDLE_JIT_COMPILE=ON".to_string());
    args.push(format!("-DKINDLE_TARGET_NAME={}", self.env.target));
    args.push(format!("-DKINDLE_METADATA_DIR={}", posix(self.env.layout.metadata_dir())));
    args.extend(config.options.iter().map(|(key, value)| format!("-D{key}={value}")));
    if let Some(generator) = &toolchain.generator {
      args.push("-G".to_string());
      args.push(generator.clone());
    }
    args.extend([
      "-S".to_string(),
      posix(&config.project_dir),
      "-B".to_string(),
      posix(&config.build_dir),
    ]);
    args
  }
}

impl Step for ConfigureStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::Configure
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    let args = self.command();
    let fingerprint = args.join(" ");

    let previous_status = self.store.get_or(STATUS_CONFIGURE, StepStatus::Skipped)?;
    let previous_command = self.store.get_or(CONFIGURE_COMMAND, String::new())?;
    let changed = previous_status == StepStatus::Failed || previous_command != fingerprint;
    debug!(changed, %previous_status, "configure decision");

    let result = self.env.runner.run_if(changed, &args, self.env.config.verbose)?;

    self.store.set(CONFIGURE_COMMAND, &fingerprint)?;
    self.store.set(STATUS_CONFIGURE, &result.status)?;
    if result.status == StepStatus::Failed {
      return Err(PipelineError::Configure { log: result.log });
    }

    Ok(result.status)
  }
}
