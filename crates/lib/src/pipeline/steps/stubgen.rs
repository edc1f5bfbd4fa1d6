use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Step, StepEnv, posix};
use crate::pipeline::layout::{ARTIFACT_LOCATION, CHECKSUM, EXTRA_LIBRARY_SEARCH_PATHS, STATUS_STUBGEN};
use crate::pipeline::types::{PipelineError, StepKind};
use crate::process::StepStatus;
use crate::store::KeyedStore;
use crate::util::hash::hash_file;

/// Generates interface stubs for the compiled artifact when its content changed.
pub struct StubGenerateStep<'a> {
  env: StepEnv<'a>,
  store: KeyedStore,
}

impl<'a> StubGenerateStep<'a> {
  pub fn new(env: StepEnv<'a>) -> Self {
    let mut store = KeyedStore::new();
    env.connect::<StepStatus>(&mut store, STATUS_STUBGEN);
    env.connect::<String>(&mut store, CHECKSUM);
    env.connect::<PathBuf>(&mut store, ARTIFACT_LOCATION);
    env.connect::<String>(&mut store, EXTRA_LIBRARY_SEARCH_PATHS);
    Self { env, store }
  }

  pub fn command(&self, artifact: &Path, library_dirs: &str, stubs_dir: Option<&Path>) -> Vec<String> {
    let mut args = self.env.toolchain.stubgen.clone();
    args.push("--extension-path".to_string());
    args.push(posix(artifact));
    if !library_dirs.is_empty() {
      args.push("--library-directories".to_string());
      args.push(library_dirs.to_string());
    }
    args.push("--print-invalid-expressions-as-is".to_string());
    if self.env.config.stubs_invalid_ok {
      args.push("--ignore-all-errors".to_string());
    }
    args.push("--exit-code".to_string());
    args.push("-o".to_string());
    args.push(stubs_dir.map(posix).unwrap_or_default());
    args.push(self.env.target.to_string());
    args
  }
}

impl Step for StubGenerateStep<'_> {
  fn kind(&self) -> StepKind {
    StepKind::StubGenerate
  }

  fn run(&mut self) -> Result<StepStatus, PipelineError> {
    let artifact: PathBuf = self.store.get(ARTIFACT_LOCATION)?;
    let old_checksum = self.store.get_or(CHECKSUM, String::new())?;
    let new_checksum = hash_file(&artifact)?.0;

    let stubs_dir = self.env.config.stubs_dir.as_deref();
    let needed = match stubs_dir {
      None => false,
      Some(dir) => {
        self.store.get_or(STATUS_STUBGEN, StepStatus::Skipped)? == StepStatus::Failed
          || new_checksum != old_checksum
          || !dir.join(self.env.target).exists()
      }
    };
    debug!(needed, checksum = %new_checksum, "stub generation decision");

    let library_dirs = self.store.get_or(EXTRA_LIBRARY_SEARCH_PATHS, String::new())?;
    let args = self.command(&artifact, library_dirs.trim(), stubs_dir);
    let result = self.env.runner.run_if(needed, &args, self.env.config.verbose)?;

    self.store.set(CHECKSUM, &new_checksum)?;
    self.store.set(STATUS_STUBGEN, &result.status)?;
    if result.status == StepStatus::Failed {
      return Err(PipelineError::StubGeneration { log: result.log });
    }

    Ok(result.status)
  }
}
