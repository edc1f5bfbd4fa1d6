//! Pipeline error and report types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::build_lock::BuildLockError;
use crate::consts::{ENV_FORCE_CLEAN_BUILD, ENV_FORCE_VERBOSE};
use crate::process::{ProcessError, StepStatus};
use crate::store::StoreError;
use crate::util::hash::HashError;

const LOG_SEPARATOR: &str = "----------------------------------------------------------------";

/// The six pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
  Clean,
  Initialize,
  Configure,
  Compile,
  StubGenerate,
  Publish,
}

impl StepKind {
  pub const ALL: [StepKind; 6] = [
    StepKind::Clean,
    StepKind::Initialize,
    StepKind::Configure,
    StepKind::Compile,
    StepKind::StubGenerate,
    StepKind::Publish,
  ];

  pub fn name(self) -> &'static str {
    match self {
      StepKind::Clean => "Clean",
      StepKind::Initialize => "Initialize",
      StepKind::Configure => "Configure",
      StepKind::Compile => "Compile",
      StepKind::StubGenerate => "Stub Generation",
      StepKind::Publish => "Publish",
    }
  }
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Statuses of every step of one successful run, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
  pub target: String,
  pub steps: Vec<(StepKind, StepStatus)>,
}

impl BuildReport {
  pub fn status_of(&self, kind: StepKind) -> Option<StepStatus> {
    self
      .steps
      .iter()
      .find(|(step, _)| *step == kind)
      .map(|(_, status)| *status)
  }
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("{}", render_failure("Configure", .log.as_deref()))]
  Configure { log: Option<String> },

  #[error("{}", render_failure("Compile", .log.as_deref()))]
  Build { log: Option<String> },

  #[error("{}", render_failure("Stub generation", .log.as_deref()))]
  StubGeneration { log: Option<String> },

  #[error("Cannot find executable \"{program}\"")]
  CommandNotFound { program: String },

  #[error("internal error: configuration for target `{target}` is not a resolved kindle configuration")]
  InvalidConfigType { target: String },

  #[error(transparent)]
  Process(ProcessError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Lock(#[from] BuildLockError),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl PipelineError {
  pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    PipelineError::Io {
      path: path.into(),
      source,
    }
  }

  /// Captured tool output for the three step failures.
  pub fn log(&self) -> Option<&str> {
    match self {
      PipelineError::Configure { log } | PipelineError::Build { log } | PipelineError::StubGeneration { log } => {
        log.as_deref()
      }
      _ => None,
    }
  }
}

impl From<ProcessError> for PipelineError {
  fn from(err: ProcessError) -> Self {
    match err {
      ProcessError::CommandNotFound { program } => PipelineError::CommandNotFound { program },
      other => PipelineError::Process(other),
    }
  }
}

fn render_failure(step: &str, log: Option<&str>) -> String {
  let mut msg = match log {
    Some(log) => format!("{step} failed:\n{LOG_SEPARATOR}\n\n{log}\n{LOG_SEPARATOR}\n"),
    None => format!("{step} failed.\n"),
  };
  msg.push_str(&format!(
    "\nkindle might automatically run a clean build on the next call in order to try to resolve the error. \
     If the issue persists, you can override kindle's behavior via these environment variables:\n  \
     - {ENV_FORCE_CLEAN_BUILD}=1 : Enforce clean builds for all projects.\n  \
     - {ENV_FORCE_VERBOSE}=1     : Always show full build logs (for debugging).\n"
  ));
  msg
}
