//! External command execution for pipeline steps.
//!
//! A [`ProcessRunner`] runs one command to completion and classifies it as
//! [`StepStatus::Successful`] or [`StepStatus::Failed`] by exit code. How the
//! child's output is handled is decided once per run:
//!
//! - **interactive**: verbose output to a terminal on Unix. The child writes to a
//!   pseudo-terminal so tools keep their colors, bytes are forwarded as they arrive.
//! - **streamed**: verbose output to anything else. One pipe, forwarded live.
//! - **captured**: quiet runs. One pipe, buffered into the returned log.
//!
//! Only captured runs return a log; the other strategies already showed the
//! output to the user.

#[cfg(unix)]
mod pty;
pub mod which;

use std::any::TypeId;
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use std::process::{Command, ExitStatus};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::store::{EnumMember, Persist, PersistentEnum, SerializerRegistry, enum_lineage, enum_member};

/// Outcome of one step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
  Successful,
  Failed,
  Skipped,
}

impl fmt::Display for StepStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.member_name())
  }
}

impl PersistentEnum for StepStatus {
  const MODULE: &'static str = module_path!();
  const QUALIFIED_NAME: &'static str = "StepStatus";

  fn member_name(&self) -> &'static str {
    match self {
      StepStatus::Successful => "Successful",
      StepStatus::Failed => "Failed",
      StepStatus::Skipped => "Skipped",
    }
  }

  fn from_member_name(name: &str) -> Option<Self> {
    match name {
      "Successful" => Some(StepStatus::Successful),
      "Failed" => Some(StepStatus::Failed),
      "Skipped" => Some(StepStatus::Skipped),
      _ => None,
    }
  }
}

impl Persist for StepStatus {
  fn lineage() -> Vec<TypeId> {
    enum_lineage::<Self>()
  }

  fn register(registry: &mut SerializerRegistry) {
    registry.register_enum::<Self>();
  }

  fn enum_member(&self) -> Option<EnumMember> {
    Some(enum_member(self))
  }
}

/// Status of a finished (or skipped) command plus the captured output, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
  pub status: StepStatus,
  pub log: Option<String>,
}

impl ProcessResult {
  pub fn skipped() -> Self {
    Self {
      status: StepStatus::Skipped,
      log: None,
    }
  }

  /// The captured log, or an empty string for streamed runs.
  pub fn log_text(&self) -> &str {
    self.log.as_deref().unwrap_or_default()
  }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("command not found: {program}")]
  CommandNotFound { program: String },

  #[error("internal error: empty command line")]
  EmptyCommand,

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed while running {program}: {source}")]
  Io {
    program: String,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStrategy {
  Interactive,
  Streamed,
  Captured,
}

/// Runs external commands and forwards or captures their output.
pub struct ProcessRunner {
  output: Mutex<Box<dyn Write + Send>>,
  output_is_terminal: bool,
}

impl fmt::Debug for ProcessRunner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProcessRunner")
      .field("output_is_terminal", &self.output_is_terminal)
      .finish_non_exhaustive()
  }
}

impl Default for ProcessRunner {
  fn default() -> Self {
    Self::new()
  }
}

impl ProcessRunner {
  /// Runner forwarding to stdout. Interactive only when stdout and stderr are both terminals.
  pub fn new() -> Self {
    let is_terminal = io::stdout().is_terminal() && io::stderr().is_terminal();
    Self::with_output(io::stdout(), is_terminal)
  }

  pub fn with_output(output: impl Write + Send + 'static, is_terminal: bool) -> Self {
    Self {
      output: Mutex::new(Box::new(output)),
      output_is_terminal: is_terminal,
    }
  }

  pub fn strategy(&self, verbose: bool) -> IoStrategy {
    match (verbose, self.output_is_terminal) {
      (false, _) => IoStrategy::Captured,
      (true, true) if cfg!(unix) => IoStrategy::Interactive,
      (true, _) => IoStrategy::Streamed,
    }
  }

  /// Returns [`ProcessResult::skipped`] without resolving or spawning anything when `condition` is false.
  pub fn run_if(&self, condition: bool, args: &[String], verbose: bool) -> Result<ProcessResult, ProcessError> {
    if !condition {
      debug!(command = %args.join(" "), "skipping command, inputs unchanged");
      return Ok(ProcessResult::skipped());
    }
    self.run(args, verbose)
  }

  pub fn run(&self, args: &[String], verbose: bool) -> Result<ProcessResult, ProcessError> {
    let (program, rest) = args.split_first().ok_or(ProcessError::EmptyCommand)?;
    let executable = which::find_executable(program).ok_or_else(|| ProcessError::CommandNotFound {
      program: program.clone(),
    })?;

    let strategy = self.strategy(verbose);
    info!(command = %args.join(" "), ?strategy, "running");

    let mut command = Command::new(&executable);
    command.args(rest);

    let (status, log) = match strategy {
      IoStrategy::Interactive => (self.run_interactive(command, program)?, None),
      IoStrategy::Streamed => {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        (run_piped(command, program, &mut **output)?, None)
      }
      IoStrategy::Captured => {
        let mut buffer = Vec::new();
        let status = run_piped(command, program, &mut buffer)?;
        (status, Some(String::from_utf8_lossy(&buffer).into_owned()))
      }
    };

    let code = status.code();
    let status = if status.success() {
      StepStatus::Successful
    } else {
      StepStatus::Failed
    };
    debug!(program = %program, ?code, %status, "command finished");

    Ok(ProcessResult { status, log })
  }

  #[cfg(unix)]
  fn run_interactive(&self, mut command: Command, program: &str) -> Result<ExitStatus, ProcessError> {
    let io_err = |source| ProcessError::Io {
      program: program.to_string(),
      source,
    };

    let terminal = pty::Pty::open().map_err(io_err)?;
    terminal.attach(&mut command).map_err(io_err)?;
    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
      program: program.to_string(),
      source,
    })?;
    drop(command);

    let mut reader = terminal.into_reader();
    let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
    let mut buffer = [0u8; 4096];
    loop {
      match reader.read(&mut buffer) {
        Ok(0) => break,
        Ok(n) => {
          output.write_all(&buffer[..n]).map_err(io_err)?;
          output.flush().map_err(io_err)?;
        }
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) if pty::is_end_of_stream(&err) => break,
        Err(err) => return Err(io_err(err)),
      }
    }

    child.wait().map_err(io_err)
  }

  #[cfg(not(unix))]
  fn run_interactive(&self, command: Command, program: &str) -> Result<ExitStatus, ProcessError> {
    let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
    run_piped(command, program, &mut **output)
  }
}

/// Runs `command` with stdout and stderr merged into one pipe, copying everything into `sink`.
fn run_piped(mut command: Command, program: &str, sink: &mut dyn Write) -> Result<ExitStatus, ProcessError> {
  let io_err = |source| ProcessError::Io {
    program: program.to_string(),
    source,
  };

  let (mut reader, writer) = io::pipe().map_err(io_err)?;
  command.stdout(writer.try_clone().map_err(io_err)?).stderr(writer);

  let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
    program: program.to_string(),
    source,
  })?;
  // The parent's copies of the write end must be closed or the read never sees EOF.
  drop(command);

  let mut buffer = [0u8; 4096];
  loop {
    match reader.read(&mut buffer) {
      Ok(0) => break,
      Ok(n) => {
        sink.write_all(&buffer[..n]).map_err(io_err)?;
        sink.flush().map_err(io_err)?;
      }
      Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
      Err(err) => return Err(io_err(err)),
    }
  }

  child.wait().map_err(io_err)
}
