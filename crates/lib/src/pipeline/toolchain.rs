//! External tools the pipeline drives.

use std::path::PathBuf;

/// Programs and fixed arguments used to configure, compile and generate stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  /// Build-system generator/driver. Invoked for both configure and compile.
  pub cmake: String,
  /// Passed as `-G` when set.
  pub generator: Option<String>,
  pub prefix_path: Option<PathBuf>,
  pub project_include: Option<PathBuf>,
  /// Stub generator command line; the per-run arguments are appended.
  pub stubgen: Vec<String>,
}

impl Default for Toolchain {
  fn default() -> Self {
    Self {
      cmake: "cmake".to_string(),
      generator: default_generator(),
      prefix_path: None,
      project_include: None,
      stubgen: vec!["python3".to_string(), "-m".to_string(), "pybind11_stubgen".to_string()],
    }
  }
}

impl Toolchain {
  pub fn cmake(mut self, program: impl Into<String>) -> Self {
    self.cmake = program.into();
    self
  }

  pub fn generator(mut self, generator: Option<String>) -> Self {
    self.generator = generator;
    self
  }

  pub fn prefix_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.prefix_path = Some(path.into());
    self
  }

  pub fn project_include(mut self, path: impl Into<PathBuf>) -> Self {
    self.project_include = Some(path.into());
    self
  }

  pub fn stubgen(mut self, command: Vec<String>) -> Self {
    self.stubgen = command;
    self
  }
}

#[cfg(not(windows))]
fn default_generator() -> Option<String> {
  Some("Ninja Multi-Config".to_string())
}

#[cfg(windows)]
fn default_generator() -> Option<String> {
  None
}
