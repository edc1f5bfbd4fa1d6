//! Test utilities for kindle-lib.
//!
//! Cross-platform helpers for tests that need to execute shell commands or
//! install small executable scripts that stand in for external tools.

#[cfg(unix)]
use std::path::{Path, PathBuf};

/// Returns the full argument vector that runs `script` through the platform shell.
#[cfg(unix)]
pub fn shell_args(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn shell_args(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}

/// Writes an executable shell script into `dir` and returns its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}
