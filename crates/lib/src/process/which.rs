//! Executable lookup on `PATH`.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolves `program` to an executable file.
///
/// Names containing a path separator are checked directly; bare names are
/// searched for in every `PATH` entry. On Windows the `PATHEXT` extensions are
/// tried when the name has none.
pub fn find_executable(program: &str) -> Option<PathBuf> {
  find_in(program, env::var_os("PATH"))
}

fn find_in(program: &str, path_var: Option<OsString>) -> Option<PathBuf> {
  if program.is_empty() {
    return None;
  }

  let candidate = Path::new(program);
  if candidate.components().count() > 1 || candidate.is_absolute() {
    return with_extensions(candidate).into_iter().find(|path| is_executable(path));
  }

  let path_var = path_var?;
  env::split_paths(&path_var)
    .filter(|dir| !dir.as_os_str().is_empty())
    .flat_map(|dir| with_extensions(&dir.join(program)))
    .find(|path| is_executable(path))
}

#[cfg(unix)]
fn with_extensions(path: &Path) -> Vec<PathBuf> {
  vec![path.to_path_buf()]
}

#[cfg(windows)]
fn with_extensions(path: &Path) -> Vec<PathBuf> {
  if path.extension().is_some() {
    return vec![path.to_path_buf()];
  }

  let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
  let mut candidates: Vec<PathBuf> = pathext
    .split(';')
    .filter(|ext| !ext.is_empty())
    .map(|ext| {
      let mut name = path.as_os_str().to_os_string();
      name.push(ext);
      PathBuf::from(name)
    })
    .collect();
  candidates.push(path.to_path_buf());
  candidates
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  path
    .metadata()
    .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
