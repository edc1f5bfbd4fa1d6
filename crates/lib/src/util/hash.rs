//! Whole-file content hashing.
//!
//! The stub generation step fingerprints the compiled artifact by its content,
//! never by timestamps, so a rebuild that reproduces identical bytes is not
//! considered a change.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// A full 64-character SHA-256 hash of a file's contents.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
#[error("failed to read file {path} for hashing: {source}")]
pub struct HashError {
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// Hash a file's contents in fixed-size blocks.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let map_err = |source| HashError {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(map_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(map_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}
