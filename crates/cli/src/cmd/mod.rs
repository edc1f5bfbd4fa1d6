mod build;
mod status;

pub use build::{BuildArgs, cmd_build};
pub use status::cmd_status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kindle_lib::Config;

use crate::TargetArgs;

/// Config carrying the directories and build type shared by every command.
fn base_config(args: &TargetArgs) -> Result<Config> {
  let mut config = Config::new(absolute(&args.project_dir)?).build_type(&args.build_type);
  if let Some(dir) = &args.build_dir {
    config = config.build_dir(absolute(dir)?);
  }
  Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
  std::path::absolute(path).with_context(|| format!("Failed to resolve path {}", path.display()))
}
