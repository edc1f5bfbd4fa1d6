//! Status command implementation.
//!
//! Reads what the last build of a target persisted. Does not take the build lock,
//! so the values may be mid-update while another build runs.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use kindle_lib::build_lock::LockMetadata;
use kindle_lib::consts::CURRENT_VERSION;
use kindle_lib::pipeline::Layout;
use kindle_lib::pipeline::layout::{
  ARTIFACT_LOCATION, CHECKSUM, CONFIGURE_COMMAND, EXTRA_LIBRARY_SEARCH_PATHS, STATUS_COMPILE, STATUS_CONFIGURE,
  STATUS_STUBGEN, VERSION,
};
use kindle_lib::store::{KeyedStore, Persist, StoreError};
use kindle_lib::{StepStatus, version};

use super::base_config;
use crate::TargetArgs;
use crate::output::{print_info, print_json, print_stat, print_step, print_success, print_warning, truncate_hash};

pub fn cmd_status(args: &TargetArgs, verbose: bool) -> Result<()> {
  let config = base_config(args)?.resolve(&args.target)?;
  let layout = Layout::for_config(&config);

  if !layout.metadata_dir().is_dir() {
    print_info(&format!(
      "No build found for {} in {}. Run 'kindle build' first.",
      args.target,
      config.build_dir.display()
    ));
    return Ok(());
  }

  let mut store = KeyedStore::new();
  for key in [VERSION, CONFIGURE_COMMAND, CHECKSUM, EXTRA_LIBRARY_SEARCH_PATHS] {
    store.connect::<String>(key, layout.key_path(key));
  }
  for key in [STATUS_CONFIGURE, STATUS_COMPILE, STATUS_STUBGEN] {
    store.connect::<StepStatus>(key, layout.key_path(key));
  }
  store.connect::<PathBuf>(ARTIFACT_LOCATION, layout.key_path(ARTIFACT_LOCATION));

  let stored_version: Option<String> = read(&store, VERSION)?;
  let compatible = stored_version
    .as_deref()
    .is_some_and(|stored| version::is_compatible(stored, CURRENT_VERSION));
  let statuses = [
    ("Configure", read::<StepStatus>(&store, STATUS_CONFIGURE)?),
    ("Compile", read::<StepStatus>(&store, STATUS_COMPILE)?),
    ("Stub generation", read::<StepStatus>(&store, STATUS_STUBGEN)?),
  ];
  let artifact: Option<PathBuf> = read(&store, ARTIFACT_LOCATION)?;
  let checksum: Option<String> = read(&store, CHECKSUM)?;
  let configure_command: Option<String> = read(&store, CONFIGURE_COMMAND)?;
  let library_dirs: Option<String> = read(&store, EXTRA_LIBRARY_SEARCH_PATHS)?;
  let holder = fs::read_to_string(layout.lock_file())
    .ok()
    .and_then(|text| serde_json::from_str::<LockMetadata>(&text).ok());

  if args.output.is_json() {
    let steps: Vec<_> = statuses
      .iter()
      .map(|(step, status)| serde_json::json!({ "step": step, "status": status.map(|s| s.to_string()) }))
      .collect();
    print_json(&serde_json::json!({
      "target": args.target,
      "build_dir": config.build_dir,
      "version": stored_version,
      "compatible": compatible,
      "steps": steps,
      "artifact": artifact,
      "checksum": checksum,
      "configure_command": configure_command,
      "library_dirs": library_dirs,
      "last_lock_holder": holder
        .as_ref()
        .map(|meta| serde_json::json!({ "pid": meta.pid, "started_at_unix": meta.started_at_unix })),
    }))?;
    return Ok(());
  }

  print_success(&format!("Build directory for {}: {}", args.target, config.build_dir.display()));
  print_stat("Version", stored_version.as_deref().unwrap_or("unknown"));
  if !compatible {
    print_warning(&format!(
      "Build directory does not match kindle {CURRENT_VERSION}; the next build starts clean"
    ));
  }
  for (step, status) in &statuses {
    print_step(step, *status);
  }
  if let Some(artifact) = &artifact {
    print_stat("Artifact", &artifact.display().to_string());
  }
  if let Some(checksum) = &checksum {
    print_stat("Checksum", truncate_hash(checksum));
  }
  if let Some(holder) = &holder {
    print_stat("Last lock holder", &format!("PID {}", holder.pid));
  }

  if verbose {
    if let Some(command) = &configure_command {
      println!();
      println!("Configure command:");
      println!("  {command}");
    }
    if let Some(dirs) = library_dirs.as_deref().filter(|dirs| !dirs.trim().is_empty()) {
      println!();
      println!("Library directories:");
      for dir in dirs.split(kindle_lib::consts::LIBRARY_PATH_SEPARATOR).filter(|dir| !dir.is_empty()) {
        println!("  {dir}");
      }
    }
  }

  Ok(())
}

/// Stored value for `key`, or `None` when nothing has been written yet.
fn read<T: Persist>(store: &KeyedStore, key: &str) -> Result<Option<T>> {
  match store.get(key) {
    Ok(value) => Ok(Some(value)),
    Err(StoreError::ValueAbsent { .. }) => Ok(None),
    Err(err) => Err(err.into()),
  }
}
