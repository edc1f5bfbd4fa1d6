//! Skip decisions across consecutive builds.

use std::fs;

use kindle_lib::consts::CURRENT_VERSION;
use kindle_lib::{StepKind, StepStatus};

use super::common::{Fixture, TARGET};

#[test]
fn first_build_runs_every_step() {
  let fx = Fixture::new();
  let report = fx.build(&fx.config()).unwrap();

  assert_eq!(report.target, TARGET);
  assert_eq!(
    report.steps,
    vec![
      (StepKind::Clean, StepStatus::Skipped),
      (StepKind::Initialize, StepStatus::Successful),
      (StepKind::Configure, StepStatus::Successful),
      (StepKind::Compile, StepStatus::Successful),
      (StepKind::StubGenerate, StepStatus::Successful),
      (StepKind::Publish, StepStatus::Successful),
    ]
  );

  assert_eq!(fx.read_metadata("version.txt"), CURRENT_VERSION);
  assert_eq!(fs::read_to_string(fx.build.join(".gitignore")).unwrap(), "*");
  assert_eq!(
    fx.read_metadata("status_configure.txt"),
    "kindle_lib::process.StepStatus.Successful"
  );
  assert!(fx.stubs.join(TARGET).join("__init__.pyi").exists());
  assert_eq!(fx.runs("configure"), 1);
  assert_eq!(fx.runs("compile"), 1);
  assert_eq!(fx.runs("stubgen"), 1);
}

#[test]
fn unchanged_inputs_skip_configure_and_stubs() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();

  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Skipped));
  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Skipped));
  assert_eq!(report.status_of(StepKind::Compile), Some(StepStatus::Successful));
  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Skipped));
  assert_eq!(fx.runs("configure"), 1);
  assert_eq!(fx.runs("compile"), 2);
  assert_eq!(fx.runs("stubgen"), 1);
}

#[test]
fn changed_option_forces_configure_and_updates_fingerprint() {
  let fx = Fixture::new();
  let mut config = fx.config();
  fx.build(&config).unwrap();
  let original = fx.read_metadata("configure_command.txt");

  config.options.insert("USE_CUDA", "ON");
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Successful));
  let updated = fx.read_metadata("configure_command.txt");
  assert_ne!(original, updated);
  assert!(updated.contains("-DUSE_CUDA=ON"));
  assert_eq!(fx.runs("configure"), 2);
}

#[test]
fn reverting_an_option_reconfigures_once() {
  let fx = Fixture::new();
  let original = fx.config();
  let mut changed = fx.config();
  changed.options.insert("USE_CUDA", "ON");

  fx.build(&original).unwrap();
  fx.build(&changed).unwrap();
  let reverted = fx.build(&original).unwrap();
  let again = fx.build(&original).unwrap();

  assert_eq!(reverted.status_of(StepKind::Configure), Some(StepStatus::Successful));
  assert_eq!(again.status_of(StepKind::Configure), Some(StepStatus::Skipped));
  assert_eq!(fx.runs("configure"), 3);
}

#[test]
fn changed_artifact_regenerates_stubs() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();
  let old_checksum = fx.read_metadata("Release/checksum.txt");

  fx.write_source("int answer() { return 43; }\n");
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Successful));
  assert_ne!(fx.read_metadata("Release/checksum.txt"), old_checksum);
  assert_eq!(fx.runs("stubgen"), 2);
}

#[test]
fn identical_rebuild_keeps_stubs() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();

  // Same bytes, new modification time.
  fx.write_source("int answer() { return 42; }\n");
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Skipped));
}

#[test]
fn deleted_stubs_are_regenerated() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();

  fs::remove_dir_all(fx.stubs.join(TARGET)).unwrap();
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Successful));
  assert!(fx.stubs.join(TARGET).exists());
}

#[test]
fn without_stubs_dir_checksum_is_still_recorded() {
  let fx = Fixture::new();
  let mut config = fx.config();
  config.stubs_dir = None;

  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Skipped));
  assert_eq!(fx.read_metadata("Release/checksum.txt").len(), 64);
  assert_eq!(fx.runs("stubgen"), 0);
}

#[test]
fn enabling_stubs_later_generates_them() {
  let fx = Fixture::new();
  let mut config = fx.config();
  config.stubs_dir = None;
  fx.build(&config).unwrap();

  let report = fx.build(&fx.config()).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Successful));
  assert_eq!(fx.runs("stubgen"), 1);
}

#[test]
fn build_type_keeps_separate_artifact_state() {
  let fx = Fixture::new();
  let release = fx.config();
  let mut debug = fx.config();
  debug.build_type = "Debug".to_string();

  fx.build(&release).unwrap();
  let report = fx.build(&debug).unwrap();

  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Successful));
  assert!(fx.metadata("Release/checksum.txt").exists());
  assert!(fx.metadata("Debug/checksum.txt").exists());
}
