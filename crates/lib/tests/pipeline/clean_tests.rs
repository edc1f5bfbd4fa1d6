//! When the build directory gets wiped, and what survives.

use std::fs;

use kindle_lib::consts::CURRENT_VERSION;
use kindle_lib::{StepKind, StepStatus};

use super::common::Fixture;

#[test]
fn incompatible_version_wipes_everything_but_the_lock() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();
  fs::write(fx.build.join("junk.o"), "stale").unwrap();

  let report = fx.build_with(&fx.pipeline().with_version("0.0.1"), &config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Successful));
  assert!(!fx.build.join("junk.o").exists());
  assert!(fx.metadata("build.lock").exists());
  assert_eq!(fx.read_metadata("version.txt"), "0.0.1");
  assert_eq!(fx.runs("configure"), 2);
}

#[test]
fn patch_level_difference_keeps_the_build() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();
  fs::write(fx.build.join("junk.o"), "kept").unwrap();

  let mut parts: Vec<u64> = CURRENT_VERSION.split('.').map(|part| part.parse().unwrap()).collect();
  parts[2] += 1;
  let next_patch = format!("{}.{}.{}", parts[0], parts[1], parts[2]);
  let report = fx.build_with(&fx.pipeline().with_version(next_patch.as_str()), &config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Skipped));
  assert!(fx.build.join("junk.o").exists());
  assert_eq!(fx.read_metadata("version.txt"), next_patch);
}

#[test]
fn pre_release_version_reuses_its_own_build() {
  let fx = Fixture::new();
  let config = fx.config();
  let pipeline = fx.pipeline().with_version("0.2.0-rc.1");
  fx.build_with(&pipeline, &config).unwrap();
  fs::write(fx.build.join("junk.o"), "kept").unwrap();

  let report = fx.build_with(&pipeline, &config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Skipped));
  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Skipped));
  assert!(fx.build.join("junk.o").exists());
  assert_eq!(fx.read_metadata("version.txt"), "0.2.0-rc.1");
  assert_eq!(fx.runs("configure"), 1);
}

#[test]
fn version_file_with_invalid_utf8_wipes() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();
  fs::write(fx.build.join("junk.o"), "stale").unwrap();
  fs::write(fx.metadata("version.txt"), [0xff, 0xfe, 0x00]).unwrap();

  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert!(!fx.build.join("junk.o").exists());
  assert_eq!(fx.read_metadata("version.txt"), CURRENT_VERSION);
  assert_eq!(fx.runs("configure"), 2);
}

#[test]
fn clean_flag_always_wipes() {
  let fx = Fixture::new();
  let mut config = fx.config();
  fx.build(&config).unwrap();
  fs::write(fx.build.join("junk.o"), "stale").unwrap();

  config.clean_build = true;
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert!(!fx.build.join("junk.o").exists());
  assert_eq!(fx.runs("configure"), 2);
  assert_eq!(fx.runs("stubgen"), 2);
}

#[test]
fn unreadable_configure_status_wipes() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();
  fs::write(fx.metadata("status_configure.txt"), "not an enum").unwrap();

  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert_eq!(
    fx.read_metadata("status_configure.txt"),
    "kindle_lib::process.StepStatus.Successful"
  );
}

#[test]
fn clean_on_a_fresh_directory_is_harmless() {
  let fx = Fixture::new();
  let mut config = fx.config();
  config.clean_build = true;

  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert_eq!(report.status_of(StepKind::Publish), Some(StepStatus::Successful));
}
