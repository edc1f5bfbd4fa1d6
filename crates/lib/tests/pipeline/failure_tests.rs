//! Failing tools and how the next run recovers.

use kindle_lib::{PipelineError, StepKind, StepStatus, Toolchain};

use super::common::{Fixture, TARGET};

#[test]
fn configure_failure_carries_log_and_forces_clean() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.touch("fail_configure");

  let err = fx.build(&config).unwrap_err();

  assert!(matches!(err, PipelineError::Configure { .. }), "unexpected error: {err:?}");
  let log = err.log().unwrap();
  assert!(log.contains("requested configure failure"));
  assert!(err.to_string().starts_with("Configure failed:\n"));
  assert_eq!(
    fx.read_metadata("status_configure.txt"),
    "kindle_lib::process.StepStatus.Failed"
  );

  fx.remove("fail_configure");
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Successful));
  assert_eq!(fx.runs("configure"), 2);
}

#[test]
fn failure_message_explains_how_to_recover() {
  let fx = Fixture::new();
  fx.touch("fail_configure");

  let message = fx.build(&fx.config()).unwrap_err().to_string();

  assert!(message.contains(&"-".repeat(64)));
  assert!(message.contains("KINDLE_FORCE_CLEAN_BUILD"));
}

#[test]
fn failed_reconfiguration_during_compile_is_a_configure_error() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.build(&config).unwrap();

  fx.touch("fail_reconfigure");
  let err = fx.build(&config).unwrap_err();

  assert!(matches!(err, PipelineError::Configure { .. }), "unexpected error: {err:?}");
  assert!(err.log().unwrap().contains("regeneration failed"));
  assert_eq!(
    fx.read_metadata("status_configure.txt"),
    "kindle_lib::process.StepStatus.Failed"
  );

  fx.remove("fail_reconfigure");
  let report = fx.build(&config).unwrap();
  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Successful));
}

#[test]
fn compile_failure_keeps_the_build_directory() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.touch("fail_compile");

  let err = fx.build(&config).unwrap_err();

  assert!(matches!(err, PipelineError::Build { .. }), "unexpected error: {err:?}");
  assert!(err.log().unwrap().contains("requested compile failure"));
  assert!(err.to_string().starts_with("Compile failed:\n"));
  assert_eq!(
    fx.read_metadata("status_compile.txt"),
    "kindle_lib::process.StepStatus.Failed"
  );

  fx.remove("fail_compile");
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::Clean), Some(StepStatus::Skipped));
  assert_eq!(report.status_of(StepKind::Configure), Some(StepStatus::Skipped));
  assert_eq!(report.status_of(StepKind::Compile), Some(StepStatus::Successful));
  assert_eq!(fx.runs("configure"), 1);
}

#[test]
fn failed_stub_generation_is_retried() {
  let fx = Fixture::new();
  let config = fx.config();
  fx.write_source("broken\n");

  let err = fx.build(&config).unwrap_err();
  assert!(matches!(err, PipelineError::StubGeneration { .. }), "unexpected error: {err:?}");
  assert!(err.log().unwrap().contains("Invalid expression"));
  assert!(err.to_string().starts_with("Stub generation failed:\n"));

  // Same artifact, but the previous attempt failed.
  let err = fx.build(&config).unwrap_err();
  assert!(matches!(err, PipelineError::StubGeneration { .. }));
  assert_eq!(fx.runs("stubgen"), 2);
}

#[test]
fn invalid_stubs_can_be_accepted() {
  let fx = Fixture::new();
  let mut config = fx.config();
  fx.write_source("broken\n");
  fx.build(&config).unwrap_err();

  config.stubs_invalid_ok = true;
  let report = fx.build(&config).unwrap();

  assert_eq!(report.status_of(StepKind::StubGenerate), Some(StepStatus::Successful));
  assert!(fx.stubs.join(TARGET).join("__init__.pyi").exists());
}

#[test]
fn missing_build_tool_is_reported_by_name() {
  let fx = Fixture::new();
  let missing = fx.root.join("bin").join("no-such-cmake");
  let pipeline = kindle_lib::Pipeline::new(
    Toolchain::default()
      .cmake(missing.to_string_lossy())
      .generator(None),
  )
  .with_runner(kindle_lib::ProcessRunner::with_output(std::io::sink(), false));

  let err = fx.build_with(&pipeline, &fx.config()).unwrap_err();

  match err {
    PipelineError::CommandNotFound { program } => assert_eq!(program, missing.to_string_lossy()),
    other => panic!("unexpected error: {other:?}"),
  }
}
