//! Implementation of the `kindle build` command.
//!
//! Resolves the target's configuration, runs the pipeline once and prints which
//! steps ran and where the artifact was published.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::debug;

use kindle_lib::{LoadContext, Pipeline, ProcessRunner, Toolchain};

use super::{absolute, base_config};
use crate::TargetArgs;
use crate::output::{format_duration, print_info, print_json, print_stat, print_step, print_success};

pub struct BuildArgs {
  pub target: TargetArgs,
  pub options: Vec<String>,
  pub stubs_dir: Option<PathBuf>,
  pub stubs_invalid_ok: bool,
  pub clean: bool,
  pub verbose: bool,
  pub cmake: String,
  pub generator: Option<String>,
  pub no_generator: bool,
  pub stubgen: Option<String>,
}

/// Execute the build command.
///
/// Tool output is only shown with `--verbose`; on failure the captured log is
/// part of the error. With `--output json` tool output goes to stderr so stdout
/// stays machine-readable.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let json = args.target.output.is_json();
  let target = args.target.target.as_str();

  let mut config = base_config(&args.target)?
    .clean_build(args.clean)
    .stubs_invalid_ok(args.stubs_invalid_ok)
    .verbose(args.verbose);
  for option in &args.options {
    let (key, value) = parse_option(option)?;
    config = config.option(key, value);
  }
  if let Some(dir) = &args.stubs_dir {
    config = config.stubs_dir(absolute(dir)?);
  }
  let config = config.resolve(target)?;
  debug!(build_dir = %config.build_dir.display(), "resolved build directory");

  let pipeline = Pipeline::new(toolchain(&args)).with_runner(if json {
    ProcessRunner::with_output(io::stderr(), io::stderr().is_terminal())
  } else {
    ProcessRunner::new()
  });

  if !json {
    print_info(&format!("Building {target}"));
  }
  let started = Instant::now();
  let mut ctx = LoadContext::new();
  let report = pipeline.build_resolved(&mut ctx, target, &config)?;
  let elapsed = started.elapsed();

  if json {
    let steps: Vec<_> = report
      .steps
      .iter()
      .map(|(step, status)| serde_json::json!({ "step": step.name(), "status": status.to_string() }))
      .collect();
    let library_dirs: Vec<_> = ctx.library_dirs().map(|dir| dir.display().to_string()).collect();
    print_json(&serde_json::json!({
      "target": report.target,
      "build_dir": config.build_dir,
      "elapsed_ms": elapsed.as_millis() as u64,
      "steps": steps,
      "search_paths": ctx.search_paths(),
      "library_dirs": library_dirs,
    }))?;
    return Ok(());
  }

  for (step, status) in &report.steps {
    print_step(step.name(), Some(*status));
  }
  println!();
  for dir in ctx.search_paths() {
    print_stat("Search path", &dir.display().to_string());
  }
  for dir in ctx.library_dirs() {
    print_stat("Library dir", &dir.display().to_string());
  }
  print_success(&format!("Built {target} in {}", format_duration(elapsed)));

  Ok(())
}

fn toolchain(args: &BuildArgs) -> Toolchain {
  let mut toolchain = Toolchain::default().cmake(args.cmake.as_str());
  if args.no_generator {
    toolchain = toolchain.generator(None);
  } else if let Some(generator) = &args.generator {
    toolchain = toolchain.generator(Some(generator.clone()));
  }
  if let Some(command) = &args.stubgen {
    toolchain = toolchain.stubgen(command.split_whitespace().map(str::to_string).collect());
  }
  toolchain
}

fn parse_option(option: &str) -> Result<(&str, &str)> {
  match option.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key, value)),
    _ => bail!("Invalid build option '{option}', expected KEY=VALUE"),
  }
}
