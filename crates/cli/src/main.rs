mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, print_error};

/// kindle - incremental builds of native extension projects
#[derive(Parser)]
#[command(name = "kindle")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Show full tool output and debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

/// Options naming one target and its build directory.
#[derive(Args)]
pub struct TargetArgs {
  /// Project directory containing the top-level CMakeLists.txt
  pub project_dir: PathBuf,

  /// Name of the extension module to build
  #[arg(short, long)]
  pub target: String,

  /// Build directory (default: a per-user directory under the system temp dir)
  #[arg(long)]
  pub build_dir: Option<PathBuf>,

  /// Build configuration passed to the build tool
  #[arg(long, default_value = kindle_lib::consts::DEFAULT_BUILD_TYPE)]
  pub build_type: String,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  pub output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Configure, compile and publish a target, skipping work whose inputs are unchanged
  Build {
    #[command(flatten)]
    target: TargetArgs,

    /// Extra build option as KEY=VALUE (repeatable)
    #[arg(short = 'D', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Directory receiving generated stubs (stub generation is skipped without it)
    #[arg(long)]
    stubs_dir: Option<PathBuf>,

    /// Accept stubs containing invalid expressions
    #[arg(long)]
    stubs_invalid_ok: bool,

    /// Wipe the build directory first
    #[arg(long)]
    clean: bool,

    /// Build tool executable
    #[arg(long, default_value = "cmake")]
    cmake: String,

    /// Generator passed to the configure step
    #[arg(long, conflicts_with = "no_generator")]
    generator: Option<String>,

    /// Let the build tool pick its default generator
    #[arg(long)]
    no_generator: bool,

    /// Stub generator command line, split on whitespace
    #[arg(long)]
    stubgen: Option<String>,
  },

  /// Show what the last build of a target stored
  Status {
    #[command(flatten)]
    target: TargetArgs,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "info" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      target,
      options,
      stubs_dir,
      stubs_invalid_ok,
      clean,
      cmake,
      generator,
      no_generator,
      stubgen,
    } => cmd::cmd_build(cmd::BuildArgs {
      target,
      options,
      stubs_dir,
      stubs_invalid_ok,
      clean,
      verbose: cli.verbose,
      cmake,
      generator,
      no_generator,
      stubgen,
    }),
    Commands::Status { target } => cmd::cmd_status(&target, cli.verbose),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
