//! Shared fixture for pipeline integration tests.
//!
//! Every test gets a scratch directory with a tiny project, a build directory,
//! a stubs directory and two shell scripts standing in for `cmake` and the stub
//! generator. The scripts react to marker files in the project directory
//! (`fail_configure`, `fail_reconfigure`, `fail_compile`, `slow`) and append to
//! `*_runs.log` files so tests can count how often each tool ran.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kindle_lib::{
  BuildOptions, BuildReport, LoadContext, Pipeline, PipelineError, ProcessRunner, ResolvedConfig, Toolchain,
};
use tempfile::TempDir;

pub const TARGET: &str = "demo";

const FAKE_CMAKE: &str = r#"#!/bin/sh
mode=configure
src=""
build=""
config=""
target=""
metadata=""
while [ $# -gt 0 ]; do
  case "$1" in
    --build) mode=build; build="$2"; shift 2 ;;
    --config) config="$2"; shift 2 ;;
    -S) src="$2"; shift 2 ;;
    -B) build="$2"; shift 2 ;;
    -G) shift 2 ;;
    -DCMAKE_CONFIGURATION_TYPES=*) config="${1#-DCMAKE_CONFIGURATION_TYPES=}"; shift ;;
    -DKINDLE_TARGET_NAME=*) target="${1#-DKINDLE_TARGET_NAME=}"; shift ;;
    -DKINDLE_METADATA_DIR=*) metadata="${1#-DKINDLE_METADATA_DIR=}"; shift ;;
    *) shift ;;
  esac
done

if [ "$mode" = configure ]; then
  mkdir -p "$metadata"
  rm -f "$metadata/configure_passed.txt"
  echo configure >> "$src/configure_runs.log"
  echo "-- Configuring $target ($config)"
  if [ -e "$src/fail_configure" ]; then
    echo "CMake Error: requested configure failure" >&2
    exit 1
  fi
  printf '%s\n%s\n' "$src" "$target" > "$build/fake_cache.txt"
  : > "$metadata/configure_passed.txt"
  exit 0
fi

if [ ! -f "$build/fake_cache.txt" ]; then
  echo "Error: not a configured build directory" >&2
  exit 1
fi
src=$(sed -n 1p "$build/fake_cache.txt")
target=$(sed -n 2p "$build/fake_cache.txt")
echo compile >> "$src/compile_runs.log"

if [ -e "$src/slow" ]; then
  echo start >> "$src/events.log"
  sleep 0.2
  echo end >> "$src/events.log"
fi
if [ -e "$src/fail_reconfigure" ]; then
  rm -f "$build/kindle/configure_passed.txt"
  echo "CMake Error: regeneration failed" >&2
  exit 1
fi
if [ -e "$src/fail_compile" ]; then
  echo "module.cpp:1: error: requested compile failure" >&2
  exit 1
fi

out="$build/$config"
meta="$build/kindle/$config"
mkdir -p "$out" "$meta"
cp "$src/module.cpp" "$out/lib$target.so"
printf '%s' "$out/lib$target.so" > "$meta/artifact_location.txt"
if [ -f "$src/library_dirs" ]; then
  cp "$src/library_dirs" "$meta/extra_library_search_paths.txt"
else
  : > "$meta/extra_library_search_paths.txt"
fi
echo "[100%] Built target $target"
"#;

const FAKE_STUBGEN: &str = r#"#!/bin/sh
artifact=""
out=""
ignore=0
target=""
while [ $# -gt 0 ]; do
  case "$1" in
    --extension-path) artifact="$2"; shift 2 ;;
    --library-directories) shift 2 ;;
    --ignore-all-errors) ignore=1; shift ;;
    -o) out="$2"; shift 2 ;;
    --*) shift ;;
    *) target="$1"; shift ;;
  esac
done

echo stubgen >> "$(dirname "$out")/stubgen_runs.log"
if grep -q broken "$artifact" && [ "$ignore" -eq 0 ]; then
  echo "Invalid expression found in $target" >&2
  exit 1
fi
mkdir -p "$out/$target"
echo "def answer() -> int: ..." > "$out/$target/__init__.pyi"
"#;

pub struct Fixture {
  _temp: TempDir,
  pub root: PathBuf,
  pub project: PathBuf,
  pub build: PathBuf,
  pub stubs: PathBuf,
  cmake: PathBuf,
  stubgen: PathBuf,
}

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let project = root.join("project");
    let bin = root.join("bin");
    fs::create_dir_all(&project).unwrap();
    fs::create_dir_all(&bin).unwrap();
    fs::write(project.join("module.cpp"), "int answer() { return 42; }\n").unwrap();

    let cmake = write_script(&bin, "cmake", FAKE_CMAKE);
    let stubgen = write_script(&bin, "stubgen", FAKE_STUBGEN);

    Self {
      _temp: temp,
      build: root.join("build"),
      stubs: root.join("stubs"),
      root,
      project,
      cmake,
      stubgen,
    }
  }

  pub fn config(&self) -> ResolvedConfig {
    ResolvedConfig {
      project_dir: self.project.clone(),
      build_dir: self.build.clone(),
      clean_build: false,
      build_type: "Release".to_string(),
      options: BuildOptions::new(),
      stubs_dir: Some(self.stubs.clone()),
      stubs_invalid_ok: false,
      verbose: false,
    }
  }

  pub fn toolchain(&self) -> Toolchain {
    Toolchain::default()
      .cmake(self.cmake.to_string_lossy())
      .generator(None)
      .stubgen(vec![self.stubgen.to_string_lossy().into_owned()])
  }

  pub fn pipeline(&self) -> Pipeline {
    Pipeline::new(self.toolchain()).with_runner(ProcessRunner::with_output(std::io::sink(), false))
  }

  pub fn build(&self, config: &ResolvedConfig) -> Result<BuildReport, PipelineError> {
    let mut ctx = LoadContext::new();
    self.pipeline().build_resolved(&mut ctx, TARGET, config)
  }

  pub fn build_with(&self, pipeline: &Pipeline, config: &ResolvedConfig) -> Result<BuildReport, PipelineError> {
    let mut ctx = LoadContext::new();
    pipeline.build_resolved(&mut ctx, TARGET, config)
  }

  /// Number of times a fake tool appended to `<dir>/<name>_runs.log`.
  pub fn runs(&self, tool: &str) -> usize {
    let dir = if tool == "stubgen" { &self.root } else { &self.project };
    fs::read_to_string(dir.join(format!("{tool}_runs.log")))
      .map(|log| log.lines().count())
      .unwrap_or(0)
  }

  pub fn touch(&self, marker: &str) {
    fs::write(self.project.join(marker), "").unwrap();
  }

  pub fn remove(&self, marker: &str) {
    fs::remove_file(self.project.join(marker)).unwrap();
  }

  pub fn write_source(&self, content: &str) {
    fs::write(self.project.join("module.cpp"), content).unwrap();
  }

  pub fn metadata(&self, relative: &str) -> PathBuf {
    self.build.join("kindle").join(relative)
  }

  pub fn read_metadata(&self, relative: &str) -> String {
    fs::read_to_string(self.metadata(relative)).unwrap()
  }

  pub fn artifact(&self) -> PathBuf {
    self.build.join("Release").join(format!("lib{TARGET}.so"))
  }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, body).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}
