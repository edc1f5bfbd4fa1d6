//! kindle-lib: incremental, lock-protected builds of native extension projects.
//!
//! This crate provides the pieces a trigger needs to compile a project on demand:
//! - `Config` / `ResolvedConfig`: per-target settings and their validation
//! - `Pipeline`: the Clean, Initialize, Configure, Compile, Stub Generation and Publish steps
//! - `KeyedStore`: typed step state persisted as one small file per value
//! - `ProcessRunner`: runs the external tools, interactively or captured
//! - `BuildLock`: serializes runs that share a build directory
//! - `LoadContext`: where published artifacts become visible to the host

pub mod build_lock;
pub mod config;
pub mod consts;
pub mod loader;
pub mod pipeline;
pub mod process;
pub mod store;
pub mod util;
pub mod version;

pub use config::{BuildOptions, Config, ConfigError, ResolvedConfig};
pub use loader::LoadContext;
pub use pipeline::{BuildReport, Pipeline, PipelineError, StepKind, Toolchain};
pub use process::{ProcessRunner, StepStatus};
