//! `wasm-run` - load a single WebAssembly module and run its `main`.
//!
//! The module's imports are linked against a small set of registered
//! instances (the WASI shim by default). Anything that cannot be found is
//! replaced with a stub of exactly the declared type: functions that trap when
//! called, and real memories, tables, globals and tags otherwise. The module is
//! then instantiated and its `main` (or `_main`) export is invoked, with the
//! result mapped onto a process exit status.

pub mod cli;
pub mod compartment;
pub mod config;
pub mod error;
pub mod invoke;
pub mod link;
pub mod pipeline;
pub mod resolver;
pub mod shim;
pub mod stub;
pub mod types;

pub use compartment::{Compartment, HostState};
pub use config::{OptimizationLevel, RunConfig};
pub use error::RunError;
pub use link::{LinkResult, MissingImport, ResolvedImport};
pub use pipeline::{RunOptions, Session, run};
pub use resolver::{NamedInstanceRegistry, Resolution, Resolver, RootResolver};
pub use shim::{EnvironmentShim, WasiShim};
pub use types::{ExternType, ImportDeclaration, ModuleDescriptor};

/// Exit status for a run that completed without an integer result.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for every failure before the entry point is invoked.
pub const EXIT_FAILURE: i32 = 1;
