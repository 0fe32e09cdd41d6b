use std::path::PathBuf;
use thiserror::Error;

use crate::link::MissingImport;
use crate::resolver::ResolveError;

/// Every way a run can end other than a normal exit.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read {}", .path.display())]
    FileLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing WebAssembly text file:\n{}", render_lines(.errors))]
    Parse { errors: Vec<wat::Error> },

    #[error("failed to set up the compartment")]
    Compartment(#[source] anyhow::Error),

    #[error("failed to compile {name}")]
    Compile {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("environment shim failed")]
    Shim(#[source] anyhow::Error),

    #[error("Failed to link module:\n{}", render_lines(.0))]
    Link(Vec<MissingImport>),

    #[error(transparent)]
    Stub(ResolveError),

    #[error("failed to instantiate {name}")]
    Instantiate {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Module does not export main function")]
    NoEntryPoint,

    #[error(
        "WebAssembly function requires {arity} argument(s), but only 0 or 2 can be passed!"
    )]
    UnsupportedSignature { arity: usize },

    #[error("entry point takes (argc, argv) but no environment shim is available")]
    MissingShim,

    /// A trap fired, possibly inside a stub function.
    #[error("Runtime exception: {0:#}")]
    Trap(anyhow::Error),

    /// Any other failure raised while the module was executing.
    #[error("Runtime exception: {0:#}")]
    Runtime(anyhow::Error),
}

impl RunError {
    /// Failures the runner does not recover from: the program was already
    /// executing when they happened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunError::Trap(_) | RunError::Runtime(_))
    }

    /// Classify a failure raised by executing module code.
    pub(crate) fn from_execution(err: anyhow::Error) -> Self {
        if err.downcast_ref::<wasmtime::Trap>().is_some() {
            RunError::Trap(err)
        } else {
            RunError::Runtime(err)
        }
    }
}

fn render_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
