use clap::Parser;
use std::path::PathBuf;

use crate::config::{OptimizationLevel, RunConfig};
use crate::pipeline::RunOptions;

#[derive(Parser, Debug)]
#[command(
    name = "wasm-run",
    version,
    about = "Run the main function of a WebAssembly module",
    long_about = None
)]
pub struct RunCLI {
    /// Do not provide WASI imports to the module.
    #[arg(long = "no-wasi", default_value_t = false)]
    pub no_wasi: bool,

    /// Generate debug information for compiled code.
    #[arg(short = 'g', long = "debug-info", default_value_t = false)]
    pub debug_info: bool,

    #[arg(short = 'O', long = "opt-level", value_enum, default_value_t = OptimizationLevel::Speed)]
    pub opt_level: OptimizationLevel,

    /// Module to run (text or binary format), then the arguments passed
    /// through to it. Nothing after the module is interpreted by the runner.
    #[arg(
        value_name = "FILE [ARGS]",
        trailing_var_arg = true,
        num_args = 1..
    )]
    pub command: Vec<String>,
}

impl RunCLI {
    /// `None` when no module file was given.
    pub fn into_options(self) -> Option<RunOptions> {
        let config = RunConfig {
            debug_info: self.debug_info,
            opt_level: self.opt_level,
            wasi: !self.no_wasi,
        };
        let mut command = self.command.into_iter();
        let filename = PathBuf::from(command.next()?);
        Some(RunOptions {
            filename,
            args: command.collect(),
            config,
        })
    }
}
