use clap::{CommandFactory, Parser};
use std::process;

use wasm_run::cli::RunCLI;
use wasm_run::{EXIT_FAILURE, RunError};

/// Report a failure raised while the program was running and abort.
fn fatal(err: RunError) -> ! {
    eprintln!("{err}");
    process::abort();
}

fn main() {
    env_logger::init();

    // Treat any panic (e.g. on an engine thread) as a fatal error.
    std::panic::set_hook(Box::new(|info| {
        eprintln!("Runtime exception: {info}");
        process::abort();
    }));

    // Usage errors share the failure status of every other pre-run failure;
    // help and version output still exit successfully.
    let cli = match RunCLI::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            process::exit(EXIT_FAILURE);
        }
        Err(err) => err.exit(),
    };

    let Some(options) = cli.into_options() else {
        let _ = RunCLI::command().print_help();
        process::exit(EXIT_FAILURE);
    };

    match wasm_run::run(&options) {
        Ok(status) => process::exit(status),
        Err(err) if err.is_fatal() => fatal(err),
        Err(err) => {
            eprintln!("{:#}", anyhow::Error::new(err));
            process::exit(EXIT_FAILURE);
        }
    }
}
