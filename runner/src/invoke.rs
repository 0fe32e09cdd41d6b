use wasmtime::{Func, Instance, Val};
use wasmtime_wasi::I32Exit;

use crate::EXIT_SUCCESS;
use crate::compartment::Compartment;
use crate::error::RunError;
use crate::shim::EnvironmentShim;

/// Entry point export names, in order of preference.
pub const ENTRY_POINTS: [&str; 2] = ["main", "_main"];

/// Find the first exported entry point function.
pub fn find_entry_point(
    compartment: &mut Compartment,
    instance: &Instance,
) -> Option<(&'static str, Func)> {
    ENTRY_POINTS.into_iter().find_map(|name| {
        instance
            .get_func(compartment.store(), name)
            .map(|func| (name, func))
    })
}

/// Call the module's entry point and map its result onto an exit status.
///
/// `args` is the full argument vector, program name first. It is only
/// marshaled (through `shim`) for `(argc, argv)` entry points.
pub fn invoke(
    compartment: &mut Compartment,
    instance: &Instance,
    shim: Option<&dyn EnvironmentShim>,
    args: &[String],
) -> Result<i32, RunError> {
    let (name, func) = find_entry_point(compartment, instance).ok_or(RunError::NoEntryPoint)?;
    let ty = func.ty(compartment.store());

    let params = match ty.params().len() {
        0 => Vec::new(),
        2 => {
            let shim = shim.ok_or(RunError::MissingShim)?;
            shim.inject_command_args(compartment, instance, args)
                .map_err(RunError::Shim)?
        }
        arity => return Err(RunError::UnsupportedSignature { arity }),
    };

    log::debug!("Invoking {name} with {} argument(s)", params.len());
    let mut results = vec![Val::I32(0); ty.results().len()];
    match func.call(compartment.store(), &params, &mut results) {
        Ok(()) => Ok(exit_status(&results)),
        Err(err) => match err.downcast_ref::<I32Exit>() {
            Some(exit) => {
                log::debug!("{name} exited with status {}", exit.0);
                Ok(exit.0)
            }
            None => Err(RunError::from_execution(err)),
        },
    }
}

/// A lone `i32` result is the exit status; any other result shape is success.
pub fn exit_status(results: &[Val]) -> i32 {
    match results {
        [Val::I32(status)] => *status,
        _ => EXIT_SUCCESS,
    }
}
