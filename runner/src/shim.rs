//! Environment shims: conventional host imports plus the services an
//! `(argc, argv)` entry point needs.

use anyhow::{Context, Result, anyhow, bail};
use wasmtime::{Instance, Linker, TypedFunc, Val};
use wasmtime_wasi::WasiCtxBuilder;

use crate::compartment::{Compartment, HostState};
use crate::resolver::NamedInstanceRegistry;

/// Module namespace the WASI shim registers its imports under.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Allocator exports used to place command arguments in linear memory, in
/// order of preference.
pub const ALLOCATORS: [&str; 2] = ["malloc", "_malloc"];

/// Global initializer exports run after instantiation, in order of preference.
pub const INITIALIZERS: [&str; 2] = ["_initialize", "__wasm_call_ctors"];

pub trait EnvironmentShim {
    /// Add the shim's namespaces to `registry`.
    fn register(&self, compartment: &mut Compartment, registry: &mut NamedInstanceRegistry);

    /// Run the module's global initializers, if it has any.
    fn initialize_globals(&self, compartment: &mut Compartment, instance: &Instance) -> Result<()>;

    /// Copy `args` into the module's linear memory and return the
    /// `(argc, argv)` pair describing them.
    fn inject_command_args(
        &self,
        compartment: &mut Compartment,
        instance: &Instance,
        args: &[String],
    ) -> Result<Vec<Val>>;
}

/// WASI preview 1, backed by `wasmtime-wasi`.
pub struct WasiShim {
    linker: Linker<HostState>,
}

impl WasiShim {
    /// Set up a WASI context for `args` (program name first) in the
    /// compartment.
    pub fn instantiate(compartment: &mut Compartment, args: &[String]) -> Result<Self> {
        compartment.store().data_mut().wasi = WasiCtxBuilder::new()
            .inherit_stdio()
            .inherit_env()
            .args(args)
            .build_p1();

        let mut linker = Linker::new(compartment.engine());
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |state: &mut HostState| &mut state.wasi)
            .context("failed to define WASI imports")?;
        Ok(WasiShim { linker })
    }
}

impl EnvironmentShim for WasiShim {
    fn register(&self, compartment: &mut Compartment, registry: &mut NamedInstanceRegistry) {
        let definitions = self
            .linker
            .iter(compartment.store())
            .map(|(module, name, object)| (module.to_string(), name.to_string(), object))
            .collect::<Vec<_>>();
        log::debug!("Registering {} WASI definitions", definitions.len());
        for (module, name, object) in definitions {
            registry.define(&module, &name, object);
        }
    }

    fn initialize_globals(&self, compartment: &mut Compartment, instance: &Instance) -> Result<()> {
        let store = compartment.store();
        for name in INITIALIZERS {
            if let Ok(init) = instance.get_typed_func::<(), ()>(&mut *store, name) {
                log::debug!("Running global initializer {name}");
                return init.call(&mut *store, ());
            }
        }
        Ok(())
    }

    fn inject_command_args(
        &self,
        compartment: &mut Compartment,
        instance: &Instance,
        args: &[String],
    ) -> Result<Vec<Val>> {
        let store = compartment.store();
        let malloc: TypedFunc<i32, i32> = ALLOCATORS
            .iter()
            .find_map(|name| instance.get_typed_func::<i32, i32>(&mut *store, name).ok())
            .ok_or_else(|| {
                anyhow!(
                    "module exports no allocator ({}) to place arguments with",
                    ALLOCATORS.join(", ")
                )
            })?;
        let memory = instance
            .get_memory(&mut *store, "memory")
            .context("module does not export its linear memory as \"memory\"")?;

        let mut allocate = |bytes: &[u8]| -> Result<i32> {
            let size = i32::try_from(bytes.len()).context("argument too large")?;
            let ptr = malloc.call(&mut *store, size)?;
            if ptr == 0 {
                bail!("allocation of {size} bytes for command arguments failed");
            }
            memory.write(&mut *store, ptr as u32 as usize, bytes)?;
            Ok(ptr)
        };

        let mut pointers = Vec::with_capacity(args.len() + 1);
        for arg in args {
            let mut bytes = arg.as_bytes().to_vec();
            bytes.push(0);
            pointers.push(allocate(&bytes)?);
        }
        pointers.push(0);

        let table = pointers
            .iter()
            .flat_map(|ptr| ptr.to_le_bytes())
            .collect::<Vec<u8>>();
        let argv = allocate(&table)?;
        let argc = i32::try_from(args.len()).context("too many arguments")?;
        log::debug!("Injected {argc} command arguments at {argv:#x}");
        Ok(vec![Val::I32(argc), Val::I32(argv)])
    }
}
