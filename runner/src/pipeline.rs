//! Load, compile, link, instantiate, invoke.
//!
//! Each stage is a synchronous checkpoint: the first failure ends the run.
//! Failures before the entry point is invoked are reported and map to
//! [`EXIT_FAILURE`](crate::EXIT_FAILURE); failures while the program executes
//! are fatal (see [`RunError::is_fatal`]).

use std::fs;
use std::path::{Path, PathBuf};
use wasmtime::{Extern, Instance, Module};

use crate::compartment::Compartment;
use crate::config::RunConfig;
use crate::error::RunError;
use crate::invoke;
use crate::link::{self, LinkResult, ResolvedImport};
use crate::resolver::{NamedInstanceRegistry, RootResolver};
use crate::shim::{EnvironmentShim, WasiShim};
use crate::types::ModuleDescriptor;

/// Everything needed to run one module.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub filename: PathBuf,
    /// Arguments for the program, not including its name.
    pub args: Vec<String>,
    pub config: RunConfig,
}

impl RunOptions {
    /// The argument vector the program sees: its file name, then `args`.
    pub fn program_args(&self) -> Vec<String> {
        std::iter::once(self.filename.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Read `path` and turn it into a binary module. Text-format sources are
/// parsed; binary modules pass through unchanged.
pub fn load_module(path: &Path) -> Result<Vec<u8>, RunError> {
    let source = fs::read(path).map_err(|source| RunError::FileLoad {
        path: path.to_path_buf(),
        source,
    })?;
    match wat::parse_bytes(&source) {
        Ok(bytes) => Ok(bytes.into_owned()),
        Err(mut err) => {
            err.set_path(path);
            Err(RunError::Parse { errors: vec![err] })
        }
    }
}

/// State shared by every stage of one run.
///
/// Owns the compartment, the resolver's registry and the environment shim;
/// all of them are dropped together when the session ends.
pub struct Session {
    compartment: Compartment,
    resolver: RootResolver,
    shim: Option<WasiShim>,
}

impl Session {
    pub fn new(config: &RunConfig) -> Result<Self, RunError> {
        let compartment = Compartment::new(config).map_err(RunError::Compartment)?;
        Ok(Session {
            compartment,
            resolver: RootResolver::new(NamedInstanceRegistry::new()),
            shim: None,
        })
    }

    pub fn compartment(&mut self) -> &mut Compartment {
        &mut self.compartment
    }

    pub fn registry(&self) -> &NamedInstanceRegistry {
        self.resolver.registry()
    }

    pub fn registry_mut(&mut self) -> &mut NamedInstanceRegistry {
        self.resolver.registry_mut()
    }

    /// Make the exports of `instance` importable from the module `name`.
    pub fn register_instance(&mut self, name: &str, instance: &Instance) {
        self.resolver
            .registry_mut()
            .register_instance(self.compartment.store(), name, instance);
    }

    pub fn compile(&self, name: &str, bytes: &[u8]) -> Result<Module, RunError> {
        log::debug!("Compiling {name}");
        Module::from_binary(self.compartment.engine(), bytes).map_err(|source| RunError::Compile {
            name: name.to_string(),
            source,
        })
    }

    /// Instantiate the WASI shim for `args` and register its namespaces.
    pub fn instantiate_shim(&mut self, args: &[String]) -> Result<(), RunError> {
        let shim = WasiShim::instantiate(&mut self.compartment, args).map_err(RunError::Shim)?;
        shim.register(&mut self.compartment, self.resolver.registry_mut());
        self.shim = Some(shim);
        Ok(())
    }

    pub fn link(&mut self, module: &ModuleDescriptor) -> Result<LinkResult, RunError> {
        log::debug!("Linking {} import(s) of {}", module.imports.len(), module.name);
        link::link_module(&mut self.compartment, module, &self.resolver).map_err(RunError::Stub)
    }

    /// Instantiate `module` with resolved imports. The start function, if
    /// any, runs as part of instantiation.
    pub fn instantiate(
        &mut self,
        name: &str,
        module: &Module,
        imports: &[ResolvedImport],
    ) -> Result<Instance, RunError> {
        let externs = imports
            .iter()
            .map(|import| import.object.clone())
            .collect::<Vec<Extern>>();
        Instance::new(self.compartment.store(), module, &externs).map_err(|source| {
            if source.downcast_ref::<wasmtime::Trap>().is_some() {
                RunError::Trap(source)
            } else {
                RunError::Instantiate {
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    /// Run the shim's global initializers; a no-op without a shim.
    pub fn initialize_globals(&mut self, instance: &Instance) -> Result<(), RunError> {
        let Some(shim) = &self.shim else {
            return Ok(());
        };
        shim.initialize_globals(&mut self.compartment, instance)
            .map_err(|err| match RunError::from_execution(err) {
                RunError::Runtime(err) => RunError::Shim(err),
                trap => trap,
            })
    }

    pub fn invoke(&mut self, instance: &Instance, args: &[String]) -> Result<i32, RunError> {
        let shim = self.shim.as_ref().map(|shim| shim as &dyn EnvironmentShim);
        invoke::invoke(&mut self.compartment, instance, shim, args)
    }

    /// Link, instantiate and invoke a compiled module, returning the exit
    /// status.
    pub fn run_module(
        &mut self,
        name: &str,
        module: &Module,
        args: &[String],
    ) -> Result<i32, RunError> {
        let descriptor = ModuleDescriptor::new(name, module);

        let imports = match self.link(&descriptor)? {
            LinkResult::Success(imports) => imports,
            LinkResult::Failure(missing) => return Err(RunError::Link(missing)),
        };
        let stubbed = imports.iter().filter(|import| import.stubbed).count();
        if stubbed > 0 {
            log::debug!("{stubbed} of {} import(s) stubbed", imports.len());
        }

        let instance = self.instantiate(name, module, &imports)?;
        self.initialize_globals(&instance)?;
        self.invoke(&instance, args)
    }
}

/// Run the module named by `options` to completion.
pub fn run(options: &RunOptions) -> Result<i32, RunError> {
    let name = options.filename.display().to_string();
    log::debug!("Loading {name}");
    let bytes = load_module(&options.filename)?;

    let mut session = Session::new(&options.config)?;
    let module = session.compile(&name, &bytes)?;

    let args = options.program_args();
    if options.config.wasi {
        session.instantiate_shim(&args)?;
    }
    session.run_module(&name, &module, &args)
}
