use std::collections::HashMap;
use thiserror::Error;
use wasmtime::{Extern, Instance, Store};

use crate::compartment::{Compartment, HostState};
use crate::stub;
use crate::types::ExternType;

/// Export tables of already-instantiated modules, keyed by module name.
#[derive(Default)]
pub struct NamedInstanceRegistry {
    modules: HashMap<String, HashMap<String, Extern>>,
}

impl NamedInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every export of `instance` under the module name `name`.
    pub fn register_instance(
        &mut self,
        store: &mut Store<HostState>,
        name: &str,
        instance: &Instance,
    ) {
        let exports = instance
            .exports(store)
            .map(|export| (export.name().to_string(), export.into_extern()))
            .collect::<Vec<_>>();
        self.register(name, exports);
    }

    /// Register an export table under the module name `name`, replacing any
    /// table previously registered under it.
    pub fn register(&mut self, name: &str, exports: impl IntoIterator<Item = (String, Extern)>) {
        let exports = exports.into_iter().collect();
        if self.modules.insert(name.to_string(), exports).is_some() {
            log::warn!("Module {name} was registered twice; keeping the latest");
        }
    }

    /// Add a single export to the table of `module`, creating it if needed.
    pub fn define(&mut self, module: &str, name: &str, object: Extern) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string(), object);
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.modules.get(module)?.get(name)
    }
}

/// How an import was satisfied.
pub enum Resolution {
    /// A registered export of the expected type.
    Bound(Extern, ExternType),
    /// Nothing provided the import; the object is a stub.
    Stubbed(Extern),
}

/// A registered export whose type does not match the import.
#[derive(Debug, Clone, Error)]
#[error("Resolved import {module}.{name} to a {actual}, but was expecting {expected}")]
pub struct TypeMismatch {
    pub module: String,
    pub name: String,
    pub actual: ExternType,
    pub expected: ExternType,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Mismatch(#[from] TypeMismatch),
    #[error("failed to synthesize a stub {kind} for {module}.{name}")]
    Stub {
        module: String,
        name: String,
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Supplies an object for each import of a module being linked.
pub trait Resolver {
    fn resolve(
        &self,
        compartment: &mut Compartment,
        module: &str,
        name: &str,
        expected: &ExternType,
    ) -> Result<Resolution, ResolveError>;
}

/// Resolves against a [`NamedInstanceRegistry`], stubbing anything absent.
///
/// A registered export is only used when its type satisfies the import; a
/// mismatch is an error rather than a reason to stub.
#[derive(Default)]
pub struct RootResolver {
    registry: NamedInstanceRegistry,
}

impl RootResolver {
    pub fn new(registry: NamedInstanceRegistry) -> Self {
        RootResolver { registry }
    }

    pub fn registry(&self) -> &NamedInstanceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut NamedInstanceRegistry {
        &mut self.registry
    }
}

impl Resolver for RootResolver {
    fn resolve(
        &self,
        compartment: &mut Compartment,
        module: &str,
        name: &str,
        expected: &ExternType,
    ) -> Result<Resolution, ResolveError> {
        if let Some(object) = self.registry.get(module, name) {
            let actual = ExternType::from(object.ty(compartment.store()));
            if actual.satisfies(expected) {
                log::debug!("Resolved import {module}.{name} to a registered {actual}");
                return Ok(Resolution::Bound(object.clone(), actual));
            }
            let mismatch = TypeMismatch {
                module: module.to_string(),
                name: name.to_string(),
                actual,
                expected: expected.clone(),
            };
            log::warn!("{mismatch}");
            return Err(mismatch.into());
        }

        log::info!("Stubbing import {module}.{name}: {expected}");
        stub::synthesize(compartment, name, expected)
            .map(Resolution::Stubbed)
            .map_err(|source| ResolveError::Stub {
                module: module.to_string(),
                name: name.to_string(),
                kind: expected.kind(),
                source,
            })
    }
}
