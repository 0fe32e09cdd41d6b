use std::fmt;
use wasmtime::Extern;

use crate::compartment::Compartment;
use crate::resolver::{ResolveError, Resolution, Resolver};
use crate::types::{ExternType, ImportDeclaration, ModuleDescriptor};

/// An import bound to an object, in import-declaration order.
pub struct ResolvedImport {
    pub import: ImportDeclaration,
    pub object: Extern,
    /// Type of the bound object. Equal to the declared type for stubs.
    pub ty: ExternType,
    pub stubbed: bool,
}

/// An import whose registered export had the wrong type.
#[derive(Debug, Clone)]
pub struct MissingImport {
    pub import: ImportDeclaration,
    pub diagnostic: String,
}

impl fmt::Display for MissingImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Missing import: module=\"{}\" export=\"{}\" type=\"{}\" ({})",
            self.import.module, self.import.name, self.import.ty, self.diagnostic
        )
    }
}

pub enum LinkResult {
    Success(Vec<ResolvedImport>),
    Failure(Vec<MissingImport>),
}

impl LinkResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LinkResult::Success(_))
    }
}

/// Resolve every import of `module` in declaration order.
///
/// All imports are attempted even after a mismatch, so a failed link reports
/// every offending import at once. Only stub synthesis failures end the pass
/// early.
pub fn link_module(
    compartment: &mut Compartment,
    module: &ModuleDescriptor,
    resolver: &impl Resolver,
) -> Result<LinkResult, ResolveError> {
    let mut resolved = Vec::with_capacity(module.imports.len());
    let mut missing = Vec::new();

    for import in &module.imports {
        match resolver.resolve(compartment, &import.module, &import.name, &import.ty) {
            Ok(Resolution::Bound(object, ty)) => resolved.push(ResolvedImport {
                import: import.clone(),
                object,
                ty,
                stubbed: false,
            }),
            Ok(Resolution::Stubbed(object)) => resolved.push(ResolvedImport {
                import: import.clone(),
                object,
                ty: import.ty.clone(),
                stubbed: true,
            }),
            Err(ResolveError::Mismatch(mismatch)) => missing.push(MissingImport {
                import: import.clone(),
                diagnostic: mismatch.to_string(),
            }),
            Err(err) => return Err(err),
        }
    }

    if missing.is_empty() {
        Ok(LinkResult::Success(resolved))
    } else {
        Ok(LinkResult::Failure(missing))
    }
}
