//! Placeholder objects for imports nothing provides.
//!
//! A stub has exactly the requested type, so instantiation and every use that
//! does not depend on a real binding behave normally. Only calling a stub
//! function (it traps) or relying on a stub global's zero value gives it away.

use anyhow::{Result, anyhow};
use wasmtime::{Extern, Global, Memory, Ref, SharedMemory, Table, Tag, Val};

use crate::compartment::Compartment;
use crate::types::ExternType;

/// Synthesize an object of type `ty` standing in for the import `export_name`.
pub fn synthesize(
    compartment: &mut Compartment,
    export_name: &str,
    ty: &ExternType,
) -> Result<Extern> {
    let stub = match ty {
        ExternType::Func(ty) => Extern::Func(compartment.trap_function(export_name, ty)?),
        ExternType::Memory(ty) if ty.is_shared() => {
            let memory = SharedMemory::new(compartment.engine(), ty.clone())?;
            Extern::SharedMemory(memory)
        }
        ExternType::Memory(ty) => Extern::Memory(Memory::new(compartment.store(), ty.clone())?),
        ExternType::Table(ty) => {
            let init = Ref::null(ty.element().heap_type());
            Extern::Table(Table::new(compartment.store(), ty.clone(), init)?)
        }
        ExternType::Global(ty) => {
            let init = Val::default_for_ty(ty.content()).ok_or_else(|| {
                anyhow!("{} has no default value to initialize a stub global", ty.content())
            })?;
            Extern::Global(Global::new(compartment.store(), ty.clone(), init)?)
        }
        ExternType::Tag(ty) => Extern::Tag(Tag::new(compartment.store(), ty)?),
    };
    Ok(stub)
}
