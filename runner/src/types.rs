//! Extern types and the import/export view of a compiled module.

use std::fmt;
use wasmtime::{
    FuncType, GlobalType, HeapType, MemoryType, Module, Mutability, RefType, TableType, TagType,
    ValType,
};

/// The closed set of shapes an import or export can take.
///
/// Every dispatch over extern kinds in this crate matches on this enum
/// exhaustively, so a new kind has to be handled everywhere before the crate
/// builds again.
#[derive(Debug, Clone)]
pub enum ExternType {
    Func(FuncType),
    Memory(MemoryType),
    Table(TableType),
    Global(GlobalType),
    Tag(TagType),
}

impl ExternType {
    pub fn kind(&self) -> &'static str {
        match self {
            ExternType::Func(_) => "function",
            ExternType::Memory(_) => "memory",
            ExternType::Table(_) => "table",
            ExternType::Global(_) => "global",
            ExternType::Tag(_) => "tag",
        }
    }

    /// Whether an object of this (actual) type can be bound to an import
    /// declared with the `expected` type.
    ///
    /// Signatures must be identical. For memories and tables the actual limits
    /// must fall within the requested ones: at least the requested minimum, and
    /// bounded by the requested maximum when one is given.
    pub fn satisfies(&self, expected: &ExternType) -> bool {
        match (self, expected) {
            (ExternType::Func(actual), ExternType::Func(expected)) => {
                same_types(actual.params(), expected.params())
                    && same_types(actual.results(), expected.results())
            }
            (ExternType::Memory(actual), ExternType::Memory(expected)) => {
                actual.is_64() == expected.is_64()
                    && actual.is_shared() == expected.is_shared()
                    && limits_satisfy(
                        (actual.minimum(), actual.maximum()),
                        (expected.minimum(), expected.maximum()),
                    )
            }
            (ExternType::Table(actual), ExternType::Table(expected)) => {
                RefType::eq(actual.element(), expected.element())
                    && limits_satisfy(
                        (u64::from(actual.minimum()), actual.maximum().map(u64::from)),
                        (u64::from(expected.minimum()), expected.maximum().map(u64::from)),
                    )
            }
            (ExternType::Global(actual), ExternType::Global(expected)) => {
                ValType::eq(actual.content(), expected.content())
                    && actual.mutability() == expected.mutability()
            }
            (ExternType::Tag(actual), ExternType::Tag(expected)) => {
                same_types(actual.ty().params(), expected.ty().params())
            }
            _ => false,
        }
    }
}

impl From<wasmtime::ExternType> for ExternType {
    fn from(ty: wasmtime::ExternType) -> Self {
        match ty {
            wasmtime::ExternType::Func(ty) => ExternType::Func(ty),
            wasmtime::ExternType::Memory(ty) => ExternType::Memory(ty),
            wasmtime::ExternType::Table(ty) => ExternType::Table(ty),
            wasmtime::ExternType::Global(ty) => ExternType::Global(ty),
            wasmtime::ExternType::Tag(ty) => ExternType::Tag(ty),
        }
    }
}

fn same_types(
    actual: impl ExactSizeIterator<Item = ValType>,
    expected: impl ExactSizeIterator<Item = ValType>,
) -> bool {
    actual.len() == expected.len() && actual.zip(expected).all(|(a, e)| ValType::eq(&a, &e))
}

fn limits_satisfy(actual: (u64, Option<u64>), expected: (u64, Option<u64>)) -> bool {
    let (actual_min, actual_max) = actual;
    let (expected_min, expected_max) = expected;
    if actual_min < expected_min {
        return false;
    }
    match (actual_max, expected_max) {
        (_, None) => true,
        (Some(actual_max), Some(expected_max)) => actual_max <= expected_max,
        (None, Some(_)) => false,
    }
}

// Text-format style rendering, used in every diagnostic.
impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternType::Func(ty) => {
                write!(f, "func")?;
                write_signature(f, ty)
            }
            ExternType::Memory(ty) => {
                write!(f, "memory")?;
                if ty.is_64() {
                    write!(f, " i64")?;
                }
                write_limits(f, ty.minimum(), ty.maximum())?;
                if ty.is_shared() {
                    write!(f, " shared")?;
                }
                Ok(())
            }
            ExternType::Table(ty) => {
                write!(f, "table")?;
                write_limits(f, u64::from(ty.minimum()), ty.maximum().map(u64::from))?;
                write!(f, " ")?;
                write_ref_type(f, ty.element())
            }
            ExternType::Global(ty) => match ty.mutability() {
                Mutability::Var => {
                    write!(f, "global (mut ")?;
                    write_val_type(f, ty.content())?;
                    write!(f, ")")
                }
                Mutability::Const => {
                    write!(f, "global ")?;
                    write_val_type(f, ty.content())
                }
            },
            ExternType::Tag(ty) => {
                write!(f, "tag")?;
                write_signature(f, ty.ty())
            }
        }
    }
}

fn write_signature(f: &mut fmt::Formatter<'_>, ty: &FuncType) -> fmt::Result {
    if ty.params().len() > 0 {
        write!(f, " (param")?;
        for param in ty.params() {
            write!(f, " ")?;
            write_val_type(f, &param)?;
        }
        write!(f, ")")?;
    }
    if ty.results().len() > 0 {
        write!(f, " (result")?;
        for result in ty.results() {
            write!(f, " ")?;
            write_val_type(f, &result)?;
        }
        write!(f, ")")?;
    }
    Ok(())
}

fn write_limits(f: &mut fmt::Formatter<'_>, minimum: u64, maximum: Option<u64>) -> fmt::Result {
    write!(f, " {minimum}")?;
    if let Some(maximum) = maximum {
        write!(f, " {maximum}")?;
    }
    Ok(())
}

fn write_val_type(f: &mut fmt::Formatter<'_>, ty: &ValType) -> fmt::Result {
    match ty {
        ValType::Ref(ty) => write_ref_type(f, ty),
        other => write!(f, "{other}"),
    }
}

fn write_ref_type(f: &mut fmt::Formatter<'_>, ty: &RefType) -> fmt::Result {
    match (ty.is_nullable(), ty.heap_type()) {
        (true, HeapType::Func) => write!(f, "funcref"),
        (true, HeapType::Extern) => write!(f, "externref"),
        _ => write!(f, "{ty}"),
    }
}

/// A single import as declared by the module, in declaration order.
#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub module: String,
    pub name: String,
    pub ty: ExternType,
}

/// The import view of a compiled module.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub imports: Vec<ImportDeclaration>,
}

impl ModuleDescriptor {
    /// Describe a compiled module. `name` is used when the module carries no
    /// name of its own.
    pub fn new(name: &str, module: &Module) -> Self {
        let imports = module
            .imports()
            .map(|import| ImportDeclaration {
                module: import.module().to_string(),
                name: import.name().to_string(),
                ty: import.ty().into(),
            })
            .collect();
        ModuleDescriptor {
            name: module.name().unwrap_or(name).to_string(),
            imports,
        }
    }
}
