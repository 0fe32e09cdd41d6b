//! The allocation arena for one run.
//!
//! A [`Compartment`] owns the engine and the store. Every instance, memory,
//! table, global and stub created during a run lives in its store, and
//! nothing outlives it.

use anyhow::{Context, Result, anyhow};
use wasm_encoder as enc;
use wasmtime::{
    Engine, Func, FuncType, HeapType, Instance, Module, RefType, Store, Trap, ValType,
};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::p1::WasiP1Ctx;

use crate::config::RunConfig;

/// Export name of the single function in a synthesized stub module.
pub const STUB_EXPORT: &str = "importStub";

/// Per-store host data.
pub struct HostState {
    pub(crate) wasi: WasiP1Ctx,
}

impl HostState {
    fn new() -> Self {
        // Replaced by the WASI shim when one is instantiated.
        HostState {
            wasi: WasiCtxBuilder::new().build_p1(),
        }
    }
}

pub struct Compartment {
    engine: Engine,
    store: Store<HostState>,
}

impl Compartment {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let engine = Engine::new(&config.engine_config())?;
        let store = Store::new(&engine, HostState::new());
        Ok(Compartment { engine, store })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Produce a function of signature `ty` that traps on every call.
    ///
    /// The function is normally a compiled one-function module whose body is
    /// `unreachable`, named after `label` so it shows up in backtraces.
    /// Signatures that cannot be written down in a standalone module (those
    /// mentioning concrete reference types) get a host function instead.
    pub fn trap_function(&mut self, label: &str, ty: &FuncType) -> Result<Func> {
        let Some(bytes) = encode_trap_module(label, ty) else {
            log::debug!("Using a host trap for {label}: signature has no standalone encoding");
            return Ok(Func::new(&mut self.store, ty.clone(), |_, _, _| {
                Err(Trap::UnreachableCodeReached.into())
            }));
        };
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(text) = wasmprinter::print_bytes(&bytes) {
                log::trace!("Stub module for {label}:\n{text}");
            }
        }

        let module = Module::from_binary(&self.engine, &bytes)
            .with_context(|| format!("failed to compile stub function for {label}"))?;
        let instance = Instance::new(&mut self.store, &module, &[])
            .with_context(|| format!("failed to instantiate stub function for {label}"))?;
        instance
            .get_func(&mut self.store, STUB_EXPORT)
            .ok_or_else(|| anyhow!("stub module for {label} does not export {STUB_EXPORT}"))
    }
}

fn encode_trap_module(label: &str, ty: &FuncType) -> Option<Vec<u8>> {
    let params = ty
        .params()
        .map(|ty| encode_val_type(&ty))
        .collect::<Option<Vec<_>>>()?;
    let results = ty
        .results()
        .map(|ty| encode_val_type(&ty))
        .collect::<Option<Vec<_>>>()?;

    let mut module = enc::Module::new();

    let mut types = enc::TypeSection::new();
    types.ty().function(params, results);
    module.section(&types);

    let mut functions = enc::FunctionSection::new();
    functions.function(0);
    module.section(&functions);

    let mut exports = enc::ExportSection::new();
    exports.export(STUB_EXPORT, enc::ExportKind::Func, 0);
    module.section(&exports);

    let mut code = enc::CodeSection::new();
    let mut body = enc::Function::new(vec![]);
    body.instruction(&enc::Instruction::Unreachable);
    body.instruction(&enc::Instruction::End);
    code.function(&body);
    module.section(&code);

    let mut names = enc::NameSection::new();
    names.module(STUB_EXPORT);
    let mut function_names = enc::NameMap::new();
    function_names.append(0, &format!("{STUB_EXPORT}: {label}"));
    names.functions(&function_names);
    module.section(&names);

    Some(module.finish())
}

fn encode_val_type(ty: &ValType) -> Option<enc::ValType> {
    Some(match ty {
        ValType::I32 => enc::ValType::I32,
        ValType::I64 => enc::ValType::I64,
        ValType::F32 => enc::ValType::F32,
        ValType::F64 => enc::ValType::F64,
        ValType::V128 => enc::ValType::V128,
        ValType::Ref(ty) => enc::ValType::Ref(encode_ref_type(ty)?),
    })
}

fn encode_ref_type(ty: &RefType) -> Option<enc::RefType> {
    let heap_type = match ty.heap_type() {
        HeapType::Func => enc::AbstractHeapType::Func,
        HeapType::NoFunc => enc::AbstractHeapType::NoFunc,
        HeapType::Extern => enc::AbstractHeapType::Extern,
        HeapType::NoExtern => enc::AbstractHeapType::NoExtern,
        HeapType::Any => enc::AbstractHeapType::Any,
        HeapType::None => enc::AbstractHeapType::None,
        _ => return None,
    };
    Some(enc::RefType {
        nullable: ty.is_nullable(),
        heap_type: enc::HeapType::Abstract {
            shared: false,
            ty: heap_type,
        },
    })
}
