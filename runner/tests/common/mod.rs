#![allow(dead_code)]

use std::path::PathBuf;
use wasm_run::{RunConfig, RunError, Session};
use wasmtime::Module;

pub const PROGRAM: &str = "test.wat";

pub fn no_wasi() -> RunConfig {
    RunConfig {
        wasi: false,
        ..Default::default()
    }
}

pub fn session_with(config: &RunConfig) -> Session {
    Session::new(config).expect("compartment is created")
}

pub fn session() -> Session {
    session_with(&RunConfig::default())
}

pub fn compile(session: &Session, wat: &str) -> Module {
    let bytes = wat::parse_str(wat).expect("test module is valid wat");
    session.compile(PROGRAM, &bytes).expect("test module compiles")
}

/// Instantiate an import-free module and register its exports as `name`.
pub fn register(session: &mut Session, name: &str, wat: &str) {
    let module = compile(session, wat);
    let instance = session
        .instantiate(name, &module, &[])
        .expect("registered module instantiates");
    session.register_instance(name, &instance);
}

pub fn program_args(args: &[&str]) -> Vec<String> {
    std::iter::once(PROGRAM)
        .chain(args.iter().copied())
        .map(String::from)
        .collect()
}

/// Run `wat` through every stage after loading.
pub fn run_wat_with(config: &RunConfig, wat: &str, args: &[&str]) -> Result<i32, RunError> {
    let mut session = session_with(config);
    let module = compile(&session, wat);
    let args = program_args(args);
    if config.wasi {
        session.instantiate_shim(&args)?;
    }
    session.run_module(PROGRAM, &module, &args)
}

pub fn run_wat(wat: &str) -> Result<i32, RunError> {
    run_wat_with(&RunConfig::default(), wat, &[])
}

/// Write `contents` to a file unique to this test process.
pub fn write_source(name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wasm-run-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir is writable");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("source file is written");
    path
}
