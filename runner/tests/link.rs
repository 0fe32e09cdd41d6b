use wasm_run::{LinkResult, ModuleDescriptor, RunError};

mod common;
use common::*;

const ENV: &str = r#"
(module
  (memory (export "mem") 1)
  (global (export "answer") i32 (i32.const 42))
  (func (export "double") (param i32) (result i32)
    (i32.mul (local.get 0) (i32.const 2))))
"#;

#[test]
fn unregistered_module_is_stubbed() {
    let wat = r#"
    (module
      (import "env" "missingFn" (func $missing (param i32) (result i32)))
      (func (export "main") (result i32) (i32.const 0)))
    "#;
    assert_eq!(run_wat(wat).unwrap(), 0);
}

#[test]
fn every_import_is_bound_in_declaration_order() {
    let wat = r#"
    (module
      (import "env" "f" (func))
      (import "env" "mem" (memory 1))
      (import "other" "g" (global i64))
      (import "other" "t" (table 1 funcref)))
    "#;
    let mut session = session();
    let module = compile(&session, wat);
    let descriptor = ModuleDescriptor::new(PROGRAM, &module);

    let LinkResult::Success(imports) = session.link(&descriptor).unwrap() else {
        panic!("link with nothing registered must succeed");
    };
    let names = imports
        .iter()
        .map(|import| format!("{}.{}", import.import.module, import.import.name))
        .collect::<Vec<_>>();
    assert_eq!(names, ["env.f", "env.mem", "other.g", "other.t"]);
    assert!(imports.iter().all(|import| import.stubbed));
    for import in &imports {
        assert!(import.ty.satisfies(&import.import.ty));
        let actual = wasm_run::ExternType::from(import.object.ty(session.compartment().store()));
        assert!(actual.satisfies(&import.import.ty), "{actual} vs {}", import.import.ty);
    }
}

#[test]
fn registered_export_is_bound() {
    let wat = r#"
    (module
      (import "env" "double" (func $double (param i32) (result i32)))
      (func (export "main") (result i32) (call $double (i32.const 21))))
    "#;
    let mut session = session();
    register(&mut session, "env", ENV);
    let module = compile(&session, wat);

    let descriptor = ModuleDescriptor::new(PROGRAM, &module);
    let LinkResult::Success(imports) = session.link(&descriptor).unwrap() else {
        panic!("matching export must link");
    };
    assert!(!imports[0].stubbed);

    assert_eq!(session.run_module(PROGRAM, &module, &program_args(&[])).unwrap(), 42);
}

#[test]
fn absent_export_of_registered_module_is_stubbed() {
    let wat = r#"
    (module
      (import "env" "double" (func (param i32) (result i32)))
      (import "env" "triple" (func (param i32) (result i32)))
      (import "env" "answer" (global i32)))
    "#;
    let mut session = session();
    register(&mut session, "env", ENV);
    let module = compile(&session, wat);
    let descriptor = ModuleDescriptor::new(PROGRAM, &module);

    let LinkResult::Success(imports) = session.link(&descriptor).unwrap() else {
        panic!("absent exports must be stubbed");
    };
    let stubbed = imports.iter().map(|import| import.stubbed).collect::<Vec<_>>();
    assert_eq!(stubbed, [false, true, false]);

    let answer = imports[2].object.clone().into_global().unwrap();
    assert_eq!(answer.get(session.compartment().store()).unwrap_i32(), 42);
}

#[test]
fn type_mismatch_fails_the_link_and_reports_every_import() {
    let wat = r#"
    (module
      (import "env" "double" (func (param i64) (result i64)))
      (import "env" "missing" (func))
      (import "env" "answer" (global (mut i32)))
      (import "env" "mem" (memory 1))
      (func $start (i32.store (i32.const 0) (i32.const 42)))
      (start $start)
      (func (export "main")))
    "#;
    let mut session = session();
    register(&mut session, "env", ENV);
    let memory = session
        .registry()
        .get("env", "mem")
        .cloned()
        .and_then(|object| object.into_memory())
        .unwrap();
    let module = compile(&session, wat);

    let err = session
        .run_module(PROGRAM, &module, &program_args(&[]))
        .unwrap_err();
    assert!(!err.is_fatal());
    let RunError::Link(ref missing) = err else {
        panic!("expected a link failure, got {err}");
    };
    let names = missing
        .iter()
        .map(|missing| missing.import.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["double", "answer"]);
    let diagnostic = &missing[0].diagnostic;
    assert!(diagnostic.contains("Resolved import env.double to a func (param i32) (result i32)"));
    assert!(diagnostic.contains("but was expecting func (param i64) (result i64)"));

    let message = err.to_string();
    assert!(message.starts_with("Failed to link module:"));
    let answer = r#"Missing import: module="env" export="answer" type="global (mut i32)""#;
    assert!(message.contains(answer), "{message}");

    // The start function never ran.
    assert_eq!(memory.data(session.compartment().store())[0], 0);
}

#[test]
fn kind_mismatch_fails_the_link() {
    let wat = r#"
    (module
      (import "env" "double" (global i32)))
    "#;
    let mut session = session();
    register(&mut session, "env", ENV);
    let module = compile(&session, wat);
    let descriptor = ModuleDescriptor::new(PROGRAM, &module);

    let LinkResult::Failure(missing) = session.link(&descriptor).unwrap() else {
        panic!("a function cannot satisfy a global import");
    };
    assert_eq!(missing.len(), 1);
    assert!(missing[0].diagnostic.contains("to a func"));
}

#[test]
fn memory_limits_are_checked() {
    let mut session = session();
    register(&mut session, "env", ENV);

    let bounded = compile(&session, r#"(module (import "env" "mem" (memory 1 2)))"#);
    let descriptor = ModuleDescriptor::new(PROGRAM, &bounded);
    assert!(!session.link(&descriptor).unwrap().is_success());

    let unbounded = compile(&session, r#"(module (import "env" "mem" (memory 1)))"#);
    let descriptor = ModuleDescriptor::new(PROGRAM, &unbounded);
    assert!(session.link(&descriptor).unwrap().is_success());
}

#[test]
fn wasi_imports_come_from_the_shim() {
    let wat = r#"
    (module
      (import "wasi_snapshot_preview1" "proc_exit" (func (param i32)))
      (import "wasi_snapshot_preview1" "not_a_wasi_call" (func)))
    "#;
    let mut session = session();
    session.instantiate_shim(&program_args(&[])).unwrap();
    assert!(session.registry().contains(wasm_run::shim::WASI_MODULE));

    let module = compile(&session, wat);
    let descriptor = ModuleDescriptor::new(PROGRAM, &module);
    let LinkResult::Success(imports) = session.link(&descriptor).unwrap() else {
        panic!("WASI imports must link");
    };
    assert!(!imports[0].stubbed);
    assert!(imports[1].stubbed);
}

#[test]
fn mistyped_wasi_import_fails_the_link() {
    let wat = r#"
    (module
      (import "wasi_snapshot_preview1" "proc_exit" (func (param i64)))
      (func (export "main")))
    "#;
    let err = run_wat(wat).unwrap_err();
    assert!(matches!(err, RunError::Link(ref missing) if missing.len() == 1));
}
