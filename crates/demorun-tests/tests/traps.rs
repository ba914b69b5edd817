//! Traps abort the invocation and are reported to the host.

use demorun::{compile_shared, Instance, InvokeError, RunOptions, Value, WasmTrap};
use demorun_tests::{instantiate, TRAPS};

fn trap_of(result: Result<Vec<Value>, InvokeError>) -> WasmTrap {
    match result {
        Err(InvokeError::Trap(trap)) => trap,
        other => panic!("expected trap, got {:?}", other),
    }
}

#[test]
fn test_unreachable() {
    let mut m = instantiate(TRAPS).unwrap();
    assert_eq!(trap_of(m.invoke("unreachable", &[])), WasmTrap::Unreachable);
}

#[test]
fn test_division_traps() {
    let mut m = instantiate(TRAPS).unwrap();
    assert_eq!(
        trap_of(m.invoke("div_s", &[Value::I32(1), Value::I32(0)])),
        WasmTrap::DivisionByZero
    );
    assert_eq!(
        trap_of(m.invoke("div_s", &[Value::I32(i32::MIN), Value::I32(-1)])),
        WasmTrap::IntegerOverflow
    );
    assert_eq!(
        trap_of(m.invoke("rem_u64", &[Value::I64(9), Value::I64(0)])),
        WasmTrap::DivisionByZero
    );
    assert_eq!(
        m.invoke("div_s", &[Value::I32(-7), Value::I32(2)]).unwrap(),
        vec![Value::I32(-3)]
    );
}

#[test]
fn test_writes_before_trap_remain() {
    let mut m = instantiate(TRAPS).unwrap();
    assert_eq!(trap_of(m.invoke("write_then_trap", &[])), WasmTrap::OutOfBounds);
    let mem = m.memory("mem").unwrap().as_slice();
    assert_eq!(mem[0], 1);
    assert!(mem[65534..].iter().all(|&b| b == 0));
}

#[test]
fn test_fuel_stops_infinite_loop() {
    let options = RunOptions {
        fuel: Some(10_000),
        ..RunOptions::default()
    };
    let mut m = Instance::new(compile_shared(TRAPS).unwrap(), &options).unwrap();
    assert_eq!(trap_of(m.invoke("spin", &[])), WasmTrap::FuelExhausted);
    // Fuel is per invocation.
    assert_eq!(trap_of(m.invoke("spin", &[])), WasmTrap::FuelExhausted);
    assert!(m.invoke("div_s", &[Value::I32(4), Value::I32(2)]).is_ok());
}

#[test]
fn test_trap_display() {
    assert_eq!(WasmTrap::OutOfBounds.to_string(), "out of bounds memory access");
    let err = InvokeError::Trap(WasmTrap::FuelExhausted);
    assert_eq!(err.to_string(), "wasm trap: fuel exhausted");
}
