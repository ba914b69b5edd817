//! Direct calls, recursion and the call depth limit.

use demorun::{InvokeError, Value, WasmTrap};
use demorun_tests::{instantiate, CALLS};

#[test]
fn test_recursive_factorial() {
    let mut m = instantiate(CALLS).unwrap();
    let out = m.invoke("fact", &[Value::I64(20)]).unwrap();
    assert_eq!(out, vec![Value::I64(2_432_902_008_176_640_000)]);
}

#[test]
fn test_mutual_recursion() {
    let mut m = instantiate(CALLS).unwrap();
    assert_eq!(m.invoke("is_even", &[Value::I32(10)]).unwrap(), vec![Value::I32(1)]);
    assert_eq!(m.invoke("is_even", &[Value::I32(7)]).unwrap(), vec![Value::I32(0)]);
}

#[test]
fn test_argument_order() {
    let mut m = instantiate(CALLS).unwrap();
    assert_eq!(m.invoke("call_args", &[]).unwrap(), vec![Value::I32(7)]);
}

#[test]
fn test_unbounded_recursion_traps() {
    let mut m = instantiate(CALLS).unwrap();
    assert_eq!(
        m.invoke("forever", &[]),
        Err(InvokeError::Trap(WasmTrap::CallStackExhausted))
    );
    // The instance stays usable after a trap.
    assert_eq!(m.invoke("call_args", &[]).unwrap(), vec![Value::I32(7)]);
}
