//! Loops, br_table, early return, if/else and select.

use demorun::{Instance, Value};
use demorun_tests::{fib_orig, instantiate, CONTROL_FLOW};

fn call_i32(m: &mut Instance, name: &str, args: &[Value]) -> i32 {
    m.invoke(name, args).unwrap()[0].as_i32().unwrap()
}

#[test]
fn test_loop_sum() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    assert_eq!(call_i32(&mut m, "sum_to", &[Value::I32(0)]), 0);
    assert_eq!(call_i32(&mut m, "sum_to", &[Value::I32(10)]), 55);
    assert_eq!(call_i32(&mut m, "sum_to", &[Value::I32(1000)]), 500500);
}

#[test]
fn test_br_table() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    assert_eq!(call_i32(&mut m, "switch", &[Value::I32(0)]), 100);
    assert_eq!(call_i32(&mut m, "switch", &[Value::I32(1)]), 101);
    assert_eq!(call_i32(&mut m, "switch", &[Value::I32(2)]), 102);
    assert_eq!(call_i32(&mut m, "switch", &[Value::I32(3)]), -1);
    // Out-of-range indices take the default.
    assert_eq!(call_i32(&mut m, "switch", &[Value::I32(-7)]), -1);
}

#[test]
fn test_early_return() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    assert_eq!(call_i32(&mut m, "abs", &[Value::I32(5)]), 5);
    assert_eq!(call_i32(&mut m, "abs", &[Value::I32(-5)]), 5);
    assert_eq!(call_i32(&mut m, "abs", &[Value::I32(i32::MIN)]), i32::MIN);
}

#[test]
fn test_if_else_result() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    assert_eq!(call_i32(&mut m, "max", &[Value::I32(3), Value::I32(9)]), 9);
    assert_eq!(call_i32(&mut m, "max", &[Value::I32(-1), Value::I32(-9)]), -1);
}

#[test]
fn test_select() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    let out = m
        .invoke("select_min", &[Value::I64(-3), Value::I64(2)])
        .unwrap();
    assert_eq!(out, vec![Value::I64(-3)]);
}

#[test]
fn test_br_if_carries_value() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    let args = |a, b| [Value::I32(a), Value::I32(b)];
    assert_eq!(call_i32(&mut m, "first_nonzero", &args(4, 8)), 4);
    assert_eq!(call_i32(&mut m, "first_nonzero", &args(0, 8)), 8);
}

#[test]
fn test_fib_matches_rust() {
    let mut m = instantiate(CONTROL_FLOW).unwrap();
    for n in [0, 1, 2, 10, 20, 50] {
        assert_eq!(call_i32(&mut m, "fib", &[Value::I32(n)]), fib_orig(n), "fib({})", n);
    }
}
