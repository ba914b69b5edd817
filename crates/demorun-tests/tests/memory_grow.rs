//! Runtime tests for memory.size and memory.grow.

use demorun::{compile_shared, Instance, RunOptions, Value};
use demorun_tests::{instantiate, MEMORY_GROW};

fn i32_of(out: Vec<Value>) -> i32 {
    out[0].as_i32().unwrap()
}

#[test]
fn test_initial_size() {
    let mut m = instantiate(MEMORY_GROW).unwrap();
    assert_eq!(i32_of(m.invoke("get_size", &[]).unwrap()), 1);
}

#[test]
fn test_grow_success() {
    let mut m = instantiate(MEMORY_GROW).unwrap();
    assert_eq!(i32_of(m.invoke("grow", &[Value::I32(1)]).unwrap()), 1);
    assert_eq!(i32_of(m.invoke("get_size", &[]).unwrap()), 2);
}

#[test]
fn test_grow_failure_returns_neg1() {
    let mut m = instantiate(MEMORY_GROW).unwrap();
    // Declared max is 2 pages; 1 + 2 exceeds it.
    assert_eq!(i32_of(m.invoke("grow", &[Value::I32(2)]).unwrap()), -1);
    assert_eq!(i32_of(m.invoke("get_size", &[]).unwrap()), 1);
    assert_eq!(m.memory("mem").unwrap().active_size(), 65536);
}

#[test]
fn test_grow_zero() {
    let mut m = instantiate(MEMORY_GROW).unwrap();
    assert_eq!(i32_of(m.invoke("grow", &[Value::I32(0)]).unwrap()), 1);
    assert_eq!(i32_of(m.invoke("get_size", &[]).unwrap()), 1);
}

#[test]
fn test_grow_then_use_new_memory() {
    let mut m = instantiate(MEMORY_GROW).unwrap();
    assert!(m
        .invoke("store_and_load", &[Value::I32(65536), Value::I32(42)])
        .is_err());
    m.invoke("grow", &[Value::I32(1)]).unwrap();
    let out = m
        .invoke("store_and_load", &[Value::I32(65536), Value::I32(42)])
        .unwrap();
    assert_eq!(i32_of(out), 42);
}

#[test]
fn test_host_cap_below_declared_max() {
    let options = RunOptions {
        max_pages: 1,
        ..RunOptions::default()
    };
    let mut m = Instance::new(compile_shared(MEMORY_GROW).unwrap(), &options).unwrap();
    assert_eq!(i32_of(m.invoke("grow", &[Value::I32(1)]).unwrap()), -1);
}
