//! Loads, stores, data segments and bulk memory operations.

use demorun::{Instance, InvokeError, Value, WasmTrap};
use demorun_tests::{instantiate, MEMORY};

fn call(m: &mut Instance, name: &str, args: &[Value]) -> Result<Vec<Value>, InvokeError> {
    m.invoke(name, args)
}

fn mem(m: &Instance) -> &[u8] {
    m.memory("mem").unwrap().as_slice()
}

#[test]
fn test_store_load_roundtrip() {
    let mut m = instantiate(MEMORY).unwrap();
    let out = call(&mut m, "store_load", &[Value::I32(100), Value::I32(-123456)]).unwrap();
    assert_eq!(out, vec![Value::I32(-123456)]);
    let out = call(&mut m, "store_load64", &[Value::I32(200), Value::I64(i64::MIN + 7)]).unwrap();
    assert_eq!(out, vec![Value::I64(i64::MIN + 7)]);
}

#[test]
fn test_data_segment_is_little_endian() {
    let mut m = instantiate(MEMORY).unwrap();
    assert_eq!(call(&mut m, "load_data", &[]).unwrap(), vec![Value::I32(0x0403_0201)]);
    assert_eq!(call(&mut m, "load16_u_offset", &[]).unwrap(), vec![Value::I32(0x0403)]);
}

#[test]
fn test_subwidth_loads_extend() {
    let mut m = instantiate(MEMORY).unwrap();
    assert_eq!(call(&mut m, "load8_s", &[Value::I32(20)]).unwrap(), vec![Value::I32(-1)]);
    assert_eq!(call(&mut m, "load8_u", &[Value::I32(20)]).unwrap(), vec![Value::I32(255)]);
    assert_eq!(
        call(&mut m, "load32_s", &[Value::I32(17)]).unwrap(),
        vec![Value::I64(0xff04_0302u32 as i32 as i64)]
    );
}

#[test]
fn test_load_out_of_bounds_traps() {
    let mut m = instantiate(MEMORY).unwrap();
    let err = call(&mut m, "load8_u", &[Value::I32(65536)]).unwrap_err();
    assert_eq!(err, InvokeError::Trap(WasmTrap::OutOfBounds));
    // Negative i32 addresses are large unsigned offsets.
    let err = call(&mut m, "store_load", &[Value::I32(-4), Value::I32(1)]).unwrap_err();
    assert_eq!(err, InvokeError::Trap(WasmTrap::OutOfBounds));
}

#[test]
fn test_fill_uses_low_byte() {
    let mut m = instantiate(MEMORY).unwrap();
    call(&mut m, "fill", &[Value::I32(1000), Value::I32(0x1234), Value::I32(8)]).unwrap();
    assert_eq!(&mem(&m)[1000..1008], &[0x34; 8]);
    assert_eq!(mem(&m)[1008], 0);
}

#[test]
fn test_fill_out_of_bounds_writes_nothing() {
    let mut m = instantiate(MEMORY).unwrap();
    let err = call(&mut m, "fill", &[Value::I32(65000), Value::I32(0xAA), Value::I32(1000)])
        .unwrap_err();
    assert_eq!(err, InvokeError::Trap(WasmTrap::OutOfBounds));
    assert!(mem(&m)[65000..].iter().all(|&b| b == 0));
}

#[test]
fn test_fill_zero_length_at_end_is_ok() {
    let mut m = instantiate(MEMORY).unwrap();
    call(&mut m, "fill", &[Value::I32(65536), Value::I32(1), Value::I32(0)]).unwrap();
}

#[test]
fn test_copy_handles_overlap() {
    let mut m = instantiate(MEMORY).unwrap();
    // data segment bytes 16..21 shifted right by two
    call(&mut m, "copy", &[Value::I32(18), Value::I32(16), Value::I32(5)]).unwrap();
    assert_eq!(&mem(&m)[16..23], &[1, 2, 1, 2, 3, 4, 0xff]);
}

#[test]
fn test_copy_out_of_bounds_traps() {
    let mut m = instantiate(MEMORY).unwrap();
    let err = call(&mut m, "copy", &[Value::I32(0), Value::I32(65535), Value::I32(2)]).unwrap_err();
    assert_eq!(err, InvokeError::Trap(WasmTrap::OutOfBounds));
    assert_eq!(mem(&m)[0], 0);
}
