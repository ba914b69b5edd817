//! End-to-end integration tests for demorun.
//!
//! These tests verify the complete pipeline: WAT → Wasm → IR → execution.

use anyhow::{Context, Result};
use demorun::{compile_shared, Instance, InvokeError, RunOptions, Value, WasmTrap};

/// Helper to instantiate a WAT module with default options.
fn instantiate_wat(wat_source: &str) -> Result<Instance> {
    let wasm_bytes = wat::parse_str(wat_source).context("failed to parse WAT")?;
    Instance::new(compile_shared(&wasm_bytes)?, &RunOptions::default())
}

fn call1(inst: &mut Instance, name: &str, args: &[Value]) -> Result<Value> {
    inst.invoke(name, args)?
        .into_iter()
        .next()
        .context("expected a result")
}

#[test]
fn test_simple_add() -> Result<()> {
    let mut inst = instantiate_wat(
        r#"
        (module
            (func (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add
            )
        )
    "#,
    )?;
    assert_eq!(call1(&mut inst, "add", &[Value::I32(2), Value::I32(3)])?, Value::I32(5));
    assert_eq!(
        call1(&mut inst, "add", &[Value::I32(i32::MAX), Value::I32(1)])?,
        Value::I32(i32::MIN)
    );
    Ok(())
}

#[test]
fn test_i32_bit_ops() -> Result<()> {
    let mut inst = instantiate_wat(
        r#"
        (module
            (func (export "shl") (param i32 i32) (result i32)
                (i32.shl (local.get 0) (local.get 1)))
            (func (export "shr_s") (param i32 i32) (result i32)
                (i32.shr_s (local.get 0) (local.get 1)))
            (func (export "shr_u") (param i32 i32) (result i32)
                (i32.shr_u (local.get 0) (local.get 1)))
            (func (export "rotl") (param i32 i32) (result i32)
                (i32.rotl (local.get 0) (local.get 1)))
            (func (export "clz") (param i32) (result i32)
                (i32.clz (local.get 0)))
            (func (export "popcnt") (param i32) (result i32)
                (i32.popcnt (local.get 0)))
            (func (export "lt_u") (param i32 i32) (result i32)
                (i32.lt_u (local.get 0) (local.get 1)))
        )
    "#,
    )?;
    let two = |a: i32, b: i32| [Value::I32(a), Value::I32(b)];
    // Shift counts are taken modulo 32.
    assert_eq!(call1(&mut inst, "shl", &two(1, 33))?, Value::I32(2));
    assert_eq!(call1(&mut inst, "shr_s", &two(-8, 1))?, Value::I32(-4));
    assert_eq!(call1(&mut inst, "shr_u", &two(-8, 1))?, Value::I32(0x7FFF_FFFC));
    assert_eq!(
        call1(&mut inst, "rotl", &two(0x8000_0001u32 as i32, 1))?,
        Value::I32(3)
    );
    assert_eq!(call1(&mut inst, "clz", &[Value::I32(1)])?, Value::I32(31));
    assert_eq!(call1(&mut inst, "clz", &[Value::I32(0)])?, Value::I32(32));
    assert_eq!(call1(&mut inst, "popcnt", &[Value::I32(-1)])?, Value::I32(32));
    assert_eq!(call1(&mut inst, "lt_u", &two(-1, 1))?, Value::I32(0));
    Ok(())
}

#[test]
fn test_i64_ops_and_conversions() -> Result<()> {
    let mut inst = instantiate_wat(
        r#"
        (module
            (func (export "mul") (param i64 i64) (result i64)
                (i64.mul (local.get 0) (local.get 1)))
            (func (export "wrap") (param i64) (result i32)
                (i32.wrap_i64 (local.get 0)))
            (func (export "extend_u") (param i32) (result i64)
                (i64.extend_i32_u (local.get 0)))
            (func (export "extend8") (param i32) (result i32)
                (i32.extend8_s (local.get 0)))
            (func (export "ctz") (param i64) (result i64)
                (i64.ctz (local.get 0)))
            (func (export "eqz") (param i64) (result i32)
                (i64.eqz (local.get 0)))
        )
    "#,
    )?;
    assert_eq!(
        call1(&mut inst, "mul", &[Value::I64(1 << 40), Value::I64(1 << 30)])?,
        Value::I64(0)
    );
    assert_eq!(
        call1(&mut inst, "wrap", &[Value::I64(0x1_2345_6789)])?,
        Value::I32(0x2345_6789)
    );
    assert_eq!(
        call1(&mut inst, "extend_u", &[Value::I32(-1)])?,
        Value::I64(0xFFFF_FFFF)
    );
    assert_eq!(call1(&mut inst, "extend8", &[Value::I32(0x80)])?, Value::I32(-128));
    assert_eq!(call1(&mut inst, "ctz", &[Value::I64(0)])?, Value::I64(64));
    assert_eq!(call1(&mut inst, "eqz", &[Value::I64(0)])?, Value::I32(1));
    Ok(())
}

#[test]
fn test_local_get_is_a_copy() -> Result<()> {
    // The value read before local.set must not observe the later write.
    let mut inst = instantiate_wat(
        r#"
        (module
            (func (export "swap_sub") (param i32 i32) (result i32)
                (local $t i32)
                local.get 0
                (local.set 0 (local.get 1))
                local.get 0
                i32.sub
            )
        )
    "#,
    )?;
    assert_eq!(
        call1(&mut inst, "swap_sub", &[Value::I32(10), Value::I32(3)])?,
        Value::I32(7)
    );
    Ok(())
}

#[test]
fn test_local_tee_and_nested_blocks() -> Result<()> {
    let mut inst = instantiate_wat(
        r#"
        (module
            (func (export "count_down") (param $n i32) (result i32)
                (local $steps i32)
                (block $exit
                    (loop $top
                        (br_if $exit (i32.le_s (local.tee $n (i32.sub (local.get $n) (i32.const 3))) (i32.const 0)))
                        (local.set $steps (i32.add (local.get $steps) (i32.const 1)))
                        (br $top)))
                (local.get $steps)
            )
        )
    "#,
    )?;
    assert_eq!(call1(&mut inst, "count_down", &[Value::I32(10)])?, Value::I32(3));
    assert_eq!(call1(&mut inst, "count_down", &[Value::I32(1)])?, Value::I32(0));
    Ok(())
}

#[test]
fn test_demo_pipeline() -> Result<()> {
    let mut inst = instantiate_wat(include_str!("../../../demos/fill.wat"))?;
    let size = |inst: &Instance| inst.memory("image_buffer").map(|m| m.active_size());
    assert_eq!(size(&inst), Some(65536));
    inst.invoke("tick", &[])?;
    assert_eq!(size(&inst), Some(65536));
    let buffer = inst.memory("image_buffer").context("image_buffer")?;
    assert!(buffer.as_slice().iter().all(|&b| b == 0xDF));
    Ok(())
}

#[test]
fn test_fill_demo_traps_on_short_memory() -> Result<()> {
    // Same tick as the demo, but the fill runs one byte past a single page.
    let mut inst = instantiate_wat(
        r#"
        (module
            (memory (export "image_buffer") 1)
            (func (export "tick")
                (memory.fill (i32.const 1) (i32.const 0xCFDF) (i32.const 0x10000))))
    "#,
    )?;
    assert_eq!(
        inst.invoke("tick", &[]),
        Err(InvokeError::Trap(WasmTrap::OutOfBounds))
    );
    let buffer = inst.memory("image_buffer").context("image_buffer")?;
    assert!(buffer.as_slice().iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_unsupported_features_fail_compilation() {
    let float = wat::parse_str(r#"(module (func (export "f") (result f64) f64.const 1))"#)
        .map_err(anyhow::Error::from)
        .and_then(|wasm| compile_shared(&wasm));
    assert!(float.is_err());

    let multi = wat::parse_str(r#"(module (func (result i32 i32) i32.const 1 i32.const 2))"#)
        .map_err(anyhow::Error::from)
        .and_then(|wasm| compile_shared(&wasm));
    assert!(multi.is_err());
}
