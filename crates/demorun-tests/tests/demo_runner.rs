//! Driving demos frame by frame, and the demo ABI check.

use demorun::{AbiError, Demo, DemoRunner, InvokeError, RunOptions, WasmTrap};
use demorun_tests::{demo, CONTROL_FLOW, GRADIENT, MEMORY};

#[test]
fn test_gradient_frames_advance() {
    let mut runner = DemoRunner::new(demo(GRADIENT).unwrap());
    runner.step().unwrap();
    assert_eq!(&runner.frame()[..4], &[0, 1, 2, 3]);
    assert_eq!(runner.frame()[300], (300 % 256) as u8);

    runner.run(2).unwrap();
    assert_eq!(runner.ticks(), 3);
    assert_eq!(&runner.frame()[..3], &[2, 3, 4]);
}

#[test]
fn test_frame_is_a_snapshot() {
    let mut runner = DemoRunner::new(demo(GRADIENT).unwrap());
    runner.step().unwrap();
    runner.demo_mut().image_buffer_mut()[0] = 0xEE;
    assert_eq!(runner.frame()[0], 0);
    assert_eq!(runner.demo().image_buffer()[0], 0xEE);
}

#[test]
fn test_gradient_stops_when_out_of_fuel() {
    let options = RunOptions {
        fuel: Some(1000),
        ..RunOptions::default()
    };
    let mut runner = DemoRunner::new(Demo::from_bytes(GRADIENT, &options).unwrap());
    assert_eq!(
        runner.run(5),
        Err(InvokeError::Trap(WasmTrap::FuelExhausted))
    );
    assert_eq!(runner.ticks(), 0);
    assert!(runner.frame().is_empty());
}

fn abi_error(wasm: &[u8]) -> AbiError {
    let err = demo(wasm).err().expect("module should fail the ABI check");
    err.chain()
        .find_map(|e| e.downcast_ref::<AbiError>())
        .cloned()
        .expect("error chain should contain an AbiError")
}

#[test]
fn test_modules_without_demo_exports_are_rejected() {
    assert_eq!(abi_error(CONTROL_FLOW), AbiError::MissingExport("tick"));
    assert_eq!(abi_error(MEMORY), AbiError::MissingExport("tick"));
}
