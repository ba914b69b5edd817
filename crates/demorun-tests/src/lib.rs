// Include generated fixture constants from build.rs (in OUT_DIR)
include!(concat!(env!("OUT_DIR"), "/mod.rs"));

use demorun::{compile_shared, Demo, Instance, RunOptions};

/// Instantiate a compiled fixture with default options.
pub fn instantiate(wasm: &[u8]) -> anyhow::Result<Instance> {
    Instance::new(compile_shared(wasm)?, &RunOptions::default())
}

/// Load a fixture as a demo with default options.
pub fn demo(wasm: &[u8]) -> anyhow::Result<Demo> {
    Demo::from_bytes(wasm, &RunOptions::default())
}

/// Plain Rust reference for the `fib` fixture.
pub fn fib_orig(n: i32) -> i32 {
    let (mut a, mut b) = (0i32, 1i32);
    for _ in 0..n {
        let tmp = a.wrapping_add(b);
        a = b;
        b = tmp;
    }
    a
}
