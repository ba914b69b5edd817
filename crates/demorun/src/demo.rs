//! Demo hosting: load a module that follows the demo ABI and drive it.

use std::path::Path;

use anyhow::{Context, Result};

use crate::abi::{check_demo_abi, DemoAbi, IMAGE_BUFFER_EXPORT, TICK_EXPORT};
use crate::instance::{Instance, InvokeError};
use crate::{compile_shared, source, RunOptions};

/// An instantiated demo module.
pub struct Demo {
    instance: Instance,
    abi: DemoAbi,
}

impl Demo {
    /// Load a demo from a `.wat` or `.wasm` file.
    pub fn load(path: impl AsRef<Path>, options: &RunOptions) -> Result<Self> {
        let path = path.as_ref();
        let wasm = source::load(path)?;
        Self::from_bytes(&wasm, options)
            .with_context(|| format!("failed to load demo {}", path.display()))
    }

    /// Compile, check and instantiate a demo from WAT text or Wasm bytes.
    pub fn from_bytes(bytes: &[u8], options: &RunOptions) -> Result<Self> {
        let wasm = source::to_wasm(bytes)?;
        let module = compile_shared(&wasm)?;
        let abi = check_demo_abi(&module.parsed).context("module does not follow the demo ABI")?;
        let instance = Instance::new(module, options)?;
        tracing::info!(
            min_pages = abi.min_pages,
            max_pages = ?abi.max_pages,
            "demo ready"
        );
        Ok(Self { instance, abi })
    }

    pub fn abi(&self) -> DemoAbi {
        self.abi
    }

    /// Call the demo's `tick` export once. A trap surfaces as
    /// `InvokeError::Trap`.
    pub fn tick(&mut self) -> Result<(), InvokeError> {
        self.instance.invoke(TICK_EXPORT, &[]).map(|_| ())
    }

    /// Current contents of `image_buffer`.
    pub fn image_buffer(&self) -> &[u8] {
        self.instance
            .memory(IMAGE_BUFFER_EXPORT)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    /// Host write access to `image_buffer`.
    pub fn image_buffer_mut(&mut self) -> &mut [u8] {
        match self.instance.memory_mut(IMAGE_BUFFER_EXPORT) {
            Some(m) => m.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn instance_mut(&mut self) -> &mut Instance {
        &mut self.instance
    }
}

/// Drives a demo and keeps a host-side copy of the last frame.
pub struct DemoRunner {
    demo: Demo,
    frame: Vec<u8>,
    ticks: u64,
}

impl DemoRunner {
    pub fn new(demo: Demo) -> Self {
        Self {
            demo,
            frame: Vec::new(),
            ticks: 0,
        }
    }

    /// Run one tick and copy `image_buffer` into the frame.
    pub fn step(&mut self) -> Result<(), InvokeError> {
        self.demo.tick().inspect_err(|err| {
            tracing::warn!(tick = self.ticks, %err, "tick failed");
        })?;
        self.ticks += 1;
        let buffer = self.demo.image_buffer();
        self.frame.clear();
        self.frame.extend_from_slice(buffer);
        Ok(())
    }

    /// Step `n` times, stopping at the first failure.
    pub fn run(&mut self, n: u64) -> Result<(), InvokeError> {
        for _ in 0..n {
            self.step()?;
        }
        tracing::debug!(ticks = self.ticks, "run finished");
        Ok(())
    }

    /// Snapshot taken after the last successful tick.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Successful ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn demo(&self) -> &Demo {
        &self.demo
    }

    pub fn demo_mut(&mut self) -> &mut Demo {
        &mut self.demo
    }

    pub fn into_demo(self) -> Demo {
        self.demo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demorun_runtime::{WasmTrap, PAGE_SIZE};

    const FILL: &str = include_str!("../../../demos/fill.wat");

    #[test]
    fn tick_fills_image_buffer() -> Result<()> {
        let mut demo = Demo::from_bytes(FILL.as_bytes(), &RunOptions::default())?;
        assert!(demo.image_buffer().iter().all(|&b| b == 0));
        demo.tick()?;
        assert_eq!(demo.image_buffer().len(), PAGE_SIZE);
        assert!(demo.image_buffer().iter().all(|&b| b == 0xDF));
        Ok(())
    }

    #[test]
    fn host_writes_are_overwritten_by_tick() -> Result<()> {
        let mut demo = Demo::from_bytes(FILL.as_bytes(), &RunOptions::default())?;
        demo.image_buffer_mut()[100] = 7;
        assert_eq!(demo.image_buffer()[100], 7);
        demo.tick()?;
        assert_eq!(demo.image_buffer()[100], 0xDF);
        Ok(())
    }

    #[test]
    fn runner_snapshots_frames() -> Result<()> {
        let demo = Demo::from_bytes(FILL.as_bytes(), &RunOptions::default())?;
        let mut runner = DemoRunner::new(demo);
        assert!(runner.frame().is_empty());
        runner.run(3)?;
        assert_eq!(runner.ticks(), 3);
        assert_eq!(runner.frame(), runner.demo().image_buffer());
        Ok(())
    }

    #[test]
    fn runner_stops_at_first_trap() -> Result<()> {
        let demo = Demo::from_bytes(
            br#"(module
                (memory (export "image_buffer") 1)
                (global $n (mut i32) (i32.const 0))
                (func (export "tick")
                    global.get $n
                    i32.const 1
                    i32.add
                    global.set $n
                    global.get $n
                    i32.const 2
                    i32.gt_u
                    if unreachable end))"#,
            &RunOptions::default(),
        )?;
        let mut runner = DemoRunner::new(demo);
        assert_eq!(runner.run(10), Err(InvokeError::Trap(WasmTrap::Unreachable)));
        assert_eq!(runner.ticks(), 2);
        Ok(())
    }

    #[test]
    fn tick_reports_the_actual_trap() -> Result<()> {
        let mut demo = Demo::from_bytes(
            br#"(module
                (memory (export "image_buffer") 1)
                (func (export "tick")
                    (memory.fill (i32.const 1) (i32.const 0xCFDF) (i32.const 0x10000))))"#,
            &RunOptions::default(),
        )?;
        assert_eq!(demo.tick(), Err(InvokeError::Trap(WasmTrap::OutOfBounds)));
        assert!(demo.image_buffer().iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn runner_hands_back_demo() -> Result<()> {
        let demo = Demo::from_bytes(FILL.as_bytes(), &RunOptions::default())?;
        let mut runner = DemoRunner::new(demo);
        runner.step()?;
        let demo = runner.into_demo();
        assert_eq!(demo.image_buffer()[0], 0xDF);
        assert_eq!(demo.abi().min_pages, 1);
        Ok(())
    }

    #[test]
    fn non_demo_module_is_rejected() {
        let err = Demo::from_bytes(b"(module (func (export \"tick\")))", &RunOptions::default())
            .err()
            .map(|e| format!("{:#}", e));
        assert!(err.is_some_and(|e| e.contains("image_buffer")));
    }
}
