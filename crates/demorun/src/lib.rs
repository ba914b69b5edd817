//! demorun — WebAssembly demo runner.
//!
//! This crate loads a demo module (WAT text or Wasm binary), checks that it
//! exports the demo ABI (`tick` + `image_buffer`), instantiates it on a
//! bounds-checked linear memory, and runs `tick` on demand through a small
//! register-IR interpreter.

pub mod abi;
pub mod demo;
pub mod exec;
pub mod instance;
pub mod ir;
pub mod parser;
pub mod source;

use std::sync::Arc;

// Re-export key types for convenience
pub use abi::{check_demo_abi, AbiError, DemoAbi, IMAGE_BUFFER_EXPORT, TICK_EXPORT};
pub use anyhow::{Context, Result};
pub use demo::{Demo, DemoRunner};
pub use demorun_runtime::{LinearMemory, WasmTrap, PAGE_SIZE};
pub use exec::Value;
pub use instance::{Instance, InvokeError};

use ir::{build_functions, IrFunction};
use parser::{parse_wasm, ParsedModule};

/// Configuration options for instantiation and execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum memory pages (used when the module declares no maximum,
    /// and as a cap when it declares a larger one)
    pub max_pages: usize,
    /// Instruction budget per host invocation (None = unlimited)
    pub fuel: Option<u64>,
    /// Maximum nesting of Wasm-to-Wasm calls
    pub max_call_depth: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: 256,
            fuel: Some(50_000_000),
            max_call_depth: 256,
        }
    }
}

/// A validated module with every function lowered to IR.
///
/// Immutable once built; share it with `Arc` to create several instances.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub parsed: ParsedModule,
    pub functions: Vec<IrFunction>,
}

/// Compile a WebAssembly binary into a `CompiledModule`.
///
/// This is the main entry point of the pipeline: validation, section
/// parsing, then IR translation of every function.
///
/// # Example
/// ```no_run
/// use demorun::{compile, Instance, RunOptions};
/// use std::sync::Arc;
///
/// let wasm = demorun::source::load("demos/fill.wat").unwrap();
/// let module = Arc::new(compile(&wasm).unwrap());
/// let mut instance = Instance::new(module, &RunOptions::default()).unwrap();
/// instance.invoke("tick", &[]).unwrap();
/// ```
pub fn compile(wasm_bytes: &[u8]) -> Result<CompiledModule> {
    let parsed = parse_wasm(wasm_bytes).context("failed to parse WebAssembly module")?;
    tracing::debug!(
        functions = parsed.functions.len(),
        exports = parsed.exports.len(),
        "parsed module"
    );

    let functions = build_functions(&parsed).context("failed to build IR")?;

    Ok(CompiledModule { parsed, functions })
}

/// Compile and share in one step.
pub fn compile_shared(wasm_bytes: &[u8]) -> Result<Arc<CompiledModule>> {
    compile(wasm_bytes).map(Arc::new)
}
