//! `demorun-runtime` — Runtime primitives for the demorun interpreter.
//!
//! This crate is `#![no_std]` and only needs `alloc`. It provides:
//! - `LinearMemory` for Wasm linear memory (bounds-checked, zero-initialized)
//! - `WasmTrap` / `WasmResult<T>` for Wasm trap handling
//! - Trapping integer division and remainder (`ops`)

#![no_std]

extern crate alloc;

use core::fmt;

/// WebAssembly page size: 64 KiB per the Wasm specification.
pub const PAGE_SIZE: usize = 65536;

/// Largest page count a 32-bit linear memory can address (4 GiB).
pub const MAX_WASM_PAGES: usize = 65536;

mod memory;
pub use memory::LinearMemory;

pub mod ops;

/// Wasm execution errors — no panics, no unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmTrap {
    /// Memory access out of bounds.
    OutOfBounds,
    /// Integer division by zero.
    DivisionByZero,
    /// Integer overflow (`i32.div_s` of `i32::MIN` by `-1`).
    IntegerOverflow,
    /// Unreachable instruction executed.
    Unreachable,
    /// Call nesting exceeded the host's configured depth.
    CallStackExhausted,
    /// The invocation used up its instruction budget.
    FuelExhausted,
}

impl fmt::Display for WasmTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            WasmTrap::OutOfBounds => "out of bounds memory access",
            WasmTrap::DivisionByZero => "integer divide by zero",
            WasmTrap::IntegerOverflow => "integer overflow",
            WasmTrap::Unreachable => "unreachable executed",
            WasmTrap::CallStackExhausted => "call stack exhausted",
            WasmTrap::FuelExhausted => "fuel exhausted",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for WasmTrap {}

/// Result type for Wasm operations — `Result<T, WasmTrap>`.
pub type WasmResult<T> = Result<T, WasmTrap>;

/// Errors that occur while constructing a memory.
///
/// These are configuration errors detected at instantiation, not runtime traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// Initial pages exceeds the maximum for this memory.
    MemoryInitialPagesExceedsMax { initial: usize, max: usize },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::MemoryInitialPagesExceedsMax { initial, max } => write!(
                f,
                "initial memory of {} pages exceeds maximum of {} pages",
                initial, max
            ),
        }
    }
}

impl core::error::Error for ConstructionError {}
