//! Intermediate Representation (IR) for the demorun interpreter.
//!
//! This module defines a register IR that sits between WebAssembly bytecode
//! and execution. Structured control flow is lowered to basic blocks so the
//! interpreter only ever follows explicit jumps.

mod types;
pub use types::*;

pub mod builder;
pub use builder::{build_functions, IrBuilder, ModuleContext};
