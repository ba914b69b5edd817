//! IR builder - translates WebAssembly bytecode to register IR.
//!
//! - `core`: builder state, control stack, branch resolution
//! - `translate`: per-operator translation

mod core;
mod translate;

pub use self::core::{IrBuilder, ModuleContext};

use super::types::{FuncSignature, IrFunction};
use crate::parser::ParsedModule;
use anyhow::{anyhow, Context, Result};

/// Builds the translation context shared by every function of a module.
pub fn module_context(parsed: &ParsedModule) -> Result<ModuleContext> {
    let func_signatures = parsed
        .functions
        .iter()
        .enumerate()
        .map(|(i, func)| {
            let ty = parsed
                .types
                .get(func.type_idx as usize)
                .ok_or_else(|| anyhow!("function {} has unknown type {}", i, func.type_idx))?;
            FuncSignature::from_wasmparser(ty)
                .with_context(|| format!("signature of function {}", i))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ModuleContext {
        func_signatures,
        num_imported_functions: parsed.num_imported_functions,
    })
}

/// Translates all locally defined functions in the module to IR.
pub fn build_functions(parsed: &ParsedModule) -> Result<Vec<IrFunction>> {
    let ctx = module_context(parsed)?;
    let mut builder = IrBuilder::new();

    parsed
        .functions
        .iter()
        .zip(&ctx.func_signatures)
        .enumerate()
        .map(|(i, (func, signature))| {
            builder
                .translate_function(signature, &func.locals, &func.body, &ctx)
                .with_context(|| {
                    format!(
                        "failed to translate function {}",
                        i as u32 + parsed.num_imported_functions
                    )
                })
        })
        .collect()
}
