//! Demo ABI check.
//!
//! A demo exports a `tick` function taking and returning nothing, and an
//! `image_buffer` memory of at least one page that the host reads after
//! each tick. The contents of the buffer are opaque bytes to the host.

use thiserror::Error;

use crate::ir::FuncSignature;
use crate::parser::{ExportKind, ParsedModule};

pub const TICK_EXPORT: &str = "tick";
pub const IMAGE_BUFFER_EXPORT: &str = "image_buffer";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("missing export '{0}'")]
    MissingExport(&'static str),

    #[error("export '{name}' must be a {expected}, found a {found}")]
    WrongKind {
        name: &'static str,
        expected: ExportKind,
        found: ExportKind,
    },

    #[error("export '{name}' must have type [] -> [], found {found}")]
    WrongSignature { name: &'static str, found: String },

    #[error("export '{0}' must be a memory defined by the module")]
    ImportedMemory(&'static str),

    #[error("export '{0}' must have at least 1 page")]
    EmptyMemory(&'static str),
}

/// Shape of a module that passed the ABI check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoAbi {
    pub min_pages: u32,
    pub max_pages: Option<u32>,
}

/// Verify that `parsed` exports `tick: [] -> []` and an `image_buffer` memory.
pub fn check_demo_abi(parsed: &ParsedModule) -> Result<DemoAbi, AbiError> {
    let tick = find(parsed, TICK_EXPORT, ExportKind::Func)?;
    let sig = parsed
        .func_type(tick.index)
        .map(FuncSignature::from_wasmparser);
    match sig {
        Some(Ok(sig)) if sig.params.is_empty() && sig.results.is_empty() => {}
        Some(Ok(sig)) => {
            return Err(AbiError::WrongSignature {
                name: TICK_EXPORT,
                found: sig.to_string(),
            })
        }
        Some(Err(e)) => {
            return Err(AbiError::WrongSignature {
                name: TICK_EXPORT,
                found: e.to_string(),
            })
        }
        None => {
            return Err(AbiError::WrongSignature {
                name: TICK_EXPORT,
                found: "an imported function".to_string(),
            })
        }
    }

    let buffer = find(parsed, IMAGE_BUFFER_EXPORT, ExportKind::Memory)?;
    // Only a single, module-defined memory is supported, at index 0.
    let memory = match parsed.memory {
        Some(memory) if buffer.index == 0 => memory,
        _ => return Err(AbiError::ImportedMemory(IMAGE_BUFFER_EXPORT)),
    };
    if memory.initial_pages == 0 {
        return Err(AbiError::EmptyMemory(IMAGE_BUFFER_EXPORT));
    }

    Ok(DemoAbi {
        min_pages: memory.initial_pages,
        max_pages: memory.maximum_pages,
    })
}

/// One line per export, e.g. `tick: function [] -> []`.
pub fn describe_exports(parsed: &ParsedModule) -> Vec<String> {
    parsed
        .exports
        .iter()
        .map(|export| match export.kind {
            ExportKind::Func => {
                let sig = parsed
                    .func_type(export.index)
                    .and_then(|ty| FuncSignature::from_wasmparser(ty).ok())
                    .map_or_else(|| "(imported)".to_string(), |s| s.to_string());
                format!("{}: function {}", export.name, sig)
            }
            ExportKind::Memory => match parsed.memory {
                Some(m) => format!(
                    "{}: memory {} page(s), max {}",
                    export.name,
                    m.initial_pages,
                    m.maximum_pages
                        .map_or_else(|| "none".to_string(), |p| p.to_string())
                ),
                None => format!("{}: memory (imported)", export.name),
            },
            kind => format!("{}: {} {}", export.name, kind, export.index),
        })
        .collect()
}

fn find<'a>(
    parsed: &'a ParsedModule,
    name: &'static str,
    expected: ExportKind,
) -> Result<&'a crate::parser::ExportInfo, AbiError> {
    let export = parsed.export(name).ok_or(AbiError::MissingExport(name))?;
    if export.kind != expected {
        return Err(AbiError::WrongKind {
            name,
            expected,
            found: export.kind,
        });
    }
    Ok(export)
}
