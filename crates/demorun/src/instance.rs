//! Module instances.
//!
//! An `Instance` owns its linear memory and globals, like a process owns
//! its address space. The compiled code is shared through `Arc`, so any
//! number of isolated instances can run the same module.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use demorun_runtime::{LinearMemory, WasmTrap, MAX_WASM_PAGES};
use thiserror::Error;

use crate::exec::{Machine, Value};
use crate::ir::{FuncSignature, WasmType};
use crate::parser::{ExportKind, InitValue};
use crate::{CompiledModule, RunOptions};

/// Errors raised by the host binding layer when calling an export.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("no export named '{0}'")]
    UnknownExport(String),

    #[error("export '{name}' is a {kind}, not a function")]
    NotAFunction { name: String, kind: ExportKind },

    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of '{name}' must be {expected}, got {got}")]
    TypeMismatch {
        name: String,
        index: usize,
        expected: WasmType,
        got: WasmType,
    },

    #[error("wasm trap: {0}")]
    Trap(#[from] WasmTrap),
}

/// A live instance of a compiled module.
pub struct Instance {
    module: Arc<CompiledModule>,
    memory: Option<LinearMemory>,
    globals: Vec<u64>,
    global_types: Vec<WasmType>,
    options: RunOptions,
}

impl Instance {
    /// Instantiate `module`: allocate memory, initialize globals and data
    /// segments, then run the start function if there is one.
    ///
    /// # Errors
    /// Fails if the module has imports, if its initial memory exceeds the
    /// configured cap, if a data segment does not fit, or if the start
    /// function traps.
    pub fn new(module: Arc<CompiledModule>, options: &RunOptions) -> Result<Self> {
        let parsed = &module.parsed;

        if let Some(import) = parsed.imports.first() {
            bail!(
                "modules must be self-contained, found {} import '{}.{}'",
                import.kind,
                import.module_name,
                import.name
            );
        }

        let memory = match parsed.memory {
            Some(info) => {
                let declared_max = info
                    .maximum_pages
                    .map_or(MAX_WASM_PAGES, |max| max as usize);
                let max_pages = declared_max.min(options.max_pages);
                let mut memory = LinearMemory::try_new(info.initial_pages as usize, max_pages)
                    .context("failed to allocate linear memory")?;
                for (i, segment) in parsed.data_segments.iter().enumerate() {
                    memory
                        .init_data(segment.offset as usize, &segment.data)
                        .map_err(|trap| {
                            anyhow!(
                                "data segment {} ({} bytes at offset {}): {}",
                                i,
                                segment.data.len(),
                                segment.offset,
                                trap
                            )
                        })?;
                }
                Some(memory)
            }
            None => None,
        };

        let (globals, global_types): (Vec<u64>, Vec<WasmType>) = parsed
            .globals
            .iter()
            .map(|g| match g.init_value {
                InitValue::I32(v) => (Value::I32(v).to_bits(), WasmType::I32),
                InitValue::I64(v) => (Value::I64(v).to_bits(), WasmType::I64),
            })
            .unzip();

        let mut instance = Self {
            module: Arc::clone(&module),
            memory,
            globals,
            global_types,
            options: options.clone(),
        };

        tracing::info!(
            memory_pages = instance.memory.as_ref().map_or(0, |m| m.page_count()),
            globals = instance.globals.len(),
            "instantiated module"
        );

        if let Some(start) = parsed.start {
            let local = start
                .checked_sub(parsed.num_imported_functions)
                .ok_or_else(|| anyhow!("start function {} is imported", start))?;
            instance
                .run(local, &[])
                .map_err(|trap| anyhow!("start function trapped: {}", trap))?;
        }

        Ok(instance)
    }

    /// The compiled module this instance runs.
    pub fn module(&self) -> &Arc<CompiledModule> {
        &self.module
    }

    /// Call an exported function by name.
    ///
    /// Arguments are checked against the function's signature before any
    /// code runs: a wrong count or type is an error, never a trap.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, InvokeError> {
        let (func_idx, signature) = self.resolve_function(name)?;

        if args.len() != signature.params.len() {
            return Err(InvokeError::ArityMismatch {
                name: name.to_string(),
                expected: signature.params.len(),
                got: args.len(),
            });
        }
        for (index, (arg, expected)) in args.iter().zip(&signature.params).enumerate() {
            if arg.ty() != *expected {
                return Err(InvokeError::TypeMismatch {
                    name: name.to_string(),
                    index,
                    expected: *expected,
                    got: arg.ty(),
                });
            }
        }

        tracing::debug!(export = name, args = args.len(), "invoking");
        let bits: Vec<u64> = args.iter().map(|a| a.to_bits()).collect();
        let result = self.run(func_idx, &bits).inspect_err(|trap| {
            tracing::warn!(export = name, %trap, "invocation trapped");
        })?;

        Ok(match (signature.result(), result) {
            (Some(ty), Some(bits)) => vec![Value::from_bits(ty, bits)],
            _ => Vec::new(),
        })
    }

    /// Signature of an exported function.
    pub fn func_signature(&self, name: &str) -> Result<FuncSignature, InvokeError> {
        self.resolve_function(name).map(|(_, sig)| sig)
    }

    /// An exported memory, by export name.
    pub fn memory(&self, name: &str) -> Option<&LinearMemory> {
        if self.exports_memory(name) {
            self.memory.as_ref()
        } else {
            None
        }
    }

    /// Mutable access to an exported memory, by export name.
    pub fn memory_mut(&mut self, name: &str) -> Option<&mut LinearMemory> {
        if self.exports_memory(name) {
            self.memory.as_mut()
        } else {
            None
        }
    }

    /// Current value of an exported global.
    pub fn global(&self, name: &str) -> Option<Value> {
        let export = self.module.parsed.export(name)?;
        if export.kind != ExportKind::Global {
            return None;
        }
        let idx = export.index as usize;
        let bits = *self.globals.get(idx)?;
        let ty = *self.global_types.get(idx)?;
        Some(Value::from_bits(ty, bits))
    }

    fn exports_memory(&self, name: &str) -> bool {
        self.module
            .parsed
            .export(name)
            .is_some_and(|e| e.kind == ExportKind::Memory && e.index == 0)
    }

    fn resolve_function(&self, name: &str) -> Result<(u32, FuncSignature), InvokeError> {
        let parsed = &self.module.parsed;
        let export = parsed
            .export(name)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        if export.kind != ExportKind::Func {
            return Err(InvokeError::NotAFunction {
                name: name.to_string(),
                kind: export.kind,
            });
        }
        let local = export
            .index
            .checked_sub(parsed.num_imported_functions)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        let signature = self
            .module
            .functions
            .get(local as usize)
            .map(|f| f.signature.clone())
            .ok_or_else(|| InvokeError::UnknownExport(name.to_string()))?;
        Ok((local, signature))
    }

    fn run(&mut self, func_idx: u32, args: &[u64]) -> Result<Option<u64>, WasmTrap> {
        let module = Arc::clone(&self.module);
        let mut machine = Machine::new(
            &module.functions,
            self.memory.as_mut(),
            &mut self.globals,
            self.options.fuel,
            self.options.max_call_depth,
        );
        machine.call(func_idx, args, 0)
    }
}
