//! WebAssembly module parser.
//!
//! This module wraps the `wasmparser` crate to validate a `.wasm` binary and
//! extract the sections the interpreter needs.

use anyhow::{bail, Context, Result};
use wasmparser::{ExternalKind, FuncType, Parser, Payload, TypeRef, ValType, Validator};

/// Memory information from the Wasm module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Initial size in pages (64 KiB each)
    pub initial_pages: u32,

    /// Maximum size in pages (None = unlimited, up to the host's cap)
    pub maximum_pages: Option<u32>,
}

/// Information about a single Wasm global variable.
#[derive(Debug, Clone)]
pub struct GlobalInfo {
    /// The value type of the global.
    pub val_type: ValType,
    /// Whether the global is mutable.
    pub mutable: bool,
    /// The constant initializer value.
    pub init_value: InitValue,
}

/// Parsed constant initializer expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitValue {
    I32(i32),
    I64(i64),
}

/// An active data segment to initialize memory.
#[derive(Debug, Clone)]
pub struct DataSegment {
    /// Byte offset into memory 0 (from the i32.const in the offset expression).
    pub offset: u32,
    /// Raw data bytes to copy into memory at instantiation.
    pub data: Vec<u8>,
}

/// An export from the Wasm module.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// The exported name.
    pub name: String,
    /// What kind of item is exported.
    pub kind: ExportKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// Kind of export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
    Tag,
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportKind::Func => "function",
            ExportKind::Table => "table",
            ExportKind::Memory => "memory",
            ExportKind::Global => "global",
            ExportKind::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// An import from the Wasm module.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// The import module name (e.g., "env").
    pub module_name: String,
    /// The import field name (e.g., "log").
    pub name: String,
    /// What kind of item is imported.
    pub kind: ExportKind,
}

/// Parsed WebAssembly module.
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    /// Type section: function signatures
    pub types: Vec<FuncType>,

    /// Locally defined functions, in function index order after imports
    pub functions: Vec<ParsedFunction>,

    /// Memory 0, when defined by the module itself
    pub memory: Option<MemoryInfo>,

    /// Global variables defined by the module
    pub globals: Vec<GlobalInfo>,

    /// Active data segments for memory initialization
    pub data_segments: Vec<DataSegment>,

    /// Exports
    pub exports: Vec<ExportInfo>,

    /// Imports from the host environment
    pub imports: Vec<ImportInfo>,

    /// Number of imported functions (these occupy indices 0..N-1 in the
    /// function index space, before local functions).
    pub num_imported_functions: u32,

    /// Start function index, run once at instantiation.
    pub start: Option<u32>,
}

impl ParsedModule {
    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<&ExportInfo> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Signature of the function at `func_idx` in the full function index space.
    pub fn func_type(&self, func_idx: u32) -> Option<&FuncType> {
        let local = func_idx.checked_sub(self.num_imported_functions)?;
        let func = self.functions.get(local as usize)?;
        self.types.get(func.type_idx as usize)
    }
}

/// A single function in the module.
#[derive(Debug, Clone)]
pub struct ParsedFunction {
    /// Index into the types section
    pub type_idx: u32,

    /// Local variable types (parameters are in the function type)
    pub locals: Vec<ValType>,

    /// Function body (Wasm bytecode)
    pub body: Vec<u8>,
}

/// Evaluate a wasmparser ConstExpr into our InitValue.
fn eval_const_expr(const_expr: wasmparser::ConstExpr) -> Result<InitValue> {
    let mut reader = const_expr.get_operators_reader();
    let op = reader.read().context("reading const expr operator")?;
    match op {
        wasmparser::Operator::I32Const { value } => Ok(InitValue::I32(value)),
        wasmparser::Operator::I64Const { value } => Ok(InitValue::I64(value)),
        _ => bail!("unsupported const expression operator: {:?}", op),
    }
}

/// Parse an active data segment, or return None for passive segments.
fn parse_data_segment(data: wasmparser::Data) -> Result<Option<DataSegment>> {
    match data.kind {
        wasmparser::DataKind::Active {
            memory_index: 0,
            offset_expr,
        } => {
            let offset = match eval_const_expr(offset_expr)? {
                InitValue::I32(v) => v as u32,
                _ => bail!("data segment offset must be i32"),
            };
            Ok(Some(DataSegment {
                offset,
                data: data.data.to_vec(),
            }))
        }
        // Passive segments are only reachable through memory.init.
        wasmparser::DataKind::Passive => Ok(None),
        wasmparser::DataKind::Active { memory_index, .. } => {
            bail!(
                "multi-memory data segments not supported (memory_index={})",
                memory_index
            );
        }
    }
}

/// Parse a function code section entry, extracting locals and bytecode.
fn parse_code_entry(body: wasmparser::FunctionBody, type_idx: u32) -> Result<ParsedFunction> {
    let mut locals = Vec::new();
    let locals_reader = body.get_locals_reader().context("getting locals reader")?;
    for local in locals_reader {
        let (count, val_type) = local.context("reading local")?;
        for _ in 0..count {
            locals.push(val_type);
        }
    }

    // Keep operators as raw bytes; the IR builder decodes them.
    let operators_reader = body
        .get_operators_reader()
        .context("getting operators reader")?;
    let mut binary_reader = operators_reader.get_binary_reader();
    let remaining = binary_reader.bytes_remaining();
    let body_bytes = binary_reader
        .read_bytes(remaining)
        .context("reading body bytes")?;

    Ok(ParsedFunction {
        type_idx,
        locals,
        body: body_bytes.to_vec(),
    })
}

fn export_kind(kind: ExternalKind) -> ExportKind {
    match kind {
        ExternalKind::Func => ExportKind::Func,
        ExternalKind::Table => ExportKind::Table,
        ExternalKind::Memory => ExportKind::Memory,
        ExternalKind::Global => ExportKind::Global,
        ExternalKind::Tag => ExportKind::Tag,
    }
}

/// Validate and parse a WebAssembly binary into a structured module.
pub fn parse_wasm(wasm_bytes: &[u8]) -> Result<ParsedModule> {
    Validator::new()
        .validate_all(wasm_bytes)
        .context("module failed validation")?;

    let mut module = ParsedModule::default();
    let mut function_types: Vec<u32> = Vec::new();

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        if let wasmparser::CompositeInnerType::Func(func_ty) =
                            &sub_type.composite_type.inner
                        {
                            module.types.push(func_ty.clone());
                        }
                    }
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    let kind = match import.ty {
                        TypeRef::Func(_) => {
                            module.num_imported_functions += 1;
                            ExportKind::Func
                        }
                        TypeRef::Global(_) => ExportKind::Global,
                        TypeRef::Memory(_) => ExportKind::Memory,
                        TypeRef::Table(_) => ExportKind::Table,
                        TypeRef::Tag(_) => ExportKind::Tag,
                    };
                    module.imports.push(ImportInfo {
                        module_name: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }

            Payload::FunctionSection(reader) => {
                for func_type_idx in reader {
                    function_types.push(func_type_idx.context("reading function type index")?);
                }
            }

            Payload::CodeSectionEntry(body) => {
                let type_idx = *function_types
                    .get(module.functions.len())
                    .context("code entry without a matching function declaration")?;
                module.functions.push(parse_code_entry(body, type_idx)?);
            }

            Payload::MemorySection(reader) => {
                for mem in reader {
                    let memory_type = mem.context("reading memory type")?;
                    if module.memory.is_some() {
                        bail!("multiple memories not supported");
                    }
                    if memory_type.memory64 || memory_type.shared {
                        bail!("64-bit and shared memories not supported");
                    }
                    module.memory = Some(MemoryInfo {
                        initial_pages: memory_type.initial as u32,
                        maximum_pages: memory_type.maximum.map(|m| m as u32),
                    });
                }
            }

            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global.context("reading global")?;
                    module.globals.push(GlobalInfo {
                        val_type: global.ty.content_type,
                        mutable: global.ty.mutable,
                        init_value: eval_const_expr(global.init_expr)
                            .context("evaluating global initializer")?,
                    });
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    module.exports.push(ExportInfo {
                        name: export.name.to_string(),
                        kind: export_kind(export.kind),
                        index: export.index,
                    });
                }
            }

            Payload::StartSection { func, .. } => {
                module.start = Some(func);
            }

            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data.context("reading data segment")?;
                    if let Some(segment) = parse_data_segment(data)? {
                        module.data_segments.push(segment);
                    }
                }
            }

            _ => {}
        }
    }

    Ok(module)
}
