//! IR type definitions.
//!
//! These types represent a register-based intermediate representation of
//! WebAssembly functions. Each Wasm instruction is translated to one or
//! more IR instructions over numbered registers (v0, v1, ...) instead of
//! an implicit stack, and structured control flow is lowered to basic
//! blocks joined by terminators.

use std::fmt;

use anyhow::{bail, Result};

/// Register identifier. Parameters and locals come first, then temporaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Unique identifier for a basic block. Also its index in `IrFunction::blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block_{}", self.0)
    }
}

/// Value types the interpreter executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmType {
    I32,
    I64,
}

impl fmt::Display for WasmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmType::I32 => write!(f, "i32"),
            WasmType::I64 => write!(f, "i64"),
        }
    }
}

impl WasmType {
    /// Convert wasmparser::ValType to our WasmType.
    pub fn from_wasmparser(vt: wasmparser::ValType) -> Result<Self> {
        use wasmparser::ValType;
        match vt {
            ValType::I32 => Ok(WasmType::I32),
            ValType::I64 => Ok(WasmType::I64),
            _ => bail!("unsupported value type: {:?}", vt),
        }
    }
}

/// Parameter and result types of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncSignature {
    pub params: Vec<WasmType>,
    pub results: Vec<WasmType>,
}

impl FuncSignature {
    /// Convert a wasmparser function type, rejecting unsupported value types
    /// and multi-value results.
    pub fn from_wasmparser(ty: &wasmparser::FuncType) -> Result<Self> {
        if ty.results().len() > 1 {
            bail!("multi-value results not supported");
        }
        let params = ty
            .params()
            .iter()
            .map(|vt| WasmType::from_wasmparser(*vt))
            .collect::<Result<Vec<_>>>()?;
        let results = ty
            .results()
            .iter()
            .map(|vt| WasmType::from_wasmparser(*vt))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { params, results })
    }

    /// Single result type, if any.
    pub fn result(&self) -> Option<WasmType> {
        self.results.first().copied()
    }
}

impl fmt::Display for FuncSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |tys: &[WasmType]| {
            tys.iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        write!(f, "[{}] -> [{}]", join(&self.params), join(&self.results))
    }
}

/// IR representation of a complete function.
#[derive(Debug, Clone)]
pub struct IrFunction {
    /// Parameter and result types.
    pub signature: FuncSignature,

    /// Declared locals after the parameters (zero-initialized on entry).
    pub locals: Vec<(VarId, WasmType)>,

    /// All basic blocks, indexed by `BlockId`.
    pub blocks: Vec<IrBlock>,

    /// Number of registers the function needs (params + locals + temporaries).
    pub num_vars: u32,
}

impl IrFunction {
    /// Entry block. Execution always starts at `BlockId(0)`.
    pub const ENTRY: BlockId = BlockId(0);

    /// Look up a block by id.
    pub fn block(&self, id: BlockId) -> Option<&IrBlock> {
        self.blocks.get(id.0 as usize)
    }
}

/// A basic block — sequence of instructions with a single entry and exit.
#[derive(Debug, Clone)]
pub struct IrBlock {
    /// Unique identifier for this block
    pub id: BlockId,

    /// Instructions in this block (no control flow within)
    pub instructions: Vec<IrInstr>,

    /// How control exits this block
    pub terminator: IrTerminator,
}

/// Width of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessWidth {
    /// Full type width (i32=4 bytes, i64=8 bytes)
    Full,
    /// 8-bit access
    I8,
    /// 16-bit access
    I16,
    /// 32-bit access (only valid for i64 loads/stores)
    I32,
}

/// Sign extension for sub-width loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignExtension {
    Signed,
    Unsigned,
}

/// A single IR instruction.
#[derive(Debug, Clone)]
pub enum IrInstr {
    /// Define a register from a constant value
    Const { dest: VarId, value: IrValue },

    /// Binary operation (dest = lhs op rhs)
    BinOp {
        dest: VarId,
        op: BinOp,
        lhs: VarId,
        rhs: VarId,
    },

    /// Unary operation (dest = op operand)
    UnOp {
        dest: VarId,
        op: UnOp,
        operand: VarId,
    },

    /// Memory load (dest = memory[addr + offset])
    Load {
        dest: VarId,
        ty: WasmType,
        addr: VarId,
        offset: u64,
        width: MemoryAccessWidth,
        sign: SignExtension,
    },

    /// Memory store (memory[addr + offset] = value), truncated to `width`
    Store {
        ty: WasmType,
        addr: VarId,
        value: VarId,
        offset: u64,
        width: MemoryAccessWidth,
    },

    /// Copy a register (local.get / local.set / local.tee, block results)
    Assign { dest: VarId, src: VarId },

    /// Read a global variable
    GlobalGet { dest: VarId, index: u32 },

    /// Write a mutable global variable
    GlobalSet { index: u32, value: VarId },

    /// Query current memory size in pages
    MemorySize { dest: VarId },

    /// Grow memory by delta pages; previous page count or -1
    MemoryGrow { dest: VarId, delta: VarId },

    /// Fill `len` bytes at `dst` with the low byte of `value`
    MemoryFill { dst: VarId, value: VarId, len: VarId },

    /// Copy `len` bytes from `src` to `dst` (memmove)
    MemoryCopy { dst: VarId, src: VarId, len: VarId },

    /// Conditional select (dest = if condition != 0 { val1 } else { val2 })
    Select {
        dest: VarId,
        val1: VarId,
        val2: VarId,
        condition: VarId,
    },

    /// Call a locally defined function (index already excludes imports)
    Call {
        dest: Option<VarId>,
        func_idx: u32,
        args: Vec<VarId>,
    },
}

/// Block terminator — how control flow exits a basic block.
#[derive(Debug, Clone)]
pub enum IrTerminator {
    /// Return from function
    Return { value: Option<VarId> },

    /// Unconditional jump to target block
    Jump { target: BlockId },

    /// Conditional branch
    BranchIf {
        condition: VarId,
        if_true: BlockId,
        if_false: BlockId,
    },

    /// Multi-way branch (for br_table)
    BranchTable {
        index: VarId,
        targets: Vec<BlockId>,
        default: BlockId,
    },

    /// Unreachable (trap)
    Unreachable,
}

/// Constant value in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrValue {
    I32(i32),
    I64(i64),
}

impl IrValue {
    /// Returns the WasmType of this constant value.
    pub fn wasm_type(&self) -> WasmType {
        match self {
            IrValue::I32(_) => WasmType::I32,
            IrValue::I64(_) => WasmType::I64,
        }
    }
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::I32(v) => write!(f, "{}i32", v),
            IrValue::I64(v) => write!(f, "{}i64", v),
        }
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // i32 operations
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // i32 comparisons
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    // i64 operations
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // i64 comparisons (result is i32)
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz,
    I32Extend8S,
    I32Extend16S,

    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Eqz,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
}
