//! Core IR builder state and control flow management.
//!
//! This module contains the `IrBuilder` state machine that translates Wasm
//! bytecode to register IR by simulating the Wasm evaluation stack.

use super::super::types::*;
use anyhow::{anyhow, Context, Result};

/// Control flow frame for tracking nested blocks/loops/if.
#[derive(Debug, Clone)]
pub(super) struct ControlFrame {
    /// Kind of control structure
    pub(super) kind: ControlKind,

    /// Start block (where loop branches return to)
    pub(super) start_block: BlockId,

    /// End block (where forward branches go to)
    pub(super) end_block: BlockId,

    /// Else block (for If constructs - where the false branch goes)
    pub(super) else_block: Option<BlockId>,

    /// Result register, when the frame produces a value
    pub(super) result_var: Option<VarId>,

    /// Value stack height when the frame was entered
    pub(super) stack_height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ControlKind {
    Function, // Branches return from the function
    Block,    // Forward branches only
    Loop,     // Backward branch to start
    If,       // Conditional with possible else
    Else,     // Else branch of if
}

/// Where a branch to a given depth goes.
#[derive(Debug, Clone, Copy)]
pub(super) enum BranchTarget {
    /// Jump to a block, assigning the carried value (if any) to `result_var` first.
    Block {
        block: BlockId,
        result_var: Option<VarId>,
    },
    /// Return from the function.
    Return,
}

/// Module-level context for function translation.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Signatures of locally defined functions, in local index order.
    pub func_signatures: Vec<FuncSignature>,

    /// Number of imported functions (these occupy indices 0..N-1 in the
    /// function index space, before local functions).
    pub num_imported_functions: u32,
}

/// IR builder state.
pub struct IrBuilder {
    /// All blocks created so far, indexed by `BlockId`
    pub(super) blocks: Vec<IrBlock>,

    /// Current block being built
    pub(super) current_block: BlockId,

    /// Next register to allocate
    pub(super) next_var_id: u32,

    /// Wasm value stack (registers instead of actual values)
    pub(super) value_stack: Vec<VarId>,

    /// Control flow stack for nested blocks/loops/if
    pub(super) control_stack: Vec<ControlFrame>,

    /// Mapping from Wasm local index to register.
    pub(super) local_vars: Vec<VarId>,

    /// Result type of the function being translated
    pub(super) return_type: Option<WasmType>,

    /// True after br/br_table/return/unreachable until the enclosing
    /// frame's else/end.
    pub(super) unreachable: bool,

    /// Block/loop/if frames opened inside unreachable code.
    pub(super) dead_depth: u32,
}

impl IrBuilder {
    /// Create a new IR builder.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current_block: BlockId(0),
            next_var_id: 0,
            value_stack: Vec::new(),
            control_stack: Vec::new(),
            local_vars: Vec::new(),
            return_type: None,
            unreachable: false,
            dead_depth: 0,
        }
    }

    /// Allocate a new register.
    pub(super) fn new_var(&mut self) -> VarId {
        let id = VarId(self.next_var_id);
        self.next_var_id += 1;
        id
    }

    /// Allocate a new basic block. It stays empty (terminated by
    /// `Unreachable`) until something is emitted into it.
    pub(super) fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(IrBlock {
            id,
            instructions: Vec::new(),
            terminator: IrTerminator::Unreachable,
        });
        id
    }

    /// Switch emission to `block_id`. Code there is reachable again.
    pub(super) fn start_block(&mut self, block_id: BlockId) {
        self.current_block = block_id;
        self.unreachable = false;
    }

    /// Emit an instruction to the current block.
    pub(super) fn emit(&mut self, instr: IrInstr) {
        if let Some(block) = self.blocks.get_mut(self.current_block.0 as usize) {
            block.instructions.push(instr);
        }
    }

    /// Set the terminator for the current block. Following code is
    /// unreachable until a new block is started.
    pub(super) fn terminate(&mut self, term: IrTerminator) {
        if let Some(block) = self.blocks.get_mut(self.current_block.0 as usize) {
            block.terminator = term;
        }
        self.unreachable = true;
    }

    pub(super) fn pop(&mut self, what: &str) -> Result<VarId> {
        self.value_stack
            .pop()
            .ok_or_else(|| anyhow!("stack underflow for {}", what))
    }

    pub(super) fn peek(&self, what: &str) -> Result<VarId> {
        self.value_stack
            .last()
            .copied()
            .ok_or_else(|| anyhow!("stack underflow for {}", what))
    }

    /// Translate a function from Wasm bytecode to IR.
    pub fn translate_function(
        &mut self,
        signature: &FuncSignature,
        locals: &[wasmparser::ValType],
        body: &[u8],
        module_ctx: &ModuleContext,
    ) -> Result<IrFunction> {
        // Reset per-function state so each function starts fresh
        self.blocks.clear();
        self.value_stack.clear();
        self.control_stack.clear();
        self.local_vars.clear();
        self.next_var_id = 0;
        self.unreachable = false;
        self.dead_depth = 0;
        self.return_type = signature.result();

        // Parameters first, then declared locals: local_index maps straight
        // to its register.
        for _ in &signature.params {
            let var = self.new_var();
            self.local_vars.push(var);
        }
        let mut func_locals = Vec::with_capacity(locals.len());
        for vt in locals {
            let ty = WasmType::from_wasmparser(*vt)?;
            let var = self.new_var();
            self.local_vars.push(var);
            func_locals.push((var, ty));
        }

        // First block allocated, so the entry is BlockId(0).
        let entry = self.new_block();
        self.start_block(entry);
        self.control_stack.push(ControlFrame {
            kind: ControlKind::Function,
            start_block: entry,
            end_block: entry,
            else_block: None,
            result_var: None,
            stack_height: 0,
        });

        let mut reader = wasmparser::BinaryReader::new(body, 0);
        while !reader.eof() {
            let op = reader.read_operator().context("failed to read operator")?;
            self.translate_operator(&op, module_ctx)
                .with_context(|| format!("translating operator {:?}", op))?;
        }

        if !self.control_stack.is_empty() {
            anyhow::bail!("function body ended with unclosed blocks");
        }

        Ok(IrFunction {
            signature: signature.clone(),
            locals: func_locals,
            blocks: std::mem::take(&mut self.blocks),
            num_vars: self.next_var_id,
        })
    }

    /// Push a control frame onto the control stack.
    pub(super) fn push_control(
        &mut self,
        kind: ControlKind,
        start_block: BlockId,
        end_block: BlockId,
        else_block: Option<BlockId>,
        result_type: Option<WasmType>,
    ) {
        let result_var = result_type.map(|_| self.new_var());
        let stack_height = self.value_stack.len();
        self.control_stack.push(ControlFrame {
            kind,
            start_block,
            end_block,
            else_block,
            result_var,
            stack_height,
        });
    }

    /// Pop a control frame from the control stack.
    pub(super) fn pop_control(&mut self) -> Result<ControlFrame> {
        self.control_stack
            .pop()
            .ok_or_else(|| anyhow!("control stack underflow"))
    }

    /// Resolve the branch target for relative depth N.
    ///
    /// Depth 0 = innermost frame. Loops branch back to their start and
    /// carry no value; blocks/if branch forward to their end.
    pub(super) fn branch_target(&self, depth: u32) -> Result<BranchTarget> {
        let frame_idx = self
            .control_stack
            .len()
            .checked_sub(depth as usize + 1)
            .ok_or_else(|| {
                anyhow!(
                    "branch depth {} exceeds control stack depth {}",
                    depth,
                    self.control_stack.len()
                )
            })?;

        let frame = &self.control_stack[frame_idx];
        Ok(match frame.kind {
            ControlKind::Function => BranchTarget::Return,
            ControlKind::Loop => BranchTarget::Block {
                block: frame.start_block,
                result_var: None,
            },
            _ => BranchTarget::Block {
                block: frame.end_block,
                result_var: frame.result_var,
            },
        })
    }

    /// Value returned by a branch to the function frame.
    pub(super) fn return_value(&mut self, consume: bool) -> Result<Option<VarId>> {
        if self.return_type.is_none() {
            return Ok(None);
        }
        let value = if consume {
            self.pop("return value")?
        } else {
            self.peek("return value")?
        };
        Ok(Some(value))
    }
}

impl Default for IrBuilder {
    fn default() -> Self {
        Self::new()
    }
}
