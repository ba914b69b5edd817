//! Operator translation - converts WebAssembly operators to IR instructions.
//!
//! This module contains the `translate_operator` method and the emit helpers
//! that form the core of the Wasm-to-IR conversion logic.

use super::super::types::*;
use super::core::{BranchTarget, ControlKind, IrBuilder, ModuleContext};
use anyhow::{anyhow, bail, Result};
use wasmparser::{BlockType, Operator};

fn block_result(blockty: &BlockType) -> Result<Option<WasmType>> {
    match blockty {
        BlockType::Empty => Ok(None),
        BlockType::Type(vt) => Ok(Some(WasmType::from_wasmparser(*vt)?)),
        BlockType::FuncType(_) => bail!("multi-value blocks not supported"),
    }
}

impl IrBuilder {
    /// Translate a single Wasm operator to IR instructions.
    pub(super) fn translate_operator(&mut self, op: &Operator, ctx: &ModuleContext) -> Result<()> {
        if self.unreachable {
            return self.translate_dead_operator(op);
        }

        match op {
            // Constants
            Operator::I32Const { value } => self.emit_const(IrValue::I32(*value)),
            Operator::I64Const { value } => self.emit_const(IrValue::I64(*value)),

            // Local variable access. local.get copies so that a later
            // local.set cannot change a value already on the stack.
            Operator::LocalGet { local_index } => {
                let src = self.local(*local_index)?;
                let dest = self.new_var();
                self.emit(IrInstr::Assign { dest, src });
                self.value_stack.push(dest);
            }

            Operator::LocalSet { local_index } => {
                let src = self.pop("local.set")?;
                let dest = self.local(*local_index)?;
                self.emit(IrInstr::Assign { dest, src });
            }

            Operator::LocalTee { local_index } => {
                let src = self.peek("local.tee")?;
                let dest = self.local(*local_index)?;
                self.emit(IrInstr::Assign { dest, src });
            }

            // Global variable access
            Operator::GlobalGet { global_index } => {
                let dest = self.new_var();
                self.emit(IrInstr::GlobalGet {
                    dest,
                    index: *global_index,
                });
                self.value_stack.push(dest);
            }

            Operator::GlobalSet { global_index } => {
                let value = self.pop("global.set")?;
                self.emit(IrInstr::GlobalSet {
                    index: *global_index,
                    value,
                });
            }

            // === i32 binary operations ===
            Operator::I32Add => self.emit_binop(BinOp::I32Add)?,
            Operator::I32Sub => self.emit_binop(BinOp::I32Sub)?,
            Operator::I32Mul => self.emit_binop(BinOp::I32Mul)?,
            Operator::I32DivS => self.emit_binop(BinOp::I32DivS)?,
            Operator::I32DivU => self.emit_binop(BinOp::I32DivU)?,
            Operator::I32RemS => self.emit_binop(BinOp::I32RemS)?,
            Operator::I32RemU => self.emit_binop(BinOp::I32RemU)?,
            Operator::I32And => self.emit_binop(BinOp::I32And)?,
            Operator::I32Or => self.emit_binop(BinOp::I32Or)?,
            Operator::I32Xor => self.emit_binop(BinOp::I32Xor)?,
            Operator::I32Shl => self.emit_binop(BinOp::I32Shl)?,
            Operator::I32ShrS => self.emit_binop(BinOp::I32ShrS)?,
            Operator::I32ShrU => self.emit_binop(BinOp::I32ShrU)?,
            Operator::I32Rotl => self.emit_binop(BinOp::I32Rotl)?,
            Operator::I32Rotr => self.emit_binop(BinOp::I32Rotr)?,

            // i32 comparisons
            Operator::I32Eq => self.emit_binop(BinOp::I32Eq)?,
            Operator::I32Ne => self.emit_binop(BinOp::I32Ne)?,
            Operator::I32LtS => self.emit_binop(BinOp::I32LtS)?,
            Operator::I32LtU => self.emit_binop(BinOp::I32LtU)?,
            Operator::I32GtS => self.emit_binop(BinOp::I32GtS)?,
            Operator::I32GtU => self.emit_binop(BinOp::I32GtU)?,
            Operator::I32LeS => self.emit_binop(BinOp::I32LeS)?,
            Operator::I32LeU => self.emit_binop(BinOp::I32LeU)?,
            Operator::I32GeS => self.emit_binop(BinOp::I32GeS)?,
            Operator::I32GeU => self.emit_binop(BinOp::I32GeU)?,

            // i32 unary
            Operator::I32Eqz => self.emit_unop(UnOp::I32Eqz)?,
            Operator::I32Clz => self.emit_unop(UnOp::I32Clz)?,
            Operator::I32Ctz => self.emit_unop(UnOp::I32Ctz)?,
            Operator::I32Popcnt => self.emit_unop(UnOp::I32Popcnt)?,
            Operator::I32Extend8S => self.emit_unop(UnOp::I32Extend8S)?,
            Operator::I32Extend16S => self.emit_unop(UnOp::I32Extend16S)?,

            // === i64 binary operations ===
            Operator::I64Add => self.emit_binop(BinOp::I64Add)?,
            Operator::I64Sub => self.emit_binop(BinOp::I64Sub)?,
            Operator::I64Mul => self.emit_binop(BinOp::I64Mul)?,
            Operator::I64DivS => self.emit_binop(BinOp::I64DivS)?,
            Operator::I64DivU => self.emit_binop(BinOp::I64DivU)?,
            Operator::I64RemS => self.emit_binop(BinOp::I64RemS)?,
            Operator::I64RemU => self.emit_binop(BinOp::I64RemU)?,
            Operator::I64And => self.emit_binop(BinOp::I64And)?,
            Operator::I64Or => self.emit_binop(BinOp::I64Or)?,
            Operator::I64Xor => self.emit_binop(BinOp::I64Xor)?,
            Operator::I64Shl => self.emit_binop(BinOp::I64Shl)?,
            Operator::I64ShrS => self.emit_binop(BinOp::I64ShrS)?,
            Operator::I64ShrU => self.emit_binop(BinOp::I64ShrU)?,
            Operator::I64Rotl => self.emit_binop(BinOp::I64Rotl)?,
            Operator::I64Rotr => self.emit_binop(BinOp::I64Rotr)?,

            // i64 comparisons
            Operator::I64Eq => self.emit_binop(BinOp::I64Eq)?,
            Operator::I64Ne => self.emit_binop(BinOp::I64Ne)?,
            Operator::I64LtS => self.emit_binop(BinOp::I64LtS)?,
            Operator::I64LtU => self.emit_binop(BinOp::I64LtU)?,
            Operator::I64GtS => self.emit_binop(BinOp::I64GtS)?,
            Operator::I64GtU => self.emit_binop(BinOp::I64GtU)?,
            Operator::I64LeS => self.emit_binop(BinOp::I64LeS)?,
            Operator::I64LeU => self.emit_binop(BinOp::I64LeU)?,
            Operator::I64GeS => self.emit_binop(BinOp::I64GeS)?,
            Operator::I64GeU => self.emit_binop(BinOp::I64GeU)?,

            // i64 unary
            Operator::I64Eqz => self.emit_unop(UnOp::I64Eqz)?,
            Operator::I64Clz => self.emit_unop(UnOp::I64Clz)?,
            Operator::I64Ctz => self.emit_unop(UnOp::I64Ctz)?,
            Operator::I64Popcnt => self.emit_unop(UnOp::I64Popcnt)?,
            Operator::I64Extend8S => self.emit_unop(UnOp::I64Extend8S)?,
            Operator::I64Extend16S => self.emit_unop(UnOp::I64Extend16S)?,
            Operator::I64Extend32S => self.emit_unop(UnOp::I64Extend32S)?,

            // Conversions
            Operator::I32WrapI64 => self.emit_unop(UnOp::I32WrapI64)?,
            Operator::I64ExtendI32S => self.emit_unop(UnOp::I64ExtendI32S)?,
            Operator::I64ExtendI32U => self.emit_unop(UnOp::I64ExtendI32U)?,

            // === Memory loads ===
            Operator::I32Load { memarg } => self.emit_load(
                WasmType::I32,
                memarg.offset,
                MemoryAccessWidth::Full,
                SignExtension::Unsigned,
            )?,
            Operator::I64Load { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::Full,
                SignExtension::Unsigned,
            )?,
            Operator::I32Load8S { memarg } => self.emit_load(
                WasmType::I32,
                memarg.offset,
                MemoryAccessWidth::I8,
                SignExtension::Signed,
            )?,
            Operator::I32Load8U { memarg } => self.emit_load(
                WasmType::I32,
                memarg.offset,
                MemoryAccessWidth::I8,
                SignExtension::Unsigned,
            )?,
            Operator::I32Load16S { memarg } => self.emit_load(
                WasmType::I32,
                memarg.offset,
                MemoryAccessWidth::I16,
                SignExtension::Signed,
            )?,
            Operator::I32Load16U { memarg } => self.emit_load(
                WasmType::I32,
                memarg.offset,
                MemoryAccessWidth::I16,
                SignExtension::Unsigned,
            )?,
            Operator::I64Load8S { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I8,
                SignExtension::Signed,
            )?,
            Operator::I64Load8U { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I8,
                SignExtension::Unsigned,
            )?,
            Operator::I64Load16S { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I16,
                SignExtension::Signed,
            )?,
            Operator::I64Load16U { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I16,
                SignExtension::Unsigned,
            )?,
            Operator::I64Load32S { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I32,
                SignExtension::Signed,
            )?,
            Operator::I64Load32U { memarg } => self.emit_load(
                WasmType::I64,
                memarg.offset,
                MemoryAccessWidth::I32,
                SignExtension::Unsigned,
            )?,

            // === Memory stores ===
            Operator::I32Store { memarg } => {
                self.emit_store(WasmType::I32, memarg.offset, MemoryAccessWidth::Full)?
            }
            Operator::I64Store { memarg } => {
                self.emit_store(WasmType::I64, memarg.offset, MemoryAccessWidth::Full)?
            }
            Operator::I32Store8 { memarg } => {
                self.emit_store(WasmType::I32, memarg.offset, MemoryAccessWidth::I8)?
            }
            Operator::I32Store16 { memarg } => {
                self.emit_store(WasmType::I32, memarg.offset, MemoryAccessWidth::I16)?
            }
            Operator::I64Store8 { memarg } => {
                self.emit_store(WasmType::I64, memarg.offset, MemoryAccessWidth::I8)?
            }
            Operator::I64Store16 { memarg } => {
                self.emit_store(WasmType::I64, memarg.offset, MemoryAccessWidth::I16)?
            }
            Operator::I64Store32 { memarg } => {
                self.emit_store(WasmType::I64, memarg.offset, MemoryAccessWidth::I32)?
            }

            // === Memory management ===
            Operator::MemorySize { .. } => {
                let dest = self.new_var();
                self.emit(IrInstr::MemorySize { dest });
                self.value_stack.push(dest);
            }

            Operator::MemoryGrow { .. } => {
                let delta = self.pop("memory.grow")?;
                let dest = self.new_var();
                self.emit(IrInstr::MemoryGrow { dest, delta });
                self.value_stack.push(dest);
            }

            Operator::MemoryFill { .. } => {
                let len = self.pop("memory.fill length")?;
                let value = self.pop("memory.fill value")?;
                let dst = self.pop("memory.fill destination")?;
                self.emit(IrInstr::MemoryFill { dst, value, len });
            }

            Operator::MemoryCopy { .. } => {
                let len = self.pop("memory.copy length")?;
                let src = self.pop("memory.copy source")?;
                let dst = self.pop("memory.copy destination")?;
                self.emit(IrInstr::MemoryCopy { dst, src, len });
            }

            // === Parametric ===
            Operator::Nop => {}

            Operator::Drop => {
                self.pop("drop")?;
            }

            Operator::Select | Operator::TypedSelect { .. } => {
                let condition = self.pop("select condition")?;
                let val2 = self.pop("select operand")?;
                let val1 = self.pop("select operand")?;
                let dest = self.new_var();
                self.emit(IrInstr::Select {
                    dest,
                    val1,
                    val2,
                    condition,
                });
                self.value_stack.push(dest);
            }

            // === Control flow ===
            Operator::Unreachable => {
                self.terminate(IrTerminator::Unreachable);
            }

            Operator::Block { blockty } => {
                let result_type = block_result(blockty)?;
                let end_block = self.new_block();
                let start_block = self.current_block;
                self.push_control(ControlKind::Block, start_block, end_block, None, result_type);
            }

            Operator::Loop { blockty } => {
                let result_type = block_result(blockty)?;

                // Loop: start block is the loop header (for backward branches)
                let loop_header = self.new_block();
                let end_block = self.new_block();
                self.terminate(IrTerminator::Jump {
                    target: loop_header,
                });
                self.start_block(loop_header);
                self.push_control(ControlKind::Loop, loop_header, end_block, None, result_type);
            }

            Operator::If { blockty } => {
                let result_type = block_result(blockty)?;
                let condition = self.pop("if condition")?;

                let then_block = self.new_block();
                let else_block = self.new_block();
                let end_block = self.new_block();

                self.terminate(IrTerminator::BranchIf {
                    condition,
                    if_true: then_block,
                    if_false: else_block,
                });
                self.start_block(then_block);
                self.push_control(
                    ControlKind::If,
                    then_block,
                    end_block,
                    Some(else_block),
                    result_type,
                );
            }

            Operator::Else => self.translate_else()?,

            Operator::End => self.translate_end()?,

            Operator::Br { relative_depth } => {
                self.emit_branch(*relative_depth)?;
            }

            Operator::BrIf { relative_depth } => {
                let condition = self.pop("br_if condition")?;
                let continue_block = self.new_block();
                let target = match self.branch_target(*relative_depth)? {
                    BranchTarget::Block { block, result_var } => {
                        if let Some(result_var) = result_var {
                            let src = self.peek("br_if value")?;
                            self.emit(IrInstr::Assign {
                                dest: result_var,
                                src,
                            });
                        }
                        block
                    }
                    BranchTarget::Return => {
                        let value = self.return_value(false)?;
                        let return_block = self.new_block();
                        if let Some(block) = self.blocks.get_mut(return_block.0 as usize) {
                            block.terminator = IrTerminator::Return { value };
                        }
                        return_block
                    }
                };

                self.terminate(IrTerminator::BranchIf {
                    condition,
                    if_true: target,
                    if_false: continue_block,
                });
                self.start_block(continue_block);
            }

            Operator::BrTable { targets } => {
                let index = self.pop("br_table index")?;
                let depths = targets
                    .targets()
                    .collect::<Result<Vec<u32>, _>>()
                    .map_err(|e| anyhow!("reading br_table targets: {}", e))?;

                let mut target_blocks = Vec::with_capacity(depths.len());
                for depth in depths {
                    target_blocks.push(self.table_target(depth)?);
                }
                let default = self.table_target(targets.default())?;

                self.terminate(IrTerminator::BranchTable {
                    index,
                    targets: target_blocks,
                    default,
                });
            }

            Operator::Return => {
                let value = self.return_value(true)?;
                self.terminate(IrTerminator::Return { value });
            }

            Operator::Call { function_index } => {
                let local_idx = function_index
                    .checked_sub(ctx.num_imported_functions)
                    .ok_or_else(|| {
                        anyhow!(
                            "calls to imported functions are not supported (function {})",
                            function_index
                        )
                    })?;
                let signature = ctx
                    .func_signatures
                    .get(local_idx as usize)
                    .ok_or_else(|| anyhow!("call to unknown function {}", function_index))?;
                let param_count = signature.params.len();
                let has_result = signature.result().is_some();

                if self.value_stack.len() < param_count {
                    bail!("stack underflow for call to function {}", function_index);
                }
                let args = self
                    .value_stack
                    .split_off(self.value_stack.len() - param_count);

                let dest = has_result.then(|| self.new_var());
                self.emit(IrInstr::Call {
                    dest,
                    func_idx: local_idx,
                    args,
                });
                if let Some(d) = dest {
                    self.value_stack.push(d);
                }
            }

            _ => bail!("unsupported operator: {:?}", op),
        }

        Ok(())
    }

    /// Operators in unreachable code only matter for frame bookkeeping.
    fn translate_dead_operator(&mut self, op: &Operator) -> Result<()> {
        match op {
            Operator::Block { .. } | Operator::Loop { .. } | Operator::If { .. } => {
                self.dead_depth += 1;
            }
            Operator::Else if self.dead_depth == 0 => self.translate_else()?,
            Operator::End if self.dead_depth > 0 => self.dead_depth -= 1,
            Operator::End => self.translate_end()?,
            _ => {}
        }
        Ok(())
    }

    fn translate_else(&mut self) -> Result<()> {
        let if_frame = self.pop_control()?;
        if if_frame.kind != ControlKind::If {
            bail!("else without matching if");
        }
        let else_block = if_frame
            .else_block
            .ok_or_else(|| anyhow!("if frame missing else block"))?;

        // Then branch: assign result and fall through to end
        if !self.unreachable {
            if let Some(result_var) = if_frame.result_var {
                let src = self.pop("if result")?;
                self.emit(IrInstr::Assign {
                    dest: result_var,
                    src,
                });
            }
            self.terminate(IrTerminator::Jump {
                target: if_frame.end_block,
            });
        }
        self.value_stack.truncate(if_frame.stack_height);

        self.start_block(else_block);
        self.control_stack.push(super::core::ControlFrame {
            kind: ControlKind::Else,
            start_block: else_block,
            end_block: if_frame.end_block,
            else_block: None,
            result_var: if_frame.result_var,
            stack_height: if_frame.stack_height,
        });
        Ok(())
    }

    fn translate_end(&mut self) -> Result<()> {
        let frame = self.pop_control()?;

        if frame.kind == ControlKind::Function {
            // End of function - implicit return
            if !self.unreachable {
                let value = self.return_value(true)?;
                self.terminate(IrTerminator::Return { value });
            }
            return Ok(());
        }

        if !self.unreachable {
            if let Some(result_var) = frame.result_var {
                let src = self.pop("block result")?;
                self.emit(IrInstr::Assign {
                    dest: result_var,
                    src,
                });
            }
            self.terminate(IrTerminator::Jump {
                target: frame.end_block,
            });
        }
        self.value_stack.truncate(frame.stack_height);

        // An if without else: the false edge goes straight to the end.
        if frame.kind == ControlKind::If {
            if let Some(else_block) = frame.else_block {
                if let Some(block) = self.blocks.get_mut(else_block.0 as usize) {
                    block.terminator = IrTerminator::Jump {
                        target: frame.end_block,
                    };
                }
            }
        }

        self.start_block(frame.end_block);
        if let Some(result_var) = frame.result_var {
            self.value_stack.push(result_var);
        }
        Ok(())
    }

    fn local(&self, index: u32) -> Result<VarId> {
        self.local_vars
            .get(index as usize)
            .copied()
            .ok_or_else(|| anyhow!("local index {} out of range", index))
    }

    fn emit_const(&mut self, value: IrValue) {
        let dest = self.new_var();
        self.emit(IrInstr::Const { dest, value });
        self.value_stack.push(dest);
    }

    fn emit_binop(&mut self, op: BinOp) -> Result<()> {
        let rhs = self.pop("binary operand")?;
        let lhs = self.pop("binary operand")?;
        let dest = self.new_var();
        self.emit(IrInstr::BinOp { dest, op, lhs, rhs });
        self.value_stack.push(dest);
        Ok(())
    }

    fn emit_unop(&mut self, op: UnOp) -> Result<()> {
        let operand = self.pop("unary operand")?;
        let dest = self.new_var();
        self.emit(IrInstr::UnOp { dest, op, operand });
        self.value_stack.push(dest);
        Ok(())
    }

    fn emit_load(
        &mut self,
        ty: WasmType,
        offset: u64,
        width: MemoryAccessWidth,
        sign: SignExtension,
    ) -> Result<()> {
        let addr = self.pop("load address")?;
        let dest = self.new_var();
        self.emit(IrInstr::Load {
            dest,
            ty,
            addr,
            offset,
            width,
            sign,
        });
        self.value_stack.push(dest);
        Ok(())
    }

    fn emit_store(&mut self, ty: WasmType, offset: u64, width: MemoryAccessWidth) -> Result<()> {
        let value = self.pop("store value")?;
        let addr = self.pop("store address")?;
        self.emit(IrInstr::Store {
            ty,
            addr,
            value,
            offset,
            width,
        });
        Ok(())
    }

    /// Unconditional branch (`br`).
    fn emit_branch(&mut self, depth: u32) -> Result<()> {
        match self.branch_target(depth)? {
            BranchTarget::Block { block, result_var } => {
                if let Some(result_var) = result_var {
                    let src = self.pop("br value")?;
                    self.emit(IrInstr::Assign {
                        dest: result_var,
                        src,
                    });
                }
                self.terminate(IrTerminator::Jump { target: block });
            }
            BranchTarget::Return => {
                let value = self.return_value(true)?;
                self.terminate(IrTerminator::Return { value });
            }
        }
        Ok(())
    }

    /// Resolve one `br_table` entry to a block. The carried value (if any)
    /// is assigned to the target's result register up front; a branch to
    /// the function frame goes through a dedicated return block.
    fn table_target(&mut self, depth: u32) -> Result<BlockId> {
        match self.branch_target(depth)? {
            BranchTarget::Block { block, result_var } => {
                if let Some(result_var) = result_var {
                    let src = self.peek("br_table value")?;
                    self.emit(IrInstr::Assign {
                        dest: result_var,
                        src,
                    });
                }
                Ok(block)
            }
            BranchTarget::Return => {
                let value = self.return_value(false)?;
                let return_block = self.new_block();
                if let Some(block) = self.blocks.get_mut(return_block.0 as usize) {
                    block.terminator = IrTerminator::Return { value };
                }
                Ok(return_block)
            }
        }
    }
}
