//! IR interpreter.
//!
//! Executes `IrFunction`s over a flat register file. Registers hold raw
//! 64-bit patterns; i32 values live in the low 32 bits and every i32
//! operation re-truncates, so stale upper bits are never observed.
//!
//! Every instruction and every terminator costs one unit of fuel when a
//! budget is set.

mod value;
pub use value::Value;

use demorun_runtime::{ops, LinearMemory, WasmResult, WasmTrap};

use crate::ir::{
    BinOp, IrFunction, IrInstr, IrTerminator, IrValue, MemoryAccessWidth, SignExtension, UnOp,
    VarId, WasmType,
};

/// Execution state for one host invocation.
pub struct Machine<'a> {
    functions: &'a [IrFunction],
    memory: Option<&'a mut LinearMemory>,
    globals: &'a mut [u64],
    fuel: Option<u64>,
    max_call_depth: usize,
}

impl<'a> Machine<'a> {
    pub fn new(
        functions: &'a [IrFunction],
        memory: Option<&'a mut LinearMemory>,
        globals: &'a mut [u64],
        fuel: Option<u64>,
        max_call_depth: usize,
    ) -> Self {
        Self {
            functions,
            memory,
            globals,
            fuel,
            max_call_depth,
        }
    }

    /// Fuel left, if a budget was set.
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.fuel
    }

    /// Call local function `func_idx` with register-encoded arguments.
    pub fn call(&mut self, func_idx: u32, args: &[u64], depth: usize) -> WasmResult<Option<u64>> {
        if depth >= self.max_call_depth {
            return Err(WasmTrap::CallStackExhausted);
        }
        let functions = self.functions;
        let func = functions
            .get(func_idx as usize)
            .ok_or(WasmTrap::Unreachable)?;

        let mut regs = vec![0u64; func.num_vars as usize];
        for (reg, arg) in regs.iter_mut().zip(args) {
            *reg = *arg;
        }

        let mut block_id = IrFunction::ENTRY;
        loop {
            let block = func.block(block_id).ok_or(WasmTrap::Unreachable)?;
            for instr in &block.instructions {
                self.consume_fuel()?;
                self.execute(instr, &mut regs, depth)?;
            }

            self.consume_fuel()?;
            block_id = match &block.terminator {
                IrTerminator::Return { value } => {
                    return Ok(value.map(|v| regs[v.0 as usize]));
                }
                IrTerminator::Jump { target } => *target,
                IrTerminator::BranchIf {
                    condition,
                    if_true,
                    if_false,
                } => {
                    if i32_reg(&regs, *condition) != 0 {
                        *if_true
                    } else {
                        *if_false
                    }
                }
                IrTerminator::BranchTable {
                    index,
                    targets,
                    default,
                } => {
                    let i = i32_reg(&regs, *index) as u32 as usize;
                    targets.get(i).copied().unwrap_or(*default)
                }
                IrTerminator::Unreachable => return Err(WasmTrap::Unreachable),
            };
        }
    }

    fn consume_fuel(&mut self) -> WasmResult<()> {
        if let Some(fuel) = self.fuel.as_mut() {
            *fuel = fuel.checked_sub(1).ok_or(WasmTrap::FuelExhausted)?;
        }
        Ok(())
    }

    fn memory(&mut self) -> WasmResult<&mut LinearMemory> {
        self.memory.as_deref_mut().ok_or(WasmTrap::OutOfBounds)
    }

    fn execute(&mut self, instr: &IrInstr, regs: &mut [u64], depth: usize) -> WasmResult<()> {
        match instr {
            IrInstr::Const { dest, value } => {
                regs[dest.0 as usize] = match value {
                    IrValue::I32(v) => *v as u32 as u64,
                    IrValue::I64(v) => *v as u64,
                };
            }

            IrInstr::BinOp { dest, op, lhs, rhs } => {
                regs[dest.0 as usize] = binop(*op, regs[lhs.0 as usize], regs[rhs.0 as usize])?;
            }

            IrInstr::UnOp { dest, op, operand } => {
                regs[dest.0 as usize] = unop(*op, regs[operand.0 as usize]);
            }

            IrInstr::Load {
                dest,
                ty,
                addr,
                offset,
                width,
                sign,
            } => {
                let ea = effective_address(regs, *addr, *offset)?;
                let mem = self.memory()?;
                let signed = *sign == SignExtension::Signed;
                let value: i64 = match width {
                    MemoryAccessWidth::Full => match ty {
                        WasmType::I32 => mem.load_i32(ea)? as u32 as i64,
                        WasmType::I64 => mem.load_i64(ea)?,
                    },
                    MemoryAccessWidth::I8 => {
                        let b = mem.load_u8(ea)?;
                        if signed {
                            b as i8 as i64
                        } else {
                            b as i64
                        }
                    }
                    MemoryAccessWidth::I16 => {
                        let h = mem.load_u16(ea)?;
                        if signed {
                            h as i16 as i64
                        } else {
                            h as i64
                        }
                    }
                    MemoryAccessWidth::I32 => {
                        let w = mem.load_u32(ea)?;
                        if signed {
                            w as i32 as i64
                        } else {
                            w as i64
                        }
                    }
                };
                regs[dest.0 as usize] = match ty {
                    WasmType::I32 => value as u32 as u64,
                    WasmType::I64 => value as u64,
                };
            }

            IrInstr::Store {
                ty,
                addr,
                value,
                offset,
                width,
            } => {
                let ea = effective_address(regs, *addr, *offset)?;
                let bits = regs[value.0 as usize];
                let mem = self.memory()?;
                match (width, ty) {
                    (MemoryAccessWidth::Full, WasmType::I32) => mem.store_i32(ea, bits as i32)?,
                    (MemoryAccessWidth::Full, WasmType::I64) => mem.store_i64(ea, bits as i64)?,
                    (MemoryAccessWidth::I8, _) => mem.store_u8(ea, bits as u8)?,
                    (MemoryAccessWidth::I16, _) => mem.store_u16(ea, bits as u16)?,
                    (MemoryAccessWidth::I32, _) => mem.store_u32(ea, bits as u32)?,
                }
            }

            IrInstr::Assign { dest, src } => {
                regs[dest.0 as usize] = regs[src.0 as usize];
            }

            IrInstr::GlobalGet { dest, index } => {
                regs[dest.0 as usize] = *self
                    .globals
                    .get(*index as usize)
                    .ok_or(WasmTrap::Unreachable)?;
            }

            IrInstr::GlobalSet { index, value } => {
                let slot = self
                    .globals
                    .get_mut(*index as usize)
                    .ok_or(WasmTrap::Unreachable)?;
                *slot = regs[value.0 as usize];
            }

            IrInstr::MemorySize { dest } => {
                let size = self.memory()?.size();
                regs[dest.0 as usize] = size as u32 as u64;
            }

            IrInstr::MemoryGrow { dest, delta } => {
                let delta = i32_reg(regs, *delta) as u32;
                let old = self.memory()?.grow(delta);
                regs[dest.0 as usize] = old as u32 as u64;
            }

            IrInstr::MemoryFill { dst, value, len } => {
                let dst = i32_reg(regs, *dst) as u32;
                let value = i32_reg(regs, *value);
                let len = i32_reg(regs, *len) as u32;
                self.memory()?.fill(dst, value, len)?;
            }

            IrInstr::MemoryCopy { dst, src, len } => {
                let dst = i32_reg(regs, *dst) as u32;
                let src = i32_reg(regs, *src) as u32;
                let len = i32_reg(regs, *len) as u32;
                self.memory()?.copy(dst, src, len)?;
            }

            IrInstr::Select {
                dest,
                val1,
                val2,
                condition,
            } => {
                let chosen = if i32_reg(regs, *condition) != 0 {
                    val1
                } else {
                    val2
                };
                regs[dest.0 as usize] = regs[chosen.0 as usize];
            }

            IrInstr::Call {
                dest,
                func_idx,
                args,
            } => {
                let arg_bits: Vec<u64> = args.iter().map(|a| regs[a.0 as usize]).collect();
                let result = self.call(*func_idx, &arg_bits, depth + 1)?;
                if let (Some(dest), Some(result)) = (dest, result) {
                    regs[dest.0 as usize] = result;
                }
            }
        }
        Ok(())
    }
}

#[inline(always)]
fn i32_reg(regs: &[u64], var: VarId) -> i32 {
    regs[var.0 as usize] as u32 as i32
}

/// Address operand (unsigned i32) plus static offset. Never wraps.
fn effective_address(regs: &[u64], addr: VarId, offset: u64) -> WasmResult<usize> {
    let base = regs[addr.0 as usize] as u32 as u64;
    let ea = base.checked_add(offset).ok_or(WasmTrap::OutOfBounds)?;
    usize::try_from(ea).map_err(|_| WasmTrap::OutOfBounds)
}

fn bool_bits(b: bool) -> u64 {
    b as u64
}

fn binop(op: BinOp, lhs: u64, rhs: u64) -> WasmResult<u64> {
    let (a32, b32) = (lhs as u32 as i32, rhs as u32 as i32);
    let (a64, b64) = (lhs as i64, rhs as i64);
    let i32_bits = |v: i32| v as u32 as u64;
    let i64_bits = |v: i64| v as u64;

    Ok(match op {
        BinOp::I32Add => i32_bits(a32.wrapping_add(b32)),
        BinOp::I32Sub => i32_bits(a32.wrapping_sub(b32)),
        BinOp::I32Mul => i32_bits(a32.wrapping_mul(b32)),
        BinOp::I32DivS => i32_bits(ops::i32_div_s(a32, b32)?),
        BinOp::I32DivU => i32_bits(ops::i32_div_u(a32, b32)?),
        BinOp::I32RemS => i32_bits(ops::i32_rem_s(a32, b32)?),
        BinOp::I32RemU => i32_bits(ops::i32_rem_u(a32, b32)?),
        BinOp::I32And => i32_bits(a32 & b32),
        BinOp::I32Or => i32_bits(a32 | b32),
        BinOp::I32Xor => i32_bits(a32 ^ b32),
        BinOp::I32Shl => i32_bits(a32.wrapping_shl(b32 as u32)),
        BinOp::I32ShrS => i32_bits(a32.wrapping_shr(b32 as u32)),
        BinOp::I32ShrU => i32_bits((a32 as u32).wrapping_shr(b32 as u32) as i32),
        BinOp::I32Rotl => i32_bits(a32.rotate_left(b32 as u32)),
        BinOp::I32Rotr => i32_bits(a32.rotate_right(b32 as u32)),

        BinOp::I32Eq => bool_bits(a32 == b32),
        BinOp::I32Ne => bool_bits(a32 != b32),
        BinOp::I32LtS => bool_bits(a32 < b32),
        BinOp::I32LtU => bool_bits((a32 as u32) < (b32 as u32)),
        BinOp::I32GtS => bool_bits(a32 > b32),
        BinOp::I32GtU => bool_bits((a32 as u32) > (b32 as u32)),
        BinOp::I32LeS => bool_bits(a32 <= b32),
        BinOp::I32LeU => bool_bits((a32 as u32) <= (b32 as u32)),
        BinOp::I32GeS => bool_bits(a32 >= b32),
        BinOp::I32GeU => bool_bits((a32 as u32) >= (b32 as u32)),

        BinOp::I64Add => i64_bits(a64.wrapping_add(b64)),
        BinOp::I64Sub => i64_bits(a64.wrapping_sub(b64)),
        BinOp::I64Mul => i64_bits(a64.wrapping_mul(b64)),
        BinOp::I64DivS => i64_bits(ops::i64_div_s(a64, b64)?),
        BinOp::I64DivU => i64_bits(ops::i64_div_u(a64, b64)?),
        BinOp::I64RemS => i64_bits(ops::i64_rem_s(a64, b64)?),
        BinOp::I64RemU => i64_bits(ops::i64_rem_u(a64, b64)?),
        BinOp::I64And => i64_bits(a64 & b64),
        BinOp::I64Or => i64_bits(a64 | b64),
        BinOp::I64Xor => i64_bits(a64 ^ b64),
        BinOp::I64Shl => i64_bits(a64.wrapping_shl(b64 as u32)),
        BinOp::I64ShrS => i64_bits(a64.wrapping_shr(b64 as u32)),
        BinOp::I64ShrU => (a64 as u64).wrapping_shr(b64 as u32),
        BinOp::I64Rotl => i64_bits(a64.rotate_left((b64 & 63) as u32)),
        BinOp::I64Rotr => i64_bits(a64.rotate_right((b64 & 63) as u32)),

        BinOp::I64Eq => bool_bits(a64 == b64),
        BinOp::I64Ne => bool_bits(a64 != b64),
        BinOp::I64LtS => bool_bits(a64 < b64),
        BinOp::I64LtU => bool_bits((a64 as u64) < (b64 as u64)),
        BinOp::I64GtS => bool_bits(a64 > b64),
        BinOp::I64GtU => bool_bits((a64 as u64) > (b64 as u64)),
        BinOp::I64LeS => bool_bits(a64 <= b64),
        BinOp::I64LeU => bool_bits((a64 as u64) <= (b64 as u64)),
        BinOp::I64GeS => bool_bits(a64 >= b64),
        BinOp::I64GeU => bool_bits((a64 as u64) >= (b64 as u64)),
    })
}

fn unop(op: UnOp, operand: u64) -> u64 {
    let a32 = operand as u32 as i32;
    let a64 = operand as i64;
    let i32_bits = |v: i32| v as u32 as u64;

    match op {
        UnOp::I32Clz => a32.leading_zeros() as u64,
        UnOp::I32Ctz => a32.trailing_zeros() as u64,
        UnOp::I32Popcnt => a32.count_ones() as u64,
        UnOp::I32Eqz => bool_bits(a32 == 0),
        UnOp::I32Extend8S => i32_bits(a32 as i8 as i32),
        UnOp::I32Extend16S => i32_bits(a32 as i16 as i32),

        UnOp::I64Clz => a64.leading_zeros() as u64,
        UnOp::I64Ctz => a64.trailing_zeros() as u64,
        UnOp::I64Popcnt => a64.count_ones() as u64,
        UnOp::I64Eqz => bool_bits(a64 == 0),
        UnOp::I64Extend8S => a64 as i8 as i64 as u64,
        UnOp::I64Extend16S => a64 as i16 as i64 as u64,
        UnOp::I64Extend32S => a64 as i32 as i64 as u64,

        UnOp::I32WrapI64 => a64 as u32 as u64,
        UnOp::I64ExtendI32S => a32 as i64 as u64,
        UnOp::I64ExtendI32U => a32 as u32 as u64,
    }
}
