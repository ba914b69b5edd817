//! WebAssembly linear memory — `LinearMemory`.
//!
//! The backing store is a heap buffer that always holds exactly the active
//! pages. `grow` extends it with zeroed pages up to `max_pages`, so every
//! byte a module can observe has been either zero-initialized or written by
//! the module or the host.
//!
//! Every access is bounds-checked against the active size. Range checks use
//! `checked_add` so a 32-bit address plus offset can never wrap into bounds.

use alloc::vec;
use alloc::vec::Vec;

use crate::{ConstructionError, WasmResult, WasmTrap, PAGE_SIZE};

/// Linear memory owned by a single module instance.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    /// Active bytes. Length is always `page_count * PAGE_SIZE`.
    bytes: Vec<u8>,
    /// Upper bound for `grow`, in pages.
    max_pages: usize,
}

impl LinearMemory {
    /// Create a new zero-filled memory with `initial_pages` active.
    ///
    /// # Errors
    /// Returns `ConstructionError::MemoryInitialPagesExceedsMax` if
    /// `initial_pages > max_pages`.
    pub fn try_new(initial_pages: usize, max_pages: usize) -> Result<Self, ConstructionError> {
        if initial_pages > max_pages {
            return Err(ConstructionError::MemoryInitialPagesExceedsMax {
                initial: initial_pages,
                max: max_pages,
            });
        }
        Ok(Self {
            bytes: vec![0u8; initial_pages * PAGE_SIZE],
            max_pages,
        })
    }

    /// Current number of active pages.
    #[inline(always)]
    pub fn page_count(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    /// Maximum number of pages this memory may grow to.
    #[inline(always)]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Current active size in bytes.
    #[inline(always)]
    pub fn active_size(&self) -> usize {
        self.bytes.len()
    }

    /// Wasm `memory.grow` — returns previous page count, or -1 on failure.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.page_count();
        let new = match old.checked_add(delta as usize) {
            Some(new) if new <= self.max_pages => new,
            _ => return -1,
        };
        // New pages start zeroed.
        self.bytes.resize(new * PAGE_SIZE, 0);
        old as i32
    }

    /// Wasm `memory.size` — returns current page count.
    #[inline(always)]
    pub fn size(&self) -> i32 {
        self.page_count() as i32
    }

    // ── Bulk memory operations ────────────────────────────────────────

    /// Wasm `memory.fill` — write the low byte of `value` over `len` bytes
    /// starting at `dst`.
    ///
    /// The whole range is checked before anything is written: a fill that
    /// would run past the active size traps and leaves memory untouched.
    pub fn fill(&mut self, dst: u32, value: i32, len: u32) -> WasmResult<()> {
        let active = self.active_size();
        let region = checked_slice_mut(&mut self.bytes, active, dst as usize, len as usize)?;
        region.fill(value as u8);
        Ok(())
    }

    /// Wasm `memory.copy` — copy `len` bytes from `src` to `dst`.
    ///
    /// Semantics match `memmove`: overlapping source and destination regions
    /// are handled correctly. Traps (`OutOfBounds`) if either region extends
    /// beyond the current active memory.
    pub fn copy(&mut self, dst: u32, src: u32, len: u32) -> WasmResult<()> {
        let active = self.active_size();
        let dst = dst as usize;
        let src = src as usize;
        let len = len as usize;
        if src.checked_add(len).is_none_or(|end| end > active)
            || dst.checked_add(len).is_none_or(|end| end > active)
        {
            return Err(WasmTrap::OutOfBounds);
        }
        self.bytes.copy_within(src..src + len, dst);
        Ok(())
    }

    // ── Bounds-checked load/store ─────────────────────────────────────

    /// Load an i32 from linear memory with bounds checking.
    pub fn load_i32(&self, offset: usize) -> WasmResult<i32> {
        Ok(i32::from_le_bytes(self.read_array(offset)?))
    }

    /// Load an i64 from linear memory with bounds checking.
    pub fn load_i64(&self, offset: usize) -> WasmResult<i64> {
        Ok(i64::from_le_bytes(self.read_array(offset)?))
    }

    /// Load a u8 (`load8_u`) from linear memory with bounds checking.
    pub fn load_u8(&self, offset: usize) -> WasmResult<u8> {
        Ok(u8::from_le_bytes(self.read_array(offset)?))
    }

    /// Load a u16 (`load16_u`) from linear memory with bounds checking.
    pub fn load_u16(&self, offset: usize) -> WasmResult<u16> {
        Ok(u16::from_le_bytes(self.read_array(offset)?))
    }

    /// Load a u32 (`i64.load32_u`) from linear memory with bounds checking.
    pub fn load_u32(&self, offset: usize) -> WasmResult<u32> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }

    /// Store an i32 into linear memory with bounds checking.
    pub fn store_i32(&mut self, offset: usize, value: i32) -> WasmResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Store an i64 into linear memory with bounds checking.
    pub fn store_i64(&mut self, offset: usize, value: i64) -> WasmResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Store a u8 (`store8`) into linear memory with bounds checking.
    pub fn store_u8(&mut self, offset: usize, value: u8) -> WasmResult<()> {
        self.write_bytes(offset, &[value])
    }

    /// Store a u16 (`store16`) into linear memory with bounds checking.
    pub fn store_u16(&mut self, offset: usize, value: u16) -> WasmResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Store a u32 (`i64.store32`) into linear memory with bounds checking.
    pub fn store_u32(&mut self, offset: usize, value: u32) -> WasmResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Initialize a region of memory from a byte slice (Wasm data segment).
    ///
    /// # Errors
    /// Returns `Err(WasmTrap::OutOfBounds)` if `offset + data.len()` exceeds
    /// the active size. Nothing is written in that case.
    pub fn init_data(&mut self, offset: usize, data: &[u8]) -> WasmResult<()> {
        self.write_bytes(offset, data)
    }

    /// Read-only access to the active memory region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the active memory region.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn read_array<const N: usize>(&self, offset: usize) -> WasmResult<[u8; N]> {
        let s = checked_slice(&self.bytes, self.active_size(), offset, N)?;
        s.try_into().map_err(|_| WasmTrap::OutOfBounds)
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> WasmResult<()> {
        let active = self.active_size();
        let dst = checked_slice_mut(&mut self.bytes, active, offset, data.len())?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Bounds-check and return the sub-slice `memory[offset..offset+len]`.
/// Returns `Err(OutOfBounds)` on overflow or out-of-range — never panics.
#[inline(always)]
fn checked_slice(
    memory: &[u8],
    active_bytes: usize,
    offset: usize,
    len: usize,
) -> WasmResult<&[u8]> {
    let end = offset.checked_add(len).ok_or(WasmTrap::OutOfBounds)?;
    if end > active_bytes {
        return Err(WasmTrap::OutOfBounds);
    }
    memory.get(offset..end).ok_or(WasmTrap::OutOfBounds)
}

/// Mutable variant of `checked_slice`.
#[inline(always)]
fn checked_slice_mut(
    memory: &mut [u8],
    active_bytes: usize,
    offset: usize,
    len: usize,
) -> WasmResult<&mut [u8]> {
    let end = offset.checked_add(len).ok_or(WasmTrap::OutOfBounds)?;
    if end > active_bytes {
        return Err(WasmTrap::OutOfBounds);
    }
    memory.get_mut(offset..end).ok_or(WasmTrap::OutOfBounds)
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────
//
// Run with: cargo kani -p demorun-runtime
//
// The proofs establish that:
// - fill and load/store either succeed or return Err (never panic)
// - a failed fill writes nothing
// - grow respects max_pages

#[cfg(kani)]
mod proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(1)]
    fn load_i32_never_panics() {
        let mem = LinearMemory::try_new(1, 1).unwrap();
        let offset: usize = kani::any();
        let result = mem.load_i32(offset);
        if result.is_ok() {
            kani::assert(
                offset.checked_add(4).is_some_and(|end| end <= mem.active_size()),
                "successful load must be within active region",
            );
        }
    }

    #[kani::proof]
    #[kani::unwind(1)]
    fn fill_failure_writes_nothing() {
        let mut mem = LinearMemory::try_new(1, 1).unwrap();
        let dst: u32 = kani::any();
        let len: u32 = kani::any();
        kani::assume(dst as usize + len as usize > PAGE_SIZE);
        let result = mem.fill(dst, 0xFF, len);
        kani::assert(result == Err(WasmTrap::OutOfBounds), "fill past end traps");
        kani::assert(mem.load_u8(0) == Ok(0), "failed fill leaves memory untouched");
    }

    #[kani::proof]
    #[kani::unwind(3)]
    fn grow_respects_max_pages() {
        let mut mem = LinearMemory::try_new(1, 2).unwrap();
        let delta: u32 = kani::any();
        let result = mem.grow(delta);
        kani::assert(mem.page_count() <= 2, "page count must not exceed max_pages");
        if result < 0 {
            kani::assert(mem.page_count() == 1, "failed grow leaves pages unchanged");
        }
    }
}
