//! Wasm integer operations that require runtime checks.
//!
//! Integer division and remainder trap in Wasm where Rust would panic:
//! a zero divisor traps with `DivisionByZero`, and signed `MIN / -1`
//! traps with `IntegerOverflow`. `MIN rem -1` is defined as `0` and does
//! NOT trap, even though Rust's `checked_rem` reports `None` for it.
//!
//! `no_std` compatible: no alloc, no panics.

use crate::{WasmResult, WasmTrap};

/// Wasm `i32.div_s`.
pub fn i32_div_s(lhs: i32, rhs: i32) -> WasmResult<i32> {
    if rhs == 0 {
        return Err(WasmTrap::DivisionByZero);
    }
    lhs.checked_div(rhs).ok_or(WasmTrap::IntegerOverflow)
}

/// Wasm `i32.div_u`.
pub fn i32_div_u(lhs: i32, rhs: i32) -> WasmResult<i32> {
    (lhs as u32)
        .checked_div(rhs as u32)
        .map(|v| v as i32)
        .ok_or(WasmTrap::DivisionByZero)
}

/// Wasm `i32.rem_s`.
pub fn i32_rem_s(lhs: i32, rhs: i32) -> WasmResult<i32> {
    if rhs == 0 {
        return Err(WasmTrap::DivisionByZero);
    }
    Ok(lhs.wrapping_rem(rhs))
}

/// Wasm `i32.rem_u`.
pub fn i32_rem_u(lhs: i32, rhs: i32) -> WasmResult<i32> {
    (lhs as u32)
        .checked_rem(rhs as u32)
        .map(|v| v as i32)
        .ok_or(WasmTrap::DivisionByZero)
}

/// Wasm `i64.div_s`.
pub fn i64_div_s(lhs: i64, rhs: i64) -> WasmResult<i64> {
    if rhs == 0 {
        return Err(WasmTrap::DivisionByZero);
    }
    lhs.checked_div(rhs).ok_or(WasmTrap::IntegerOverflow)
}

/// Wasm `i64.div_u`.
pub fn i64_div_u(lhs: i64, rhs: i64) -> WasmResult<i64> {
    (lhs as u64)
        .checked_div(rhs as u64)
        .map(|v| v as i64)
        .ok_or(WasmTrap::DivisionByZero)
}

/// Wasm `i64.rem_s`.
pub fn i64_rem_s(lhs: i64, rhs: i64) -> WasmResult<i64> {
    if rhs == 0 {
        return Err(WasmTrap::DivisionByZero);
    }
    Ok(lhs.wrapping_rem(rhs))
}

/// Wasm `i64.rem_u`.
pub fn i64_rem_u(lhs: i64, rhs: i64) -> WasmResult<i64> {
    (lhs as u64)
        .checked_rem(rhs as u64)
        .map(|v| v as i64)
        .ok_or(WasmTrap::DivisionByZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── i32 ──────────────────────────────────────────────────────────────────

    #[test]
    fn i32_div_s_basic() {
        assert_eq!(i32_div_s(10, 3), Ok(3));
        assert_eq!(i32_div_s(-10, 3), Ok(-3));
    }

    #[test]
    fn i32_div_s_zero_divisor() {
        assert_eq!(i32_div_s(5, 0), Err(WasmTrap::DivisionByZero));
    }

    #[test]
    fn i32_div_s_min_over_neg_one() {
        assert_eq!(i32_div_s(i32::MIN, -1), Err(WasmTrap::IntegerOverflow));
    }

    #[test]
    fn i32_div_u_large() {
        // u32::MAX / 1 = u32::MAX, reinterpreted as i32 = -1
        assert_eq!(i32_div_u(-1, 1), Ok(-1));
        assert_eq!(i32_div_u(-1, 2), Ok(i32::MAX));
    }

    #[test]
    fn i32_rem_s_min_neg_one_is_zero() {
        assert_eq!(i32_rem_s(i32::MIN, -1), Ok(0));
        assert_eq!(i32_rem_s(-10, 3), Ok(-1));
    }

    #[test]
    fn i32_rem_u_zero_divisor() {
        assert_eq!(i32_rem_u(5, 0), Err(WasmTrap::DivisionByZero));
    }

    // ── i64 ──────────────────────────────────────────────────────────────────

    #[test]
    fn i64_div_s_min_over_neg_one() {
        assert_eq!(i64_div_s(i64::MIN, -1), Err(WasmTrap::IntegerOverflow));
        assert_eq!(i64_div_s(7, 0), Err(WasmTrap::DivisionByZero));
    }

    #[test]
    fn i64_rem_s_min_neg_one_is_zero() {
        assert_eq!(i64_rem_s(i64::MIN, -1), Ok(0));
    }

    #[test]
    fn i64_unsigned_ops() {
        assert_eq!(i64_div_u(-2, 2), Ok(i64::MAX));
        assert_eq!(i64_rem_u(10, 4), Ok(2));
        assert_eq!(i64_rem_u(10, 0), Err(WasmTrap::DivisionByZero));
    }
}
