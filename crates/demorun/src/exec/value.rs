//! Host-visible Wasm values.

use std::fmt;

use crate::ir::WasmType;

/// A typed value passed to or returned from an exported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    I32(i32),
    I64(i64),
}

impl Value {
    pub fn ty(&self) -> WasmType {
        match self {
            Value::I32(_) => WasmType::I32,
            Value::I64(_) => WasmType::I64,
        }
    }

    /// Register encoding: i32 values are zero-extended to 64 bits.
    pub(crate) fn to_bits(self) -> u64 {
        match self {
            Value::I32(v) => v as u32 as u64,
            Value::I64(v) => v as u64,
        }
    }

    pub(crate) fn from_bits(ty: WasmType, bits: u64) -> Self {
        match ty {
            WasmType::I32 => Value::I32(bits as u32 as i32),
            WasmType::I64 => Value::I64(bits as i64),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}:i32", v),
            Value::I64(v) => write!(f, "{}:i64", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_i32_is_zero_extended() {
        let bits = Value::I32(-1).to_bits();
        assert_eq!(bits, 0xFFFF_FFFF);
        assert_eq!(Value::from_bits(WasmType::I32, bits), Value::I32(-1));
    }

    #[test]
    fn i64_bits_roundtrip() {
        let v = Value::I64(i64::MIN);
        assert_eq!(Value::from_bits(WasmType::I64, v.to_bits()), v);
        assert_eq!(v.as_i32(), None);
        assert_eq!(v.to_string(), format!("{}:i64", i64::MIN));
    }
}
