//! Address type for linear image locations.
//!
//! An `Address` is an absolute location inside a loaded image. Its bit width
//! comes from the architecture that produced it and fixes both the valid
//! range and the wraparound rule for offset arithmetic. Addresses are values:
//! every transformation returns a new `Address`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::expression::Constant;

/// Errors produced when constructing an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("bits must be 16, 32, or 64 (got {0})")]
    InvalidWidth(u8),
    #[error("value {value:#x} exceeds maximum for {bits}-bit address")]
    OutOfRange { value: u64, bits: u8 },
}

/// A location reference inside a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The numeric value of the address
    pub value: u64,
    /// Bit width (16, 32, or 64)
    pub bits: u8,
}

fn mask_for(bits: u8) -> u64 {
    match bits {
        16 => 0xFFFF,
        32 => 0xFFFF_FFFF,
        _ => u64::MAX,
    }
}

impl Address {
    /// Create a new Address, validating the width and range.
    pub fn new(value: u64, bits: u8) -> Result<Self, AddressError> {
        if ![16, 32, 64].contains(&bits) {
            return Err(AddressError::InvalidWidth(bits));
        }
        if value > mask_for(bits) {
            return Err(AddressError::OutOfRange { value, bits });
        }
        Ok(Self { value, bits })
    }

    /// 16-bit address; high bits of `value` are discarded.
    pub fn ptr16(value: u16) -> Self {
        Self {
            value: value as u64,
            bits: 16,
        }
    }

    /// 32-bit address.
    pub fn ptr32(value: u32) -> Self {
        Self {
            value: value as u64,
            bits: 32,
        }
    }

    /// 64-bit address.
    pub fn ptr64(value: u64) -> Self {
        Self { value, bits: 64 }
    }

    /// Build an address of the given width from a folded constant,
    /// truncating to the width.
    pub fn from_constant(c: &Constant, bits: u8) -> Self {
        Self {
            value: c.value & mask_for(bits),
            bits,
        }
    }

    /// Add a signed offset, wrapping at the address width.
    pub fn add_offset(&self, offset: i64) -> Self {
        Self {
            value: self.value.wrapping_add(offset as u64) & mask_for(self.bits),
            bits: self.bits,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (self.bits as usize) / 4;
        write!(f, "{:0width$X}", self.value, width = digits)
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.bits.cmp(&other.bits))
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
