//! Decoded machine instructions.
//!
//! Each architecture has its own instruction type; they all share the
//! `MachineInstruction` view so generic code can print them and map them
//! back to image bytes.

use std::fmt;

use crate::core::address::Address;

/// An immutable, architecture-specific decoded instruction.
pub trait MachineInstruction: fmt::Display + fmt::Debug {
    /// Address of the first byte of the instruction
    fn address(&self) -> Address;

    /// Encoded length in bytes
    fn length(&self) -> usize;

    fn mnemonic(&self) -> &str;

    /// Address of the byte following the instruction.
    fn next_address(&self) -> Address {
        self.address().add_offset(self.length() as i64)
    }
}

impl MachineInstruction for Box<dyn MachineInstruction> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn length(&self) -> usize {
        (**self).length()
    }

    fn mnemonic(&self) -> &str {
        (**self).mnemonic()
    }
}
