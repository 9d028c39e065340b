//! Disassembler trait and error types for instruction decoding.
//!
//! A disassembler owns an `ImageReader` and turns the bytes under its cursor
//! into one machine instruction per call. Decoding is a pure function of the
//! architecture, the address and the bytes.

use std::marker::PhantomData;

use crate::core::address::Address;
use crate::core::image::ImageReader;
use crate::core::instruction::MachineInstruction;

/// Errors that can occur during disassembly operations.
///
/// A decoder peeks every byte it needs before advancing, so running off the
/// end of the image mid-instruction is reported as `MalformedInstruction` at
/// the instruction's first byte, with the reader left there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisassemblerError {
    /// The bytes at `address` are not a valid instruction, or the image ends
    /// before the instruction does.
    #[error("malformed instruction at {address}")]
    MalformedInstruction { address: Address },
}

impl DisassemblerError {
    pub fn malformed(address: Address) -> Self {
        DisassemblerError::MalformedInstruction { address }
    }
}

/// Result type for disassembly operations
pub type DisassemblerResult<T> = Result<T, DisassemblerError>;

/// Core disassembler trait shared by all architectures.
pub trait Disassembler<'a> {
    type Instruction: MachineInstruction;

    /// Decode one instruction at the reader's cursor and advance past it.
    /// On failure the cursor does not move.
    fn disassemble_instruction(&mut self) -> DisassemblerResult<Self::Instruction>;

    fn reader(&self) -> &ImageReader<'a>;

    /// Get a human-readable name for this disassembler
    fn name(&self) -> &str {
        "Generic Disassembler"
    }
}

/// Iterator over the instructions of a disassembler.
///
/// Stops at end of image. A decoding error is yielded once and ends the
/// iteration.
pub struct Instructions<'a, D> {
    dasm: D,
    done: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a, D> Instructions<'a, D> {
    pub fn new(dasm: D) -> Self {
        Self {
            dasm,
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<'a, D: Disassembler<'a>> Iterator for Instructions<'a, D> {
    type Item = DisassemblerResult<D::Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.dasm.reader().is_at_end() {
            return None;
        }
        let r = self.dasm.disassemble_instruction();
        if r.is_err() {
            self.done = true;
        }
        Some(r)
    }
}
