//! 6502 instruction decoder covering the documented opcodes.

use tracing::trace;

use crate::arch::mos6502::instruction::{AddressMode, Mnemonic, Mos6502Instruction, Operand};
use crate::core::disassembler::{Disassembler, DisassemblerError, DisassemblerResult};
use crate::core::image::ImageReader;

pub struct Mos6502Disassembler<'a> {
    rdr: ImageReader<'a>,
}

/// Opcodes whose low two bits are `01` share one layout: the top three bits
/// select the operation and bits 2..5 the addressing mode.
fn decode_group_one(op: u8) -> Option<(Mnemonic, AddressMode)> {
    use AddressMode::*;
    const OPS: [Mnemonic; 8] = [
        Mnemonic::Ora,
        Mnemonic::And,
        Mnemonic::Eor,
        Mnemonic::Adc,
        Mnemonic::Sta,
        Mnemonic::Lda,
        Mnemonic::Cmp,
        Mnemonic::Sbc,
    ];
    const MODES: [AddressMode; 8] = [
        IndexedIndirect,
        ZeroPage,
        Immediate,
        Absolute,
        IndirectIndexed,
        ZeroPageX,
        AbsoluteY,
        AbsoluteX,
    ];
    // sta #imm
    if op == 0x89 {
        return None;
    }
    Some((OPS[(op >> 5) as usize], MODES[((op >> 2) & 7) as usize]))
}

/// Mnemonic and addressing mode of a documented opcode.
pub fn decode_opcode(op: u8) -> Option<(Mnemonic, AddressMode)> {
    use AddressMode::*;
    use Mnemonic::*;
    if op & 3 == 1 {
        return decode_group_one(op);
    }
    let d = match op {
        0x00 => (Brk, Implied),
        0x08 => (Php, Implied),
        0x10 => (Bpl, Relative),
        0x18 => (Clc, Implied),
        0x20 => (Jsr, Absolute),
        0x24 => (Bit, ZeroPage),
        0x28 => (Plp, Implied),
        0x2C => (Bit, Absolute),
        0x30 => (Bmi, Relative),
        0x38 => (Sec, Implied),
        0x40 => (Rti, Implied),
        0x48 => (Pha, Implied),
        0x4C => (Jmp, Absolute),
        0x50 => (Bvc, Relative),
        0x58 => (Cli, Implied),
        0x60 => (Rts, Implied),
        0x68 => (Pla, Implied),
        0x6C => (Jmp, Indirect),
        0x70 => (Bvs, Relative),
        0x78 => (Sei, Implied),
        0x84 => (Sty, ZeroPage),
        0x88 => (Dey, Implied),
        0x8C => (Sty, Absolute),
        0x90 => (Bcc, Relative),
        0x94 => (Sty, ZeroPageX),
        0x98 => (Tya, Implied),
        0xA0 => (Ldy, Immediate),
        0xA4 => (Ldy, ZeroPage),
        0xA8 => (Tay, Implied),
        0xAC => (Ldy, Absolute),
        0xB0 => (Bcs, Relative),
        0xB4 => (Ldy, ZeroPageX),
        0xB8 => (Clv, Implied),
        0xBC => (Ldy, AbsoluteX),
        0xC0 => (Cpy, Immediate),
        0xC4 => (Cpy, ZeroPage),
        0xC8 => (Iny, Implied),
        0xCC => (Cpy, Absolute),
        0xD0 => (Bne, Relative),
        0xD8 => (Cld, Implied),
        0xE0 => (Cpx, Immediate),
        0xE4 => (Cpx, ZeroPage),
        0xE8 => (Inx, Implied),
        0xEC => (Cpx, Absolute),
        0xF0 => (Beq, Relative),
        0xF8 => (Sed, Implied),

        0x06 => (Asl, ZeroPage),
        0x0A => (Asl, Accumulator),
        0x0E => (Asl, Absolute),
        0x16 => (Asl, ZeroPageX),
        0x1E => (Asl, AbsoluteX),
        0x26 => (Rol, ZeroPage),
        0x2A => (Rol, Accumulator),
        0x2E => (Rol, Absolute),
        0x36 => (Rol, ZeroPageX),
        0x3E => (Rol, AbsoluteX),
        0x46 => (Lsr, ZeroPage),
        0x4A => (Lsr, Accumulator),
        0x4E => (Lsr, Absolute),
        0x56 => (Lsr, ZeroPageX),
        0x5E => (Lsr, AbsoluteX),
        0x66 => (Ror, ZeroPage),
        0x6A => (Ror, Accumulator),
        0x6E => (Ror, Absolute),
        0x76 => (Ror, ZeroPageX),
        0x7E => (Ror, AbsoluteX),
        0x86 => (Stx, ZeroPage),
        0x8A => (Txa, Implied),
        0x8E => (Stx, Absolute),
        0x96 => (Stx, ZeroPageY),
        0x9A => (Txs, Implied),
        0xA2 => (Ldx, Immediate),
        0xA6 => (Ldx, ZeroPage),
        0xAA => (Tax, Implied),
        0xAE => (Ldx, Absolute),
        0xB6 => (Ldx, ZeroPageY),
        0xBA => (Tsx, Implied),
        0xBE => (Ldx, AbsoluteY),
        0xC6 => (Dec, ZeroPage),
        0xCA => (Dex, Implied),
        0xCE => (Dec, Absolute),
        0xD6 => (Dec, ZeroPageX),
        0xDE => (Dec, AbsoluteX),
        0xE6 => (Inc, ZeroPage),
        0xEA => (Nop, Implied),
        0xEE => (Inc, Absolute),
        0xF6 => (Inc, ZeroPageX),
        0xFE => (Inc, AbsoluteX),
        _ => return None,
    };
    Some(d)
}

impl<'a> Mos6502Disassembler<'a> {
    pub fn new(rdr: ImageReader<'a>) -> Self {
        Self { rdr }
    }

    pub fn into_reader(self) -> ImageReader<'a> {
        self.rdr
    }
}

impl<'a> Disassembler<'a> for Mos6502Disassembler<'a> {
    type Instruction = Mos6502Instruction;

    fn disassemble_instruction(&mut self) -> DisassemblerResult<Mos6502Instruction> {
        let addr = self.rdr.address();
        let op = self
            .rdr
            .peek_u8(0)
            .map_err(|_| DisassemblerError::malformed(addr))?;
        let Some((mnemonic, mode)) = decode_opcode(op) else {
            trace!(address = %addr, opcode = op, "undocumented 6502 opcode");
            return Err(DisassemblerError::malformed(addr));
        };
        let value = match mode.length() {
            1 => Ok(0),
            2 => self.rdr.peek_u8(1).map(u16::from),
            _ => self.rdr.peek_u16(1),
        };
        let Ok(value) = value else {
            trace!(address = %addr, remaining = self.rdr.remaining(), "truncated 6502 instruction");
            return Err(DisassemblerError::malformed(addr));
        };
        let value = if mode == AddressMode::Relative {
            addr.add_offset(2 + (value as u8 as i8) as i64).value as u16
        } else {
            value
        };
        self.rdr
            .read_bytes(mode.length())
            .map_err(|_| DisassemblerError::malformed(addr))?;
        Ok(Mos6502Instruction {
            address: addr,
            mnemonic,
            operand: Operand { mode, value },
        })
    }

    fn reader(&self) -> &ImageReader<'a> {
        &self.rdr
    }

    fn name(&self) -> &str {
        "m6502"
    }
}
