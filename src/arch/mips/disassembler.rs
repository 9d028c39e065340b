//! MIPS32 instruction decoder.

use tracing::trace;

use crate::arch::mips::instruction::{MipsInstruction, MipsOperand, Opcode};
use crate::core::address::Address;
use crate::core::disassembler::{Disassembler, DisassemblerError, DisassemblerResult};
use crate::core::image::ImageReader;

pub struct MipsDisassembler<'a> {
    rdr: ImageReader<'a>,
}

fn reg(n: u32) -> MipsOperand {
    MipsOperand::Register(n as u8)
}

fn simm(w: u32) -> i32 {
    (w & 0xFFFF) as u16 as i16 as i32
}

impl<'a> MipsDisassembler<'a> {
    pub fn new(rdr: ImageReader<'a>) -> Self {
        Self { rdr }
    }

    pub fn into_reader(self) -> ImageReader<'a> {
        self.rdr
    }

    /// Decode the word `w` found at `addr`.
    pub fn decode(addr: Address, w: u32) -> Option<MipsInstruction> {
        let rs = (w >> 21) & 0x1F;
        let rt = (w >> 16) & 0x1F;
        let rd = (w >> 11) & 0x1F;
        let sa = (w >> 6) & 0x1F;
        let branch_target = || {
            MipsOperand::Address(addr.add_offset(4 + ((simm(w) as i64) << 2)))
        };
        let mem = || MipsOperand::Memory {
            base: rs as u8,
            offset: simm(w) as i16,
        };

        let (opcode, operands) = match w >> 26 {
            0x00 => match w & 0x3F {
                0x00 if w == 0 => (Opcode::Nop, vec![]),
                0x00 => (Opcode::Sll, vec![reg(rd), reg(rt), MipsOperand::UnsignedImmediate(sa)]),
                0x02 => (Opcode::Srl, vec![reg(rd), reg(rt), MipsOperand::UnsignedImmediate(sa)]),
                0x03 => (Opcode::Sra, vec![reg(rd), reg(rt), MipsOperand::UnsignedImmediate(sa)]),
                0x04 => (Opcode::Sllv, vec![reg(rd), reg(rt), reg(rs)]),
                0x06 => (Opcode::Srlv, vec![reg(rd), reg(rt), reg(rs)]),
                0x07 => (Opcode::Srav, vec![reg(rd), reg(rt), reg(rs)]),
                0x08 => (Opcode::Jr, vec![reg(rs)]),
                0x09 => (Opcode::Jalr, vec![reg(rd), reg(rs)]),
                0x0C => (Opcode::Syscall, vec![]),
                0x0D => (Opcode::Break, vec![]),
                0x10 => (Opcode::Mfhi, vec![reg(rd)]),
                0x11 => (Opcode::Mthi, vec![reg(rs)]),
                0x12 => (Opcode::Mflo, vec![reg(rd)]),
                0x13 => (Opcode::Mtlo, vec![reg(rs)]),
                0x18 => (Opcode::Mult, vec![reg(rs), reg(rt)]),
                0x19 => (Opcode::Multu, vec![reg(rs), reg(rt)]),
                0x1A => (Opcode::Div, vec![reg(rs), reg(rt)]),
                0x1B => (Opcode::Divu, vec![reg(rs), reg(rt)]),
                0x20 => (Opcode::Add, vec![reg(rd), reg(rs), reg(rt)]),
                0x21 => (Opcode::Addu, vec![reg(rd), reg(rs), reg(rt)]),
                0x22 => (Opcode::Sub, vec![reg(rd), reg(rs), reg(rt)]),
                0x23 => (Opcode::Subu, vec![reg(rd), reg(rs), reg(rt)]),
                0x24 => (Opcode::And, vec![reg(rd), reg(rs), reg(rt)]),
                0x25 => (Opcode::Or, vec![reg(rd), reg(rs), reg(rt)]),
                0x26 => (Opcode::Xor, vec![reg(rd), reg(rs), reg(rt)]),
                0x27 => (Opcode::Nor, vec![reg(rd), reg(rs), reg(rt)]),
                0x2A => (Opcode::Slt, vec![reg(rd), reg(rs), reg(rt)]),
                0x2B => (Opcode::Sltu, vec![reg(rd), reg(rs), reg(rt)]),
                _ => return None,
            },
            0x01 => {
                let op = match rt {
                    0x00 => Opcode::Bltz,
                    0x01 => Opcode::Bgez,
                    0x10 => Opcode::Bltzal,
                    0x11 => Opcode::Bgezal,
                    _ => return None,
                };
                (op, vec![reg(rs), branch_target()])
            }
            0x02 | 0x03 => {
                let op = if w >> 26 == 2 { Opcode::J } else { Opcode::Jal };
                let region = addr.add_offset(4).value & 0xF000_0000;
                let target = Address::ptr32((region | ((w & 0x03FF_FFFF) << 2) as u64) as u32);
                (op, vec![MipsOperand::Address(target)])
            }
            0x04 => (Opcode::Beq, vec![reg(rs), reg(rt), branch_target()]),
            0x05 => (Opcode::Bne, vec![reg(rs), reg(rt), branch_target()]),
            0x06 if rt == 0 => (Opcode::Blez, vec![reg(rs), branch_target()]),
            0x07 if rt == 0 => (Opcode::Bgtz, vec![reg(rs), branch_target()]),
            0x08 => (Opcode::Addi, vec![reg(rt), reg(rs), MipsOperand::SignedImmediate(simm(w))]),
            0x09 => (Opcode::Addiu, vec![reg(rt), reg(rs), MipsOperand::SignedImmediate(simm(w))]),
            0x0A => (Opcode::Slti, vec![reg(rt), reg(rs), MipsOperand::SignedImmediate(simm(w))]),
            0x0B => (Opcode::Sltiu, vec![reg(rt), reg(rs), MipsOperand::SignedImmediate(simm(w))]),
            0x0C => (Opcode::Andi, vec![reg(rt), reg(rs), MipsOperand::UnsignedImmediate(w & 0xFFFF)]),
            0x0D => (Opcode::Ori, vec![reg(rt), reg(rs), MipsOperand::UnsignedImmediate(w & 0xFFFF)]),
            0x0E => (Opcode::Xori, vec![reg(rt), reg(rs), MipsOperand::UnsignedImmediate(w & 0xFFFF)]),
            0x0F if rs == 0 => (Opcode::Lui, vec![reg(rt), MipsOperand::UnsignedImmediate(w & 0xFFFF)]),
            0x20 => (Opcode::Lb, vec![reg(rt), mem()]),
            0x21 => (Opcode::Lh, vec![reg(rt), mem()]),
            0x23 => (Opcode::Lw, vec![reg(rt), mem()]),
            0x24 => (Opcode::Lbu, vec![reg(rt), mem()]),
            0x25 => (Opcode::Lhu, vec![reg(rt), mem()]),
            0x28 => (Opcode::Sb, vec![reg(rt), mem()]),
            0x29 => (Opcode::Sh, vec![reg(rt), mem()]),
            0x2B => (Opcode::Sw, vec![reg(rt), mem()]),
            _ => return None,
        };
        Some(MipsInstruction {
            address: addr,
            opcode,
            operands,
        })
    }
}

impl<'a> Disassembler<'a> for MipsDisassembler<'a> {
    type Instruction = MipsInstruction;

    fn disassemble_instruction(&mut self) -> DisassemblerResult<MipsInstruction> {
        let addr = self.rdr.address();
        let Ok(w) = self.rdr.peek_u32(0) else {
            trace!(address = %addr, remaining = self.rdr.remaining(), "truncated MIPS instruction");
            return Err(DisassemblerError::malformed(addr));
        };
        let instr = Self::decode(addr, w).ok_or_else(|| {
            trace!(address = %addr, word = w, "invalid MIPS encoding");
            DisassemblerError::malformed(addr)
        })?;
        self.rdr
            .read_u32()
            .map_err(|_| DisassemblerError::malformed(addr))?;
        Ok(instr)
    }

    fn reader(&self) -> &ImageReader<'a> {
        &self.rdr
    }

    fn name(&self) -> &str {
        "mips32"
    }
}
