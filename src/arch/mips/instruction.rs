//! MIPS instruction representation and rendering.

use std::fmt;

use crate::arch::mips::register;
use crate::core::address::Address;
use crate::core::instruction::MachineInstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Sll => "sll",
            Opcode::Srl => "srl",
            Opcode::Sra => "sra",
            Opcode::Sllv => "sllv",
            Opcode::Srlv => "srlv",
            Opcode::Srav => "srav",
            Opcode::Jr => "jr",
            Opcode::Jalr => "jalr",
            Opcode::Syscall => "syscall",
            Opcode::Break => "break",
            Opcode::Mfhi => "mfhi",
            Opcode::Mthi => "mthi",
            Opcode::Mflo => "mflo",
            Opcode::Mtlo => "mtlo",
            Opcode::Mult => "mult",
            Opcode::Multu => "multu",
            Opcode::Div => "div",
            Opcode::Divu => "divu",
            Opcode::Add => "add",
            Opcode::Addu => "addu",
            Opcode::Sub => "sub",
            Opcode::Subu => "subu",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Nor => "nor",
            Opcode::Slt => "slt",
            Opcode::Sltu => "sltu",
            Opcode::Bltz => "bltz",
            Opcode::Bgez => "bgez",
            Opcode::Bltzal => "bltzal",
            Opcode::Bgezal => "bgezal",
            Opcode::J => "j",
            Opcode::Jal => "jal",
            Opcode::Beq => "beq",
            Opcode::Bne => "bne",
            Opcode::Blez => "blez",
            Opcode::Bgtz => "bgtz",
            Opcode::Addi => "addi",
            Opcode::Addiu => "addiu",
            Opcode::Slti => "slti",
            Opcode::Sltiu => "sltiu",
            Opcode::Andi => "andi",
            Opcode::Ori => "ori",
            Opcode::Xori => "xori",
            Opcode::Lui => "lui",
            Opcode::Lb => "lb",
            Opcode::Lh => "lh",
            Opcode::Lw => "lw",
            Opcode::Lbu => "lbu",
            Opcode::Lhu => "lhu",
            Opcode::Sb => "sb",
            Opcode::Sh => "sh",
            Opcode::Sw => "sw",
        }
    }

    /// Branches and jumps, all of which have a delay slot.
    pub fn has_delay_slot(&self) -> bool {
        matches!(
            self,
            Opcode::Jr
                | Opcode::Jalr
                | Opcode::J
                | Opcode::Jal
                | Opcode::Beq
                | Opcode::Bne
                | Opcode::Blez
                | Opcode::Bgtz
                | Opcode::Bltz
                | Opcode::Bgez
                | Opcode::Bltzal
                | Opcode::Bgezal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipsOperand {
    /// Register number
    Register(u8),
    /// Sign-extended immediate
    SignedImmediate(i32),
    /// Zero-extended immediate
    UnsignedImmediate(u32),
    /// `offset(base)`
    Memory { base: u8, offset: i16 },
    /// Branch or jump target
    Address(Address),
}

impl fmt::Display for MipsOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MipsOperand::Register(r) => write!(f, "{}", register(*r as usize)),
            MipsOperand::SignedImmediate(v) if *v < 0 => write!(f, "-0x{:X}", v.unsigned_abs()),
            MipsOperand::SignedImmediate(v) => write!(f, "0x{:X}", v),
            MipsOperand::UnsignedImmediate(v) => write!(f, "0x{:X}", v),
            MipsOperand::Memory { base, offset } if *offset < 0 => {
                write!(f, "-0x{:X}({})", offset.unsigned_abs(), register(*base as usize))
            }
            MipsOperand::Memory { base, offset } => {
                write!(f, "0x{:X}({})", offset, register(*base as usize))
            }
            MipsOperand::Address(a) => write!(f, "{}", a),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipsInstruction {
    pub address: Address,
    pub opcode: Opcode,
    pub operands: Vec<MipsOperand>,
}

impl MipsInstruction {
    pub fn op(&self, i: usize) -> Option<&MipsOperand> {
        self.operands.get(i)
    }
}

impl MachineInstruction for MipsInstruction {
    fn address(&self) -> Address {
        self.address
    }

    fn length(&self) -> usize {
        4
    }

    fn mnemonic(&self) -> &str {
        self.opcode.mnemonic()
    }
}

impl fmt::Display for MipsInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for (i, op) in self.operands.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { "\t" } else { "," }, op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_memory_operands() {
        let i = MipsInstruction {
            address: Address::ptr32(0),
            opcode: Opcode::Lw,
            operands: vec![
                MipsOperand::Register(3),
                MipsOperand::Memory { base: 29, offset: -8 },
            ],
        };
        assert_eq!(i.to_string(), "lw\tr3,-0x8(sp)");
    }

    #[test]
    fn renders_bare_mnemonic() {
        let i = MipsInstruction {
            address: Address::ptr32(0),
            opcode: Opcode::Syscall,
            operands: vec![],
        };
        assert_eq!(i.to_string(), "syscall");
        assert_eq!(i.length(), 4);
        assert_eq!(i.next_address(), Address::ptr32(4));
    }
}
