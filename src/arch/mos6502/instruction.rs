//! 6502 instructions, addressing modes and their classic rendering.

use std::fmt;

use crate::core::address::Address;
use crate::core::instruction::MachineInstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
}

impl Mnemonic {
    pub fn as_str(&self) -> &'static str {
        use Mnemonic::*;
        match self {
            Adc => "adc",
            And => "and",
            Asl => "asl",
            Bcc => "bcc",
            Bcs => "bcs",
            Beq => "beq",
            Bit => "bit",
            Bmi => "bmi",
            Bne => "bne",
            Bpl => "bpl",
            Brk => "brk",
            Bvc => "bvc",
            Bvs => "bvs",
            Clc => "clc",
            Cld => "cld",
            Cli => "cli",
            Clv => "clv",
            Cmp => "cmp",
            Cpx => "cpx",
            Cpy => "cpy",
            Dec => "dec",
            Dex => "dex",
            Dey => "dey",
            Eor => "eor",
            Inc => "inc",
            Inx => "inx",
            Iny => "iny",
            Jmp => "jmp",
            Jsr => "jsr",
            Lda => "lda",
            Ldx => "ldx",
            Ldy => "ldy",
            Lsr => "lsr",
            Nop => "nop",
            Ora => "ora",
            Pha => "pha",
            Php => "php",
            Pla => "pla",
            Plp => "plp",
            Rol => "rol",
            Ror => "ror",
            Rti => "rti",
            Rts => "rts",
            Sbc => "sbc",
            Sec => "sec",
            Sed => "sed",
            Sei => "sei",
            Sta => "sta",
            Stx => "stx",
            Sty => "sty",
            Tax => "tax",
            Tay => "tay",
            Tsx => "tsx",
            Txa => "txa",
            Txs => "txs",
            Tya => "tya",
        }
    }
}

/// Addressing modes of the documented instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Implied,
    Accumulator,
    /// `#$nn`
    Immediate,
    /// `$nn`
    ZeroPage,
    /// `$nn,x`
    ZeroPageX,
    /// `$nn,y`
    ZeroPageY,
    /// `$nnnn`
    Absolute,
    /// `$nnnn,x`
    AbsoluteX,
    /// `$nnnn,y`
    AbsoluteY,
    /// `($nnnn)`, only used by `jmp`
    Indirect,
    /// `($nn,x)`
    IndexedIndirect,
    /// `($nn),y`
    IndirectIndexed,
    /// Branch displacement, stored as the resolved target
    Relative,
}

impl AddressMode {
    /// Instruction length in bytes, opcode included.
    pub fn length(&self) -> usize {
        match self {
            AddressMode::Implied | AddressMode::Accumulator => 1,
            AddressMode::Absolute
            | AddressMode::AbsoluteX
            | AddressMode::AbsoluteY
            | AddressMode::Indirect => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    pub mode: AddressMode,
    /// Immediate byte, zero-page address, absolute address or branch target.
    pub value: u16,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        match self.mode {
            AddressMode::Implied => Ok(()),
            AddressMode::Accumulator => write!(f, "a"),
            AddressMode::Immediate => write!(f, "#${:02X}", v),
            AddressMode::ZeroPage => write!(f, "${:02X}", v),
            AddressMode::ZeroPageX => write!(f, "${:02X},x", v),
            AddressMode::ZeroPageY => write!(f, "${:02X},y", v),
            AddressMode::Absolute | AddressMode::Relative => write!(f, "${:04X}", v),
            AddressMode::AbsoluteX => write!(f, "${:04X},x", v),
            AddressMode::AbsoluteY => write!(f, "${:04X},y", v),
            AddressMode::Indirect => write!(f, "(${:04X})", v),
            AddressMode::IndexedIndirect => write!(f, "(${:02X},x)", v),
            AddressMode::IndirectIndexed => write!(f, "(${:02X}),y", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mos6502Instruction {
    pub address: Address,
    pub mnemonic: Mnemonic,
    pub operand: Operand,
}

impl MachineInstruction for Mos6502Instruction {
    fn address(&self) -> Address {
        self.address
    }

    fn length(&self) -> usize {
        self.operand.mode.length()
    }

    fn mnemonic(&self) -> &str {
        self.mnemonic.as_str()
    }
}

impl fmt::Display for Mos6502Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand.mode {
            AddressMode::Implied => write!(f, "{}", self.mnemonic.as_str()),
            _ => write!(f, "{}\t{}", self.mnemonic.as_str(), self.operand),
        }
    }
}
