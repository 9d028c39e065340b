//! Register-transfer-list instructions and clusters.
//!
//! A rewriter lowers each machine instruction into one
//! `RtlInstructionCluster`: an ordered list of `RtlInstruction`s that share
//! the machine instruction's address and length.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::address::Address;
use crate::core::expression::Expression;

bitflags! {
    /// Transfer-class flags attached to RTL instructions and clusters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RtlClass: u32 {
        /// Execution continues at the next instruction.
        const LINEAR = 1;
        /// Control may leave the straight-line path.
        const TRANSFER = 1 << 1;
        /// Transfer only happens when a condition holds.
        const CONDITIONAL = 1 << 2;
        /// Transfer takes effect after the following (delay slot) instruction.
        const DELAY = 1 << 3;
        /// Transfer is a call.
        const CALL = 1 << 4;
        /// The bytes did not decode; no semantics are available.
        const INVALID = 1 << 5;
    }
}

/// One semantic micro-operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtlInstruction {
    /// `dst = src`; `dst` is an identifier or a memory access.
    Assignment { dst: Expression, src: Expression },
    /// Unconditional transfer to `target`.
    Goto { target: Expression, class: RtlClass },
    /// Transfer to `target` when `condition` holds.
    Branch {
        condition: Expression,
        target: Expression,
        class: RtlClass,
    },
    /// Call to `target`; `return_address_size` bytes are pushed by the call.
    Call {
        target: Expression,
        return_address_size: u8,
        class: RtlClass,
    },
    /// Return to caller, popping `return_address_size` bytes.
    Return { return_address_size: u8, class: RtlClass },
    /// Evaluate an expression only for its side effects.
    SideEffect(Expression),
    Nop,
    Invalid,
}

impl RtlInstruction {
    pub fn assign(dst: Expression, src: Expression) -> Self {
        RtlInstruction::Assignment { dst, src }
    }

    pub fn goto(target: Expression, class: RtlClass) -> Self {
        RtlInstruction::Goto { target, class }
    }

    pub fn class(&self) -> RtlClass {
        match self {
            RtlInstruction::Goto { class, .. }
            | RtlInstruction::Branch { class, .. }
            | RtlInstruction::Call { class, .. }
            | RtlInstruction::Return { class, .. } => *class,
            RtlInstruction::Invalid => RtlClass::INVALID,
            _ => RtlClass::LINEAR,
        }
    }

    /// Whether this instruction transfers control after a delay slot.
    pub fn is_delayed(&self) -> bool {
        self.class().contains(RtlClass::DELAY)
    }

    pub fn is_transfer(&self) -> bool {
        self.class().contains(RtlClass::TRANSFER)
    }
}

impl fmt::Display for RtlInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delay = |c: &RtlClass| if c.contains(RtlClass::DELAY) { " (delay)" } else { "" };
        match self {
            RtlInstruction::Assignment { dst, src } => write!(f, "{} = {}", dst, src),
            RtlInstruction::Goto { target, class } => write!(f, "goto {}{}", target, delay(class)),
            RtlInstruction::Branch {
                condition,
                target,
                class,
            } => write!(f, "if ({}) branch {}{}", condition, target, delay(class)),
            RtlInstruction::Call { target, class, .. } => write!(f, "call {}{}", target, delay(class)),
            RtlInstruction::Return { class, .. } => write!(f, "return{}", delay(class)),
            RtlInstruction::SideEffect(e) => write!(f, "{}", e),
            RtlInstruction::Nop => write!(f, "nop"),
            RtlInstruction::Invalid => write!(f, "<invalid>"),
        }
    }
}

/// The semantic expansion of exactly one machine instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtlInstructionCluster {
    /// Address of the source machine instruction
    pub address: Address,
    /// Length in bytes of the source machine instruction
    pub length: usize,
    /// Union of the member instructions' classes
    pub class: RtlClass,
    pub instructions: Vec<RtlInstruction>,
}

impl RtlInstructionCluster {
    pub fn new(address: Address, length: usize, instructions: Vec<RtlInstruction>) -> Self {
        let class = instructions
            .iter()
            .fold(RtlClass::empty(), |acc, i| acc | i.class());
        Self {
            address,
            length,
            class,
            instructions,
        }
    }

    /// Address just past the source instruction.
    pub fn next_address(&self) -> Address {
        self.address.add_offset(self.length as i64)
    }
}

impl fmt::Display for RtlInstructionCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({})", self.address, self.length)?;
        for i in &self.instructions {
            writeln!(f, "  {}", i)?;
        }
        Ok(())
    }
}
