//! MIPS32 decoder and rewriter.
//!
//! Covers the base integer ISA. Branches and jumps have one delay slot; the
//! rewriter tags them `RtlClass::DELAY` and emits the delay-slot instruction
//! as its own cluster.

pub mod disassembler;
pub mod instruction;
pub mod rewriter;

use once_cell::sync::Lazy;

use crate::arch::{
    ArchitectureKind, InstructionStream, ProcessorArchitecture, RewriterHost, RtlStream,
};
use crate::core::disassembler::Instructions;
use crate::core::frame::Frame;
use crate::core::image::{Endianness, ImageReader};
use crate::core::instruction::MachineInstruction;
use crate::core::register::{RegisterKind, RegisterStorage};
use crate::core::state::ProcessorState;

pub use disassembler::MipsDisassembler;
pub use instruction::{MipsInstruction, MipsOperand, Opcode};
pub use rewriter::MipsRewriter;

pub const GP: usize = 28;
pub const SP: usize = 29;
pub const RA: usize = 31;
pub const HI: usize = 32;
pub const LO: usize = 33;

/// r0..r31, hi, lo. r29 is named `sp`, r30 `fp` and r31 `ra`.
pub static REGISTERS: Lazy<Vec<RegisterStorage>> = Lazy::new(|| {
    let mut regs: Vec<RegisterStorage> = (0..32)
        .map(|n| {
            let (name, kind) = match n {
                SP => ("sp".to_string(), RegisterKind::Stack),
                30 => ("fp".to_string(), RegisterKind::General),
                RA => ("ra".to_string(), RegisterKind::General),
                _ => (format!("r{}", n), RegisterKind::General),
            };
            RegisterStorage::new(name, n, 32, kind)
        })
        .collect();
    regs.push(RegisterStorage::new("hi", HI, 32, RegisterKind::Special));
    regs.push(RegisterStorage::new("lo", LO, 32, RegisterKind::Special));
    regs
});

pub fn register(n: usize) -> &'static RegisterStorage {
    &REGISTERS[n]
}

/// MIPS32 in one byte order.
#[derive(Debug, Clone)]
pub struct MipsArchitecture {
    endianness: Endianness,
    name: String,
}

impl MipsArchitecture {
    pub fn new(endianness: Endianness) -> Self {
        let name = match endianness {
            Endianness::Little => "mips-le-32",
            Endianness::Big => "mips-be-32",
        };
        Self {
            endianness,
            name: name.to_string(),
        }
    }
}

impl ProcessorArchitecture for MipsArchitecture {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArchitectureKind {
        ArchitectureKind::Mips32
    }

    fn word_bits(&self) -> u8 {
        32
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn registers(&self) -> &[RegisterStorage] {
        &REGISTERS
    }

    fn stack_register(&self) -> &RegisterStorage {
        register(SP)
    }

    fn create_disassembler<'a>(&self, reader: ImageReader<'a>) -> InstructionStream<'a> {
        Box::new(
            Instructions::new(MipsDisassembler::new(reader))
                .map(|r| r.map(|i| Box::new(i) as Box<dyn MachineInstruction>)),
        )
    }

    fn create_rewriter<'a>(
        &self,
        reader: ImageReader<'a>,
        state: ProcessorState,
        frame: Frame,
        host: &'a dyn RewriterHost,
    ) -> RtlStream<'a> {
        Box::new(MipsRewriter::new(reader, state, frame, host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        let arch = MipsArchitecture::new(Endianness::Little);
        assert_eq!(arch.get_register("r28").unwrap().number, GP);
        assert_eq!(arch.get_register("sp").unwrap().number, SP);
        assert_eq!(arch.get_register("lo").unwrap().number, LO);
        assert!(arch.get_register("r29").is_none());
        assert_eq!(arch.create_register_bitset().capacity(), 34);
    }

    #[test]
    fn names_carry_endianness() {
        assert_eq!(MipsArchitecture::new(Endianness::Big).name(), "mips-be-32");
    }
}
