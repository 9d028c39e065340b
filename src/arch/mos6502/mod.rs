//! MOS 6502 decoder and rewriter.

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

pub use disassembler::Mos6502Disassembler;
pub use instruction::{AddressMode, Mnemonic, Mos6502Instruction, Operand};
pub use rewriter::Mos6502Rewriter;

pub const A: usize = 0;
pub const X: usize = 1;
pub const Y: usize = 2;
pub const S: usize = 3;
pub const P: usize = 4;
pub const PC: usize = 5;

/// Bits of the processor status register `p`.
pub mod flags {
    pub const N: u32 = 0x80;
    pub const V: u32 = 0x40;
    pub const D: u32 = 0x08;
    pub const I: u32 = 0x04;
    pub const Z: u32 = 0x02;
    pub const C: u32 = 0x01;
}

pub static REGISTERS: Lazy<Vec<RegisterStorage>> = Lazy::new(|| {
    vec![
        RegisterStorage::general("a", A, 8),
        RegisterStorage::general("x", X, 8),
        RegisterStorage::general("y", Y, 8),
        RegisterStorage::new("s", S, 8, RegisterKind::Stack),
        RegisterStorage::new("p", P, 8, RegisterKind::Flags),
        RegisterStorage::new("pc", PC, 16, RegisterKind::ProgramCounter),
    ]
});

pub fn register(n: usize) -> &'static RegisterStorage {
    &REGISTERS[n]
}

#[derive(Debug, Clone, Default)]
pub struct Mos6502Architecture;

impl Mos6502Architecture {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorArchitecture for Mos6502Architecture {
    fn name(&self) -> &str {
        "m6502"
    }

    fn kind(&self) -> ArchitectureKind {
        ArchitectureKind::Mos6502
    }

    fn word_bits(&self) -> u8 {
        16
    }

    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn registers(&self) -> &[RegisterStorage] {
        &REGISTERS
    }

    fn stack_register(&self) -> &RegisterStorage {
        register(S)
    }

    fn create_disassembler<'a>(&self, reader: ImageReader<'a>) -> InstructionStream<'a> {
        Box::new(
            Instructions::new(Mos6502Disassembler::new(reader))
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
        Box::new(Mos6502Rewriter::new(reader, state, frame, host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;
    use crate::core::expression::Constant;
    use crate::core::image::LoadedImage;

    #[test]
    fn registers_and_stack() {
        let arch = Mos6502Architecture::new();
        assert_eq!(arch.stack_register().name, "s");
        assert_eq!(arch.get_register("p").unwrap().kind, RegisterKind::Flags);
        assert_eq!(arch.create_register_bitset().capacity(), 6);
    }

    #[test]
    fn addresses_are_16_bit() {
        let arch = Mos6502Architecture::new();
        let a = arch.make_address_from_constant(&Constant::word32(0x0001_C000));
        assert_eq!(a, Address::ptr16(0xC000));
    }

    #[test]
    fn disassembler_stream() {
        let img = LoadedImage::new(Address::ptr16(0x200), vec![0xA9, 0x01, 0x60]);
        let arch = Mos6502Architecture::new();
        let rdr = arch.create_image_reader(&img, img.base()).unwrap();
        let text: Vec<String> = arch
            .create_disassembler(rdr)
            .map(|i| i.unwrap().to_string())
            .collect();
        assert_eq!(text, vec!["lda\t#$01", "rts"]);
    }
}
