//! Processor architectures: decoders and RTL rewriters.
//!
//! Each supported family implements `ProcessorArchitecture`. A session picks
//! one architecture up front through [`registry`]; the decode and rewrite
//! loops then run against that family's concrete types.

pub mod mips;
pub mod mos6502;
pub mod registry;

use std::fmt;

use crate::core::address::Address;
use crate::core::disassembler::DisassemblerResult;
use crate::core::expression::Constant;
use crate::core::frame::Frame;
use crate::core::image::{Endianness, ImageError, ImageReader, LoadedImage};
use crate::core::instruction::MachineInstruction;
use crate::core::procedure::ExternalProcedure;
use crate::core::register::{RegisterSet, RegisterStorage};
use crate::core::rtl::RtlInstructionCluster;
use crate::core::state::ProcessorState;

/// Callbacks the rewriter and trampoline recognizer use to resolve
/// addresses that refer outside the image.
pub trait RewriterHost {
    /// Imported procedure whose stub or slot lives at `target`.
    /// `continuation` is where execution resumes after the transfer.
    fn get_imported_procedure(&self, target: Address, continuation: Address) -> Option<ExternalProcedure>;

    /// Procedure the host intercepts calls to at `target`.
    fn get_intercepted_call(&self, target: Address) -> Option<ExternalProcedure>;
}

/// Decoded instructions, pulled one at a time.
pub type InstructionStream<'a> =
    Box<dyn Iterator<Item = DisassemblerResult<Box<dyn MachineInstruction>>> + 'a>;

/// RTL clusters, pulled one at a time. Each item corresponds to exactly one
/// machine instruction.
pub type RtlStream<'a> = Box<dyn Iterator<Item = DisassemblerResult<RtlInstructionCluster>> + 'a>;

/// Supported processor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArchitectureKind {
    /// MIPS32 (little or big endian)
    Mips32,
    /// MOS 6502
    Mos6502,
}

impl fmt::Display for ArchitectureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchitectureKind::Mips32 => write!(f, "mips32"),
            ArchitectureKind::Mos6502 => write!(f, "m6502"),
        }
    }
}

/// One processor family.
pub trait ProcessorArchitecture {
    fn name(&self) -> &str;

    fn kind(&self) -> ArchitectureKind;

    /// Pointer width; also the width of addresses this family produces.
    fn word_bits(&self) -> u8;

    fn endianness(&self) -> Endianness;

    /// The register file, indexed by register number.
    fn registers(&self) -> &[RegisterStorage];

    fn stack_register(&self) -> &RegisterStorage;

    fn get_register(&self, name: &str) -> Option<&RegisterStorage> {
        self.registers().iter().find(|r| r.name == name)
    }

    /// Empty bitset sized to the register file.
    fn create_register_bitset(&self) -> RegisterSet {
        RegisterSet::with_capacity(self.registers().len())
    }

    fn create_processor_state(&self) -> ProcessorState {
        ProcessorState::new()
    }

    fn create_frame(&self) -> Frame {
        Frame::new(self.word_bits() as u32)
    }

    fn create_image_reader<'a>(
        &self,
        image: &'a LoadedImage,
        addr: Address,
    ) -> Result<ImageReader<'a>, ImageError> {
        image.create_reader(addr, self.endianness())
    }

    fn create_disassembler<'a>(&self, reader: ImageReader<'a>) -> InstructionStream<'a>;

    /// Start a rewrite session. The session owns `reader`, `state` and
    /// `frame`; nothing is decoded until the stream is pulled.
    fn create_rewriter<'a>(
        &self,
        reader: ImageReader<'a>,
        state: ProcessorState,
        frame: Frame,
        host: &'a dyn RewriterHost,
    ) -> RtlStream<'a>;

    /// Address of this family's width holding the constant's value.
    fn make_address_from_constant(&self, c: &Constant) -> Address {
        Address::from_constant(c, self.word_bits())
    }
}
