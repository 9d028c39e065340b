use crate::arch::mips::MipsArchitecture;
use crate::arch::mos6502::Mos6502Architecture;
use crate::arch::{
    ArchitectureKind, InstructionStream, ProcessorArchitecture, RewriterHost, RtlStream,
};
use crate::core::frame::Frame;
use crate::core::image::{Endianness, ImageReader};
use crate::core::register::RegisterStorage;
use crate::core::state::ProcessorState;

/// Any supported architecture, chosen once per session.
#[derive(Debug, Clone)]
pub enum Backend {
    Mips(MipsArchitecture),
    Mos6502(Mos6502Architecture),
}

impl Backend {
    fn inner(&self) -> &dyn ProcessorArchitecture {
        match self {
            Backend::Mips(a) => a,
            Backend::Mos6502(a) => a,
        }
    }
}

impl ProcessorArchitecture for Backend {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn kind(&self) -> ArchitectureKind {
        self.inner().kind()
    }

    fn word_bits(&self) -> u8 {
        self.inner().word_bits()
    }

    fn endianness(&self) -> Endianness {
        self.inner().endianness()
    }

    fn registers(&self) -> &[RegisterStorage] {
        self.inner().registers()
    }

    fn stack_register(&self) -> &RegisterStorage {
        self.inner().stack_register()
    }

    fn create_disassembler<'a>(&self, reader: ImageReader<'a>) -> InstructionStream<'a> {
        self.inner().create_disassembler(reader)
    }

    fn create_rewriter<'a>(
        &self,
        reader: ImageReader<'a>,
        state: ProcessorState,
        frame: Frame,
        host: &'a dyn RewriterHost,
    ) -> RtlStream<'a> {
        self.inner().create_rewriter(reader, state, frame, host)
    }
}

/// Select the architecture for a processor family. The 6502 ignores
/// `endianness`; it is always little-endian.
pub fn for_kind(kind: ArchitectureKind, endianness: Endianness) -> Backend {
    match kind {
        ArchitectureKind::Mips32 => Backend::Mips(MipsArchitecture::new(endianness)),
        ArchitectureKind::Mos6502 => Backend::Mos6502(Mos6502Architecture::new()),
    }
}

/// Look an architecture up by its configuration name.
pub fn for_name(name: &str) -> Option<Backend> {
    match name {
        "mips-le-32" => Some(for_kind(ArchitectureKind::Mips32, Endianness::Little)),
        "mips-be-32" => Some(for_kind(ArchitectureKind::Mips32, Endianness::Big)),
        "m6502" => Some(for_kind(ArchitectureKind::Mos6502, Endianness::Little)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        let arch = for_name("mips-be-32").unwrap();
        assert_eq!(arch.kind(), ArchitectureKind::Mips32);
        assert_eq!(arch.endianness(), Endianness::Big);
        assert_eq!(for_name("m6502").unwrap().word_bits(), 16);
        assert!(for_name("x86-protected-32").is_none());
    }

    #[test]
    fn names_round_trip() {
        for name in ["mips-le-32", "mips-be-32", "m6502"] {
            assert_eq!(for_name(name).unwrap().name(), name);
        }
    }
}
