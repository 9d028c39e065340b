//! Property-based tests for the decoders, the rewriters and the matcher.
//!
//! These tests use proptest to generate random code and verify that:
//! 1. Rewriting is deterministic and never panics on arbitrary bytes
//! 2. Every cluster lines up with the instruction it came from
//! 3. Constant folding wraps at the operand width
//! 4. A reused capture name only matches equal subterms

mod common;

use common::{mips_image, ScriptedHost};
use proptest::prelude::*;
use rtlift::arch::registry::{self, Backend};
use rtlift::arch::{mips, ProcessorArchitecture};
use rtlift::core::address::Address;
use rtlift::core::expression::{Constant, DataType, Expression, Identifier, Operator};
use rtlift::core::image::{Endianness, LoadedImage};
use rtlift::core::instruction::MachineInstruction;
use rtlift::core::pattern::{DataTypePattern, ExpressionPattern};
use rtlift::core::rtl::RtlInstructionCluster;
use rtlift::platform::{Platform, Win32MipsPlatform};
use rtlift::typelib::config::{JsonConfiguration, Services};

// =============================================================================
// HELPERS
// =============================================================================

fn rewrite_all(arch: &Backend, img: &LoadedImage) -> Vec<RtlInstructionCluster> {
    let host = ScriptedHost::new();
    let rdr = arch.create_image_reader(img, img.base()).unwrap();
    arch.create_rewriter(rdr, arch.create_processor_state(), arch.create_frame(), &host)
        .map_while(Result::ok)
        .collect()
}

fn decode_all(arch: &Backend, img: &LoadedImage) -> Vec<(Address, usize)> {
    let rdr = arch.create_image_reader(img, img.base()).unwrap();
    arch.create_disassembler(rdr)
        .map_while(Result::ok)
        .map(|i| (i.address(), i.length()))
        .collect()
}

/// Words drawn from opcodes the MIPS decoder understands, plus noise.
fn mips_word() -> impl Strategy<Value = u32> {
    prop_oneof![
        any::<u32>(),
        // lui / addiu / ori / lw / sw
        (prop::sample::select(vec![0x0Fu32, 0x09, 0x0D, 0x23, 0x2B]), any::<u32>())
            .prop_map(|(op, rest)| (op << 26) | (rest & 0x03FF_FFFF)),
        // SPECIAL: addu / or / jr / slt
        (prop::sample::select(vec![0x21u32, 0x25, 0x08, 0x2A]), any::<u32>())
            .prop_map(|(funct, rest)| (rest & 0x03FF_F800) | funct),
    ]
}

// =============================================================================
// REWRITER PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn mips_clusters_pair_with_instructions(words in prop::collection::vec(mips_word(), 0..64)) {
        let arch = registry::for_name("mips-le-32").unwrap();
        let img = mips_image(0x0040_0000, &words, Endianness::Little);

        let instrs = decode_all(&arch, &img);
        let clusters = rewrite_all(&arch, &img);
        prop_assert_eq!(instrs.len(), clusters.len());
        for ((addr, len), c) in instrs.iter().zip(&clusters) {
            prop_assert_eq!(*addr, c.address);
            prop_assert_eq!(*len, c.length);
            prop_assert!(!c.instructions.is_empty());
        }
    }

    #[test]
    fn mips_rewrite_is_deterministic(words in prop::collection::vec(mips_word(), 0..64)) {
        let arch = registry::for_name("mips-be-32").unwrap();
        let img = mips_image(0x0001_0000, &words, Endianness::Big);
        prop_assert_eq!(rewrite_all(&arch, &img), rewrite_all(&arch, &img));
    }

    #[test]
    fn m6502_clusters_pair_with_instructions(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let arch = registry::for_name("m6502").unwrap();
        let img = LoadedImage::new(Address::ptr16(0x0800), bytes);

        let instrs = decode_all(&arch, &img);
        let clusters = rewrite_all(&arch, &img);
        prop_assert_eq!(instrs.len(), clusters.len());
        for ((addr, len), c) in instrs.iter().zip(&clusters) {
            prop_assert_eq!(*addr, c.address);
            prop_assert_eq!(*len, c.length);
        }
    }

    #[test]
    fn trampoline_probe_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let platform = Win32MipsPlatform::new(
            mips::MipsArchitecture::new(Endianness::Little),
            Services::new(JsonConfiguration::new(vec![], vec![], ".")),
        );
        let img = LoadedImage::new(Address::ptr32(0x0001_0000), bytes);
        let host = ScriptedHost::new();
        let rdr = platform.architecture().create_image_reader(&img, img.base()).unwrap();
        let _ = platform.get_trampoline_destination(rdr, &host);
    }

    #[test]
    fn trampoline_target_is_hi_plus_lo(hi in any::<u16>(), lo in any::<i16>()) {
        // lui r2,hi ; lw r3,lo(r2) ; jr r3 ; nop
        let words = [
            0x3C02_0000 | hi as u32,
            0x8C43_0000 | (lo as u16) as u32,
            0x0060_0008,
            0,
        ];
        let target = ((hi as u32) << 16).wrapping_add(lo as i32 as u32);
        let platform = Win32MipsPlatform::new(
            mips::MipsArchitecture::new(Endianness::Little),
            Services::new(JsonConfiguration::new(vec![], vec![], ".")),
        );
        let img = mips_image(0x0001_0000, &words, Endianness::Little);
        let host = ScriptedHost::new().with_import(target, "Target");
        let rdr = platform.architecture().create_image_reader(&img, img.base()).unwrap();
        let proc = platform.get_trampoline_destination(rdr, &host);
        prop_assert_eq!(proc.map(|p| p.name), Some("Target".to_string()));
    }
}

// =============================================================================
// FOLDING AND MATCHING PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn folding_wraps_at_operand_width(a in any::<u32>(), b in any::<u32>(), c in any::<u8>(), d in any::<u8>()) {
        let sum = Operator::IAdd.apply_constants(&Constant::word32(a), &Constant::word32(b));
        prop_assert_eq!(sum, Constant::word32(a.wrapping_add(b)));

        let diff = Operator::ISub.apply_constants(&Constant::byte(c), &Constant::byte(d));
        prop_assert_eq!(diff, Constant::byte(c.wrapping_sub(d)));
        prop_assert_eq!(diff.data_type, DataType::Byte);
    }

    #[test]
    fn reused_capture_requires_equal_subterms(x in 0usize..32, y in 0usize..32) {
        let rx = Identifier::register(mips::register(x), DataType::Word32);
        let ry = Identifier::register(mips::register(y), DataType::Word32);
        let e = Expression::binary(Operator::IAdd, DataType::Word32, Expression::id(&rx), Expression::id(&ry));

        let same = ExpressionPattern::binary(
            Operator::IAdd,
            DataTypePattern::Any,
            ExpressionPattern::any_id("r"),
            ExpressionPattern::any_id("r"),
        );
        prop_assert_eq!(same.matches(&e).is_some(), x == y);

        let distinct = ExpressionPattern::binary(
            Operator::IAdd,
            DataTypePattern::Exact(DataType::Word32),
            ExpressionPattern::any_id("a"),
            ExpressionPattern::any_id("b"),
        );
        let caps = distinct.matches(&e).unwrap();
        prop_assert_eq!(caps.identifier("a"), Some(&rx));
        prop_assert_eq!(caps.identifier("b"), Some(&ry));
    }
}
