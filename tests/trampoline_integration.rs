//! End-to-end trampoline recognition through the winMips platform.

mod common;

use common::{mips_image, ScriptedHost};
use rtlift::arch::mips::MipsArchitecture;
use rtlift::arch::registry;
use rtlift::arch::ArchitectureKind;
use rtlift::arch::ProcessorArchitecture;
use rtlift::core::address::Address;
use rtlift::core::image::Endianness;
use rtlift::core::instruction::MachineInstruction;
use rtlift::core::rtl::RtlClass;
use rtlift::platform::{DefaultPlatform, Platform, Win32MipsPlatform};
use rtlift::typelib::config::{JsonConfiguration, Services};

// lui r2,0x40 ; lw r3,0x1234(r2) ; jr r3 ; nop
const STUB: [u32; 4] = [0x3C02_0040, 0x8C43_1234, 0x0060_0008, 0x0000_0000];

fn win_mips(endianness: Endianness) -> Win32MipsPlatform {
    Win32MipsPlatform::new(
        MipsArchitecture::new(endianness),
        Services::new(JsonConfiguration::new(vec![], vec![], ".")),
    )
}

#[test]
fn test_trampoline_resolves_import() {
    let platform = win_mips(Endianness::Little);
    let img = mips_image(0x0001_1000, &STUB, Endianness::Little);
    let host = ScriptedHost::new().with_import(0x0040_1234, "CreateFileW");
    let rdr = platform
        .architecture()
        .create_image_reader(&img, img.base())
        .unwrap();

    let proc = platform.get_trampoline_destination(rdr, &host).unwrap();
    assert_eq!(proc.name, "CreateFileW");
    assert_eq!(
        host.import_queries.borrow().last(),
        Some(&(Address::ptr32(0x0040_1234), Address::ptr32(0x0001_1008)))
    );
}

#[test]
fn test_trampoline_big_endian() {
    let platform = win_mips(Endianness::Big);
    let img = mips_image(0x0001_1000, &STUB, Endianness::Big);
    let host = ScriptedHost::new().with_intercept(0x0040_1234, "__chkstk");
    let rdr = platform
        .architecture()
        .create_image_reader(&img, img.base())
        .unwrap();
    assert_eq!(
        platform.get_trampoline_destination(rdr, &host).unwrap().name,
        "__chkstk"
    );
}

#[test]
fn test_probe_mid_stub_is_not_a_trampoline() {
    let platform = win_mips(Endianness::Little);
    let img = mips_image(0x0001_1000, &STUB, Endianness::Little);
    let host = ScriptedHost::new().with_import(0x0040_1234, "CreateFileW");
    let rdr = platform
        .architecture()
        .create_image_reader(&img, Address::ptr32(0x0001_1004))
        .unwrap();
    assert!(platform.get_trampoline_destination(rdr, &host).is_none());
}

#[test]
fn test_probe_at_end_of_image() {
    let platform = win_mips(Endianness::Little);
    let img = mips_image(0x0001_1000, &STUB, Endianness::Little);
    let host = ScriptedHost::new().with_import(0x0040_1234, "CreateFileW");
    let rdr = platform
        .architecture()
        .create_image_reader(&img, Address::ptr32(0x0001_1010))
        .unwrap();
    assert!(platform.get_trampoline_destination(rdr, &host).is_none());
}

#[test]
fn test_default_platform_sees_no_trampoline() {
    let platform = DefaultPlatform::new(
        Box::new(registry::for_kind(ArchitectureKind::Mips32, Endianness::Little)),
        "linuxMips",
        "__cdecl",
        Services::new(JsonConfiguration::new(vec![], vec![], ".")),
    );
    let img = mips_image(0x0001_1000, &STUB, Endianness::Little);
    let host = ScriptedHost::new().with_import(0x0040_1234, "CreateFileW");
    let rdr = platform
        .architecture()
        .create_image_reader(&img, img.base())
        .unwrap();
    assert!(platform.get_trampoline_destination(rdr, &host).is_none());
}

#[test]
fn test_rewrite_stream_pairs_clusters_with_instructions() {
    let arch = registry::for_name("mips-le-32").unwrap();
    let img = mips_image(0x0001_1000, &STUB, Endianness::Little);
    let host = ScriptedHost::new();

    let instrs: Vec<_> = arch
        .create_disassembler(arch.create_image_reader(&img, img.base()).unwrap())
        .map(|i| i.unwrap())
        .collect();
    let clusters: Vec<_> = arch
        .create_rewriter(
            arch.create_image_reader(&img, img.base()).unwrap(),
            arch.create_processor_state(),
            arch.create_frame(),
            &host,
        )
        .map(|c| c.unwrap())
        .collect();

    assert_eq!(instrs.len(), clusters.len());
    for (i, c) in instrs.iter().zip(&clusters) {
        assert_eq!(i.address(), c.address);
        assert_eq!(i.length(), c.length);
    }
    assert!(clusters[2].class.contains(RtlClass::TRANSFER | RtlClass::DELAY));
    // The delay slot follows as its own linear cluster.
    assert_eq!(clusters[3].class, RtlClass::LINEAR);
}
