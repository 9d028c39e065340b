use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use rtlift::arch::registry::{self, Backend};
use rtlift::arch::{ProcessorArchitecture, RewriterHost};
use rtlift::core::address::Address;
use rtlift::core::image::LoadedImage;
use rtlift::core::procedure::ExternalProcedure;

struct NullHost;

impl RewriterHost for NullHost {
    fn get_imported_procedure(&self, _target: Address, _continuation: Address) -> Option<ExternalProcedure> {
        None
    }

    fn get_intercepted_call(&self, _target: Address) -> Option<ExternalProcedure> {
        None
    }
}

// A prologue-ish mix: lui/ori pairs, loads, stores, arithmetic, a branch
// with its delay slot.
const MIPS_BLOCK: [u32; 12] = [
    0x3C08_0041, // lui   r8,0x41
    0x3508_8000, // ori   r8,r8,0x8000
    0x27BD_FFE0, // addiu sp,sp,-32
    0xAFBF_001C, // sw    ra,28(sp)
    0x8D09_0004, // lw    r9,4(r8)
    0x0128_5021, // addu  r10,r9,r8
    0x0149_582A, // slt   r11,r10,r9
    0x1560_0002, // bne   r11,r0,+2
    0x0000_0000, // nop
    0x8FBF_001C, // lw    ra,28(sp)
    0x03E0_0008, // jr    ra
    0x27BD_0020, // addiu sp,sp,32
];

// lda #$10 ; sta $0300,y ; asl $06 ; inx ; bne -6 ; rts
const M6502_BLOCK: [u8; 11] = [0xA9, 0x10, 0x99, 0x00, 0x03, 0x06, 0x06, 0xE8, 0xD0, 0xF6, 0x60];

fn rewrite(arch: &Backend, img: &LoadedImage) -> usize {
    let rdr = match arch.create_image_reader(img, img.base()) {
        Ok(r) => r,
        Err(_) => return 0,
    };
    arch.create_rewriter(rdr, arch.create_processor_state(), arch.create_frame(), &NullHost)
        .map_while(Result::ok)
        .map(|c| c.instructions.len())
        .sum()
}

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");

    let mips = registry::for_name("mips-le-32").expect("mips backend");
    let bytes: Vec<u8> = MIPS_BLOCK
        .iter()
        .cycle()
        .take(MIPS_BLOCK.len() * 512)
        .flat_map(|w| w.to_le_bytes())
        .collect();
    let img = LoadedImage::new(Address::ptr32(0x0040_0000), bytes);
    group.throughput(Throughput::Bytes(img.len() as u64));
    group.bench_function("mips-le-32", |b| b.iter(|| rewrite(black_box(&mips), black_box(&img))));

    let m6502 = registry::for_name("m6502").expect("m6502 backend");
    let bytes: Vec<u8> = M6502_BLOCK.iter().copied().cycle().take(M6502_BLOCK.len() * 512).collect();
    let img = LoadedImage::new(Address::ptr16(0x0800), bytes);
    group.throughput(Throughput::Bytes(img.len() as u64));
    group.bench_function("m6502", |b| b.iter(|| rewrite(black_box(&m6502), black_box(&img))));

    group.finish();
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
