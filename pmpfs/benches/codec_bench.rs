use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pmpfs::pmp300::*;

criterion_group!(benches, codec_bench, allocator_bench);
criterion_main!(benches);

fn populated() -> Directory {
    let mut dir = Directory::empty(LARGE_INTERNAL_BLOCKS, &[7, 300, 1500]);
    let mut table = FileTable::new(&mut dir);
    for i in 0..MAX_ENTRIES {
        let size = 100_000 + (i as u32 * 4_321);
        table
            .add_entry(&format!("track {i:02}.mp3"), size, 946_684_800)
            .expect("add failed");
    }
    dir
}

pub fn codec_bench(c: &mut Criterion) {
    let mut dir = populated();
    let raw = seal(&mut dir);

    c.bench_function("pmp300_encode", |b| {
        b.iter(|| black_box(encode(black_box(&dir))));
    });

    c.bench_function("pmp300_decode", |b| {
        b.iter(|| black_box(decode(black_box(&raw)).expect("decode failed")));
    });

    c.bench_function("pmp300_verify", |b| {
        b.iter(|| black_box(dir.verify_all()));
    });
}

pub fn allocator_bench(c: &mut Criterion) {
    let base = Directory::empty(LARGE_INTERNAL_BLOCKS, &[]);

    c.bench_function("pmp300_allocate_free_full", |b| {
        b.iter(|| {
            let mut dir = base.clone();
            let mut alloc = BlockAllocator::new(&mut dir);
            let chain = alloc
                .allocate_blocks(LARGE_INTERNAL_BLOCKS as usize)
                .expect("allocate failed");
            alloc.free(chain.head(), chain.len()).expect("free failed");
        });
    });
}
