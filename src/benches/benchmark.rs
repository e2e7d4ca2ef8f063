#[macro_use]
extern crate criterion;
extern crate gptscan;

use criterion::{Criterion, Throughput};
use gptscan::{GptParser, crc32};

/// Header at LBA 1 plus `num_entries` zeroed 128 byte slots at LBA 2, checksums filled in.
fn synthetic_image(num_entries: u32) -> Vec<u8> {
    let array = vec![0_u8; num_entries as usize * 128];

    let mut header = vec![0_u8; 512];
    header[0..8].copy_from_slice(b"EFI PART");
    header[8..12].copy_from_slice(&0x0001_0000_u32.to_le_bytes());
    header[12..16].copy_from_slice(&92_u32.to_le_bytes());
    header[24..32].copy_from_slice(&1_u64.to_le_bytes());
    header[72..80].copy_from_slice(&2_u64.to_le_bytes());
    header[80..84].copy_from_slice(&num_entries.to_le_bytes());
    header[84..88].copy_from_slice(&128_u32.to_le_bytes());
    header[88..92].copy_from_slice(&crc32(&array).to_le_bytes());
    let header_crc = crc32(&header[..92]);
    header[16..20].copy_from_slice(&header_crc.to_le_bytes());

    let mut image = vec![0_u8; 512];
    image.extend(header);
    image.extend(array);
    image
}

fn criterion_benchmark(c: &mut Criterion) {
    let data = vec![0xA5_u8; 16 * 1024];
    let mut group = c.benchmark_group("crc32");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("16 KiB", |b| b.iter(|| crc32(&data)));
    group.finish();

    let image = synthetic_image(128);
    c.bench_function("scan 128 entry GPT", move |b| {
        b.iter(|| {
            let scan = GptParser::from_buffer(image.clone()).parse().unwrap();
            assert!(scan.is_valid());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
