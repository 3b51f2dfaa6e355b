use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mpqread::crypto::{decrypt_bytes, encrypt_bytes};
use mpqread::Archive;
use std::io::{Cursor, SeekFrom};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{mixed_data, ArchiveBuilder, FileOptions};

const FILE_LEN: usize = 256 * 1024;

fn build_archive() -> Vec<u8> {
    let data = mixed_data(FILE_LEN, 11);
    ArchiveBuilder::new()
        .file("plain.bin", &data, FileOptions::default())
        .file("compressed.bin", &data, FileOptions::compressed())
        .file(
            "checked.bin",
            &data,
            FileOptions {
                sector_crc: true,
                ..FileOptions::encrypted()
            },
        )
        .build()
}

pub fn whole_file_benchmark(c: &mut Criterion) {
    let archive = Archive::from_reader(Cursor::new(build_archive())).unwrap();
    let mut group = c.benchmark_group("read_whole_file");
    group.throughput(Throughput::Bytes(FILE_LEN as u64));

    for name in ["plain.bin", "compressed.bin", "checked.bin"] {
        group.bench_with_input(BenchmarkId::from_parameter(name), name, |b, name| {
            b.iter(|| black_box(archive.read_file(name).unwrap()))
        });
    }
    group.finish();
}

pub fn chunked_read_benchmark(c: &mut Criterion) {
    let archive = Archive::from_reader(Cursor::new(build_archive())).unwrap();
    let mut group = c.benchmark_group("read_chunked");
    group.throughput(Throughput::Bytes(FILE_LEN as u64));

    for chunk in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let mut buf = vec![0u8; chunk];
            b.iter(|| {
                let mut file = archive.open_file("checked.bin").unwrap();
                loop {
                    let outcome = file.read(&mut buf).unwrap();
                    if outcome.is_eof() {
                        break;
                    }
                }
            })
        });
    }
    group.finish();
}

pub fn random_access_benchmark(c: &mut Criterion) {
    let archive = Archive::from_reader(Cursor::new(build_archive())).unwrap();
    let mut file = archive.open_file("compressed.bin").unwrap();
    let mut buf = [0u8; 300];
    let mut position = 0u64;

    c.bench_function("read_random_300", |b| {
        b.iter(|| {
            position = (position + 7919 * 13) % (FILE_LEN as u64 - 300);
            file.seek(SeekFrom::Start(position)).unwrap();
            black_box(file.read(&mut buf).unwrap());
        })
    });
}

pub fn cipher_benchmark(c: &mut Criterion) {
    let mut data = vec![0u8; 4096];
    let mut group = c.benchmark_group("cipher");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("encrypt_4k", |b| {
        b.iter(|| encrypt_bytes(black_box(&mut data), 0xC1EB1CEF))
    });
    group.bench_function("decrypt_4k", |b| {
        b.iter(|| decrypt_bytes(black_box(&mut data), 0xC1EB1CEF))
    });
    group.finish();
}

criterion_group!(
    benches,
    whole_file_benchmark,
    chunked_read_benchmark,
    random_access_benchmark,
    cipher_benchmark
);
criterion_main!(benches);
