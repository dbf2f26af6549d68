//! # QC-02 Block Log Benchmarks
//!
//! Claims to validate:
//! - Random block read: two index reads plus one record read, flat in log length
//! - Range read: one region read for the whole range
//! - Append: one primary write plus two index writes
//! - Index reconstruction: linear in the number of blocks
//!
//! Conditions:
//! - Logs of 1k to 50k blocks
//! - Compressed and uncompressed records
//! - Readers racing a writer

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_02_block_log::{BlockLog, BlockLogConfig, FileManager};
use rand::Rng;
use shared_types::{BlockHeader, BlockId, BlockTransaction, SignedBlock, SignedBlockHeader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A block with `tx_count` transactions of semi-random payload.
fn bench_block(previous: BlockId, tx_count: usize) -> SignedBlock {
    let mut rng = rand::thread_rng();
    let block_num = previous.block_num() + 1;
    SignedBlock {
        header: SignedBlockHeader {
            header: BlockHeader {
                previous,
                timestamp: 1_700_000_000 + block_num * 3,
                witness: format!("witness-{}", block_num % 21),
                transaction_merkle_root: rng.gen(),
            },
            signing_key: [(block_num % 21) as u8; 32],
            witness_signature: [0x5A; 64],
        },
        transactions: (0..tx_count)
            .map(|i| {
                // half random, half repetitive, roughly like real operations
                let mut operations: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
                operations.extend_from_slice(format!("transfer amount=1.000 HIVE memo={:064}", i).as_bytes());
                BlockTransaction {
                    ref_block_num: (block_num & 0xFFFF) as u16,
                    expiration: 1_700_000_600,
                    operations,
                }
            })
            .collect(),
    }
}

fn generate_chain(length: u32, tx_count: usize) -> Vec<SignedBlock> {
    let mut previous = BlockId::zero();
    (0..length)
        .map(|_| {
            let block = bench_block(previous, tx_count);
            previous = block.id();
            block
        })
        .collect()
}

fn filled_log(path: &Path, config: BlockLogConfig, chain: &[SignedBlock]) -> BlockLog {
    let log = BlockLog::open_at(path, false, config).expect("open block log");
    for block in chain {
        log.append(block).expect("append");
    }
    log
}

pub fn lookup_by_number(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/block_log/lookup");
    group.measurement_time(Duration::from_secs(10));

    for length in [1_000u32, 10_000, 50_000] {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain = generate_chain(length, 10);
        let log = filled_log(&dir.path().join("block_log"), BlockLogConfig::default(), &chain);
        let mut rng = rand::thread_rng();

        group.bench_with_input(BenchmarkId::new("read_block_by_num", length), &log, |b, log| {
            b.iter(|| {
                let n = rng.gen_range(1..=length);
                black_box(log.read_block_by_num(n).expect("read"))
            })
        });

        group.bench_with_input(BenchmarkId::new("read_data_by_num", length), &log, |b, log| {
            b.iter(|| {
                let n = rng.gen_range(1..=length);
                black_box(log.read_data_by_num(n).expect("read"))
            })
        });
    }

    group.finish();
}

pub fn range_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/block_log/range");
    group.measurement_time(Duration::from_secs(10));

    let dir = tempfile::tempdir().expect("tempdir");
    let chain = generate_chain(5_000, 10);
    let log = filled_log(&dir.path().join("block_log"), BlockLogConfig::default(), &chain);

    for count in [10u32, 100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("read_block_range_by_num", count), &count, |b, &count| {
            b.iter(|| black_box(log.read_block_range_by_num(4_000 - count, count).expect("range")))
        });
    }

    group.finish();
}

pub fn append_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/block_log/append");
    group.measurement_time(Duration::from_secs(10));

    let configs = [
        ("uncompressed", BlockLogConfig::default().with_compression(false)),
        ("zstd_level_3", BlockLogConfig::default().with_compression_level(3)),
        ("zstd_level_15", BlockLogConfig::default()),
    ];

    for (name, config) in configs {
        group.throughput(Throughput::Elements(100));
        group.bench_function(BenchmarkId::new("batch_100_blocks", name), |b| {
            let chain = generate_chain(100, 50);
            b.iter(|| {
                let dir = tempfile::tempdir().expect("tempdir");
                let log = filled_log(&dir.path().join("block_log"), config.clone(), &chain);
                black_box(log.head())
            })
        });
    }

    group.finish();
}

pub fn reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/block_log/reconstruction");
    group.sample_size(10);

    for length in [1_000u32, 10_000] {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("block_log");
        drop(filled_log(&path, BlockLogConfig::default(), &generate_chain(length, 10)));

        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::new("rebuild_indexes", length), &path, |b, path| {
            b.iter(|| {
                std::fs::remove_file(FileManager::index_path(path)).expect("remove index");
                std::fs::remove_file(FileManager::hash_index_path(path)).expect("remove hash index");
                let log = BlockLog::open_at(path, false, BlockLogConfig::default()).expect("reopen");
                black_box(log.head())
            })
        });
    }

    group.finish();
}

pub fn concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-02/block_log/concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("append_with_4_readers", |b| {
        let chain = generate_chain(500, 10);
        b.iter(|| {
            let dir = tempfile::tempdir().expect("tempdir");
            let log = Arc::new(
                BlockLog::open_at(
                    dir.path().join("block_log"),
                    false,
                    BlockLogConfig::default().with_compression_level(1),
                )
                .expect("open"),
            );
            let done = Arc::new(AtomicBool::new(false));

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let log = Arc::clone(&log);
                    let done = Arc::clone(&done);
                    std::thread::spawn(move || {
                        let mut reads = 0u64;
                        while !done.load(Ordering::Acquire) {
                            if let Some(head) = log.head() {
                                black_box(log.read_block_by_num(head.block_num()).expect("read"));
                                reads += 1;
                            }
                        }
                        reads
                    })
                })
                .collect();

            for block in &chain {
                log.append(block).expect("append");
            }
            done.store(true, Ordering::Release);
            let reads: u64 = readers.into_iter().map(|r| r.join().unwrap_or(0)).sum();
            black_box(reads)
        })
    });

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    lookup_by_number(c);
    range_reads(c);
    append_performance(c);
    reconstruction(c);
    concurrent_reads(c);
}
