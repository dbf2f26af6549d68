//! # Block Log Benchmarks
//!
//! | Operation | Claim |
//! |-----------|-------|
//! | Random read by number | Flat in log length |
//! | Range read | One region read per range |
//! | Append | One write per file |
//! | Index rebuild | Linear in block count |

use criterion::{criterion_group, criterion_main, Criterion};
use qc_tests::benchmarks::qc_02_block_log;

fn block_log(c: &mut Criterion) {
    qc_02_block_log::register_benchmarks(c);
}

criterion_group!(benches, block_log);
criterion_main!(benches);
