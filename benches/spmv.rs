//! SpMV benchmarks: CSR vs BCSR host kernels
//!
//! Run with: cargo bench --bench spmv

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sparsix::prelude::*;
use std::hint::black_box;

/// Build a block-banded CSR matrix of `nb` block rows with `d x d` blocks on
/// the diagonal and first off-diagonal
fn banded_csr(nb: usize, d: usize, device: &CpuDevice) -> SparseMatrix<CpuRuntime, f64> {
    let n = nb * d;
    let mut rng = StdRng::seed_from_u64(42);

    let mut row_offsets = Vec::with_capacity(n + 1);
    let mut col_indices = Vec::new();
    let mut values = Vec::new();

    row_offsets.push(0i32);
    for row in 0..n {
        let br = row / d;
        for bc in br.saturating_sub(1)..(br + 1).min(nb) {
            for bj in 0..d {
                col_indices.push((bc * d + bj) as i32);
                values.push(rng.gen_range(-1.0..1.0));
            }
        }
        row_offsets.push(col_indices.len() as i32);
    }

    SparseMatrix::from(
        CsrData::from_slices(&row_offsets, &col_indices, &values, n, n, device).unwrap(),
    )
}

fn bench_spmv(c: &mut Criterion) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);

    let mut group = c.benchmark_group("spmv");
    for &nb in &[256usize, 1024] {
        let d = 4;
        let n = nb * d;

        let csr = banded_csr(nb, d, &device);
        let mut bcsr = SparseMatrix::<CpuRuntime, f64>::bcsr(&device, d);
        bcsr.convert_from(&csr, &client).unwrap();

        let x = DenseVector::ones(n, &device);

        group.bench_with_input(BenchmarkId::new("csr", n), &n, |b, _| {
            let mut y = DenseVector::zeros(n, &device);
            b.iter(|| {
                csr.apply(black_box(&x), &mut y, &client);
            });
        });

        group.bench_with_input(BenchmarkId::new("bcsr", n), &n, |b, _| {
            let mut y = DenseVector::zeros(n, &device);
            b.iter(|| {
                bcsr.apply(black_box(&x), &mut y, &client);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spmv);
criterion_main!(benches);
