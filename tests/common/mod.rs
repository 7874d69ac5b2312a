//! Common test utilities
#![allow(dead_code)]

use sparsix::prelude::*;

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// The 6x6 fixture used across the integration suites: 12 nonzeros arranged
/// in three 2x2 blocks - (0,0), (0,1) and (1,1) on the 3x3 block grid.
///
/// ```text
/// [ 1  2  5  6  .  .]
/// [ 3  4  7  8  .  .]
/// [ .  .  9 10  .  .]
/// [ .  . 11 12  .  .]
/// [ .  .  .  .  .  .]
/// [ .  .  .  .  .  .]
/// ```
pub fn blocked_6x6_csr(device: &CpuDevice) -> SparseMatrix<CpuRuntime, f64> {
    let row_offsets = [0, 4, 8, 10, 12, 12, 12];
    let col_indices = [0, 1, 2, 3, 0, 1, 2, 3, 2, 3, 2, 3];
    let values = [
        1.0, 2.0, 5.0, 6.0, //
        3.0, 4.0, 7.0, 8.0, //
        9.0, 10.0, //
        11.0, 12.0,
    ];
    SparseMatrix::from(
        CsrData::from_slices(&row_offsets, &col_indices, &values, 6, 6, device).unwrap(),
    )
}

/// Dense reference SpMV for validating kernels
pub fn dense_spmv(dense: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
    dense
        .iter()
        .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
        .collect()
}
