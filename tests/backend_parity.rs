//! Host/accelerator parity tests
//!
//! These exercise the cross-backend transfer paths, the device conversion
//! routine and the recoverable unsupported-conversion contract. They only
//! run with the `cuda` feature on a machine with a usable GPU; otherwise
//! each test returns early.

#![cfg(feature = "cuda")]

mod common;

use common::{assert_allclose_f64, blocked_6x6_csr, create_cpu_client};
use sparsix::prelude::*;
use sparsix::runtime::cuda::is_cuda_available;

fn cuda_client() -> Option<(CudaClient, CudaDevice)> {
    if !is_cuda_available() {
        eprintln!("skipping: CUDA not available");
        return None;
    }
    let device = CudaDevice::new(0);
    Some((CudaRuntime::default_client(&device), device))
}

#[test]
fn host_device_roundtrip_is_bit_exact() {
    let Some((cuda, cuda_dev)) = cuda_client() else {
        return;
    };
    let (_, host_dev) = create_cpu_client();

    let host = blocked_6x6_csr(&host_dev);

    // host -> device: empty destination allocates itself to the source shape
    let mut device_mat = SparseMatrix::<CudaRuntime, f64>::csr(&cuda_dev);
    device_mat.copy_from_host(&host);
    assert_eq!(device_mat.nnz(), 12);

    // device -> host into a fresh matrix
    let mut back = SparseMatrix::<CpuRuntime, f64>::csr(&host_dev);
    device_mat.copy_to_host(&mut back);

    let h = host.as_csr().unwrap();
    let b = back.as_csr().unwrap();
    assert_eq!(b.row_offsets().to_vec(), h.row_offsets().to_vec());
    assert_eq!(b.col_indices().to_vec(), h.col_indices().to_vec());
    assert_eq!(b.values().to_vec(), h.values().to_vec());

    cuda.synchronize();
}

#[test]
fn async_roundtrip_after_synchronize() {
    let Some((cuda, cuda_dev)) = cuda_client() else {
        return;
    };
    let (_, host_dev) = create_cpu_client();

    let host = blocked_6x6_csr(&host_dev);

    let mut device_mat = SparseMatrix::<CudaRuntime, f64>::csr(&cuda_dev);
    device_mat.copy_from_host_async(&host, &cuda);
    cuda.synchronize();

    let mut back = SparseMatrix::<CpuRuntime, f64>::csr(&host_dev);
    device_mat.copy_to_host_async(&mut back, &cuda);
    cuda.synchronize();

    assert_eq!(
        back.as_csr().unwrap().values().to_vec(),
        host.as_csr().unwrap().values().to_vec()
    );
}

#[test]
fn device_spmv_matches_host_spmv() {
    let Some((cuda, cuda_dev)) = cuda_client() else {
        return;
    };
    let (host_client, host_dev) = create_cpu_client();

    let host = blocked_6x6_csr(&host_dev);
    let mut device_mat = SparseMatrix::<CudaRuntime, f64>::csr(&cuda_dev);
    device_mat.copy_from_host(&host);

    let x_host = vec![0.5, -1.0, 2.0, 1.5, 3.0, -2.5];

    let x = DenseVector::from_slice(&x_host, &host_dev);
    let mut y = DenseVector::zeros(6, &host_dev);
    host.apply(&x, &mut y, &host_client);

    let dx = DenseVector::from_slice(&x_host, &cuda_dev);
    let mut dy = DenseVector::zeros(6, &cuda_dev);
    device_mat.apply(&dx, &mut dy, &cuda);
    cuda.synchronize();

    assert_allclose_f64(&dy.to_vec(), &y.to_vec(), 1e-12, 1e-12, "cpu vs cuda spmv");
}

#[test]
fn device_conversion_matches_host_conversion() {
    let Some((cuda, cuda_dev)) = cuda_client() else {
        return;
    };
    let (host_client, host_dev) = create_cpu_client();

    let host_csr = blocked_6x6_csr(&host_dev);
    let mut host_bcsr = SparseMatrix::<CpuRuntime, f64>::bcsr(&host_dev, 2);
    host_bcsr.convert_from(&host_csr, &host_client).unwrap();

    let mut device_csr = SparseMatrix::<CudaRuntime, f64>::csr(&cuda_dev);
    device_csr.copy_from_host(&host_csr);

    let mut device_bcsr = SparseMatrix::<CudaRuntime, f64>::bcsr(&cuda_dev, 2);
    device_bcsr.convert_from(&device_csr, &cuda).unwrap();
    cuda.synchronize();

    let mut back = SparseMatrix::<CpuRuntime, f64>::bcsr(&host_dev, 2);
    device_bcsr.copy_to_host(&mut back);

    let a = host_bcsr.as_bcsr().unwrap();
    let b = back.as_bcsr().unwrap();
    assert_eq!(b.nnzb(), a.nnzb());
    assert_eq!(b.row_offsets().to_vec(), a.row_offsets().to_vec());
    assert_eq!(b.col_indices().to_vec(), a.col_indices().to_vec());
    assert_eq!(b.values().to_vec(), a.values().to_vec());
}

#[test]
fn unsupported_device_conversion_fails_recoverably() {
    let Some((cuda, cuda_dev)) = cuda_client() else {
        return;
    };
    let (host_client, host_dev) = create_cpu_client();

    let host_csr = blocked_6x6_csr(&host_dev);
    let mut host_bcsr = SparseMatrix::<CpuRuntime, f64>::bcsr(&host_dev, 2);
    host_bcsr.convert_from(&host_csr, &host_client).unwrap();

    let mut device_bcsr = SparseMatrix::<CudaRuntime, f64>::bcsr(&cuda_dev, 2);
    device_bcsr.copy_from_host(&host_bcsr);

    // bcsr -> csr has no device routine: recoverable failure, destination
    // left empty
    let mut device_csr = SparseMatrix::<CudaRuntime, f64>::csr(&cuda_dev);
    let result = device_csr.convert_from(&device_bcsr, &cuda);
    assert!(matches!(result, Err(Error::UnsupportedConversion { .. })));
    assert_eq!(device_csr.nnz(), 0);

    // the documented fallback: convert through host memory
    let mut staged = SparseMatrix::<CpuRuntime, f64>::bcsr(&host_dev, 2);
    device_bcsr.copy_to_host(&mut staged);
    let mut host_out = SparseMatrix::<CpuRuntime, f64>::csr(&host_dev);
    host_out.convert_from(&staged, &host_client).unwrap();
    device_csr.copy_from_host(&host_out);
    assert_eq!(device_csr.nnz(), 12);
}
