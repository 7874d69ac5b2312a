//! Apply engine: matrix-vector products
//!
//! Dispatches `y = A*x` and `y += scalar*A*x` to the backend kernel for the
//! concrete storage format. Size or device mismatches between the operands
//! are caller contract violations; so is a nonzero status from the backend
//! math library. Neither is recoverable at this layer.

use crate::dtype::Element;
use crate::runtime::Runtime;
use crate::vector::DenseVector;

use super::format::SparseStorage;
use super::matrix::{check_same_device, SparseMatrix};
use super::ops::SparseKernels;

impl<R, T> SparseMatrix<R, T>
where
    R: Runtime,
    R::Client: SparseKernels<R>,
    T: Element,
{
    fn check_apply_operands(&self, op: &str, x: &DenseVector<R, T>, y: &DenseVector<R, T>) {
        check_same_device(op, self.device(), x.device());
        check_same_device(op, self.device(), y.device());

        if x.len() != self.ncols() || y.len() != self.nrows() {
            log::error!(
                "{}: operand sizes x={} y={} do not match matrix shape",
                op,
                x.len(),
                y.len()
            );
            log::error!("  matrix: {}", self.info());
            panic!(
                "{}: expected x.len()={} and y.len()={}, got x.len()={} and y.len()={} ({})",
                op,
                self.ncols(),
                self.nrows(),
                x.len(),
                y.len(),
                self.info()
            );
        }
    }

    /// Compute `y = A * x`
    ///
    /// An empty matrix is the zero operator: no backend call is made and `y`
    /// is zero-filled. Backend kernel failures are fatal.
    pub fn apply(&self, x: &DenseVector<R, T>, y: &mut DenseVector<R, T>, client: &R::Client) {
        self.check_apply_operands("SparseMatrix::apply", x, y);

        if self.nnz() == 0 {
            y.fill_zero();
            return;
        }

        let result = match self {
            SparseMatrix::Csr(m) => client.spmv_csr(m, T::one(), x, T::zero(), y),
            SparseMatrix::Bcsr(m) => client.spmv_bcsr(m, T::one(), x, T::zero(), y),
        };

        if let Err(e) = result {
            log::error!("SparseMatrix::apply: backend kernel failed: {}", e);
            log::error!("  matrix: {}", self.info());
            panic!("SparseMatrix::apply: backend kernel failed: {} ({})", e, self.info());
        }
    }

    /// Compute `y += scalar * A * x`
    ///
    /// An empty matrix is the zero operator: no backend call is made and `y`
    /// is left unchanged. Backend kernel failures are fatal.
    pub fn apply_add(
        &self,
        x: &DenseVector<R, T>,
        scalar: T,
        y: &mut DenseVector<R, T>,
        client: &R::Client,
    ) {
        self.check_apply_operands("SparseMatrix::apply_add", x, y);

        if self.nnz() == 0 {
            return;
        }

        let result = match self {
            SparseMatrix::Csr(m) => client.spmv_csr(m, scalar, x, T::one(), y),
            SparseMatrix::Bcsr(m) => client.spmv_bcsr(m, scalar, x, T::one(), y),
        };

        if let Err(e) = result {
            log::error!("SparseMatrix::apply_add: backend kernel failed: {}", e);
            log::error!("  matrix: {}", self.info());
            panic!(
                "SparseMatrix::apply_add: backend kernel failed: {} ({})",
                e,
                self.info()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::sparse::CsrData;

    fn device() -> CpuDevice {
        CpuDevice::new()
    }

    fn host_csr(device: &CpuDevice) -> SparseMatrix<CpuRuntime, f64> {
        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        SparseMatrix::from(
            CsrData::from_slices(
                &[0, 2, 3, 5],
                &[0, 2, 2, 0, 1],
                &[1.0, 2.0, 3.0, 4.0, 5.0],
                3,
                3,
                device,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_apply_csr() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let a = host_csr(&device);

        let x = DenseVector::from_slice(&[1.0, 2.0, 3.0], &device);
        let mut y = DenseVector::zeros(3, &device);
        a.apply(&x, &mut y, &client);

        assert_eq!(y.to_vec(), vec![7.0, 9.0, 14.0]);
    }

    #[test]
    fn test_apply_overwrites_output() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let a = host_csr(&device);

        let x = DenseVector::from_slice(&[1.0, 2.0, 3.0], &device);
        let mut y = DenseVector::from_slice(&[100.0, 100.0, 100.0], &device);
        a.apply(&x, &mut y, &client);

        assert_eq!(y.to_vec(), vec![7.0, 9.0, 14.0]);
    }

    #[test]
    fn test_apply_add_accumulates() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let a = host_csr(&device);

        let x = DenseVector::from_slice(&[1.0, 2.0, 3.0], &device);
        let mut y = DenseVector::from_slice(&[1.0, 1.0, 1.0], &device);
        a.apply_add(&x, 2.0, &mut y, &client);

        assert_eq!(y.to_vec(), vec![15.0, 19.0, 29.0]);
    }

    #[test]
    fn test_empty_matrix_is_zero_operator() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let a = SparseMatrix::<CpuRuntime, f64>::csr(&device);

        // an empty matrix has zero rows and columns, so the correctly-sized
        // operands are zero-length vectors
        let x = DenseVector::zeros(0, &device);
        let mut y = DenseVector::zeros(0, &device);

        a.apply(&x, &mut y, &client);
        assert!(y.to_vec().is_empty());

        a.apply_add(&x, 3.0, &mut y, &client);
        assert!(y.to_vec().is_empty());
    }

    #[test]
    #[should_panic(expected = "expected x.len()")]
    fn test_apply_size_mismatch_is_fatal() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let a = host_csr(&device);

        let x = DenseVector::from_slice(&[1.0, 2.0], &device);
        let mut y = DenseVector::zeros(3, &device);
        a.apply(&x, &mut y, &client);
    }
}
