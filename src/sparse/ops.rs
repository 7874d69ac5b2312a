//! Backend kernel contract
//!
//! Defines the sparse kernels every backend client implements. The transfer
//! engine never needs kernels; the conversion and apply engines dispatch
//! through this trait, so adding a backend means implementing `SparseKernels`
//! for its client type.

use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::{Runtime, RuntimeClient};
use crate::vector::DenseVector;

use super::bcsr::BcsrData;
use super::csr::CsrData;

/// Sparse kernels provided by a backend client
///
/// # Contract
///
/// - SpMV kernels compute `y = alpha * A * x + beta * y`; callers guarantee
///   `x.len() == A.ncols()` and `y.len() == A.nrows()` and that all operands
///   share the client's device. Kernels are never invoked on empty matrices.
/// - Conversion kernels build a fully-populated descriptor on the client's
///   device or fail without side effects. A pairing the backend has no
///   routine for reports [`Error::UnsupportedConversion`]; the caller treats
///   that as a planning failure, not a fault.
/// - Any other error return indicates a device or math-library fault and is
///   escalated by the calling engine.
///
/// [`Error::UnsupportedConversion`]: crate::error::Error::UnsupportedConversion
pub trait SparseKernels<R: Runtime>: RuntimeClient<R> {
    /// CSR sparse matrix-vector multiply-accumulate:
    /// `y = alpha * A * x + beta * y`
    fn spmv_csr<T: Element>(
        &self,
        mat: &CsrData<R, T>,
        alpha: T,
        x: &DenseVector<R, T>,
        beta: T,
        y: &mut DenseVector<R, T>,
    ) -> Result<()>;

    /// BCSR sparse matrix-vector multiply-accumulate:
    /// `y = alpha * A * x + beta * y`
    ///
    /// The intra-block storage order is the crate-wide
    /// [`BLOCK_LAYOUT`](super::format::BLOCK_LAYOUT) constant.
    fn spmv_bcsr<T: Element>(
        &self,
        mat: &BcsrData<R, T>,
        alpha: T,
        x: &DenseVector<R, T>,
        beta: T,
        y: &mut DenseVector<R, T>,
    ) -> Result<()>;

    /// Convert a CSR matrix into BCSR form with the given block dimension
    ///
    /// Block counts round up (`nrowb = ceil(nrows / blockdim)`); positions
    /// with no CSR entry inside a stored block are zero-filled, so the
    /// resulting matrix may report padded derived dimensions.
    fn csr_to_bcsr<T: Element>(
        &self,
        src: &CsrData<R, T>,
        blockdim: usize,
    ) -> Result<BcsrData<R, T>>;

    /// Expand a BCSR matrix into CSR form
    ///
    /// Every stored block position becomes a CSR entry (including explicit
    /// zeros), so the result has `nnzb * blockdim^2` entries.
    fn bcsr_to_csr<T: Element>(&self, src: &BcsrData<R, T>) -> Result<CsrData<R, T>>;
}
