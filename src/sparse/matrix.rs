//! Format-erased matrix handle
//!
//! [`SparseMatrix`] is the handle the solver layer holds: the backend is a
//! type parameter, the storage format is a runtime property. Every operation
//! first matches on the concrete format of its operand(s), then routes to
//! transfer, conversion or apply behavior; an operand pairing with no
//! supported path is a hard failure.

use crate::dtype::Element;
use crate::runtime::{Device, Runtime};

use super::bcsr::BcsrData;
use super::csr::CsrData;
use super::format::{SparseFormat, SparseStorage};

/// A sparse matrix on backend `R` in one of the supported storage formats
///
/// The concrete format of an operand is only known at runtime; the variant
/// dispatch in the transfer/conversion/apply engines replaces per-call-site
/// concrete-type tests.
#[derive(Debug)]
pub enum SparseMatrix<R: Runtime, T: Element> {
    /// Row-compressed storage
    Csr(CsrData<R, T>),
    /// Block-row-compressed storage
    Bcsr(BcsrData<R, T>),
}

impl<R: Runtime, T: Element> SparseMatrix<R, T> {
    /// Create an empty CSR matrix on a device
    pub fn csr(device: &R::Device) -> Self {
        SparseMatrix::Csr(CsrData::new(device))
    }

    /// Create an empty BCSR matrix on a device with a target block dimension
    pub fn bcsr(device: &R::Device, blockdim: usize) -> Self {
        SparseMatrix::Bcsr(BcsrData::new(device, blockdim))
    }

    /// Device this matrix lives on
    pub fn device(&self) -> &R::Device {
        match self {
            SparseMatrix::Csr(m) => m.device(),
            SparseMatrix::Bcsr(m) => m.device(),
        }
    }

    /// Release all storage, resetting to the empty state
    pub fn clear(&mut self) {
        match self {
            SparseMatrix::Csr(m) => m.clear(),
            SparseMatrix::Bcsr(m) => m.clear(),
        }
    }

    /// Borrow the CSR descriptor, if this matrix is stored as CSR
    pub fn as_csr(&self) -> Option<&CsrData<R, T>> {
        match self {
            SparseMatrix::Csr(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the BCSR descriptor, if this matrix is stored as BCSR
    pub fn as_bcsr(&self) -> Option<&BcsrData<R, T>> {
        match self {
            SparseMatrix::Bcsr(m) => Some(m),
            _ => None,
        }
    }

    /// One-line diagnostic dump, used in fatal-error reporting
    pub fn info(&self) -> String {
        match self {
            SparseMatrix::Csr(m) => m.info(),
            SparseMatrix::Bcsr(m) => m.info(),
        }
    }
}

impl<R: Runtime, T: Element> SparseStorage for SparseMatrix<R, T> {
    fn format(&self) -> SparseFormat {
        match self {
            SparseMatrix::Csr(_) => SparseFormat::Csr,
            SparseMatrix::Bcsr(_) => SparseFormat::Bcsr,
        }
    }

    fn nrows(&self) -> usize {
        match self {
            SparseMatrix::Csr(m) => m.nrows(),
            SparseMatrix::Bcsr(m) => m.nrows(),
        }
    }

    fn ncols(&self) -> usize {
        match self {
            SparseMatrix::Csr(m) => m.ncols(),
            SparseMatrix::Bcsr(m) => m.ncols(),
        }
    }

    fn nnz(&self) -> usize {
        match self {
            SparseMatrix::Csr(m) => m.nnz(),
            SparseMatrix::Bcsr(m) => m.nnz(),
        }
    }
}

impl<R: Runtime, T: Element> From<CsrData<R, T>> for SparseMatrix<R, T> {
    fn from(data: CsrData<R, T>) -> Self {
        SparseMatrix::Csr(data)
    }
}

impl<R: Runtime, T: Element> From<BcsrData<R, T>> for SparseMatrix<R, T> {
    fn from(data: BcsrData<R, T>) -> Self {
        SparseMatrix::Bcsr(data)
    }
}

/// Report a caller contract violation and terminate
///
/// Used for operand pairings the engines do not support (format mismatch in
/// a copy, incompatible apply operands). Dumps the diagnostic state of both
/// operands, then panics.
pub(crate) fn fatal_operands(op: &str, dst_info: &str, src_info: &str) -> ! {
    log::error!("{}: unsupported operand pairing", op);
    log::error!("  destination: {}", dst_info);
    log::error!("  source: {}", src_info);
    panic!(
        "{}: unsupported operand pairing (destination: {}, source: {})",
        op, dst_info, src_info
    );
}

/// Report a device mismatch between operands and terminate
pub(crate) fn check_same_device<D: Device>(op: &str, a: &D, b: &D) {
    if !a.is_same(b) {
        log::error!(
            "{}: operands on different devices ({} vs {})",
            op,
            a.name(),
            b.name()
        );
        panic!(
            "{}: operands on different devices ({} vs {})",
            op,
            a.name(),
            b.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_format_tags() {
        let device = CpuDevice::new();
        let csr = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        let bcsr = SparseMatrix::<CpuRuntime, f64>::bcsr(&device, 2);

        assert_eq!(csr.format(), SparseFormat::Csr);
        assert_eq!(bcsr.format(), SparseFormat::Bcsr);
        assert!(csr.is_empty());
        assert!(bcsr.is_empty());
    }

    #[test]
    fn test_accessors() {
        let device = CpuDevice::new();
        let mat = SparseMatrix::<CpuRuntime, f32>::csr(&device);
        assert!(mat.as_csr().is_some());
        assert!(mat.as_bcsr().is_none());
    }

    #[test]
    fn test_clear_through_handle() {
        let device = CpuDevice::new();
        let csr = CsrData::<CpuRuntime, f64>::from_slices(
            &[0, 1],
            &[0],
            &[5.0],
            1,
            1,
            &device,
        )
        .unwrap();
        let mut mat = SparseMatrix::from(csr);
        assert_eq!(mat.nnz(), 1);

        mat.clear();
        assert!(mat.is_empty());
        assert_eq!(mat.nrows(), 0);
    }
}
