//! Sparse kernels for the CUDA backend
//!
//! Implements the `SparseKernels` contract on top of cuSPARSE: the generic
//! SpMV API for CSR, the legacy bsrmv entry point for BCSR, and csr2bsr for
//! the format conversion. bcsr->csr has no routine here; callers fall back
//! to converting through host memory.

use super::client::CudaClient;
use super::cusparse;
use super::cusparse::CudaMatDescr;
use super::runtime::CudaRuntime;
use crate::buffer::DeviceBuffer;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{BcsrData, CsrData, SparseFormat, SparseKernels, SparseStorage};
use crate::vector::DenseVector;

/// The value types the cuSPARSE entry points used here are instantiated for
fn check_dtype<T: Element>(op: &'static str) -> Result<()> {
    match T::DTYPE {
        DType::F32 | DType::F64 => Ok(()),
        other => Err(Error::unsupported_dtype(other, op)),
    }
}

impl SparseKernels<CudaRuntime> for CudaClient {
    fn spmv_csr<T: Element>(
        &self,
        mat: &CsrData<CudaRuntime, T>,
        alpha: T,
        x: &DenseVector<CudaRuntime, T>,
        beta: T,
        y: &mut DenseVector<CudaRuntime, T>,
    ) -> Result<()> {
        check_dtype::<T>("spmv_csr")?;
        let device = self.device.clone();

        unsafe {
            cusparse::spmv_csr_raw::<T>(
                &self.sparse,
                mat.nrows() as i64,
                mat.ncols() as i64,
                mat.nnz() as i64,
                mat.row_offsets().ptr(),
                mat.col_indices().ptr(),
                mat.values().ptr(),
                alpha,
                x.buffer().ptr(),
                beta,
                y.buffer_mut().ptr(),
                |size| CudaRuntime::allocate(size, &device),
                |ptr, size| CudaRuntime::deallocate(ptr, size, &device),
            )
        }
        .map_err(Error::from)
    }

    fn spmv_bcsr<T: Element>(
        &self,
        mat: &BcsrData<CudaRuntime, T>,
        alpha: T,
        x: &DenseVector<CudaRuntime, T>,
        beta: T,
        y: &mut DenseVector<CudaRuntime, T>,
    ) -> Result<()> {
        check_dtype::<T>("spmv_bcsr")?;

        unsafe {
            cusparse::bsrmv_raw::<T>(
                &self.sparse,
                mat.context(),
                mat.nrowb() as i32,
                mat.ncolb() as i32,
                mat.nnzb() as i32,
                mat.blockdim() as i32,
                alpha,
                mat.values().ptr(),
                mat.row_offsets().ptr(),
                mat.col_indices().ptr(),
                x.buffer().ptr(),
                beta,
                y.buffer_mut().ptr(),
            )
        }
        .map_err(Error::from)
    }

    fn csr_to_bcsr<T: Element>(
        &self,
        src: &CsrData<CudaRuntime, T>,
        blockdim: usize,
    ) -> Result<BcsrData<CudaRuntime, T>> {
        check_dtype::<T>("csr_to_bcsr")?;

        if blockdim <= 1 {
            return Err(Error::invalid_argument(
                "blockdim",
                format!("must be > 1, got {}", blockdim),
            ));
        }

        let d = blockdim;
        let nrows = src.nrows();
        let ncols = src.ncols();
        let nrowb = (nrows + d - 1) / d;
        let ncolb = (ncols + d - 1) / d;

        let device = self.device.clone();
        let bsr_descr = CudaMatDescr::new().map_err(Error::from)?;

        let row_offsets = DeviceBuffer::<CudaRuntime, i32>::zeroed(nrowb + 1, &device);

        let nnzb = unsafe {
            cusparse::csr2bsr_nnz(
                &self.sparse,
                src.context(),
                &bsr_descr,
                nrows as i32,
                ncols as i32,
                d as i32,
                src.row_offsets().ptr(),
                src.col_indices().ptr(),
                row_offsets.ptr(),
            )
        }
        .map_err(Error::from)? as usize;

        let col_indices = DeviceBuffer::<CudaRuntime, i32>::zeroed(nnzb, &device);
        let values = DeviceBuffer::<CudaRuntime, T>::zeroed(nnzb * d * d, &device);

        unsafe {
            cusparse::csr2bsr::<T>(
                &self.sparse,
                src.context(),
                &bsr_descr,
                nrows as i32,
                ncols as i32,
                d as i32,
                src.values().ptr(),
                src.row_offsets().ptr(),
                src.col_indices().ptr(),
                values.ptr(),
                row_offsets.ptr(),
                col_indices.ptr(),
            )
        }
        .map_err(Error::from)?;

        Ok(BcsrData::from_buffers(
            row_offsets,
            col_indices,
            values,
            nrowb,
            ncolb,
            blockdim,
        ))
    }

    fn bcsr_to_csr<T: Element>(
        &self,
        _src: &BcsrData<CudaRuntime, T>,
    ) -> Result<CsrData<CudaRuntime, T>> {
        // no block-expansion routine on this backend; the host path is the
        // documented fallback
        Err(Error::unsupported_conversion(
            SparseFormat::Bcsr,
            SparseFormat::Csr,
            CudaRuntime::name(),
        ))
    }
}
