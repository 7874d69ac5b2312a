//! cuSPARSE wrappers for the CUDA backend
//!
//! RAII wrappers around the cuSPARSE handles the backend needs, plus typed
//! entry points for the bsrmv and csr2bsr routines. The legacy BSR API takes
//! 32-bit indices and a per-matrix `cusparseMatDescr_t`; the generic SpMV
//! API takes descriptor objects created per call.

#![allow(unsafe_op_in_unsafe_fn)]

use super::device::CudaError;
use crate::dtype::{DType, Element};
use crate::sparse::{BlockLayout, BLOCK_LAYOUT};
use cudarc::cusparse::sys::*;
use cudarc::driver::CudaStream;
use std::ptr::null_mut;
use std::sync::Arc;

/// RAII wrapper for the cuSPARSE library handle
///
/// One per client; all cuSPARSE calls are ordered on the client's stream.
pub struct CudaSparse {
    handle: cusparseHandle_t,
    stream: Arc<CudaStream>,
}

impl CudaSparse {
    /// Create a new cuSPARSE handle bound to a stream
    pub fn new(stream: Arc<CudaStream>) -> Result<Self, CudaError> {
        unsafe {
            let mut handle = null_mut();
            check_cusparse(cusparseCreate(&mut handle))?;

            check_cusparse(cusparseSetStream(
                handle,
                stream.cu_stream() as cudaStream_t,
            ))?;

            Ok(Self { handle, stream })
        }
    }

    /// Get the raw cuSPARSE handle
    #[inline]
    pub fn handle(&self) -> cusparseHandle_t {
        self.handle
    }

    /// Get the associated CUDA stream
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }
}

impl Drop for CudaSparse {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroy(self.handle);
        }
    }
}

// cusparseHandle_t is a raw pointer, so we need to manually implement
// Send/Sync. SAFETY: cuSPARSE operations are synchronized by the associated
// CUDA stream.
unsafe impl Send for CudaSparse {}
unsafe impl Sync for CudaSparse {}

/// Per-matrix cuSPARSE descriptor (legacy BSR API)
///
/// Created with zero index base and the general matrix type; lives exactly
/// as long as the matrix descriptor that owns it.
pub struct CudaMatDescr {
    descr: cusparseMatDescr_t,
}

impl CudaMatDescr {
    /// Create a descriptor with zero index base and general matrix type
    pub fn new() -> Result<Self, CudaError> {
        unsafe {
            let mut descr = null_mut();
            check_cusparse(cusparseCreateMatDescr(&mut descr))?;
            check_cusparse(cusparseSetMatIndexBase(
                descr,
                cusparseIndexBase_t::CUSPARSE_INDEX_BASE_ZERO,
            ))?;
            check_cusparse(cusparseSetMatType(
                descr,
                cusparseMatrixType_t::CUSPARSE_MATRIX_TYPE_GENERAL,
            ))?;
            Ok(Self { descr })
        }
    }

    /// Get the raw descriptor handle
    #[inline]
    pub fn handle(&self) -> cusparseMatDescr_t {
        self.descr
    }
}

impl Drop for CudaMatDescr {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroyMatDescr(self.descr);
        }
    }
}

// SAFETY: the descriptor is immutable after construction; uses are ordered
// by the owning matrix's stream.
unsafe impl Send for CudaMatDescr {}
unsafe impl Sync for CudaMatDescr {}

impl std::fmt::Debug for CudaMatDescr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaMatDescr")
            .field("descr", &format_args!("{:p}", self.descr))
            .finish()
    }
}

/// Check cuSPARSE status and convert to Result
pub fn check_cusparse(status: cusparseStatus_t) -> Result<(), CudaError> {
    if status == cusparseStatus_t::CUSPARSE_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(CudaError::CusparseError(format!(
            "cusparse error: {:?}",
            status
        )))
    }
}

/// Convert DType to cudaDataType for cuSPARSE
pub fn dtype_to_cusparse(dtype: DType) -> Option<cudaDataType> {
    match dtype {
        DType::F64 => Some(cudaDataType::CUDA_R_64F),
        DType::F32 => Some(cudaDataType::CUDA_R_32F),
        DType::I32 => Some(cudaDataType::CUDA_R_32I),
        #[cfg(feature = "f16")]
        DType::F16 => None,
    }
}

/// The cuSPARSE block direction matching the crate-wide block layout
#[inline]
pub fn block_direction() -> cusparseDirection_t {
    match BLOCK_LAYOUT {
        BlockLayout::RowMajor => cusparseDirection_t::CUSPARSE_DIRECTION_ROW,
        BlockLayout::ColumnMajor => cusparseDirection_t::CUSPARSE_DIRECTION_COLUMN,
    }
}

/// RAII wrapper for a generic-API CSR matrix descriptor
pub struct CsrSpMatDescr {
    descr: cusparseSpMatDescr_t,
}

impl CsrSpMatDescr {
    /// Create a new CSR matrix descriptor over device buffers
    ///
    /// # Safety
    /// - `row_offsets` must point to valid device memory with (rows + 1)
    ///   elements
    /// - `col_indices` and `values` must point to valid device memory with
    ///   nnz elements
    pub unsafe fn new(
        rows: i64,
        cols: i64,
        nnz: i64,
        row_offsets: u64,
        col_indices: u64,
        values: u64,
        data_type: cudaDataType,
    ) -> Result<Self, CudaError> {
        let mut descr = null_mut();
        check_cusparse(cusparseCreateCsr(
            &mut descr,
            rows,
            cols,
            nnz,
            row_offsets as *mut std::ffi::c_void,
            col_indices as *mut std::ffi::c_void,
            values as *mut std::ffi::c_void,
            cusparseIndexType_t::CUSPARSE_INDEX_32I,
            cusparseIndexType_t::CUSPARSE_INDEX_32I,
            cusparseIndexBase_t::CUSPARSE_INDEX_BASE_ZERO,
            data_type,
        ))?;
        Ok(Self { descr })
    }

    /// Get the raw descriptor handle
    #[inline]
    pub fn handle(&self) -> cusparseSpMatDescr_t {
        self.descr
    }
}

impl Drop for CsrSpMatDescr {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroySpMat(self.descr);
        }
    }
}

/// RAII wrapper for a generic-API dense vector descriptor
pub struct DnVecDescr {
    descr: cusparseDnVecDescr_t,
}

impl DnVecDescr {
    /// Create a new dense vector descriptor over a device buffer
    ///
    /// # Safety
    /// - `values` must point to valid device memory with `size` elements
    pub unsafe fn new(size: i64, values: u64, data_type: cudaDataType) -> Result<Self, CudaError> {
        let mut descr = null_mut();
        check_cusparse(cusparseCreateDnVec(
            &mut descr,
            size,
            values as *mut std::ffi::c_void,
            data_type,
        ))?;
        Ok(Self { descr })
    }

    /// Get the raw descriptor handle
    #[inline]
    pub fn handle(&self) -> cusparseDnVecDescr_t {
        self.descr
    }
}

impl Drop for DnVecDescr {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroyDnVec(self.descr);
        }
    }
}

/// Generic-API SpMV: `y = alpha * A * x + beta * y` over CSR buffers
///
/// # Safety
/// All raw handles must reference valid, live device buffers of the stated
/// sizes, allocated on the device the handle's stream belongs to.
#[allow(clippy::too_many_arguments)]
pub unsafe fn spmv_csr_raw<T: Element>(
    sparse: &CudaSparse,
    rows: i64,
    cols: i64,
    nnz: i64,
    row_offsets: u64,
    col_indices: u64,
    values: u64,
    alpha: T,
    x: u64,
    beta: T,
    y: u64,
    workspace_alloc: impl FnOnce(usize) -> u64,
    workspace_free: impl FnOnce(u64, usize),
) -> Result<(), CudaError> {
    let data_type = dtype_to_cusparse(T::DTYPE).ok_or_else(|| {
        CudaError::CusparseError(format!("no cusparse data type for {}", T::DTYPE))
    })?;

    let mat = CsrSpMatDescr::new(rows, cols, nnz, row_offsets, col_indices, values, data_type)?;
    let vec_x = DnVecDescr::new(cols, x, data_type)?;
    let vec_y = DnVecDescr::new(rows, y, data_type)?;

    // scalars live on the host, typed to match the compute type
    let alpha_f64 = alpha.to_f64();
    let beta_f64 = beta.to_f64();
    let alpha_f32 = alpha_f64 as f32;
    let beta_f32 = beta_f64 as f32;
    let (alpha_ptr, beta_ptr): (*const std::ffi::c_void, *const std::ffi::c_void) =
        match T::DTYPE {
            DType::F64 => (
                &alpha_f64 as *const f64 as *const _,
                &beta_f64 as *const f64 as *const _,
            ),
            _ => (
                &alpha_f32 as *const f32 as *const _,
                &beta_f32 as *const f32 as *const _,
            ),
        };

    let mut buffer_size = 0usize;
    check_cusparse(cusparseSpMV_bufferSize(
        sparse.handle(),
        cusparseOperation_t::CUSPARSE_OPERATION_NON_TRANSPOSE,
        alpha_ptr,
        mat.handle(),
        vec_x.handle(),
        beta_ptr,
        vec_y.handle(),
        data_type,
        cusparseSpMVAlg_t::CUSPARSE_SPMV_ALG_DEFAULT,
        &mut buffer_size,
    ))?;

    let workspace = workspace_alloc(buffer_size);
    let status = cusparseSpMV(
        sparse.handle(),
        cusparseOperation_t::CUSPARSE_OPERATION_NON_TRANSPOSE,
        alpha_ptr,
        mat.handle(),
        vec_x.handle(),
        beta_ptr,
        vec_y.handle(),
        data_type,
        cusparseSpMVAlg_t::CUSPARSE_SPMV_ALG_DEFAULT,
        workspace as *mut std::ffi::c_void,
    );
    // the workspace is only referenced while the call runs on the stream;
    // synchronize before releasing it
    let _ = sparse.stream().synchronize();
    workspace_free(workspace, buffer_size);
    check_cusparse(status)
}

/// Legacy-API BSR SpMV: `y = alpha * A * x + beta * y`
///
/// # Safety
/// All raw handles must reference valid, live device buffers of the stated
/// sizes; `descr` must be a live matrix descriptor.
#[allow(clippy::too_many_arguments)]
pub unsafe fn bsrmv_raw<T: Element>(
    sparse: &CudaSparse,
    descr: &CudaMatDescr,
    nrowb: i32,
    ncolb: i32,
    nnzb: i32,
    blockdim: i32,
    alpha: T,
    values: u64,
    row_offsets: u64,
    col_indices: u64,
    x: u64,
    beta: T,
    y: u64,
) -> Result<(), CudaError> {
    let dir = block_direction();
    let op = cusparseOperation_t::CUSPARSE_OPERATION_NON_TRANSPOSE;

    match T::DTYPE {
        DType::F32 => {
            let alpha = alpha.to_f64() as f32;
            let beta = beta.to_f64() as f32;
            check_cusparse(cusparseSbsrmv(
                sparse.handle(),
                dir,
                op,
                nrowb,
                ncolb,
                nnzb,
                &alpha,
                descr.handle(),
                values as *const f32,
                row_offsets as *const i32,
                col_indices as *const i32,
                blockdim,
                x as *const f32,
                &beta,
                y as *mut f32,
            ))
        }
        DType::F64 => {
            let alpha = alpha.to_f64();
            let beta = beta.to_f64();
            check_cusparse(cusparseDbsrmv(
                sparse.handle(),
                dir,
                op,
                nrowb,
                ncolb,
                nnzb,
                &alpha,
                descr.handle(),
                values as *const f64,
                row_offsets as *const i32,
                col_indices as *const i32,
                blockdim,
                x as *const f64,
                &beta,
                y as *mut f64,
            ))
        }
        other => Err(CudaError::CusparseError(format!(
            "bsrmv has no kernel for dtype {}",
            other
        ))),
    }
}

/// Legacy-API csr2bsr, step 1: count the nonzero blocks
///
/// Writes the BSR row offsets into `bsr_row_offsets` (length `nrowb + 1`)
/// and returns `nnzb`. Synchronizes the stream so the host-side count is
/// valid on return.
///
/// # Safety
/// All raw handles must reference valid, live device buffers of the stated
/// sizes; descriptors must be live.
#[allow(clippy::too_many_arguments)]
pub unsafe fn csr2bsr_nnz(
    sparse: &CudaSparse,
    csr_descr: &CudaMatDescr,
    bsr_descr: &CudaMatDescr,
    nrows: i32,
    ncols: i32,
    blockdim: i32,
    csr_row_offsets: u64,
    csr_col_indices: u64,
    bsr_row_offsets: u64,
) -> Result<i32, CudaError> {
    let mut nnzb: i32 = 0;
    check_cusparse(cusparseXcsr2bsrNnz(
        sparse.handle(),
        block_direction(),
        nrows,
        ncols,
        csr_descr.handle(),
        csr_row_offsets as *const i32,
        csr_col_indices as *const i32,
        blockdim,
        bsr_descr.handle(),
        bsr_row_offsets as *mut i32,
        &mut nnzb,
    ))?;

    sparse
        .stream()
        .synchronize()
        .map_err(|e| CudaError::SyncError(format!("csr2bsr_nnz sync failed: {:?}", e)))?;

    Ok(nnzb)
}

/// Legacy-API csr2bsr, step 2: reshape indices and scatter values into
/// zero-padded blocks
///
/// # Safety
/// All raw handles must reference valid, live device buffers of the stated
/// sizes (the BSR buffers sized from the `csr2bsr_nnz` result); descriptors
/// must be live.
#[allow(clippy::too_many_arguments)]
pub unsafe fn csr2bsr<T: Element>(
    sparse: &CudaSparse,
    csr_descr: &CudaMatDescr,
    bsr_descr: &CudaMatDescr,
    nrows: i32,
    ncols: i32,
    blockdim: i32,
    csr_values: u64,
    csr_row_offsets: u64,
    csr_col_indices: u64,
    bsr_values: u64,
    bsr_row_offsets: u64,
    bsr_col_indices: u64,
) -> Result<(), CudaError> {
    let dir = block_direction();

    match T::DTYPE {
        DType::F32 => check_cusparse(cusparseScsr2bsr(
            sparse.handle(),
            dir,
            nrows,
            ncols,
            csr_descr.handle(),
            csr_values as *const f32,
            csr_row_offsets as *const i32,
            csr_col_indices as *const i32,
            blockdim,
            bsr_descr.handle(),
            bsr_values as *mut f32,
            bsr_row_offsets as *mut i32,
            bsr_col_indices as *mut i32,
        )),
        DType::F64 => check_cusparse(cusparseDcsr2bsr(
            sparse.handle(),
            dir,
            nrows,
            ncols,
            csr_descr.handle(),
            csr_values as *const f64,
            csr_row_offsets as *const i32,
            csr_col_indices as *const i32,
            blockdim,
            bsr_descr.handle(),
            bsr_values as *mut f64,
            bsr_row_offsets as *mut i32,
            bsr_col_indices as *mut i32,
        )),
        other => Err(CudaError::CusparseError(format!(
            "csr2bsr has no kernel for dtype {}",
            other
        ))),
    }
}
