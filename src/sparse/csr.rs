//! CSR storage descriptor: struct, lifecycle, host constructors

use crate::buffer::DeviceBuffer;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime, RuntimeClient};

use super::format::{SparseFormat, SparseStorage};

/// CSR (Compressed Sparse Row) sparse matrix descriptor
///
/// A populated descriptor owns three buffers: `row_offsets` (length
/// `nrows + 1`, monotonically non-decreasing, first entry 0, last entry
/// `nnz`), `col_indices` (length `nnz`, zero-based) and `values` (length
/// `nnz`). An empty descriptor owns none and reports zero for every shape
/// field; there is no state in between.
#[derive(Debug)]
pub struct CsrData<R: Runtime, T: Element> {
    row_offsets: Option<DeviceBuffer<R, i32>>,
    col_indices: Option<DeviceBuffer<R, i32>>,
    values: Option<DeviceBuffer<R, T>>,
    nrows: usize,
    ncols: usize,
    nnz: usize,
    device: R::Device,
    ctx: R::MatrixContext,
}

impl<R: Runtime, T: Element> CsrData<R, T> {
    /// Create an empty CSR descriptor on a device
    pub fn new(device: &R::Device) -> Self {
        Self {
            row_offsets: None,
            col_indices: None,
            values: None,
            nrows: 0,
            ncols: 0,
            nnz: 0,
            device: device.clone(),
            ctx: R::matrix_context(device),
        }
    }

    /// Allocate zero-filled storage for `nnz` entries in an `nrows x ncols`
    /// matrix
    ///
    /// Clears any existing state first. A request for zero entries leaves the
    /// descriptor empty.
    pub fn allocate(&mut self, nnz: usize, nrows: usize, ncols: usize) {
        log::trace!(
            "CsrData::allocate nnz={} nrows={} ncols={} ({})",
            nnz,
            nrows,
            ncols,
            R::name()
        );

        if self.nnz > 0 {
            self.clear();
        }

        if nnz > 0 {
            self.row_offsets = Some(DeviceBuffer::zeroed(nrows + 1, &self.device));
            self.col_indices = Some(DeviceBuffer::zeroed(nnz, &self.device));
            self.values = Some(DeviceBuffer::zeroed(nnz, &self.device));

            self.nrows = nrows;
            self.ncols = ncols;
            self.nnz = nnz;
        }
    }

    /// Release all storage and reset shape fields to zero
    ///
    /// Idempotent.
    pub fn clear(&mut self) {
        if self.nnz > 0 {
            self.row_offsets = None;
            self.col_indices = None;
            self.values = None;

            self.nrows = 0;
            self.ncols = 0;
            self.nnz = 0;
        }
    }

    /// Take ownership of externally-built buffers without copying
    ///
    /// Clears any existing state, forces a full stream synchronization (no
    /// outstanding asynchronous operation may still reference old or new
    /// buffers), then installs the three buffers.
    ///
    /// # Panics
    ///
    /// All counts must be positive and the buffer lengths must match the
    /// shape exactly; violations are caller contract errors.
    #[allow(clippy::too_many_arguments)]
    pub fn set_data_ptr(
        &mut self,
        row_offsets: DeviceBuffer<R, i32>,
        col_indices: DeviceBuffer<R, i32>,
        values: DeviceBuffer<R, T>,
        nnz: usize,
        nrows: usize,
        ncols: usize,
        client: &R::Client,
    ) {
        assert!(nnz > 0, "CsrData::set_data_ptr: nnz must be positive");
        assert!(nrows > 0, "CsrData::set_data_ptr: nrows must be positive");
        assert!(ncols > 0, "CsrData::set_data_ptr: ncols must be positive");
        assert_eq!(
            row_offsets.len(),
            nrows + 1,
            "CsrData::set_data_ptr: row_offsets length must be nrows + 1"
        );
        assert_eq!(
            col_indices.len(),
            nnz,
            "CsrData::set_data_ptr: col_indices length must be nnz"
        );
        assert_eq!(
            values.len(),
            nnz,
            "CsrData::set_data_ptr: values length must be nnz"
        );

        log::trace!(
            "CsrData::set_data_ptr nnz={} nrows={} ncols={} ({})",
            nnz,
            nrows,
            ncols,
            R::name()
        );

        self.clear();
        client.synchronize();

        self.nrows = nrows;
        self.ncols = ncols;
        self.nnz = nnz;

        self.row_offsets = Some(row_offsets);
        self.col_indices = Some(col_indices);
        self.values = Some(values);
    }

    /// Relinquish the three buffers to the caller and reset to empty
    ///
    /// Forces a full stream synchronization before handing the buffers out.
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn leave_data_ptr(
        &mut self,
        client: &R::Client,
    ) -> (DeviceBuffer<R, i32>, DeviceBuffer<R, i32>, DeviceBuffer<R, T>) {
        assert!(
            self.nnz > 0,
            "CsrData::leave_data_ptr: descriptor is empty"
        );

        log::trace!("CsrData::leave_data_ptr ({})", R::name());

        client.synchronize();

        let row_offsets = self.row_offsets.take().expect("populated descriptor");
        let col_indices = self.col_indices.take().expect("populated descriptor");
        let values = self.values.take().expect("populated descriptor");

        self.nrows = 0;
        self.ncols = 0;
        self.nnz = 0;

        (row_offsets, col_indices, values)
    }

    /// Row offsets buffer
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn row_offsets(&self) -> &DeviceBuffer<R, i32> {
        self.row_offsets.as_ref().expect("empty CSR descriptor")
    }

    /// Column indices buffer
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn col_indices(&self) -> &DeviceBuffer<R, i32> {
        self.col_indices.as_ref().expect("empty CSR descriptor")
    }

    /// Values buffer
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn values(&self) -> &DeviceBuffer<R, T> {
        self.values.as_ref().expect("empty CSR descriptor")
    }

    /// Device this matrix lives on
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Per-matrix backend state
    #[inline]
    pub fn context(&self) -> &R::MatrixContext {
        &self.ctx
    }

    /// One-line diagnostic dump, used in fatal-error reporting
    pub fn info(&self) -> String {
        format!(
            "CsrData {{ backend: {}, device: {}, dtype: {}, nrows: {}, ncols: {}, nnz: {} }}",
            R::name(),
            self.device.name(),
            T::DTYPE,
            self.nrows,
            self.ncols,
            self.nnz
        )
    }

    pub(crate) fn buffers_mut(
        &mut self,
    ) -> (
        &mut DeviceBuffer<R, i32>,
        &mut DeviceBuffer<R, i32>,
        &mut DeviceBuffer<R, T>,
    ) {
        (
            self.row_offsets.as_mut().expect("empty CSR descriptor"),
            self.col_indices.as_mut().expect("empty CSR descriptor"),
            self.values.as_mut().expect("empty CSR descriptor"),
        )
    }

    /// Assemble a descriptor from already-populated buffers
    ///
    /// Used by the transfer and conversion engines; shape consistency is the
    /// caller's responsibility.
    pub(crate) fn from_buffers(
        row_offsets: DeviceBuffer<R, i32>,
        col_indices: DeviceBuffer<R, i32>,
        values: DeviceBuffer<R, T>,
        nrows: usize,
        ncols: usize,
    ) -> Self {
        let device = row_offsets.device().clone();
        let nnz = values.len();
        Self {
            row_offsets: Some(row_offsets),
            col_indices: Some(col_indices),
            values: Some(values),
            nrows,
            ncols,
            nnz,
            device: device.clone(),
            ctx: R::matrix_context(&device),
        }
    }

    /// Create a CSR matrix from host slices, validating the structure
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `row_offsets` length is not `nrows + 1`
    /// - `col_indices` and `values` lengths differ
    /// - `row_offsets` does not start at 0, end at `nnz`, or is not
    ///   monotonically non-decreasing
    /// - any column index is out of `[0, ncols)`
    pub fn from_slices(
        row_offsets: &[i32],
        col_indices: &[i32],
        values: &[T],
        nrows: usize,
        ncols: usize,
        device: &R::Device,
    ) -> Result<Self> {
        if row_offsets.len() != nrows + 1 {
            return Err(Error::shape_mismatch(&[nrows + 1], &[row_offsets.len()]));
        }

        if col_indices.len() != values.len() {
            return Err(Error::shape_mismatch(&[values.len()], &[col_indices.len()]));
        }

        let nnz = values.len();
        if row_offsets[0] != 0 || row_offsets[nrows] as usize != nnz {
            return Err(Error::invalid_argument(
                "row_offsets",
                format!(
                    "expected [0]=0 and [{}]={}, got [0]={} and [{}]={}",
                    nrows, nnz, row_offsets[0], nrows, row_offsets[nrows]
                ),
            ));
        }
        if row_offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid_argument(
                "row_offsets",
                "offsets must be monotonically non-decreasing".to_string(),
            ));
        }

        for &c in col_indices {
            if c < 0 {
                return Err(Error::invalid_argument(
                    "col_indices",
                    format!("negative column index: {}", c),
                ));
            }
            if c as usize >= ncols {
                return Err(Error::IndexOutOfBounds {
                    index: c as usize,
                    size: ncols,
                });
            }
        }

        let mut out = Self::new(device);
        if nnz > 0 {
            out.row_offsets = Some(DeviceBuffer::from_slice(row_offsets, device));
            out.col_indices = Some(DeviceBuffer::from_slice(col_indices, device));
            out.values = Some(DeviceBuffer::from_slice(values, device));
            out.nrows = nrows;
            out.ncols = ncols;
            out.nnz = nnz;
        }
        Ok(out)
    }
}

impl<R: Runtime, T: Element> SparseStorage for CsrData<R, T> {
    fn format(&self) -> SparseFormat {
        SparseFormat::Csr
    }

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn nnz(&self) -> usize {
        self.nnz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::runtime::Runtime;

    fn device() -> CpuDevice {
        CpuDevice::new()
    }

    #[test]
    fn test_allocate_zero_filled() {
        let device = device();
        let mut csr = CsrData::<CpuRuntime, f64>::new(&device);
        csr.allocate(5, 3, 3);

        assert_eq!(csr.nnz(), 5);
        assert_eq!(csr.nrows(), 3);
        assert_eq!(csr.ncols(), 3);
        assert_eq!(csr.row_offsets().to_vec(), vec![0; 4]);
        assert_eq!(csr.col_indices().to_vec(), vec![0; 5]);
        assert_eq!(csr.values().to_vec(), vec![0.0; 5]);
    }

    #[test]
    fn test_allocate_zero_is_noop() {
        let device = device();
        let mut csr = CsrData::<CpuRuntime, f64>::new(&device);
        csr.allocate(0, 10, 10);

        assert!(csr.is_empty());
        assert_eq!(csr.nrows(), 0);
        assert_eq!(csr.ncols(), 0);
    }

    #[test]
    fn test_clear_idempotent() {
        let device = device();
        let mut csr = CsrData::<CpuRuntime, f32>::new(&device);
        csr.allocate(4, 2, 2);

        csr.clear();
        assert!(csr.is_empty());
        assert_eq!(csr.nrows(), 0);
        assert_eq!(csr.ncols(), 0);

        csr.clear();
        assert!(csr.is_empty());
    }

    #[test]
    fn test_set_leave_data_ptr_roundtrip() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        let row_offsets = DeviceBuffer::from_slice(&[0i32, 2, 3], &device);
        let col_indices = DeviceBuffer::from_slice(&[0i32, 1, 1], &device);
        let values = DeviceBuffer::from_slice(&[1.0f64, 2.0, 3.0], &device);

        let mut csr = CsrData::<CpuRuntime, f64>::new(&device);
        csr.set_data_ptr(row_offsets, col_indices, values, 3, 2, 2, &client);

        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.nrows(), 2);
        assert_eq!(csr.ncols(), 2);

        let (ro, ci, va) = csr.leave_data_ptr(&client);
        assert!(csr.is_empty());
        assert_eq!(csr.nrows(), 0);
        assert_eq!(ro.to_vec(), vec![0, 2, 3]);
        assert_eq!(ci.to_vec(), vec![0, 1, 1]);
        assert_eq!(va.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "descriptor is empty")]
    fn test_leave_data_ptr_empty_is_fatal() {
        let device = device();
        let client = CpuRuntime::default_client(&device);
        let mut csr = CsrData::<CpuRuntime, f64>::new(&device);
        let _ = csr.leave_data_ptr(&client);
    }

    #[test]
    fn test_from_slices_valid() {
        let device = device();
        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        let csr = CsrData::<CpuRuntime, f32>::from_slices(
            &[0, 2, 3, 5],
            &[0, 2, 2, 0, 1],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
            &device,
        )
        .unwrap();

        assert_eq!(csr.nnz(), 5);
        assert_eq!(csr.format(), SparseFormat::Csr);
        assert_eq!(csr.values().to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_from_slices_invalid_offsets() {
        let device = device();
        let result = CsrData::<CpuRuntime, f32>::from_slices(
            &[0, 2, 3], // wrong length for 3 rows
            &[0, 2, 2, 0, 1],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            3,
            3,
            &device,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_slices_column_out_of_bounds() {
        let device = device();
        let result = CsrData::<CpuRuntime, f32>::from_slices(
            &[0, 1, 1, 1],
            &[7],
            &[1.0],
            3,
            3,
            &device,
        );
        assert!(matches!(result, Err(Error::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_info_mentions_shape() {
        let device = device();
        let mut csr = CsrData::<CpuRuntime, f64>::new(&device);
        csr.allocate(5, 3, 4);
        let info = csr.info();
        assert!(info.contains("nrows: 3"));
        assert!(info.contains("ncols: 4"));
        assert!(info.contains("cpu"));
    }
}
