//! BCSR storage descriptor: struct, lifecycle, host constructors

use crate::buffer::DeviceBuffer;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime, RuntimeClient};

use super::format::{SparseFormat, SparseStorage};

/// BCSR (Block Compressed Sparse Row) sparse matrix descriptor
///
/// Nonzeros are grouped into dense `blockdim x blockdim` blocks. A populated
/// descriptor owns three buffers: `row_offsets` (length `nrowb + 1`),
/// `col_indices` (length `nnzb`, block column indices) and `values` (length
/// `nnzb * blockdim^2`, block-major, intra-block order fixed by
/// [`BLOCK_LAYOUT`]). Derived element-level shape: `nrows = nrowb * blockdim`,
/// `ncols = ncolb * blockdim`, `nnz = nnzb * blockdim^2`.
///
/// The target `blockdim` is chosen at construction and survives [`clear`],
/// so an empty destination still knows which block dimension a conversion
/// into it should produce.
///
/// [`BLOCK_LAYOUT`]: super::format::BLOCK_LAYOUT
/// [`clear`]: BcsrData::clear
#[derive(Debug)]
pub struct BcsrData<R: Runtime, T: Element> {
    row_offsets: Option<DeviceBuffer<R, i32>>,
    col_indices: Option<DeviceBuffer<R, i32>>,
    values: Option<DeviceBuffer<R, T>>,
    nrowb: usize,
    ncolb: usize,
    nnzb: usize,
    blockdim: usize,
    device: R::Device,
    ctx: R::MatrixContext,
}

impl<R: Runtime, T: Element> BcsrData<R, T> {
    /// Create an empty BCSR descriptor on a device with a target block
    /// dimension
    ///
    /// # Panics
    ///
    /// `blockdim` must be greater than 1.
    pub fn new(device: &R::Device, blockdim: usize) -> Self {
        assert!(blockdim > 1, "BcsrData::new: blockdim must be > 1");

        Self {
            row_offsets: None,
            col_indices: None,
            values: None,
            nrowb: 0,
            ncolb: 0,
            nnzb: 0,
            blockdim,
            device: device.clone(),
            ctx: R::matrix_context(device),
        }
    }

    /// Allocate zero-filled storage for `nnzb` blocks in an `nrowb x ncolb`
    /// block grid
    ///
    /// Clears any existing state first. A request for zero blocks leaves the
    /// descriptor empty.
    ///
    /// # Panics
    ///
    /// `blockdim` must be greater than 1.
    pub fn allocate(&mut self, nnzb: usize, nrowb: usize, ncolb: usize, blockdim: usize) {
        assert!(blockdim > 1, "BcsrData::allocate: blockdim must be > 1");

        log::trace!(
            "BcsrData::allocate nnzb={} nrowb={} ncolb={} blockdim={} ({})",
            nnzb,
            nrowb,
            ncolb,
            blockdim,
            R::name()
        );

        if self.nnzb > 0 {
            self.clear();
        }

        if nnzb > 0 {
            self.row_offsets = Some(DeviceBuffer::zeroed(nrowb + 1, &self.device));
            self.col_indices = Some(DeviceBuffer::zeroed(nnzb, &self.device));
            self.values = Some(DeviceBuffer::zeroed(nnzb * blockdim * blockdim, &self.device));

            self.nrowb = nrowb;
            self.ncolb = ncolb;
            self.nnzb = nnzb;
            self.blockdim = blockdim;
        }
    }

    /// Release all storage and reset shape fields to zero
    ///
    /// Idempotent. The target block dimension is kept.
    pub fn clear(&mut self) {
        if self.nnzb > 0 {
            self.row_offsets = None;
            self.col_indices = None;
            self.values = None;

            self.nrowb = 0;
            self.ncolb = 0;
            self.nnzb = 0;
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
    /// All counts must be positive, `blockdim` greater than 1, and the
    /// buffer lengths must match the shape exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn set_data_ptr(
        &mut self,
        row_offsets: DeviceBuffer<R, i32>,
        col_indices: DeviceBuffer<R, i32>,
        values: DeviceBuffer<R, T>,
        nnzb: usize,
        nrowb: usize,
        ncolb: usize,
        blockdim: usize,
        client: &R::Client,
    ) {
        assert!(nnzb > 0, "BcsrData::set_data_ptr: nnzb must be positive");
        assert!(nrowb > 0, "BcsrData::set_data_ptr: nrowb must be positive");
        assert!(ncolb > 0, "BcsrData::set_data_ptr: ncolb must be positive");
        assert!(blockdim > 1, "BcsrData::set_data_ptr: blockdim must be > 1");
        assert_eq!(
            row_offsets.len(),
            nrowb + 1,
            "BcsrData::set_data_ptr: row_offsets length must be nrowb + 1"
        );
        assert_eq!(
            col_indices.len(),
            nnzb,
            "BcsrData::set_data_ptr: col_indices length must be nnzb"
        );
        assert_eq!(
            values.len(),
            nnzb * blockdim * blockdim,
            "BcsrData::set_data_ptr: values length must be nnzb * blockdim^2"
        );

        log::trace!(
            "BcsrData::set_data_ptr nnzb={} nrowb={} ncolb={} blockdim={} ({})",
            nnzb,
            nrowb,
            ncolb,
            blockdim,
            R::name()
        );

        self.clear();
        client.synchronize();

        self.nrowb = nrowb;
        self.ncolb = ncolb;
        self.nnzb = nnzb;
        self.blockdim = blockdim;

        self.row_offsets = Some(row_offsets);
        self.col_indices = Some(col_indices);
        self.values = Some(values);
    }

    /// Relinquish the three buffers to the caller and reset to empty
    ///
    /// Forces a full stream synchronization before handing the buffers out.
    /// Returns the buffers together with the block dimension they were
    /// stored with.
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn leave_data_ptr(
        &mut self,
        client: &R::Client,
    ) -> (
        DeviceBuffer<R, i32>,
        DeviceBuffer<R, i32>,
        DeviceBuffer<R, T>,
        usize,
    ) {
        assert!(
            self.nnzb > 0,
            "BcsrData::leave_data_ptr: descriptor is empty"
        );

        log::trace!("BcsrData::leave_data_ptr ({})", R::name());

        client.synchronize();

        let row_offsets = self.row_offsets.take().expect("populated descriptor");
        let col_indices = self.col_indices.take().expect("populated descriptor");
        let values = self.values.take().expect("populated descriptor");
        let blockdim = self.blockdim;

        self.nrowb = 0;
        self.ncolb = 0;
        self.nnzb = 0;

        (row_offsets, col_indices, values, blockdim)
    }

    /// Number of block rows
    #[inline]
    pub fn nrowb(&self) -> usize {
        self.nrowb
    }

    /// Number of block columns
    #[inline]
    pub fn ncolb(&self) -> usize {
        self.ncolb
    }

    /// Number of stored blocks
    #[inline]
    pub fn nnzb(&self) -> usize {
        self.nnzb
    }

    /// Block dimension
    #[inline]
    pub fn blockdim(&self) -> usize {
        self.blockdim
    }

    /// Row offsets buffer (block rows)
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn row_offsets(&self) -> &DeviceBuffer<R, i32> {
        self.row_offsets.as_ref().expect("empty BCSR descriptor")
    }

    /// Block column indices buffer
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn col_indices(&self) -> &DeviceBuffer<R, i32> {
        self.col_indices.as_ref().expect("empty BCSR descriptor")
    }

    /// Block values buffer
    ///
    /// # Panics
    ///
    /// The descriptor must be populated.
    pub fn values(&self) -> &DeviceBuffer<R, T> {
        self.values.as_ref().expect("empty BCSR descriptor")
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
            "BcsrData {{ backend: {}, device: {}, dtype: {}, nrowb: {}, ncolb: {}, nnzb: {}, \
             blockdim: {}, nrows: {}, ncols: {}, nnz: {} }}",
            R::name(),
            self.device.name(),
            T::DTYPE,
            self.nrowb,
            self.ncolb,
            self.nnzb,
            self.blockdim,
            self.nrows(),
            self.ncols(),
            self.nnz()
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
            self.row_offsets.as_mut().expect("empty BCSR descriptor"),
            self.col_indices.as_mut().expect("empty BCSR descriptor"),
            self.values.as_mut().expect("empty BCSR descriptor"),
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
        nrowb: usize,
        ncolb: usize,
        blockdim: usize,
    ) -> Self {
        let device = row_offsets.device().clone();
        let nnzb = col_indices.len();
        Self {
            row_offsets: Some(row_offsets),
            col_indices: Some(col_indices),
            values: Some(values),
            nrowb,
            ncolb,
            nnzb,
            blockdim,
            device: device.clone(),
            ctx: R::matrix_context(&device),
        }
    }

    /// Create a BCSR matrix from host slices, validating the structure
    ///
    /// # Errors
    ///
    /// Returns an error if the offsets, index bounds or buffer lengths are
    /// inconsistent with `(nnzb, nrowb, ncolb, blockdim)`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_slices(
        row_offsets: &[i32],
        col_indices: &[i32],
        values: &[T],
        nrowb: usize,
        ncolb: usize,
        blockdim: usize,
        device: &R::Device,
    ) -> Result<Self> {
        if blockdim <= 1 {
            return Err(Error::invalid_argument(
                "blockdim",
                format!("must be > 1, got {}", blockdim),
            ));
        }

        if row_offsets.len() != nrowb + 1 {
            return Err(Error::shape_mismatch(&[nrowb + 1], &[row_offsets.len()]));
        }

        let nnzb = col_indices.len();
        if values.len() != nnzb * blockdim * blockdim {
            return Err(Error::shape_mismatch(
                &[nnzb * blockdim * blockdim],
                &[values.len()],
            ));
        }

        if row_offsets[0] != 0 || row_offsets[nrowb] as usize != nnzb {
            return Err(Error::invalid_argument(
                "row_offsets",
                format!(
                    "expected [0]=0 and [{}]={}, got [0]={} and [{}]={}",
                    nrowb, nnzb, row_offsets[0], nrowb, row_offsets[nrowb]
                ),
            ));
        }

        for &c in col_indices {
            if c < 0 {
                return Err(Error::invalid_argument(
                    "col_indices",
                    format!("negative block column index: {}", c),
                ));
            }
            if c as usize >= ncolb {
                return Err(Error::IndexOutOfBounds {
                    index: c as usize,
                    size: ncolb,
                });
            }
        }

        let mut out = Self::new(device, blockdim);
        if nnzb > 0 {
            out.row_offsets = Some(DeviceBuffer::from_slice(row_offsets, device));
            out.col_indices = Some(DeviceBuffer::from_slice(col_indices, device));
            out.values = Some(DeviceBuffer::from_slice(values, device));
            out.nrowb = nrowb;
            out.ncolb = ncolb;
            out.nnzb = nnzb;
        }
        Ok(out)
    }
}

impl<R: Runtime, T: Element> SparseStorage for BcsrData<R, T> {
    fn format(&self) -> SparseFormat {
        SparseFormat::Bcsr
    }

    fn nrows(&self) -> usize {
        self.nrowb * self.blockdim_if_populated()
    }

    fn ncols(&self) -> usize {
        self.ncolb * self.blockdim_if_populated()
    }

    fn nnz(&self) -> usize {
        let d = self.blockdim_if_populated();
        self.nnzb * d * d
    }
}

impl<R: Runtime, T: Element> BcsrData<R, T> {
    // blockdim survives clear() as the conversion target; derived shape of
    // an empty descriptor must still be zero.
    #[inline]
    fn blockdim_if_populated(&self) -> usize {
        if self.nnzb > 0 {
            self.blockdim
        } else {
            0
        }
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
    fn test_allocate_shape_math() {
        let device = device();
        let mut bcsr = BcsrData::<CpuRuntime, f64>::new(&device, 2);
        bcsr.allocate(3, 2, 2, 2);

        assert_eq!(bcsr.nnzb(), 3);
        assert_eq!(bcsr.nrowb(), 2);
        assert_eq!(bcsr.ncolb(), 2);
        assert_eq!(bcsr.blockdim(), 2);
        // derived element-level shape
        assert_eq!(bcsr.nrows(), 4);
        assert_eq!(bcsr.ncols(), 4);
        assert_eq!(bcsr.nnz(), 12);

        assert_eq!(bcsr.row_offsets().to_vec(), vec![0; 3]);
        assert_eq!(bcsr.col_indices().to_vec(), vec![0; 3]);
        assert_eq!(bcsr.values().to_vec(), vec![0.0; 12]);
    }

    #[test]
    fn test_clear_resets_derived_shape() {
        let device = device();
        let mut bcsr = BcsrData::<CpuRuntime, f32>::new(&device, 3);
        bcsr.allocate(2, 1, 2, 3);
        assert_eq!(bcsr.nnz(), 18);

        bcsr.clear();
        assert!(bcsr.is_empty());
        assert_eq!(bcsr.nrows(), 0);
        assert_eq!(bcsr.ncols(), 0);
        // target blockdim survives for conversions
        assert_eq!(bcsr.blockdim(), 3);

        bcsr.clear();
        assert!(bcsr.is_empty());
    }

    #[test]
    #[should_panic(expected = "blockdim must be > 1")]
    fn test_blockdim_one_is_fatal() {
        let device = device();
        let _ = BcsrData::<CpuRuntime, f64>::new(&device, 1);
    }

    #[test]
    fn test_set_leave_data_ptr_roundtrip() {
        let device = device();
        let client = CpuRuntime::default_client(&device);

        let row_offsets = DeviceBuffer::from_slice(&[0i32, 2, 3], &device);
        let col_indices = DeviceBuffer::from_slice(&[0i32, 1, 1], &device);
        let vals: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let values = DeviceBuffer::from_slice(&vals, &device);

        let mut bcsr = BcsrData::<CpuRuntime, f64>::new(&device, 2);
        bcsr.set_data_ptr(row_offsets, col_indices, values, 3, 2, 2, 2, &client);

        assert_eq!(bcsr.nnzb(), 3);
        assert_eq!(bcsr.nnz(), 12);

        let (ro, ci, va, blockdim) = bcsr.leave_data_ptr(&client);
        assert!(bcsr.is_empty());
        assert_eq!(blockdim, 2);
        assert_eq!(ro.to_vec(), vec![0, 2, 3]);
        assert_eq!(ci.to_vec(), vec![0, 1, 1]);
        assert_eq!(va.to_vec(), vals);
    }

    #[test]
    fn test_from_slices_valid() {
        let device = device();
        let bcsr = BcsrData::<CpuRuntime, f64>::from_slices(
            &[0, 2, 3],
            &[0, 1, 1],
            &(0..12).map(|v| v as f64).collect::<Vec<_>>(),
            2,
            2,
            2,
            &device,
        )
        .unwrap();

        assert_eq!(bcsr.format(), SparseFormat::Bcsr);
        assert_eq!(bcsr.nnzb(), 3);
        assert_eq!(bcsr.nnz(), 12);
    }

    #[test]
    fn test_from_slices_bad_value_count() {
        let device = device();
        let result = BcsrData::<CpuRuntime, f64>::from_slices(
            &[0, 1],
            &[0],
            &[1.0, 2.0], // needs 4 values for one 2x2 block
            1,
            1,
            2,
            &device,
        );
        assert!(result.is_err());
    }
}
