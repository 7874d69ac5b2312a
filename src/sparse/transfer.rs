//! Transfer engine: same-format copies between matrices
//!
//! Copies never change format. The supported paths, cheapest first:
//! same-backend (device-to-device), host<->accelerator (direct memcpy), and
//! a generic any-backend pair staging through host memory. Each path exists
//! in a synchronous and (except staging) an asynchronous variant.
//!
//! An empty destination allocates itself to the source's exact shape before
//! copying; a populated destination must already match the source shape
//! exactly. A mismatch is a caller contract violation, not a data condition,
//! and terminates after dumping both operands.

use crate::dtype::Element;
use crate::runtime::cpu::CpuRuntime;
use crate::runtime::Runtime;

use super::bcsr::BcsrData;
use super::csr::CsrData;
use super::format::SparseStorage;
use super::matrix::{fatal_operands, SparseMatrix};

impl<R: Runtime, T: Element> CsrData<R, T> {
    fn prepare_copy_dst<S: Runtime>(&mut self, src: &CsrData<S, T>, op: &str) {
        if self.is_empty() {
            self.allocate(src.nnz(), src.nrows(), src.ncols());
        }

        if self.nnz() != src.nnz() || self.nrows() != src.nrows() || self.ncols() != src.ncols() {
            fatal_operands(op, &self.info(), &src.info());
        }
    }

    pub(crate) fn copy_from_same(&mut self, src: &Self) {
        self.prepare_copy_dst(src, "CsrData::copy_from");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from(src.row_offsets());
        ci.copy_from(src.col_indices());
        va.copy_from(src.values());
    }

    pub(crate) fn copy_from_same_async(&mut self, src: &Self, client: &R::Client) {
        self.prepare_copy_dst(src, "CsrData::copy_from_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_async(src.row_offsets(), client);
        ci.copy_from_async(src.col_indices(), client);
        va.copy_from_async(src.values(), client);
    }

    pub(crate) fn copy_from_host_sync(&mut self, src: &CsrData<CpuRuntime, T>) {
        self.prepare_copy_dst(src, "CsrData::copy_from_host");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_host(src.row_offsets());
        ci.copy_from_host(src.col_indices());
        va.copy_from_host(src.values());
    }

    pub(crate) fn copy_to_host_sync(&self, dst: &mut CsrData<CpuRuntime, T>) {
        dst.prepare_copy_dst(self, "CsrData::copy_to_host");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = dst.buffers_mut();
        self.row_offsets().copy_to_host(ro);
        self.col_indices().copy_to_host(ci);
        self.values().copy_to_host(va);
    }

    pub(crate) fn copy_from_host_async(
        &mut self,
        src: &CsrData<CpuRuntime, T>,
        client: &R::Client,
    ) {
        self.prepare_copy_dst(src, "CsrData::copy_from_host_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_host_async(src.row_offsets(), client);
        ci.copy_from_host_async(src.col_indices(), client);
        va.copy_from_host_async(src.values(), client);
    }

    pub(crate) fn copy_to_host_async(&self, dst: &mut CsrData<CpuRuntime, T>, client: &R::Client) {
        dst.prepare_copy_dst(self, "CsrData::copy_to_host_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = dst.buffers_mut();
        self.row_offsets().copy_to_host_async(ro, client);
        self.col_indices().copy_to_host_async(ci, client);
        self.values().copy_to_host_async(va, client);
    }

    pub(crate) fn copy_from_backend_staged<S: Runtime>(&mut self, src: &CsrData<S, T>) {
        self.prepare_copy_dst(src, "CsrData::copy_from_backend");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_backend(src.row_offsets());
        ci.copy_from_backend(src.col_indices());
        va.copy_from_backend(src.values());
    }
}

impl<R: Runtime, T: Element> BcsrData<R, T> {
    fn prepare_copy_dst<S: Runtime>(&mut self, src: &BcsrData<S, T>, op: &str) {
        if self.is_empty() {
            self.allocate(src.nnzb(), src.nrowb(), src.ncolb(), src.blockdim());
        }

        if self.nnzb() != src.nnzb()
            || self.nrowb() != src.nrowb()
            || self.ncolb() != src.ncolb()
            || self.blockdim() != src.blockdim()
        {
            fatal_operands(op, &self.info(), &src.info());
        }
    }

    pub(crate) fn copy_from_same(&mut self, src: &Self) {
        self.prepare_copy_dst(src, "BcsrData::copy_from");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from(src.row_offsets());
        ci.copy_from(src.col_indices());
        va.copy_from(src.values());
    }

    pub(crate) fn copy_from_same_async(&mut self, src: &Self, client: &R::Client) {
        self.prepare_copy_dst(src, "BcsrData::copy_from_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_async(src.row_offsets(), client);
        ci.copy_from_async(src.col_indices(), client);
        va.copy_from_async(src.values(), client);
    }

    pub(crate) fn copy_from_host_sync(&mut self, src: &BcsrData<CpuRuntime, T>) {
        self.prepare_copy_dst(src, "BcsrData::copy_from_host");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_host(src.row_offsets());
        ci.copy_from_host(src.col_indices());
        va.copy_from_host(src.values());
    }

    pub(crate) fn copy_to_host_sync(&self, dst: &mut BcsrData<CpuRuntime, T>) {
        dst.prepare_copy_dst(self, "BcsrData::copy_to_host");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = dst.buffers_mut();
        self.row_offsets().copy_to_host(ro);
        self.col_indices().copy_to_host(ci);
        self.values().copy_to_host(va);
    }

    pub(crate) fn copy_from_host_async(
        &mut self,
        src: &BcsrData<CpuRuntime, T>,
        client: &R::Client,
    ) {
        self.prepare_copy_dst(src, "BcsrData::copy_from_host_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_host_async(src.row_offsets(), client);
        ci.copy_from_host_async(src.col_indices(), client);
        va.copy_from_host_async(src.values(), client);
    }

    pub(crate) fn copy_to_host_async(&self, dst: &mut BcsrData<CpuRuntime, T>, client: &R::Client) {
        dst.prepare_copy_dst(self, "BcsrData::copy_to_host_async");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = dst.buffers_mut();
        self.row_offsets().copy_to_host_async(ro, client);
        self.col_indices().copy_to_host_async(ci, client);
        self.values().copy_to_host_async(va, client);
    }

    pub(crate) fn copy_from_backend_staged<S: Runtime>(&mut self, src: &BcsrData<S, T>) {
        self.prepare_copy_dst(src, "BcsrData::copy_from_backend");
        if self.is_empty() {
            return;
        }

        let (ro, ci, va) = self.buffers_mut();
        ro.copy_from_backend(src.row_offsets());
        ci.copy_from_backend(src.col_indices());
        va.copy_from_backend(src.values());
    }
}

impl<R: Runtime, T: Element> SparseMatrix<R, T> {
    /// Copy from another matrix on the same backend, blocking until complete
    ///
    /// Both operands must have the same format. An empty destination
    /// allocates itself to the source's shape; otherwise the shapes must
    /// match exactly.
    pub fn copy_from(&mut self, src: &Self) {
        match (self, src) {
            (SparseMatrix::Csr(d), SparseMatrix::Csr(s)) => d.copy_from_same(s),
            (SparseMatrix::Bcsr(d), SparseMatrix::Bcsr(s)) => d.copy_from_same(s),
            (d, s) => fatal_operands("SparseMatrix::copy_from", &d.info(), &s.info()),
        }
    }

    /// Copy into another matrix on the same backend, blocking until complete
    pub fn copy_to(&self, dst: &mut Self) {
        dst.copy_from(self);
    }

    /// Enqueue a copy from another matrix on the same backend
    ///
    /// Returns as soon as the transfer is enqueued on the client's stream.
    /// The destination's contents are undefined until the caller
    /// synchronizes the stream.
    pub fn copy_from_async(&mut self, src: &Self, client: &R::Client) {
        match (self, src) {
            (SparseMatrix::Csr(d), SparseMatrix::Csr(s)) => d.copy_from_same_async(s, client),
            (SparseMatrix::Bcsr(d), SparseMatrix::Bcsr(s)) => d.copy_from_same_async(s, client),
            (d, s) => fatal_operands("SparseMatrix::copy_from_async", &d.info(), &s.info()),
        }
    }

    /// Enqueue a copy into another matrix on the same backend
    pub fn copy_to_async(&self, dst: &mut Self, client: &R::Client) {
        dst.copy_from_async(self, client);
    }

    /// Copy from a host matrix, blocking until complete
    pub fn copy_from_host(&mut self, src: &SparseMatrix<CpuRuntime, T>) {
        match (self, src) {
            (SparseMatrix::Csr(d), SparseMatrix::Csr(s)) => d.copy_from_host_sync(s),
            (SparseMatrix::Bcsr(d), SparseMatrix::Bcsr(s)) => d.copy_from_host_sync(s),
            (d, s) => fatal_operands("SparseMatrix::copy_from_host", &d.info(), &s.info()),
        }
    }

    /// Copy into a host matrix, blocking until complete
    pub fn copy_to_host(&self, dst: &mut SparseMatrix<CpuRuntime, T>) {
        match (self, dst) {
            (SparseMatrix::Csr(s), SparseMatrix::Csr(d)) => s.copy_to_host_sync(d),
            (SparseMatrix::Bcsr(s), SparseMatrix::Bcsr(d)) => s.copy_to_host_sync(d),
            (s, d) => fatal_operands("SparseMatrix::copy_to_host", &d.info(), &s.info()),
        }
    }

    /// Enqueue a copy from a host matrix
    ///
    /// The host matrix must stay alive and unmodified until the client's
    /// stream is synchronized.
    pub fn copy_from_host_async(&mut self, src: &SparseMatrix<CpuRuntime, T>, client: &R::Client) {
        match (self, src) {
            (SparseMatrix::Csr(d), SparseMatrix::Csr(s)) => d.copy_from_host_async(s, client),
            (SparseMatrix::Bcsr(d), SparseMatrix::Bcsr(s)) => d.copy_from_host_async(s, client),
            (d, s) => fatal_operands("SparseMatrix::copy_from_host_async", &d.info(), &s.info()),
        }
    }

    /// Enqueue a copy into a host matrix
    ///
    /// The host matrix must not be read until the client's stream is
    /// synchronized.
    pub fn copy_to_host_async(&self, dst: &mut SparseMatrix<CpuRuntime, T>, client: &R::Client) {
        match (self, dst) {
            (SparseMatrix::Csr(s), SparseMatrix::Csr(d)) => s.copy_to_host_async(d, client),
            (SparseMatrix::Bcsr(s), SparseMatrix::Bcsr(d)) => s.copy_to_host_async(d, client),
            (s, d) => fatal_operands("SparseMatrix::copy_to_host_async", &d.info(), &s.info()),
        }
    }

    /// Copy from a matrix on any backend, staging through host memory
    ///
    /// The generic fallback path: downloads the source buffers to host
    /// memory, then uploads them here. Blocks until complete. For
    /// same-backend copies prefer [`SparseMatrix::copy_from`], which stays
    /// on the device.
    pub fn copy_from_backend<S: Runtime>(&mut self, src: &SparseMatrix<S, T>) {
        match (self, src) {
            (SparseMatrix::Csr(d), SparseMatrix::Csr(s)) => d.copy_from_backend_staged(s),
            (SparseMatrix::Bcsr(d), SparseMatrix::Bcsr(s)) => d.copy_from_backend_staged(s),
            (d, s) => fatal_operands("SparseMatrix::copy_from_backend", &d.info(), &s.info()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuDevice;
    use crate::runtime::Runtime;
    use crate::runtime::RuntimeClient;
    use crate::sparse::SparseFormat;

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
    fn test_copy_into_empty_allocates() {
        let device = CpuDevice::new();
        let src = host_csr(&device);

        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        dst.copy_from(&src);

        assert_eq!(dst.nnz(), 5);
        assert_eq!(dst.nrows(), 3);
        let d = dst.as_csr().unwrap();
        let s = src.as_csr().unwrap();
        assert_eq!(d.row_offsets().to_vec(), s.row_offsets().to_vec());
        assert_eq!(d.col_indices().to_vec(), s.col_indices().to_vec());
        assert_eq!(d.values().to_vec(), s.values().to_vec());
    }

    #[test]
    fn test_copy_to_matches_copy_from() {
        let device = CpuDevice::new();
        let src = host_csr(&device);

        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        src.copy_to(&mut dst);
        assert_eq!(
            dst.as_csr().unwrap().values().to_vec(),
            src.as_csr().unwrap().values().to_vec()
        );
    }

    #[test]
    fn test_copy_async_then_synchronize() {
        let device = CpuDevice::new();
        let client = CpuRuntime::default_client(&device);
        let src = host_csr(&device);

        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        dst.copy_from_async(&src, &client);
        client.synchronize();

        assert_eq!(
            dst.as_csr().unwrap().values().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    #[should_panic(expected = "unsupported operand pairing")]
    fn test_cross_format_copy_is_fatal() {
        let device = CpuDevice::new();
        let src = host_csr(&device);
        let mut dst = SparseMatrix::<CpuRuntime, f64>::bcsr(&device, 2);
        dst.copy_from(&src);
    }

    #[test]
    #[should_panic(expected = "unsupported operand pairing")]
    fn test_shape_mismatch_copy_is_fatal() {
        let device = CpuDevice::new();
        let src = host_csr(&device);

        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        if let SparseMatrix::Csr(d) = &mut dst {
            d.allocate(2, 2, 2);
        }
        dst.copy_from(&src);
    }

    #[test]
    fn test_empty_to_empty_copy() {
        let device = CpuDevice::new();
        let src = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        dst.copy_from(&src);
        assert!(dst.is_empty());
    }

    #[test]
    fn test_staged_backend_copy_roundtrip() {
        let device = CpuDevice::new();
        let src = host_csr(&device);

        let mut dst = SparseMatrix::<CpuRuntime, f64>::csr(&device);
        dst.copy_from_backend(&src);

        assert_eq!(dst.format(), SparseFormat::Csr);
        assert_eq!(
            dst.as_csr().unwrap().values().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn test_bcsr_copy_roundtrip() {
        let device = CpuDevice::new();
        let vals: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let src = SparseMatrix::from(
            BcsrData::<CpuRuntime, f64>::from_slices(&[0, 2, 3], &[0, 1, 1], &vals, 2, 2, 2, &device)
                .unwrap(),
        );

        let mut dst = SparseMatrix::<CpuRuntime, f64>::bcsr(&device, 2);
        dst.copy_from(&src);

        let d = dst.as_bcsr().unwrap();
        assert_eq!(d.nnzb(), 3);
        assert_eq!(d.blockdim(), 2);
        assert_eq!(d.values().to_vec(), vals);
    }
}
