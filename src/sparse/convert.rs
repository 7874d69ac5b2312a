//! Conversion engine: format changes on one backend
//!
//! Invoked only when a direct copy is not applicable. Unsupported
//! (format, backend) pairings are a *recoverable* failure: format support is
//! a planning decision, so the caller gets an error and an empty destination
//! and picks a fallback path (convert through host memory, or a different
//! target format).

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::format::SparseStorage;
use super::matrix::{check_same_device, SparseMatrix};
use super::ops::SparseKernels;

impl<R, T> SparseMatrix<R, T>
where
    R: Runtime,
    R::Client: SparseKernels<R>,
    T: Element,
{
    /// Convert an arbitrary source matrix on the same backend into this
    /// matrix's format
    ///
    /// - An empty source converts to an empty destination trivially.
    /// - A source already in the destination's format degrades to a
    ///   same-backend copy.
    /// - Otherwise a backend conversion routine runs (for a BCSR destination
    ///   the block dimension chosen at its construction is used).
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedConversion`] when the backend has no routine for
    /// the pairing. After any error the destination is empty; no partial
    /// state is ever observable.
    pub fn convert_from(&mut self, src: &Self, client: &R::Client) -> Result<()> {
        check_same_device("SparseMatrix::convert_from", self.device(), src.device());

        self.clear();

        // empty matrix is empty matrix
        if src.nnz() == 0 {
            return Ok(());
        }

        if self.format() == src.format() {
            self.copy_from(src);
            return Ok(());
        }

        log::trace!(
            "SparseMatrix::convert_from {} -> {} ({})",
            src.format(),
            self.format(),
            R::name()
        );

        let result = match (&mut *self, src) {
            (SparseMatrix::Bcsr(dst), SparseMatrix::Csr(s)) => {
                client.csr_to_bcsr(s, dst.blockdim()).map(|m| *dst = m)
            }
            (SparseMatrix::Csr(dst), SparseMatrix::Bcsr(s)) => {
                client.bcsr_to_csr(s).map(|m| *dst = m)
            }
            (dst, s) => Err(Error::unsupported_conversion(
                s.format(),
                dst.format(),
                R::name(),
            )),
        };

        if result.is_err() {
            // a failed conversion must leave the destination empty
            self.clear();
        }

        result
    }
}
