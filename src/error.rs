//! Error types for sparsix
//!
//! Only *recoverable* conditions are modeled here. Contract violations
//! (format mismatch between copy operands, shape mismatch into a non-empty
//! destination, lifecycle misuse, backend kernel failures) are fatal: the
//! offending operation logs the diagnostic state of every operand involved
//! and panics.

use crate::dtype::DType;
use crate::sparse::SparseFormat;
use thiserror::Error;

/// Result type alias using sparsix's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparsix operations
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// No conversion routine exists for a (format, backend) pairing
    ///
    /// This is a planning failure, not a programming bug: the caller is
    /// expected to pick a fallback path (convert through host memory, or a
    /// different target format).
    #[error("No {from} -> {to} conversion on the {backend} backend")]
    UnsupportedConversion {
        /// Source format
        from: SparseFormat,
        /// Destination format
        to: SparseFormat,
        /// Backend name
        backend: &'static str,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an unsupported conversion error
    pub fn unsupported_conversion(
        from: SparseFormat,
        to: SparseFormat,
        backend: &'static str,
    ) -> Self {
        Self::UnsupportedConversion { from, to, backend }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
