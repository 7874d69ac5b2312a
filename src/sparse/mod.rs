//! Sparse matrix storage, transfer, conversion and apply
//!
//! The layer is split the way its responsibilities separate:
//!
//! - [`CsrData`] / [`BcsrData`]: per-format storage descriptors and their
//!   allocate / clear / set-data-ptr / leave-data-ptr lifecycle
//! - [`SparseMatrix`]: the format-erased handle the solver layer holds
//! - transfer engine: same-format copies, same or different backend, sync
//!   and async
//! - conversion engine: format changes via backend routines, recoverable on
//!   unsupported pairings
//! - apply engine: `y = A*x` / `y += scalar*A*x` kernel dispatch
//! - [`SparseKernels`]: the contract each backend client implements
//!
//! # Error model
//!
//! Operand pairings that indicate caller bugs (format mismatch in a copy,
//! shape mismatch into a populated destination, wrong vector sizes) dump the
//! diagnostic [`SparseMatrix::info`] of every operand and panic. Unsupported
//! conversion pairings return [`Error::UnsupportedConversion`] and leave the
//! destination empty.
//!
//! [`Error::UnsupportedConversion`]: crate::error::Error::UnsupportedConversion

mod apply;
mod bcsr;
mod convert;
mod csr;
mod format;
mod matrix;
mod ops;
mod transfer;

pub use bcsr::BcsrData;
pub use csr::CsrData;
pub use format::{BlockLayout, SparseFormat, SparseStorage, BLOCK_LAYOUT};
pub use matrix::SparseMatrix;
pub use ops::SparseKernels;
