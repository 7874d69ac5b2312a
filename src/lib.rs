//! # sparsix
//!
//! **Multi-backend sparse matrix storage, transfer, conversion and SpMV.**
//!
//! sparsix is the mediation layer between sparse storage formats and compute
//! backends: a solver holds one opaque [`SparseMatrix`] handle and never needs
//! to know whether the data currently lives in host memory or on an
//! accelerator, nor in which storage format. Every cross-backend or
//! cross-format operation either succeeds with bit-exact data or fails
//! explicitly.
//!
//! ## What it provides
//!
//! - **Storage descriptors**: row-compressed ([`CsrData`]) and
//!   block-row-compressed ([`BcsrData`]) matrices with a strict
//!   allocate / clear / set-data-ptr / leave-data-ptr lifecycle
//! - **Transfers**: same-backend and host/accelerator copies, synchronous
//!   and stream-ordered asynchronous, same format only
//! - **Conversion**: csr <-> bcsr format changes, delegated to backend
//!   conversion kernels; unsupported pairings fail recoverably
//! - **Apply**: `y = A*x` and `y += scalar*A*x` dispatched to the backend
//!   kernel for the concrete format
//!
//! ## Backends
//!
//! - `cpu` (always available): aligned heap buffers, host kernels
//! - `cuda` (feature `cuda`): cudarc-managed device memory, cuSPARSE kernels
//!
//! ## Quick start
//!
//! ```
//! use sparsix::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! // [1 0 2]
//! // [0 0 3]
//! // [4 5 0]
//! let a = CsrData::<CpuRuntime, f64>::from_slices(
//!     &[0, 2, 3, 5],
//!     &[0, 2, 2, 0, 1],
//!     &[1.0, 2.0, 3.0, 4.0, 5.0],
//!     3,
//!     3,
//!     &device,
//! )
//! .unwrap();
//! let a = SparseMatrix::from(a);
//!
//! let x = DenseVector::ones(3, &device);
//! let mut y = DenseVector::zeros(3, &device);
//! a.apply(&x, &mut y, &client);
//! assert_eq!(y.to_vec(), vec![3.0, 3.0, 9.0]);
//! ```
//!
//! ## Feature flags
//!
//! - `rayon` (default): multi-threaded host SpMV kernels
//! - `cuda`: NVIDIA CUDA backend
//! - `f16`: half-precision elements (host kernels only)
//!
//! [`SparseMatrix`]: sparse::SparseMatrix
//! [`CsrData`]: sparse::CsrData
//! [`BcsrData`]: sparse::BcsrData

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod sparse;
pub mod vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::DeviceBuffer;
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::sparse::{
        BcsrData, CsrData, SparseFormat, SparseKernels, SparseMatrix, SparseStorage,
    };
    pub use crate::vector::DenseVector;

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
}
