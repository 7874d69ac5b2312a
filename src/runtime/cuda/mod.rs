//! CUDA (accelerator) backend
//!
//! Device memory and streams are managed through cudarc; the sparse kernels
//! and the csr->bcsr conversion routine are delegated to cuSPARSE. Enabled
//! with the `cuda` feature.

mod cache;
mod client;
mod cusparse;
mod device;
mod runtime;
mod sparse;

pub use client::CudaClient;
pub use cusparse::CudaMatDescr;
pub use device::{CudaDevice, CudaError};
pub use runtime::{is_cuda_available, CudaRuntime};
