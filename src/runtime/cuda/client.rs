//! CUDA client implementation
//!
//! CudaClient owns the context, the stream every operation launches on, and
//! the cuSPARSE library handle.

use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::cusparse::CudaSparse;
use super::device::{CudaDevice, CudaError};
use super::runtime::CudaRuntime;
use crate::runtime::RuntimeClient;

/// CUDA runtime client
///
/// All transfers and kernels for matrices on this device are enqueued on
/// `self.stream`; operations enqueued on the same stream execute in order,
/// but nothing is visible to the host until [`RuntimeClient::synchronize`].
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all operations launch
    pub(crate) stream: Arc<CudaStream>,

    /// cuSPARSE handle bound to the stream
    pub(crate) sparse: Arc<CudaSparse>,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device
    ///
    /// Initializes the CUDA context, creates a stream, and sets up the
    /// cuSPARSE handle.
    ///
    /// # Errors
    ///
    /// Returns an error if context, stream or cuSPARSE initialization fails.
    pub fn new(device: CudaDevice) -> Result<Self, CudaError> {
        let context = CudaContext::new(device.index).map_err(|e| {
            CudaError::ContextError(format!(
                "Failed to create CUDA context for device {}: {:?}",
                device.index, e
            ))
        })?;

        context.bind_to_thread().map_err(|e| {
            CudaError::ContextError(format!("Failed to bind CUDA context to thread: {:?}", e))
        })?;

        let stream = context.new_stream().map_err(|e| {
            CudaError::ContextError(format!("Failed to create CUDA stream: {:?}", e))
        })?;

        let sparse = CudaSparse::new(stream.clone())?;

        Ok(Self {
            device,
            context,
            stream,
            sparse: Arc::new(sparse),
        })
    }

    /// Get reference to the CUDA stream
    #[inline]
    pub fn stream(&self) -> &CudaStream {
        &self.stream
    }

    /// Get reference to the CUDA context
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Get reference to the cuSPARSE handle
    #[inline]
    pub fn sparse(&self) -> &CudaSparse {
        &self.sparse
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) {
        if let Err(e) = self.stream.synchronize() {
            log::error!("[sparsix::cuda] Stream synchronization failed: {:?}", e);
        }
    }
}
