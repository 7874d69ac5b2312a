//! Per-device client cache
//!
//! The `Runtime` memory primitives only receive a device, but CUDA work must
//! run on a context/stream. Clients are created once per device index and
//! reused for every primitive call, so allocations and transfers of all
//! matrices on one device share a stream.

use super::client::CudaClient;
use super::device::CudaDevice;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

static CLIENTS: OnceLock<Mutex<HashMap<usize, CudaClient>>> = OnceLock::new();

/// Get the cached client for a device, creating it on first use
///
/// # Panics
///
/// Panics if the CUDA context cannot be created; an unusable device is an
/// unrecoverable fault.
pub(crate) fn get_or_create_client(device: &CudaDevice) -> CudaClient {
    let clients = CLIENTS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = clients.lock().expect("client cache poisoned");

    map.entry(device.index)
        .or_insert_with(|| {
            CudaClient::new(device.clone()).unwrap_or_else(|e| {
                panic!(
                    "[sparsix::cuda] Failed to initialize device {}: {}",
                    device.index, e
                )
            })
        })
        .clone()
}

/// Check if the CUDA context on the current thread is still valid
///
/// Deallocation during process teardown may run after the driver destroyed
/// the context; freeing is then unnecessary and unsafe.
pub(crate) unsafe fn is_cuda_context_valid() -> bool {
    let mut ctx: cudarc::driver::sys::CUcontext = std::ptr::null_mut();
    let result = unsafe { cudarc::driver::sys::cuCtxGetCurrent(&mut ctx) };
    result == cudarc::driver::sys::CUresult::CUDA_SUCCESS && !ctx.is_null()
}

/// Log a CUDA memory operation failure
#[cold]
#[inline(never)]
pub(crate) fn log_cuda_memory_error(
    operation: &str,
    ptr: u64,
    result: cudarc::driver::sys::CUresult,
) {
    log::error!(
        "[sparsix::cuda] {} failed for ptr 0x{:x}: {:?}",
        operation,
        ptr,
        result
    );
}
