//! CUDA runtime implementation

use super::cache::{get_or_create_client, is_cuda_context_valid, log_cuda_memory_error};
use super::client::CudaClient;
use super::cusparse::CudaMatDescr;
use super::device::CudaDevice;
use crate::runtime::Runtime;

/// CUDA runtime adapter
///
/// Implements the generic Runtime trait for the CUDA backend using cudarc
/// for direct GPU control. Synchronous copies enqueue on the device's stream
/// and wait; asynchronous copies enqueue and return.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type MatrixContext = CudaMatDescr;

    fn name() -> &'static str {
        "cuda"
    }

    fn allocate(size_bytes: usize, device: &Self::Device) -> u64 {
        if size_bytes == 0 {
            return 0;
        }

        let client = get_or_create_client(device);

        unsafe {
            let mut ptr: u64 = 0;
            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                return ptr;
            }

            // First attempt failed - sync the stream to flush pending frees,
            // then retry once
            let _ = client.stream.synchronize();

            let result = cudarc::driver::sys::cuMemAllocAsync(
                &mut ptr,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[sparsix::cuda] Allocation failed: {} bytes on device {} ({:?})",
                    size_bytes, device.index, result
                );
            }

            ptr
        }
    }

    fn deallocate(ptr: u64, _size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        unsafe {
            // Skip the free if the context is already gone - the driver
            // reclaims the memory on context destruction
            if !is_cuda_context_valid() {
                return;
            }

            let client = get_or_create_client(device);
            let result = cudarc::driver::sys::cuMemFreeAsync(ptr, client.stream.cu_stream());

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS
                && result != cudarc::driver::sys::CUresult::CUDA_ERROR_ILLEGAL_ADDRESS
            {
                log_cuda_memory_error("cuMemFreeAsync", ptr, result);
            }
        }
    }

    fn memset_zero(ptr: u64, size_bytes: usize, device: &Self::Device) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }

        let client = get_or_create_client(device);

        unsafe {
            let result =
                cudarc::driver::sys::cuMemsetD8Async(ptr, 0, size_bytes, client.stream.cu_stream());

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[sparsix::cuda] Memset failed: {} bytes ({:?})",
                    size_bytes, result
                );
            }

            let _ = client.stream.synchronize();
        }
    }

    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) {
        let client = get_or_create_client(device);
        Self::copy_to_device_async(src, dst, &client);
        let _ = client.stream.synchronize();
    }

    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) {
        let client = get_or_create_client(device);
        Self::copy_from_device_async(src, dst, &client);
        let _ = client.stream.synchronize();
    }

    fn copy_within_device(src: u64, dst: u64, size_bytes: usize, device: &Self::Device) {
        let client = get_or_create_client(device);
        Self::copy_within_device_async(src, dst, size_bytes, &client);
        let _ = client.stream.synchronize();
    }

    fn copy_to_device_async(src: &[u8], dst: u64, client: &Self::Client) {
        if src.is_empty() || dst == 0 {
            return;
        }

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[sparsix::cuda] Host-to-device copy failed: {} bytes ({:?})",
                    src.len(),
                    result
                );
            }
        }
    }

    fn copy_from_device_async(src: u64, dst: &mut [u8], client: &Self::Client) {
        if dst.is_empty() || src == 0 {
            return;
        }

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[sparsix::cuda] Device-to-host copy failed: {} bytes ({:?})",
                    dst.len(),
                    result
                );
            }
        }
    }

    fn copy_within_device_async(src: u64, dst: u64, size_bytes: usize, client: &Self::Client) {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return;
        }

        unsafe {
            let result = cudarc::driver::sys::cuMemcpyDtoDAsync_v2(
                dst,
                src,
                size_bytes,
                client.stream.cu_stream(),
            );

            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                panic!(
                    "[sparsix::cuda] Device-to-device copy failed: {} bytes ({:?})",
                    size_bytes, result
                );
            }
        }
    }

    fn matrix_context(device: &Self::Device) -> Self::MatrixContext {
        // keep the client (and with it the context) alive before touching
        // the library
        let _client = get_or_create_client(device);
        CudaMatDescr::new().unwrap_or_else(|e| {
            panic!(
                "[sparsix::cuda] Failed to create matrix descriptor on device {}: {}",
                device.index, e
            )
        })
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        get_or_create_client(device)
    }
}

/// Check if CUDA is available on this system
pub fn is_cuda_available() -> bool {
    std::panic::catch_unwind(|| {
        let device = CudaDevice::new(0);
        let _client = get_or_create_client(&device);
    })
    .is_ok()
}
