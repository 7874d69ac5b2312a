//! Runtime backends for sparse matrix storage and kernels
//!
//! This module defines the `Runtime` trait and provides implementations for
//! the compute backends (CPU, CUDA).
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU)
//! ├── Client (dispatches operations, owns stream and library handles)
//! └── MatrixContext (per-matrix math-library descriptor state)
//! ```
//!
//! All copy primitives exist in a synchronous and an asynchronous flavor.
//! Asynchronous copies are enqueued on the client's stream and return
//! immediately; their effects are not guaranteed visible until
//! [`RuntimeClient::synchronize`] is called. On the CPU backend the
//! asynchronous flavors complete immediately.

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

/// Core trait for compute backends
///
/// `Runtime` abstracts over different compute devices. It uses static
/// dispatch via generics for zero-cost abstraction: a matrix resident on a
/// given backend is typed by that backend's runtime.
///
/// Memory primitives deal in raw `u64` handles (a device address, or a host
/// pointer cast on the CPU backend). Sizing is always in bytes, computed by
/// the caller from the buffer's element type.
///
/// Allocation failure and copy failure are unrecoverable device faults and
/// panic.
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Per-matrix backend state
    ///
    /// Holds whatever persistent math-library descriptor a matrix on this
    /// backend needs (index base, matrix-type flags). Created when a storage
    /// descriptor is constructed and dropped with it; never shared between
    /// two matrices.
    type MatrixContext: Send + Sync + std::fmt::Debug;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate device memory, returning a raw handle
    fn allocate(size_bytes: usize, device: &Self::Device) -> u64;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Fill a region of device memory with zero bytes
    fn memset_zero(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device, blocking until complete
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device);

    /// Copy data from device to host, blocking until complete
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device);

    /// Copy data within device memory, blocking until complete
    fn copy_within_device(src: u64, dst: u64, size_bytes: usize, device: &Self::Device);

    /// Enqueue a host-to-device copy on the client's stream
    ///
    /// The source slice must stay valid and unmodified until the stream is
    /// synchronized.
    fn copy_to_device_async(src: &[u8], dst: u64, client: &Self::Client);

    /// Enqueue a device-to-host copy on the client's stream
    ///
    /// The destination slice must not be read until the stream is
    /// synchronized.
    fn copy_from_device_async(src: u64, dst: &mut [u8], client: &Self::Client);

    /// Enqueue a device-to-device copy on the client's stream
    fn copy_within_device_async(src: u64, dst: u64, size_bytes: usize, client: &Self::Client);

    /// Create the per-matrix backend state
    fn matrix_context(device: &Self::Device) -> Self::MatrixContext;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations on the stream to complete
    fn synchronize(&self);
}
