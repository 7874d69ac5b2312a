//! Uniquely-owned typed device buffers
//!
//! [`DeviceBuffer`] is the unit of storage ownership in sparsix. It is
//! deliberately *not* `Clone`: a buffer belongs to exactly one owner at any
//! instant, and handing a buffer to a storage descriptor (or taking one back
//! out) is a move. This makes the no-aliasing rule for descriptor buffers a
//! compile-time guarantee rather than a runtime convention.

use crate::dtype::Element;
use crate::runtime::cpu::CpuRuntime;
use crate::runtime::{Device, Runtime};
use std::marker::PhantomData;

/// A uniquely-owned, typed allocation on one backend device
///
/// The buffer deallocates its memory on drop. Byte sizes for every transfer
/// are derived from the element type `T`, never passed in by callers.
pub struct DeviceBuffer<R: Runtime, T: Element> {
    ptr: u64,
    len: usize,
    device: R::Device,
    _elem: PhantomData<T>,
}

impl<R: Runtime, T: Element> DeviceBuffer<R, T> {
    /// Allocate a zero-filled buffer of `len` elements
    pub fn zeroed(len: usize, device: &R::Device) -> Self {
        let size_bytes = len * std::mem::size_of::<T>();
        let ptr = R::allocate(size_bytes, device);
        // CPU allocation is already zeroed; accelerator allocation is not.
        R::memset_zero(ptr, size_bytes, device);

        Self {
            ptr,
            len,
            device: device.clone(),
            _elem: PhantomData,
        }
    }

    /// Allocate a buffer and upload `data` into it
    pub fn from_slice(data: &[T], device: &R::Device) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let ptr = R::allocate(bytes.len(), device);
        R::copy_to_device(bytes, ptr, device);

        Self {
            ptr,
            len: data.len(),
            device: device.clone(),
            _elem: PhantomData,
        }
    }

    /// Download the buffer contents into a host `Vec`
    pub fn to_vec(&self) -> Vec<T> {
        // Allocate with the alignment of T, then view as bytes for the copy.
        let mut result = vec![T::zero(); self.len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        R::copy_from_device(self.ptr, bytes, &self.device);
        result
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Raw device handle (device address, or host pointer on the CPU backend)
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Device this buffer lives on
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Zero-fill the buffer contents
    pub fn fill_zero(&mut self) {
        R::memset_zero(self.ptr, self.size_in_bytes(), &self.device);
    }

    /// Copy from another buffer on the same backend, blocking until complete
    ///
    /// Lengths must match; a mismatch is a caller contract violation.
    pub fn copy_from(&mut self, src: &Self) {
        assert_eq!(
            self.len, src.len,
            "DeviceBuffer::copy_from: length mismatch ({} vs {})",
            self.len, src.len
        );
        R::copy_within_device(src.ptr, self.ptr, self.size_in_bytes(), &self.device);
    }

    /// Enqueue a copy from another buffer on the same backend
    ///
    /// Effects are visible only after the client's stream is synchronized.
    pub fn copy_from_async(&mut self, src: &Self, client: &R::Client) {
        assert_eq!(
            self.len, src.len,
            "DeviceBuffer::copy_from_async: length mismatch ({} vs {})",
            self.len, src.len
        );
        R::copy_within_device_async(src.ptr, self.ptr, self.size_in_bytes(), client);
    }

    /// Copy from a buffer on any backend, staging through host memory
    ///
    /// This is the generic cross-backend path. It blocks until both the
    /// download and the upload have completed. For same-backend copies prefer
    /// [`DeviceBuffer::copy_from`], which stays on the device.
    pub fn copy_from_backend<S: Runtime>(&mut self, src: &DeviceBuffer<S, T>) {
        assert_eq!(
            self.len,
            src.len(),
            "DeviceBuffer::copy_from_backend: length mismatch ({} vs {})",
            self.len,
            src.len()
        );
        let staged = src.to_vec();
        R::copy_to_device(bytemuck::cast_slice(&staged), self.ptr, &self.device);
    }

    /// Copy from a host buffer, blocking until complete
    pub fn copy_from_host(&mut self, src: &DeviceBuffer<CpuRuntime, T>) {
        assert_eq!(
            self.len,
            src.len(),
            "DeviceBuffer::copy_from_host: length mismatch ({} vs {})",
            self.len,
            src.len()
        );
        R::copy_to_device(src.as_byte_slice(), self.ptr, &self.device);
    }

    /// Copy into a host buffer, blocking until complete
    pub fn copy_to_host(&self, dst: &mut DeviceBuffer<CpuRuntime, T>) {
        assert_eq!(
            self.len,
            dst.len(),
            "DeviceBuffer::copy_to_host: length mismatch ({} vs {})",
            self.len,
            dst.len()
        );
        R::copy_from_device(self.ptr, dst.as_byte_slice_mut(), &self.device);
    }

    /// Enqueue an upload from a host buffer
    ///
    /// The host buffer must stay alive and unmodified until the client's
    /// stream is synchronized; holding it inside a host matrix satisfies
    /// this.
    pub fn copy_from_host_async(&mut self, src: &DeviceBuffer<CpuRuntime, T>, client: &R::Client) {
        assert_eq!(
            self.len,
            src.len(),
            "DeviceBuffer::copy_from_host_async: length mismatch ({} vs {})",
            self.len,
            src.len()
        );
        R::copy_to_device_async(src.as_byte_slice(), self.ptr, client);
    }

    /// Enqueue a download into a host buffer
    ///
    /// The host buffer must not be read until the client's stream is
    /// synchronized.
    pub fn copy_to_host_async(&self, dst: &mut DeviceBuffer<CpuRuntime, T>, client: &R::Client) {
        assert_eq!(
            self.len,
            dst.len(),
            "DeviceBuffer::copy_to_host_async: length mismatch ({} vs {})",
            self.len,
            dst.len()
        );
        R::copy_from_device_async(self.ptr, dst.as_byte_slice_mut(), client);
    }
}

impl<T: Element> DeviceBuffer<CpuRuntime, T> {
    /// View the buffer as a host slice
    pub(crate) fn as_slice(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        // Host buffers are 64-byte aligned allocations of len * size_of::<T>()
        unsafe { std::slice::from_raw_parts(self.ptr as *const T, self.len) }
    }

    /// View the buffer as a mutable host slice
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr as *mut T, self.len) }
    }

    fn as_byte_slice(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    fn as_byte_slice_mut(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr as *mut u8, self.len * std::mem::size_of::<T>())
        }
    }
}

impl<R: Runtime, T: Element> Drop for DeviceBuffer<R, T> {
    fn drop(&mut self) {
        R::deallocate(self.ptr, self.size_in_bytes(), &self.device);
    }
}

impl<R: Runtime, T: Element> std::fmt::Debug for DeviceBuffer<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("backend", &R::name())
            .field("device", &self.device.name())
            .field("ptr", &format_args!("0x{:x}", self.ptr))
            .field("len", &self.len)
            .field("dtype", &T::DTYPE)
            .finish()
    }
}
