//! Dense vector collaborator
//!
//! The matrix layer consumes only the fixed vector contract: length, backend
//! (the `R` type parameter), device, and an opaque storage handle passed into
//! the apply kernels. Everything else about dense vectors belongs to the
//! solver layer.

use crate::buffer::DeviceBuffer;
use crate::dtype::Element;
use crate::runtime::Runtime;

/// A dense vector resident on one backend device
#[derive(Debug)]
pub struct DenseVector<R: Runtime, T: Element> {
    buf: DeviceBuffer<R, T>,
}

impl<R: Runtime, T: Element> DenseVector<R, T> {
    /// Create a zero-filled vector of length `len`
    pub fn zeros(len: usize, device: &R::Device) -> Self {
        Self {
            buf: DeviceBuffer::zeroed(len, device),
        }
    }

    /// Create a vector of ones of length `len`
    pub fn ones(len: usize, device: &R::Device) -> Self {
        Self::from_slice(&vec![T::one(); len], device)
    }

    /// Create a vector from a host slice
    pub fn from_slice(data: &[T], device: &R::Device) -> Self {
        Self {
            buf: DeviceBuffer::from_slice(data, device),
        }
    }

    /// Download the vector contents into a host `Vec`
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.to_vec()
    }

    /// Vector length
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the vector has length zero
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Device this vector lives on
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.buf.device()
    }

    /// Zero-fill the vector contents
    pub fn fill_zero(&mut self) {
        self.buf.fill_zero();
    }

    /// Opaque storage handle, consumed by the apply kernels
    #[inline]
    pub fn buffer(&self) -> &DeviceBuffer<R, T> {
        &self.buf
    }

    /// Mutable storage handle, consumed by the apply kernels
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut DeviceBuffer<R, T> {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_zeros_ones() {
        let device = CpuDevice::new();
        let z = DenseVector::<CpuRuntime, f64>::zeros(4, &device);
        assert_eq!(z.to_vec(), vec![0.0; 4]);

        let o = DenseVector::<CpuRuntime, f64>::ones(4, &device);
        assert_eq!(o.to_vec(), vec![1.0; 4]);
    }

    #[test]
    fn test_from_slice_len() {
        let device = CpuDevice::new();
        let v = DenseVector::<CpuRuntime, f32>::from_slice(&[1.0, 2.0, 3.0], &device);
        assert_eq!(v.len(), 3);
        assert!(!v.is_empty());
        assert_eq!(v.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fill_zero() {
        let device = CpuDevice::new();
        let mut v = DenseVector::<CpuRuntime, f64>::ones(3, &device);
        v.fill_zero();
        assert_eq!(v.to_vec(), vec![0.0; 3]);
    }
}
