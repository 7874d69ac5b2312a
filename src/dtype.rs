//! Element type system for sparsix buffers
//!
//! A deliberately small subset of a numerics dtype system: the value types
//! the sparse kernels are instantiated for, plus `i32` for index buffers.

use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Supported element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit signed integer (index buffers)
    I32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 16-bit float (host kernels only)
    #[cfg(feature = "f16")]
    F16,
}

impl DType {
    /// Size of one element in bytes
    pub const fn size_in_bytes(&self) -> usize {
        match self {
            DType::I32 => 4,
            DType::F32 => 4,
            DType::F64 => 8,
            #[cfg(feature = "f16")]
            DType::F16 => 2,
        }
    }

    /// Returns the dtype name as a string
    pub const fn name(&self) -> &'static str {
        match self {
            DType::I32 => "i32",
            DType::F32 => "f32",
            DType::F64 => "f64",
            #[cfg(feature = "f16")]
            DType::F16 => "f16",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait for types that can populate a device buffer
///
/// Connects Rust's type system to the runtime [`DType`] tags the backend
/// kernels dispatch on.
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - basic requirements
/// - `Pod + Zeroable` - safe byte-level transmutation (bytemuck), required
///   for host staging during cross-backend transfers
/// - `Add + Sub + Mul + Div + PartialOrd` - arithmetic for host kernels
pub trait Element:
    Copy
    + Send
    + Sync
    + Pod
    + Zeroable
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i32
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }
}

#[cfg(feature = "f16")]
impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::from_f64(0.0)
    }

    #[inline]
    fn one() -> Self {
        half::f16::from_f64(1.0)
    }
}
