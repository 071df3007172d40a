//! Pixel dot-product kernels behind the correlation metrics.

/// Dot product of two equally sized u8 buffers.
pub trait Kernel {
    /// Returns `Σ a[i] * b[i]` over the common prefix of both slices.
    fn dot(a: &[u8], b: &[u8]) -> u64;
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

/// Kernel selected by the enabled features.
#[cfg(not(feature = "simd"))]
pub type ActiveKernel = scalar::ScalarKernel;

/// Kernel selected by the enabled features.
#[cfg(feature = "simd")]
pub type ActiveKernel = simd::SimdKernel;
