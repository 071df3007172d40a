//! SIMD kernel using the `wide` crate.
//!
//! Products are accumulated in `f32x8` lanes over blocks short enough that
//! every partial sum stays below 2^24, so the f32 accumulation is exact and
//! the result matches the scalar kernel bit for bit.

use crate::kernel::Kernel;
use wide::f32x8;

const LANES: usize = 8;
/// 255 * 255 * 256 < 2^24.
const BLOCK: usize = LANES * 256;

#[inline]
fn load_u8x8_as_f32x8(slice: &[u8]) -> f32x8 {
    f32x8::from([
        slice[0] as f32,
        slice[1] as f32,
        slice[2] as f32,
        slice[3] as f32,
        slice[4] as f32,
        slice[5] as f32,
        slice[6] as f32,
        slice[7] as f32,
    ])
}

#[inline]
fn hsum(v: f32x8) -> u64 {
    v.to_array().iter().map(|&x| x as u64).sum()
}

/// Vectorized dot product.
pub struct SimdKernel;

impl Kernel for SimdKernel {
    fn dot(a: &[u8], b: &[u8]) -> u64 {
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);

        let mut total = 0u64;
        for (block_a, block_b) in a.chunks(BLOCK).zip(b.chunks(BLOCK)) {
            let simd_end = block_a.len() / LANES * LANES;
            let mut acc = f32x8::ZERO;
            let mut i = 0;
            while i < simd_end {
                acc += load_u8x8_as_f32x8(&block_a[i..]) * load_u8x8_as_f32x8(&block_b[i..]);
                i += LANES;
            }
            total += hsum(acc);
            total += block_a[simd_end..]
                .iter()
                .zip(&block_b[simd_end..])
                .map(|(&x, &y)| u64::from(x) * u64::from(y))
                .sum::<u64>();
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::SimdKernel;
    use crate::kernel::scalar::ScalarKernel;
    use crate::kernel::Kernel;

    #[test]
    fn simd_matches_scalar() {
        let a: Vec<u8> = (0..5000).map(|i| (i * 31 % 251) as u8).collect();
        let b: Vec<u8> = (0..5000).map(|i| (i * 17 % 241) as u8).collect();
        assert_eq!(SimdKernel::dot(&a, &b), ScalarKernel::dot(&a, &b));
        let full = vec![255u8; 4099];
        assert_eq!(SimdKernel::dot(&full, &full), ScalarKernel::dot(&full, &full));
    }
}
