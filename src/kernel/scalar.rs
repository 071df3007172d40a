//! Portable scalar kernel.

use crate::kernel::Kernel;

/// Integer accumulation over 4-wide unrolled chunks.
pub struct ScalarKernel;

impl Kernel for ScalarKernel {
    #[inline]
    fn dot(a: &[u8], b: &[u8]) -> u64 {
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);

        let mut acc = [0u32; 4];
        let mut total = 0u64;
        let chunks = a.chunks_exact(4).zip(b.chunks_exact(4));
        for (i, (ca, cb)) in chunks.enumerate() {
            for lane in 0..4 {
                acc[lane] += u32::from(ca[lane]) * u32::from(cb[lane]);
            }
            // Flush long before a lane can overflow u32.
            if i % 16_384 == 16_383 {
                total += acc.iter().map(|&v| u64::from(v)).sum::<u64>();
                acc = [0; 4];
            }
        }
        total += acc.iter().map(|&v| u64::from(v)).sum::<u64>();

        let tail = len / 4 * 4;
        total
            + a[tail..]
                .iter()
                .zip(&b[tail..])
                .map(|(&x, &y)| u64::from(x) * u64::from(y))
                .sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::ScalarKernel;
    use crate::kernel::Kernel;

    #[test]
    fn dot_matches_naive_sum() {
        let a: Vec<u8> = (0..103).map(|i| (i * 7 % 256) as u8).collect();
        let b: Vec<u8> = (0..103).map(|i| (255 - i * 3 % 256) as u8).collect();
        let naive: u64 = a.iter().zip(&b).map(|(&x, &y)| x as u64 * y as u64).sum();
        assert_eq!(ScalarKernel::dot(&a, &b), naive);
    }

    #[test]
    fn dot_of_saturated_buffers_does_not_overflow() {
        let a = vec![255u8; 200_000];
        assert_eq!(ScalarKernel::dot(&a, &a), 255 * 255 * 200_000);
    }
}
