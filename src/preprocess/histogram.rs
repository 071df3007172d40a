//! Intensity equalization and coarse color histograms.

use crate::image::{ColorImage, OwnedImage};
use crate::util::math::{clamp_unit, pearson};

/// Bins per channel of the color histogram.
pub const BINS_PER_CHANNEL: usize = 8;
const BIN_SHIFT: u32 = 5;
const TOTAL_BINS: usize = BINS_PER_CHANNEL * BINS_PER_CHANNEL * BINS_PER_CHANNEL;

/// Normalized 3D color histogram with 8 bins per channel.
///
/// Bin values always sum to 1 (or are all zero for an empty image), so
/// comparisons do not depend on the number of pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorHistogram {
    bins: Vec<f32>,
}

impl ColorHistogram {
    /// Accumulates and normalizes the histogram of `image`.
    pub fn from_image(image: &ColorImage) -> Self {
        let mut counts = vec![0u32; TOTAL_BINS];
        for px in image.data().chunks_exact(ColorImage::CHANNELS) {
            let idx = ((px[0] as usize >> BIN_SHIFT) * BINS_PER_CHANNEL
                + (px[1] as usize >> BIN_SHIFT))
                * BINS_PER_CHANNEL
                + (px[2] as usize >> BIN_SHIFT);
            counts[idx] += 1;
        }
        let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
        let bins = if total == 0 {
            vec![0.0; TOTAL_BINS]
        } else {
            let inv = 1.0 / total as f64;
            counts.iter().map(|&c| (c as f64 * inv) as f32).collect()
        };
        Self { bins }
    }

    /// Returns the normalized bin values in channel-major order.
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Pearson correlation between two histograms, in `[-1, 1]`.
    pub fn correlation(&self, other: &ColorHistogram) -> f32 {
        pearson(&self.bins, &other.bins)
    }

    /// Correlation clamped into `[0, 1]` for use as a similarity score.
    pub fn similarity(&self, other: &ColorHistogram) -> f32 {
        clamp_unit(self.correlation(other))
    }
}

/// Histogram-equalizes a grayscale image.
///
/// Uses the cumulative distribution with the first occupied bin mapped to 0.
/// Constant images are returned unchanged.
pub fn equalize_histogram(image: &OwnedImage) -> OwnedImage {
    let mut hist = [0u32; 256];
    for &v in image.data() {
        hist[v as usize] += 1;
    }
    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (slot, &count) in cdf.iter_mut().zip(hist.iter()) {
        running += count;
        *slot = running;
    }

    let total = running;
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total <= cdf_min {
        return image.clone();
    }

    let scale = 255.0 / (total - cdf_min) as f32;
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let mapped = cdf[value].saturating_sub(cdf_min) as f32 * scale;
        *slot = mapped.round().clamp(0.0, 255.0) as u8;
    }

    let data = image.data().iter().map(|&v| lut[v as usize]).collect();
    OwnedImage::new(data, image.width(), image.height())
        .unwrap_or_else(|_| image.clone())
}

#[cfg(test)]
mod tests {
    use super::{equalize_histogram, ColorHistogram};
    use crate::image::{ColorImage, OwnedImage};

    #[test]
    fn histogram_sums_to_one_regardless_of_size() {
        let small = ColorImage::from_fn(4, 4, |x, y| [(x * 60) as u8, (y * 60) as u8, 10]).unwrap();
        let large = ColorImage::from_fn(40, 40, |x, y| [x as u8, y as u8, 200]).unwrap();
        for hist in [ColorHistogram::from_image(&small), ColorHistogram::from_image(&large)] {
            let sum: f32 = hist.bins().iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn identical_histograms_correlate_perfectly() {
        let img = ColorImage::from_fn(16, 16, |x, y| [(x * 16) as u8, (y * 16) as u8, 0]).unwrap();
        let a = ColorHistogram::from_image(&img);
        let b = ColorHistogram::from_image(&img);
        assert!((a.correlation(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equalization_stretches_narrow_range() {
        let data: Vec<u8> = (0..64).map(|i| 100 + (i % 16) as u8).collect();
        let img = OwnedImage::new(data, 8, 8).unwrap();
        let eq = equalize_histogram(&img);
        assert_eq!(eq.data().iter().copied().min(), Some(0));
        assert_eq!(eq.data().iter().copied().max(), Some(255));
    }

    #[test]
    fn equalization_keeps_constant_images() {
        let img = OwnedImage::filled(5, 5, 42).unwrap();
        assert_eq!(equalize_histogram(&img), img);
    }
}
