//! Intensity statistics precomputed once per prepared image.

use crate::image::ImageView;
use crate::util::{IconMatchError, IconMatchResult};

/// Sums needed by the normalized correlation metrics.
///
/// Both sums are exact integers so that two plans built from identical
/// pixels compare equal and the correlation of an image with itself is
/// exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplatePlan {
    width: usize,
    height: usize,
    count: u64,
    sum: u64,
    sum_sq: u64,
}

impl TemplatePlan {
    /// Builds a plan from a grayscale view.
    pub fn from_view(view: ImageView<'_, u8>) -> IconMatchResult<Self> {
        let width = view.width();
        let height = view.height();
        let count = width
            .checked_mul(height)
            .ok_or(IconMatchError::InvalidDimensions { width, height })?;

        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        for row in view.rows() {
            for &value in row {
                let v = u64::from(value);
                sum += v;
                sum_sq += v * v;
            }
        }

        Ok(Self {
            width,
            height,
            count: count as u64,
            sum,
            sum_sq,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the pixel count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the sum of intensities.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Returns the mean intensity.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Returns the sum of squared deviations from the mean.
    pub fn var_sum(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let sum = self.sum as f64;
        (self.sum_sq as f64 - sum * sum / self.count as f64).max(0.0)
    }

    /// Returns the sum of squared intensities.
    pub fn energy(&self) -> f64 {
        self.sum_sq as f64
    }

    /// Returns true if every pixel has the same value.
    pub fn is_flat(&self) -> bool {
        u128::from(self.count) * u128::from(self.sum_sq) == u128::from(self.sum) * u128::from(self.sum)
    }
}
