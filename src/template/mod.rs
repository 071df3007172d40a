//! Whole-image normalized correlation between two same-size rasters.
//!
//! Both images are compared at a single placement: the icons are already
//! resized to the canonical size, so no sliding search is needed.

use crate::image::OwnedImage;
use crate::kernel::{ActiveKernel, Kernel};
use crate::util::math::clamp_unit;

mod plan;

pub use plan::TemplatePlan;

/// Image plus its precomputed statistics.
#[derive(Clone, Copy, Debug)]
pub struct Planned<'a> {
    pub image: &'a OwnedImage,
    pub plan: &'a TemplatePlan,
}

impl<'a> Planned<'a> {
    pub fn new(image: &'a OwnedImage, plan: &'a TemplatePlan) -> Self {
        Self { image, plan }
    }

    fn same_geometry(&self, other: &Planned<'_>) -> bool {
        self.image.width() == other.image.width()
            && self.image.height() == other.image.height()
            && self.plan.count() == other.plan.count()
    }
}

/// Zero-mean normalized cross-correlation mapped to `[0, 1]`.
///
/// Negative correlation is reported as 0. Two flat images score 1 when
/// their intensities are equal and 0 otherwise; one flat image against a
/// textured one scores 0.
pub fn correlation_coefficient(a: Planned<'_>, b: Planned<'_>) -> f32 {
    if !a.same_geometry(&b) || a.plan.count() == 0 {
        return 0.0;
    }
    let (pa, pb) = (a.plan, b.plan);
    if pa.is_flat() || pb.is_flat() {
        return if pa.is_flat() && pb.is_flat() && pa.sum() == pb.sum() {
            1.0
        } else {
            0.0
        };
    }

    let dot = ActiveKernel::dot(a.image.data(), b.image.data()) as f64;
    let n = pa.count() as f64;
    let cov = dot - pa.sum() as f64 * pb.sum() as f64 / n;
    let denom = (pa.var_sum() * pb.var_sum()).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    clamp_unit((cov / denom) as f32)
}

/// Normalized cross-correlation without mean removal, in `[0, 1]`.
///
/// An all-black image has no energy and scores 0 against anything.
pub fn cross_correlation(a: Planned<'_>, b: Planned<'_>) -> f32 {
    if !a.same_geometry(&b) {
        return 0.0;
    }
    let denom = (a.plan.energy() * b.plan.energy()).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let dot = ActiveKernel::dot(a.image.data(), b.image.data()) as f64;
    clamp_unit((dot / denom) as f32)
}

#[cfg(test)]
mod tests {
    use super::{correlation_coefficient, cross_correlation, Planned, TemplatePlan};
    use crate::image::OwnedImage;

    fn planned(img: &OwnedImage) -> TemplatePlan {
        TemplatePlan::from_view(img.view()).unwrap()
    }

    fn ramp(w: usize, h: usize, invert: bool) -> OwnedImage {
        let data = (0..w * h)
            .map(|i| {
                let v = ((i % w) * 255 / (w - 1)) as u8;
                if invert {
                    255 - v
                } else {
                    v
                }
            })
            .collect();
        OwnedImage::new(data, w, h).unwrap()
    }

    #[test]
    fn self_correlation_is_one() {
        let img = ramp(16, 8, false);
        let plan = planned(&img);
        let p = Planned::new(&img, &plan);
        assert!((correlation_coefficient(p, p) - 1.0).abs() < 1e-6);
        assert!((cross_correlation(p, p) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn inverted_image_has_zero_coefficient() {
        let a = ramp(16, 8, false);
        let b = ramp(16, 8, true);
        let (pa, pb) = (planned(&a), planned(&b));
        assert_eq!(
            correlation_coefficient(Planned::new(&a, &pa), Planned::new(&b, &pb)),
            0.0
        );
    }

    #[test]
    fn flat_images() {
        let a = OwnedImage::filled(8, 8, 40).unwrap();
        let b = OwnedImage::filled(8, 8, 40).unwrap();
        let c = OwnedImage::filled(8, 8, 90).unwrap();
        let black = OwnedImage::filled(8, 8, 0).unwrap();
        let (pa, pb, pc, pk) = (planned(&a), planned(&b), planned(&c), planned(&black));
        let (a, b, c, k) = (
            Planned::new(&a, &pa),
            Planned::new(&b, &pb),
            Planned::new(&c, &pc),
            Planned::new(&black, &pk),
        );
        assert_eq!(correlation_coefficient(a, b), 1.0);
        assert_eq!(correlation_coefficient(a, c), 0.0);
        assert_eq!(cross_correlation(k, a), 0.0);
        assert!((cross_correlation(a, c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_sizes_score_zero() {
        let a = ramp(16, 8, false);
        let b = ramp(8, 16, false);
        let (pa, pb) = (planned(&a), planned(&b));
        assert_eq!(
            cross_correlation(Planned::new(&a, &pa), Planned::new(&b, &pb)),
            0.0
        );
    }
}
