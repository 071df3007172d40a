//! ORB-style features: FAST-9 corners, intensity-centroid orientation and
//! steered BRIEF descriptors over a small scale pyramid.
//!
//! The BRIEF sampling pattern is drawn once from a fixed-seed generator so
//! descriptors are reproducible across runs and across extractor instances.

use crate::features::{BinaryDescriptor, FeatureExtractor, FeatureSet, Keypoint};
use crate::image::resize::resize_gray;
use crate::image::OwnedImage;
use crate::util::math::wrap_rad;
use crate::util::{IconMatchError, IconMatchResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PATTERN_SEED: u64 = 0x1c0_4a7c;
const PATTERN_PAIRS: usize = 256;
const FAST_ARC: usize = 9;

/// Bresenham circle of radius 3, clockwise from north.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Parameters for [`OrbExtractor`].
#[derive(Clone, Debug, PartialEq)]
pub struct OrbConfig {
    /// Maximum number of keypoints retained across all levels.
    pub max_features: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Number of pyramid levels (1 disables the pyramid).
    pub n_levels: usize,
    /// Downscale factor between consecutive levels.
    pub scale_factor: f32,
    /// Side of the square patch used for orientation and descriptors.
    pub patch_size: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            fast_threshold: 20,
            n_levels: 3,
            scale_factor: 1.2,
            patch_size: 31,
        }
    }
}

impl OrbConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        if self.max_features == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "orb max_features must be positive",
            });
        }
        if self.n_levels == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "orb n_levels must be at least 1",
            });
        }
        if !(self.scale_factor > 1.0) {
            return Err(IconMatchError::InvalidConfig {
                reason: "orb scale_factor must be greater than 1",
            });
        }
        if self.patch_size < 9 {
            return Err(IconMatchError::InvalidConfig {
                reason: "orb patch_size must be at least 9",
            });
        }
        Ok(())
    }
}

/// FAST + steered BRIEF binary feature extractor.
#[derive(Clone, Debug)]
pub struct OrbExtractor {
    cfg: OrbConfig,
    pattern: Vec<[f32; 4]>,
}

struct Corner {
    level: usize,
    x: usize,
    y: usize,
    score: f32,
}

impl OrbExtractor {
    /// Creates an extractor and draws its sampling pattern.
    pub fn new(cfg: OrbConfig) -> Self {
        let pattern = sampling_pattern(cfg.patch_size);
        Self { cfg, pattern }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrbConfig {
        &self.cfg
    }

    fn margin(&self) -> usize {
        self.cfg.patch_size / 2 + 1
    }

    fn build_levels(&self, image: &OwnedImage) -> Vec<(OwnedImage, f32)> {
        let min_side = 2 * self.margin() + 1;
        let mut levels = Vec::with_capacity(self.cfg.n_levels);
        let mut scale = 1.0f32;
        for level in 0..self.cfg.n_levels {
            let width = (image.width() as f32 / scale).round() as usize;
            let height = (image.height() as f32 / scale).round() as usize;
            if width <= min_side || height <= min_side {
                break;
            }
            let img = if level == 0 {
                image.clone()
            } else {
                match resize_gray(image, width, height) {
                    Ok(img) => img,
                    Err(_) => break,
                }
            };
            levels.push((img, scale));
            scale *= self.cfg.scale_factor;
        }
        levels
    }
}

impl FeatureExtractor for OrbExtractor {
    type Descriptor = BinaryDescriptor;

    fn name(&self) -> &'static str {
        "orb"
    }

    fn detect_and_compute(&self, image: &OwnedImage) -> FeatureSet<BinaryDescriptor> {
        let levels = self.build_levels(image);
        let margin = self.margin();

        let mut corners = Vec::new();
        for (level, (img, _)) in levels.iter().enumerate() {
            for (x, y, score) in fast_corners(img, self.cfg.fast_threshold, margin) {
                corners.push(Corner {
                    level,
                    x,
                    y,
                    score,
                });
            }
        }

        corners.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.level.cmp(&b.level))
                .then_with(|| a.y.cmp(&b.y))
                .then_with(|| a.x.cmp(&b.x))
        });
        corners.truncate(self.cfg.max_features);

        let smoothed: Vec<OwnedImage> = levels.iter().map(|(img, _)| smooth_121(img)).collect();
        let radius = (self.cfg.patch_size / 2) as i32;

        let mut keypoints = Vec::with_capacity(corners.len());
        let mut descriptors = Vec::with_capacity(corners.len());
        for corner in corners {
            let (img, scale) = &levels[corner.level];
            let angle = intensity_centroid_angle(img, corner.x, corner.y, radius);
            let desc = steered_brief(
                &smoothed[corner.level],
                corner.x,
                corner.y,
                angle,
                &self.pattern,
            );
            keypoints.push(Keypoint {
                x: corner.x as f32 * scale,
                y: corner.y as f32 * scale,
                response: corner.score,
                angle,
                octave: corner.level as u8,
                size: self.cfg.patch_size as f32 * scale,
            });
            descriptors.push(desc);
        }

        FeatureSet::new(keypoints, descriptors).unwrap_or_else(|_| FeatureSet::empty())
    }
}

fn sampling_pattern(patch_size: usize) -> Vec<[f32; 4]> {
    let half = (patch_size / 2) as i32 - 2;
    let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
    (0..PATTERN_PAIRS)
        .map(|_| {
            [
                rng.random_range(-half..=half) as f32,
                rng.random_range(-half..=half) as f32,
                rng.random_range(-half..=half) as f32,
                rng.random_range(-half..=half) as f32,
            ]
        })
        .collect()
}

/// FAST-9 corners with 3x3 non-maximum suppression.
///
/// Returns `(x, y, score)` where the score is the summed excess contrast of
/// the circle pixels over the threshold.
fn fast_corners(img: &OwnedImage, threshold: u8, margin: usize) -> Vec<(usize, usize, f32)> {
    let width = img.width();
    let height = img.height();
    if width <= 2 * margin || height <= 2 * margin {
        return Vec::new();
    }

    let mut scores = vec![0.0f32; width * height];
    for y in margin..height - margin {
        for x in margin..width - margin {
            let center = img.at(x, y);
            let bright = center.saturating_add(threshold);
            let dark = center.saturating_sub(threshold);

            let ring: [u8; 16] = std::array::from_fn(|i| {
                let (dx, dy) = CIRCLE[i];
                img.at((x as i32 + dx) as usize, (y as i32 + dy) as usize)
            });

            let cardinal_bright = [0, 4, 8, 12].iter().filter(|&&i| ring[i] > bright).count();
            let cardinal_dark = [0, 4, 8, 12].iter().filter(|&&i| ring[i] < dark).count();
            if cardinal_bright < 2 && cardinal_dark < 2 {
                continue;
            }

            if longest_arc(&ring, |v| v > bright) < FAST_ARC
                && longest_arc(&ring, |v| v < dark) < FAST_ARC
            {
                continue;
            }

            let score: f32 = ring
                .iter()
                .map(|&v| {
                    let diff = (i32::from(v) - i32::from(center)).abs() - i32::from(threshold);
                    diff.max(0) as f32
                })
                .sum();
            scores[y * width + x] = score.max(f32::MIN_POSITIVE);
        }
    }

    let mut corners = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let idx = y * width + x;
            let score = scores[idx];
            if score <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'nbr: for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    let n = ny * width + nx;
                    if n == idx {
                        continue;
                    }
                    let other = scores[n];
                    if other > score || (other == score && n < idx) {
                        is_max = false;
                        break 'nbr;
                    }
                }
            }
            if is_max {
                corners.push((x, y, score));
            }
        }
    }
    corners
}

fn longest_arc<F: Fn(u8) -> bool>(ring: &[u8; 16], pred: F) -> usize {
    let mut best = 0;
    let mut run = 0;
    for i in 0..ring.len() * 2 {
        if pred(ring[i % ring.len()]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(ring.len())
}

fn intensity_centroid_angle(img: &OwnedImage, x: usize, y: usize, radius: i32) -> f32 {
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px < 0 || py < 0 || px >= img.width() as i32 || py >= img.height() as i32 {
                continue;
            }
            let v = f64::from(img.at(px as usize, py as usize));
            m10 += v * dx as f64;
            m01 += v * dy as f64;
        }
    }
    wrap_rad(m01.atan2(m10) as f32)
}

fn steered_brief(
    img: &OwnedImage,
    x: usize,
    y: usize,
    angle: f32,
    pattern: &[[f32; 4]],
) -> BinaryDescriptor {
    let (sin_a, cos_a) = angle.sin_cos();
    let max_x = img.width() as i32 - 1;
    let max_y = img.height() as i32 - 1;
    let sample = |px: f32, py: f32| {
        let rx = (cos_a * px - sin_a * py).round() as i32;
        let ry = (sin_a * px + cos_a * py).round() as i32;
        let sx = (x as i32 + rx).clamp(0, max_x) as usize;
        let sy = (y as i32 + ry).clamp(0, max_y) as usize;
        img.at(sx, sy)
    };

    let mut desc = [0u8; 32];
    for (i, &[x1, y1, x2, y2]) in pattern.iter().enumerate() {
        if sample(x1, y1) < sample(x2, y2) {
            desc[i / 8] |= 1 << (i % 8);
        }
    }
    BinaryDescriptor(desc)
}

/// Separable `[1, 2, 1] / 4` smoothing with clamped borders.
fn smooth_121(img: &OwnedImage) -> OwnedImage {
    let width = img.width();
    let height = img.height();
    let data = img.data();
    let mut tmp = vec![0u16; width * height];
    for y in 0..height {
        for x in 0..width {
            let l = data[y * width + x.saturating_sub(1)];
            let c = data[y * width + x];
            let r = data[y * width + (x + 1).min(width - 1)];
            tmp[y * width + x] = u16::from(l) + 2 * u16::from(c) + u16::from(r);
        }
    }
    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let t = tmp[y.saturating_sub(1) * width + x];
            let c = tmp[y * width + x];
            let b = tmp[(y + 1).min(height - 1) * width + x];
            out[y * width + x] = ((u32::from(t) + 2 * u32::from(c) + u32::from(b) + 8) / 16) as u8;
        }
    }
    OwnedImage::new(out, width, height).unwrap_or_else(|_| img.clone())
}

#[cfg(test)]
mod tests {
    use super::{fast_corners, OrbConfig, OrbExtractor};
    use crate::features::{Descriptor, FeatureExtractor};
    use crate::image::OwnedImage;

    /// Bright squares of side `cell / 2` on a dark background.
    fn squares(size: usize, cell: usize) -> OwnedImage {
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if x % cell < cell / 2 && y % cell < cell / 2 {
                    230
                } else {
                    25
                }
            })
            .collect();
        OwnedImage::new(data, size, size).unwrap()
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = OwnedImage::filled(64, 64, 90).unwrap();
        assert!(fast_corners(&img, 20, 16).is_empty());
        let orb = OrbExtractor::new(OrbConfig::default());
        assert!(orb.detect_and_compute(&img).is_empty());
    }

    #[test]
    fn square_corners_are_detected() {
        let mut data = vec![20u8; 64 * 64];
        for y in 24..40 {
            for x in 24..40 {
                data[y * 64 + x] = 220;
            }
        }
        let img = OwnedImage::new(data, 64, 64).unwrap();
        let corners = fast_corners(&img, 20, 16);
        assert!(!corners.is_empty());
        for (x, y, _) in corners {
            assert!((22..=41).contains(&x) && (22..=41).contains(&y));
        }
    }

    #[test]
    fn extraction_is_deterministic_across_instances() {
        let img = squares(96, 12);
        let a = OrbExtractor::new(OrbConfig::default()).detect_and_compute(&img);
        let b = OrbExtractor::new(OrbConfig::default()).detect_and_compute(&img);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        for (da, db) in a.descriptors().iter().zip(b.descriptors()) {
            assert_eq!(da.distance(db), 0.0);
        }
    }

    #[test]
    fn max_features_caps_output() {
        let img = squares(128, 8);
        let cfg = OrbConfig {
            max_features: 10,
            ..OrbConfig::default()
        };
        let set = OrbExtractor::new(cfg).detect_and_compute(&img);
        assert!(set.len() <= 10);
    }
}
