//! Difference-of-Gaussians keypoints with 4x4x8 gradient histogram
//! descriptors.

use crate::features::{FeatureExtractor, FeatureSet, FloatDescriptor, Keypoint};
use crate::image::OwnedImage;
use crate::util::math::wrap_rad;
use crate::util::{IconMatchError, IconMatchResult};
use std::f32::consts::TAU;

const IMG_BORDER: usize = 5;
const ORI_BINS: usize = 36;
const ORI_SIG_FACTOR: f32 = 1.5;
const ORI_RADIUS_FACTOR: f32 = 3.0 * ORI_SIG_FACTOR;
const DESC_WIDTH: usize = 4;
const DESC_BINS: usize = 8;
const DESC_SCALE_FACTOR: f32 = 3.0;
const DESC_MAG_THRESHOLD: f32 = 0.2;
const DESC_INT_FACTOR: f32 = 512.0;
const ASSUMED_BLUR: f32 = 0.5;

/// Parameters for [`SiftExtractor`].
#[derive(Clone, Debug, PartialEq)]
pub struct SiftConfig {
    /// Maximum number of keypoints retained across all octaves.
    pub max_features: usize,
    /// Number of octaves in the scale space.
    pub n_octaves: usize,
    /// Sampled scales per octave.
    pub n_layers: usize,
    /// Blur of the first scale of each octave.
    pub sigma: f32,
    /// Minimum DoG contrast on the `[0, 1]` intensity range.
    pub contrast_threshold: f32,
    /// Maximum principal curvature ratio before an extremum counts as an edge.
    pub edge_threshold: f32,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            max_features: 200,
            n_octaves: 2,
            n_layers: 3,
            sigma: 1.6,
            contrast_threshold: 0.03,
            edge_threshold: 10.0,
        }
    }
}

impl SiftConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        if self.max_features == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "sift max_features must be positive",
            });
        }
        if self.n_octaves == 0 || self.n_layers == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "sift octaves and layers must be positive",
            });
        }
        if !(self.sigma > ASSUMED_BLUR) {
            return Err(IconMatchError::InvalidConfig {
                reason: "sift sigma must exceed 0.5",
            });
        }
        if !(self.contrast_threshold >= 0.0) || !(self.edge_threshold > 1.0) {
            return Err(IconMatchError::InvalidConfig {
                reason: "sift thresholds out of range",
            });
        }
        Ok(())
    }
}

/// Single-channel float plane used by the scale space.
#[derive(Clone, Debug)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(img: &OwnedImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.data().iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    fn half(&self) -> Self {
        let width = self.width / 2;
        let height = self.height / 2;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(self.at(2 * x, 2 * y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    fn blurred(&self, sigma: f32) -> Self {
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (self.width, self.height);

        let mut tmp = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - radius).clamp(0, w as isize - 1) as usize;
                    acc += weight * self.data[y * w + sx];
                }
                tmp[y * w + x] = acc;
            }
        }
        let mut data = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y as isize + k as isize - radius).clamp(0, h as isize - 1) as usize;
                    acc += weight * tmp[sy * w + x];
                }
                data[y * w + x] = acc;
            }
        }
        Self {
            width: w,
            height: h,
            data,
        }
    }

    fn minus(&self, other: &Self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a - b)
                .collect(),
        }
    }

    /// Central-difference gradient; `None` on the outermost ring.
    #[inline]
    fn gradient(&self, x: isize, y: isize) -> Option<(f32, f32)> {
        if x < 1 || y < 1 || x >= self.width as isize - 1 || y >= self.height as isize - 1 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        let dx = self.at(x + 1, y) - self.at(x - 1, y);
        let dy = self.at(x, y + 1) - self.at(x, y - 1);
        Some((dx, dy))
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

struct Octave {
    gaussians: Vec<Plane>,
    dogs: Vec<Plane>,
}

struct Extremum {
    octave: usize,
    layer: usize,
    x: usize,
    y: usize,
    value: f32,
}

/// Scale-invariant float-descriptor extractor.
#[derive(Clone, Debug)]
pub struct SiftExtractor {
    cfg: SiftConfig,
}

impl SiftExtractor {
    /// Creates an extractor.
    pub fn new(cfg: SiftConfig) -> Self {
        Self { cfg }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SiftConfig {
        &self.cfg
    }

    fn layer_sigma(&self, layer: usize) -> f32 {
        self.cfg.sigma * 2f32.powf(layer as f32 / self.cfg.n_layers as f32)
    }

    fn build_scale_space(&self, image: &OwnedImage) -> Vec<Octave> {
        let n_scales = self.cfg.n_layers + 3;
        let first_blur = (self.cfg.sigma.powi(2) - ASSUMED_BLUR.powi(2)).max(0.01).sqrt();
        let mut base = Plane::from_gray(image).blurred(first_blur);

        let mut octaves = Vec::with_capacity(self.cfg.n_octaves);
        for _ in 0..self.cfg.n_octaves {
            if base.width <= 2 * IMG_BORDER + 2 || base.height <= 2 * IMG_BORDER + 2 {
                break;
            }
            let mut gaussians = Vec::with_capacity(n_scales);
            gaussians.push(base.clone());
            for layer in 1..n_scales {
                let prev = self.layer_sigma(layer - 1);
                let total = self.layer_sigma(layer);
                let step = (total * total - prev * prev).sqrt();
                let next = gaussians[layer - 1].blurred(step);
                gaussians.push(next);
            }
            let dogs = gaussians.windows(2).map(|w| w[1].minus(&w[0])).collect();
            base = gaussians[self.cfg.n_layers].half();
            octaves.push(Octave { gaussians, dogs });
        }
        octaves
    }

    fn find_extrema(&self, octaves: &[Octave]) -> Vec<Extremum> {
        let contrast = self.cfg.contrast_threshold / self.cfg.n_layers as f32;
        let edge = self.cfg.edge_threshold;
        let edge_limit = (edge + 1.0) * (edge + 1.0) / edge;

        let mut found = Vec::new();
        for (o, octave) in octaves.iter().enumerate() {
            for layer in 1..=self.cfg.n_layers {
                let (prev, cur, next) = (
                    &octave.dogs[layer - 1],
                    &octave.dogs[layer],
                    &octave.dogs[layer + 1],
                );
                for y in IMG_BORDER..cur.height - IMG_BORDER {
                    for x in IMG_BORDER..cur.width - IMG_BORDER {
                        let v = cur.at(x, y);
                        if v.abs() <= contrast {
                            continue;
                        }
                        if !is_extremum(v, x, y, [prev, cur, next]) {
                            continue;
                        }
                        let dxx = cur.at(x + 1, y) + cur.at(x - 1, y) - 2.0 * v;
                        let dyy = cur.at(x, y + 1) + cur.at(x, y - 1) - 2.0 * v;
                        let dxy = (cur.at(x + 1, y + 1) - cur.at(x + 1, y - 1)
                            - cur.at(x - 1, y + 1)
                            + cur.at(x - 1, y - 1))
                            * 0.25;
                        let tr = dxx + dyy;
                        let det = dxx * dyy - dxy * dxy;
                        if det <= 0.0 || tr * tr / det >= edge_limit {
                            continue;
                        }
                        found.push(Extremum {
                            octave: o,
                            layer,
                            x,
                            y,
                            value: v,
                        });
                    }
                }
            }
        }
        found
    }

    fn dominant_orientation(&self, img: &Plane, x: usize, y: usize, sigma: f32) -> f32 {
        let sig = ORI_SIG_FACTOR * sigma;
        let radius = (ORI_RADIUS_FACTOR * sigma).round() as isize;
        let denom = 2.0 * sig * sig;

        let mut hist = [0.0f32; ORI_BINS];
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let Some((gx, gy)) = img.gradient(x as isize + dx, y as isize + dy) else {
                    continue;
                };
                let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
                let ori = wrap_rad(gy.atan2(gx));
                let bin = ((ori * ORI_BINS as f32 / TAU).round() as usize) % ORI_BINS;
                hist[bin] += weight * (gx * gx + gy * gy).sqrt();
            }
        }

        let smoothed: [f32; ORI_BINS] = std::array::from_fn(|i| {
            let at = |off: isize| hist[(i as isize + off).rem_euclid(ORI_BINS as isize) as usize];
            (at(-2) + at(2)) / 16.0 + (at(-1) + at(1)) * 4.0 / 16.0 + at(0) * 6.0 / 16.0
        });

        let mut best = 0;
        for i in 1..ORI_BINS {
            if smoothed[i] > smoothed[best] {
                best = i;
            }
        }
        let left = smoothed[(best + ORI_BINS - 1) % ORI_BINS];
        let right = smoothed[(best + 1) % ORI_BINS];
        let peak = smoothed[best];
        let curvature = left - 2.0 * peak + right;
        let offset = if curvature.abs() > f32::EPSILON {
            0.5 * (left - right) / curvature
        } else {
            0.0
        };
        wrap_rad((best as f32 + offset) * TAU / ORI_BINS as f32)
    }

    fn describe(&self, img: &Plane, x: usize, y: usize, sigma: f32, angle: f32) -> FloatDescriptor {
        let d = DESC_WIDTH as f32;
        let n = DESC_BINS as f32;
        let hist_width = DESC_SCALE_FACTOR * sigma;
        let max_radius = img.width.max(img.height) as f32;
        let radius = (hist_width * std::f32::consts::SQRT_2 * (d + 1.0) * 0.5)
            .round()
            .min(max_radius) as isize;
        let (sin_t, cos_t) = angle.sin_cos();
        let (sin_t, cos_t) = (sin_t / hist_width, cos_t / hist_width);
        let exp_scale = -1.0 / (d * d * 0.5);

        let mut hist = [0.0f32; DESC_WIDTH * DESC_WIDTH * DESC_BINS];
        for i in -radius..=radius {
            for j in -radius..=radius {
                let c_rot = j as f32 * cos_t - i as f32 * sin_t;
                let r_rot = j as f32 * sin_t + i as f32 * cos_t;
                let rbin = r_rot + d / 2.0 - 0.5;
                let cbin = c_rot + d / 2.0 - 0.5;
                if rbin <= -1.0 || rbin >= d || cbin <= -1.0 || cbin >= d {
                    continue;
                }
                let Some((gx, gy)) = img.gradient(x as isize + j, y as isize + i) else {
                    continue;
                };
                let mag = (gx * gx + gy * gy).sqrt()
                    * ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
                let mut obin = wrap_rad(gy.atan2(gx) - angle) * n / TAU;
                if obin >= n {
                    obin -= n;
                }
                accumulate_trilinear(&mut hist, rbin, cbin, obin, mag);
            }
        }

        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            let clip = DESC_MAG_THRESHOLD * norm;
            hist.iter_mut().for_each(|v| *v = v.min(clip));
        }
        let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
        let scale = if norm > f32::EPSILON {
            DESC_INT_FACTOR / norm
        } else {
            0.0
        };
        FloatDescriptor(std::array::from_fn(|k| (hist[k] * scale).round().min(255.0)))
    }
}

fn is_extremum(v: f32, x: usize, y: usize, planes: [&Plane; 3]) -> bool {
    let mut is_max = true;
    let mut is_min = true;
    for (p, plane) in planes.iter().enumerate() {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if p == 1 && nx == x && ny == y {
                    continue;
                }
                let other = plane.at(nx, ny);
                is_max &= v >= other;
                is_min &= v <= other;
            }
        }
        if !is_max && !is_min {
            return false;
        }
    }
    is_max || is_min
}

fn accumulate_trilinear(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, mag: f32) {
    let r0 = rbin.floor();
    let c0 = cbin.floor();
    let o0 = obin.floor();
    let (dr, dc, dor) = (rbin - r0, cbin - c0, obin - o0);
    let (r0, c0, o0) = (r0 as isize, c0 as isize, o0 as isize);

    for (ri, wr) in [(r0, 1.0 - dr), (r0 + 1, dr)] {
        if ri < 0 || ri >= DESC_WIDTH as isize {
            continue;
        }
        for (ci, wc) in [(c0, 1.0 - dc), (c0 + 1, dc)] {
            if ci < 0 || ci >= DESC_WIDTH as isize {
                continue;
            }
            for (oi, wo) in [(o0, 1.0 - dor), (o0 + 1, dor)] {
                let oi = oi.rem_euclid(DESC_BINS as isize) as usize;
                let idx = (ri as usize * DESC_WIDTH + ci as usize) * DESC_BINS + oi;
                hist[idx] += mag * wr * wc * wo;
            }
        }
    }
}

impl FeatureExtractor for SiftExtractor {
    type Descriptor = FloatDescriptor;

    fn name(&self) -> &'static str {
        "sift"
    }

    fn detect_and_compute(&self, image: &OwnedImage) -> FeatureSet<FloatDescriptor> {
        let octaves = self.build_scale_space(image);
        let mut extrema = self.find_extrema(&octaves);
        extrema.sort_by(|a, b| {
            b.value
                .abs()
                .total_cmp(&a.value.abs())
                .then_with(|| a.octave.cmp(&b.octave))
                .then_with(|| a.layer.cmp(&b.layer))
                .then_with(|| a.y.cmp(&b.y))
                .then_with(|| a.x.cmp(&b.x))
        });
        extrema.truncate(self.cfg.max_features);

        let mut keypoints = Vec::with_capacity(extrema.len());
        let mut descriptors = Vec::with_capacity(extrema.len());
        for e in extrema {
            let img = &octaves[e.octave].gaussians[e.layer];
            let sigma = self.layer_sigma(e.layer);
            let angle = self.dominant_orientation(img, e.x, e.y, sigma);
            descriptors.push(self.describe(img, e.x, e.y, sigma, angle));

            let octave_scale = (1usize << e.octave) as f32;
            keypoints.push(Keypoint {
                x: e.x as f32 * octave_scale,
                y: e.y as f32 * octave_scale,
                response: e.value.abs(),
                angle,
                octave: e.octave as u8,
                size: 2.0 * sigma * octave_scale,
            });
        }

        FeatureSet::new(keypoints, descriptors).unwrap_or_else(|_| FeatureSet::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{gaussian_kernel, SiftConfig, SiftExtractor};
    use crate::features::{Descriptor, FeatureExtractor};
    use crate::image::OwnedImage;

    fn blobs(size: usize) -> OwnedImage {
        let centers = [(20.0f32, 24.0f32, 5.0f32), (50.0, 30.0, 7.0), (34.0, 56.0, 4.0)];
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = ((i % size) as f32, (i / size) as f32);
                let mut v = 30.0f32;
                for &(cx, cy, r) in &centers {
                    let d2 = (x - cx).powi(2) + (y - cy).powi(2);
                    v += 200.0 * (-d2 / (2.0 * r * r)).exp();
                }
                v.min(255.0) as u8
            })
            .collect();
        OwnedImage::new(data, size, size).unwrap()
    }

    #[test]
    fn kernel_is_normalized() {
        let k = gaussian_kernel(1.6);
        assert_eq!(k.len() % 2, 1);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn flat_image_has_no_keypoints() {
        let img = OwnedImage::filled(64, 64, 128).unwrap();
        let set = SiftExtractor::new(SiftConfig::default()).detect_and_compute(&img);
        assert!(set.is_empty());
    }

    #[test]
    fn blobs_produce_normalized_descriptors() {
        let img = blobs(80);
        let set = SiftExtractor::new(SiftConfig::default()).detect_and_compute(&img);
        assert!(!set.is_empty());
        for desc in set.descriptors() {
            assert!(desc.0.iter().all(|&v| (0.0..=255.0).contains(&v)));
            assert_eq!(desc.distance(desc), 0.0);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SiftConfig {
            n_layers: 0,
            ..SiftConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
