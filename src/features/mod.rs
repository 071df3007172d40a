//! Keypoint detection and descriptor extraction.
//!
//! Two extractors are provided: [`OrbExtractor`] (FAST corners with steered
//! BRIEF binary descriptors, always enabled) and [`SiftExtractor`]
//! (difference-of-Gaussians keypoints with 128-d gradient histograms). The
//! float extractor is optional: when [`FeatureConfig::sift`] is `None` the
//! capability is reported as unavailable and scoring drops the metric
//! instead of failing.

mod matching;
mod orb;
mod sift;

pub use matching::{count_good_matches, match_ratio};
pub use orb::{OrbConfig, OrbExtractor};
pub use sift::{SiftConfig, SiftExtractor};

use crate::image::OwnedImage;
use crate::util::{IconMatchError, IconMatchResult};

/// Detected keypoint in level-0 pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Detector response used to rank keypoints.
    pub response: f32,
    /// Orientation in radians, `[0, 2π)`.
    pub angle: f32,
    /// Pyramid level or octave the keypoint was detected on.
    pub octave: u8,
    /// Diameter of the described neighborhood in level-0 pixels.
    pub size: f32,
}

/// Descriptor that can be compared by distance.
pub trait Descriptor: Clone + Send + Sync {
    /// Distance between two descriptors; smaller is more similar.
    fn distance(&self, other: &Self) -> f32;
}

/// 256-bit binary descriptor compared with Hamming distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryDescriptor(pub [u8; 32]);

impl Descriptor for BinaryDescriptor {
    #[inline]
    fn distance(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum::<u32>() as f32
    }
}

/// 128-d gradient histogram descriptor compared with Euclidean distance.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatDescriptor(pub [f32; 128]);

impl Descriptor for FloatDescriptor {
    #[inline]
    fn distance(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Keypoints paired one-to-one with their descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet<D> {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<D>,
}

impl<D> FeatureSet<D> {
    /// Creates a set; `keypoints` and `descriptors` must have equal length.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<D>) -> IconMatchResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(IconMatchError::InvalidConfig {
                reason: "keypoint and descriptor counts differ",
            });
        }
        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    /// Creates an empty set.
    pub fn empty() -> Self {
        Self {
            keypoints: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Returns the keypoints.
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the descriptors, aligned with [`FeatureSet::keypoints`].
    pub fn descriptors(&self) -> &[D] {
        &self.descriptors
    }

    /// Number of described keypoints.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Keypoint detector plus descriptor extractor.
pub trait FeatureExtractor {
    type Descriptor: Descriptor;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Detects keypoints on `image` and describes them.
    fn detect_and_compute(&self, image: &OwnedImage) -> FeatureSet<Self::Descriptor>;
}

/// Detector parameters for both extractors.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureConfig {
    pub orb: OrbConfig,
    /// Float-descriptor detector parameters; `None` disables the detector.
    pub sift: Option<SiftConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            orb: OrbConfig::default(),
            sift: Some(SiftConfig::default()),
        }
    }
}

impl FeatureConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        self.orb.validate()?;
        if let Some(sift) = &self.sift {
            sift.validate()?;
        }
        Ok(())
    }
}

/// Features extracted from one equalized grayscale image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFeatures {
    pub orb: FeatureSet<BinaryDescriptor>,
    /// `None` when the float detector is unavailable.
    pub sift: Option<FeatureSet<FloatDescriptor>>,
}

/// The binary extractor and the optional float extractor.
#[derive(Clone, Debug)]
pub struct FeatureExtractors {
    orb: OrbExtractor,
    sift: Option<SiftExtractor>,
}

impl FeatureExtractors {
    /// Builds the extractors described by `cfg`.
    pub fn new(cfg: &FeatureConfig) -> IconMatchResult<Self> {
        cfg.validate()?;
        Ok(Self {
            orb: OrbExtractor::new(cfg.orb.clone()),
            sift: cfg.sift.clone().map(SiftExtractor::new),
        })
    }

    /// Returns true if float descriptors are produced.
    pub fn has_float_descriptors(&self) -> bool {
        self.sift.is_some()
    }

    /// Runs every available extractor on `image`.
    pub fn extract(&self, image: &OwnedImage) -> ImageFeatures {
        ImageFeatures {
            orb: self.orb.detect_and_compute(image),
            sift: self.sift.as_ref().map(|s| s.detect_and_compute(image)),
        }
    }
}
