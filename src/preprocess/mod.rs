//! Conversion of raw captures and reference files into comparable variants.
//!
//! Every [`PreparedImage`] holds the canonical-size color raster plus the
//! grayscale, equalized and histogram variants and the descriptors derived
//! from the equalized raster. Queries and references go through the same
//! pipeline, except that only queries get the light-border crop.

mod border;
mod histogram;

pub use border::{edge_brightness, largest_content_region, remove_light_border, ContentRegion};
pub use histogram::{equalize_histogram, ColorHistogram, BINS_PER_CHANNEL};

use crate::features::{FeatureConfig, FeatureExtractors, ImageFeatures};
use crate::image::resize::resize_color;
use crate::image::{ColorImage, IconSize, OwnedImage};
use crate::template::TemplatePlan;
use crate::util::{IconMatchError, IconMatchResult};

/// Canonical size and light-border heuristic parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessConfig {
    /// Size every reference and query is normalized to.
    pub icon_size: IconSize,
    /// Mean brightness above which an edge band counts as light.
    pub light_threshold: u8,
    /// Thickness of the sampled edge bands in pixels.
    pub edge_band: usize,
    /// Number of light edges needed to trigger the crop.
    pub min_light_edges: usize,
    /// Smallest accepted content coverage per axis.
    pub min_content_fraction: f32,
    /// Largest accepted content coverage per axis.
    pub max_content_fraction: f32,
    /// Padding kept around the content bounding box.
    pub crop_padding: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            icon_size: IconSize::default(),
            light_threshold: 230,
            edge_band: 3,
            min_light_edges: 2,
            min_content_fraction: 0.15,
            max_content_fraction: 0.85,
            crop_padding: 1,
        }
    }
}

impl PreprocessConfig {
    /// Checks every parameter range.
    pub fn validate(&self) -> IconMatchResult<()> {
        IconSize::new(self.icon_size.width, self.icon_size.height)?;
        if self.edge_band == 0 {
            return Err(IconMatchError::InvalidConfig {
                reason: "edge_band must be positive",
            });
        }
        if self.min_light_edges == 0 || self.min_light_edges > 4 {
            return Err(IconMatchError::InvalidConfig {
                reason: "min_light_edges must be in 1..=4",
            });
        }
        let (lo, hi) = (self.min_content_fraction, self.max_content_fraction);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(IconMatchError::InvalidConfig {
                reason: "content fractions must satisfy 0 <= min <= max <= 1",
            });
        }
        Ok(())
    }
}

/// One image reduced to every representation the scorer compares.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub color: ColorImage,
    pub gray: OwnedImage,
    pub equalized: OwnedImage,
    pub histogram: ColorHistogram,
    pub gray_plan: TemplatePlan,
    pub equalized_plan: TemplatePlan,
    pub features: ImageFeatures,
}

impl PreparedImage {
    /// Returns the canonical size of the prepared rasters.
    pub fn size(&self) -> IconSize {
        self.color.size()
    }
}

/// Shared preprocessing pipeline for queries and references.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
    extractors: FeatureExtractors,
}

impl Preprocessor {
    /// Validates both configurations and builds the extractors.
    pub fn new(config: PreprocessConfig, features: &FeatureConfig) -> IconMatchResult<Self> {
        config.validate()?;
        let extractors = FeatureExtractors::new(features)?;
        Ok(Self { config, extractors })
    }

    /// Returns the preprocessing configuration.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Returns the canonical size.
    pub fn icon_size(&self) -> IconSize {
        self.config.icon_size
    }

    /// Returns true if float descriptors are extracted.
    pub fn has_float_descriptors(&self) -> bool {
        self.extractors.has_float_descriptors()
    }

    /// Crops a light matte when the heuristic triggers; see [`remove_light_border`].
    pub fn remove_light_border(&self, image: &ColorImage) -> IconMatchResult<ColorImage> {
        remove_light_border(image, &self.config)
    }

    /// Resizes to the canonical size; already canonical images are copied.
    pub fn resize_to_canonical(&self, image: &ColorImage) -> IconMatchResult<ColorImage> {
        let size = self.config.icon_size;
        resize_color(image, size.width, size.height)
    }

    /// Builds the grayscale, equalized and histogram variants.
    pub fn derive_variants(&self, image: &ColorImage) -> (OwnedImage, OwnedImage, ColorHistogram) {
        let gray = image.to_gray();
        let equalized = equalize_histogram(&gray);
        let histogram = ColorHistogram::from_image(image);
        (gray, equalized, histogram)
    }

    /// Detects and describes keypoints on the equalized raster.
    pub fn extract_features(&self, equalized: &OwnedImage) -> ImageFeatures {
        self.extractors.extract(equalized)
    }

    /// Runs the full query pipeline: border crop, resize, variants, features.
    pub fn prepare_query(&self, image: &ColorImage) -> IconMatchResult<PreparedImage> {
        if image.data().is_empty() {
            return Err(IconMatchError::EmptyQuery);
        }
        let cropped = self.remove_light_border(image)?;
        let canonical = self.resize_to_canonical(&cropped)?;
        self.finish(canonical)
    }

    /// Runs the reference pipeline: resize, variants, features.
    pub fn prepare_reference(&self, image: &ColorImage) -> IconMatchResult<PreparedImage> {
        let canonical = self.resize_to_canonical(image)?;
        self.finish(canonical)
    }

    fn finish(&self, color: ColorImage) -> IconMatchResult<PreparedImage> {
        let (gray, equalized, histogram) = self.derive_variants(&color);
        let gray_plan = TemplatePlan::from_view(gray.view())?;
        let equalized_plan = TemplatePlan::from_view(equalized.view())?;
        let features = self.extract_features(&equalized);
        Ok(PreparedImage {
            color,
            gray,
            equalized,
            histogram,
            gray_plan,
            equalized_plan,
            features,
        })
    }
}
