//! Low-level building blocks for custom recognition pipelines.
//!
//! These items expose the individual metrics, extractors and preprocessing
//! steps behind the high-level `Matcher` API. Most users should prefer
//! `ReferenceLibrary` and `Matcher`.

pub use crate::features::{
    count_good_matches, match_ratio, BinaryDescriptor, Descriptor, FeatureExtractor,
    FeatureExtractors, FeatureSet, FloatDescriptor, Keypoint, OrbExtractor, SiftExtractor,
};
pub use crate::image::resize::{resize_color, resize_gray};
pub use crate::kernel::{ActiveKernel, Kernel};
pub use crate::preprocess::{
    edge_brightness, equalize_histogram, largest_content_region, remove_light_border,
    ContentRegion,
};
pub use crate::template::{correlation_coefficient, cross_correlation, Planned, TemplatePlan};
