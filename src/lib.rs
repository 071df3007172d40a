//! IconMatch identifies game item icons in screen captures.
//!
//! A [`ReferenceLibrary`] prepares every known icon once: canonical-size
//! color raster, grayscale and equalized variants, a color histogram and
//! ORB/SIFT-style descriptors. A [`Matcher`] prepares each capture the
//! same way (after cropping a light matte) and ranks the library with a
//! weighted composite of histogram, template and keypoint scores.
//!
//! Decoding files needs the default `image-io` feature; `rayon` parallelizes
//! library loading and `simd` vectorizes the correlation kernel.

pub mod features;
pub mod image;
pub mod kernel;
pub mod library;
pub mod lowlevel;
pub mod preprocess;
pub mod scorer;
pub mod search;
pub mod template;
pub mod util;
pub mod worker;

mod candidate;
pub(crate) mod trace;

pub use features::{FeatureConfig, OrbConfig, SiftConfig};
pub use image::{ColorImage, IconSize, ImageView, OwnedImage};
pub use library::{LibraryConfig, LoadReport, ReferenceEntry, ReferenceLibrary, SkippedFile};
pub use preprocess::{PreparedImage, PreprocessConfig, Preprocessor};
pub use scorer::{Metric, ScoreBreakdown, ScoreConfig, ScoreWeights, Scorer};
pub use search::{
    AdaptiveMatch, CancellationToken, MatchConfig, MatchResult, MatchStatus, Matcher, ScanOutcome,
};
pub use util::{IconMatchError, IconMatchResult};
pub use worker::{PendingRecognition, RecognitionWorker, WorkerOutcome};
