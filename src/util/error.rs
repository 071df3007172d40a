//! Error types for iconmatch.

use thiserror::Error;

/// Result alias for iconmatch operations.
pub type IconMatchResult<T> = std::result::Result<T, IconMatchError>;

/// Errors that can occur when building a library or preparing images.
///
/// Only initialization failures are expected to reach callers of the
/// recognition API; per-file and per-query failures are logged and turned
/// into "no result" outcomes.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IconMatchError {
    /// Width or height is zero or overflows the address space.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Backing buffer is shorter than the declared geometry requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Requested region does not fit inside the image.
    #[error("crop ({x}, {y}, {width}x{height}) out of bounds for {img_width}x{img_height}")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// A configuration value is out of its accepted range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
    /// The reference directory does not exist or cannot be listed.
    #[error("reference library not found: {path}")]
    LibraryNotFound { path: String },
    /// The reference directory produced no usable entries.
    #[error("reference library is empty: {path}")]
    EmptyLibrary { path: String },
    /// Decoding an image file failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
    /// The query raster has no pixels.
    #[error("empty query image")]
    EmptyQuery,
}
