//! Convenience helpers for decoding rasters via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Alpha channels are
//! dropped; transparent pixels keep whatever color the file stores for them.

use crate::image::ColorImage;
use crate::util::{IconMatchError, IconMatchResult};
use std::path::Path;

/// File extensions accepted when scanning a reference directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Returns true if `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Creates an owned color image from an RGB buffer.
pub fn color_from_rgb_image(img: &image::RgbImage) -> IconMatchResult<ColorImage> {
    ColorImage::new(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Creates an owned color image from any decoded image.
pub fn color_from_dynamic_image(img: &image::DynamicImage) -> IconMatchResult<ColorImage> {
    color_from_rgb_image(&img.to_rgb8())
}

/// Loads an image from disk as a three-channel raster.
pub fn load_color_image<P: AsRef<Path>>(path: P) -> IconMatchResult<ColorImage> {
    let img = image::open(path).map_err(|err| IconMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    color_from_dynamic_image(&img)
}

/// Writes a color raster to disk; the format follows the file extension.
pub fn save_color_image<P: AsRef<Path>>(img: &ColorImage, path: P) -> IconMatchResult<()> {
    let buffer = image::RgbImage::from_raw(
        img.width() as u32,
        img.height() as u32,
        img.data().to_vec(),
    )
    .ok_or(IconMatchError::BufferTooSmall {
        needed: img.width() * img.height() * ColorImage::CHANNELS,
        got: img.data().len(),
    })?;
    buffer.save(path).map_err(|err| IconMatchError::ImageIo {
        reason: err.to_string(),
    })
}
