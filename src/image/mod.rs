//! Raster types shared by the preprocessing and scoring stages.
//!
//! `ImageView` is a borrowed row-major view used where only read access to
//! a single-channel raster is needed.
//!
//! `OwnedImage` holds a contiguous single-channel raster and `ColorImage` a
//! contiguous interleaved three-channel raster. Channel order is not
//! interpreted anywhere in the crate; it only has to be consistent between
//! reference and query images.

use crate::util::{IconMatchError, IconMatchResult};

#[cfg(feature = "image-io")]
pub mod io;
pub mod resize;

/// Canonical icon resolution every reference and query is normalized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IconSize {
    pub width: usize,
    pub height: usize,
}

impl IconSize {
    /// Creates a size, rejecting zero extents.
    pub fn new(width: usize, height: usize) -> IconMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(IconMatchError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of pixels covered by this size.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl Default for IconSize {
    fn default() -> Self {
        Self {
            width: 160,
            height: 160,
        }
    }
}

/// Borrowed contiguous 2D image view.
#[derive(Copy, Clone)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a view over exactly `width * height` row-major elements.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> IconMatchResult<Self> {
        exact_len(width, height, 1, data.len())?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the backing slice.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Iterates over the rows top to bottom.
    pub fn rows(&self) -> std::slice::ChunksExact<'a, T> {
        self.data.chunks_exact(self.width)
    }
}

fn exact_len(width: usize, height: usize, channels: usize, got: usize) -> IconMatchResult<()> {
    if width == 0 || height == 0 {
        return Err(IconMatchError::InvalidDimensions { width, height });
    }
    let needed = width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .ok_or(IconMatchError::InvalidDimensions { width, height })?;
    if got < needed {
        return Err(IconMatchError::BufferTooSmall { needed, got });
    }
    if got > needed {
        return Err(IconMatchError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Owned contiguous single-channel `u8` raster.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedImage {
    /// Wraps a contiguous buffer of exactly `width * height` bytes.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> IconMatchResult<Self> {
        exact_len(width, height, 1, data.len())?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates an image filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> IconMatchResult<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(IconMatchError::InvalidDimensions { width, height })?;
        Self::new(vec![value; len], width, height)
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the pixel buffer in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at `(x, y)`; panics when out of bounds.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Owned contiguous interleaved 3-channel `u8` raster.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl ColorImage {
    /// Number of interleaved channels per pixel.
    pub const CHANNELS: usize = 3;

    /// Wraps a contiguous buffer of exactly `width * height * 3` bytes.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> IconMatchResult<Self> {
        exact_len(width, height, Self::CHANNELS, data.len())?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates an image where every pixel is `pixel`.
    pub fn filled(width: usize, height: usize, pixel: [u8; 3]) -> IconMatchResult<Self> {
        let count = width
            .checked_mul(height)
            .ok_or(IconMatchError::InvalidDimensions { width, height })?;
        let mut data = Vec::with_capacity(count * Self::CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&pixel);
        }
        Self::new(data, width, height)
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> IconMatchResult<Self>
    where
        F: FnMut(usize, usize) -> [u8; 3],
    {
        let mut data = Vec::with_capacity(width.saturating_mul(height) * Self::CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(data, width, height)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn size(&self) -> IconSize {
        IconSize {
            width: self.width,
            height: self.height,
        }
    }

    /// Returns the interleaved pixel buffer in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at `(x, y)`; panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * Self::CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Overwrites the pixel at `(x, y)`; panics when out of bounds.
    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, pixel: [u8; 3]) {
        let idx = (y * self.width + x) * Self::CHANNELS;
        self.data[idx..idx + Self::CHANNELS].copy_from_slice(&pixel);
    }

    /// Copies a rectangular region into a new image.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> IconMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(IconMatchError::InvalidDimensions { width, height });
        }
        if x + width > self.width || y + height > self.height {
            return Err(IconMatchError::RoiOutOfBounds {
                x,
                y,
                width,
                height,
                img_width: self.width,
                img_height: self.height,
            });
        }
        let mut data = Vec::with_capacity(width * height * Self::CHANNELS);
        for row in y..y + height {
            let start = (row * self.width + x) * Self::CHANNELS;
            data.extend_from_slice(&self.data[start..start + width * Self::CHANNELS]);
        }
        Self::new(data, width, height)
    }

    /// Converts to luma with the ITU-R BT.601 weights used by common codecs.
    pub fn to_gray(&self) -> OwnedImage {
        let data = self
            .data
            .chunks_exact(Self::CHANNELS)
            .map(|px| {
                let luma = 299 * u32::from(px[0]) + 587 * u32::from(px[1]) + 114 * u32::from(px[2]);
                ((luma + 500) / 1000) as u8
            })
            .collect();
        OwnedImage {
            data,
            width: self.width,
            height: self.height,
        }
    }
}
