//! Removal of light mattes around captured icons.
//!
//! Screen captures of small icons often carry a thin light frame. When at
//! least `min_light_edges` of the four edge bands are brighter than
//! `light_threshold`, the largest 8-connected region of non-light pixels is
//! located and, if its bounding box spans between `min_content_fraction`
//! and `max_content_fraction` of the frame on both axes, the image is cropped
//! to it (plus `crop_padding`) and rescaled back to its original size.

use crate::image::resize::resize_color;
use crate::image::{ColorImage, OwnedImage};
use crate::preprocess::PreprocessConfig;
use crate::util::IconMatchResult;

/// Bounding box of a content region, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentRegion {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    /// Number of pixels in the connected component.
    pub pixels: usize,
}

impl ContentRegion {
    /// Width of the bounding box in pixels.
    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    /// Height of the bounding box in pixels.
    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

/// Mean brightness of the top, bottom, left and right edge bands.
pub fn edge_brightness(gray: &OwnedImage, band: usize) -> [f32; 4] {
    let width = gray.width();
    let height = gray.height();
    let band_h = band.clamp(1, height);
    let band_w = band.clamp(1, width);

    let mean_rows = |rows: std::ops::Range<usize>| {
        let mut sum = 0u64;
        for y in rows.clone() {
            for x in 0..width {
                sum += u64::from(gray.at(x, y));
            }
        }
        sum as f32 / (rows.len() * width) as f32
    };
    let mean_cols = |cols: std::ops::Range<usize>| {
        let mut sum = 0u64;
        for y in 0..height {
            for x in cols.clone() {
                sum += u64::from(gray.at(x, y));
            }
        }
        sum as f32 / (cols.len() * height) as f32
    };

    [
        mean_rows(0..band_h),
        mean_rows(height - band_h..height),
        mean_cols(0..band_w),
        mean_cols(width - band_w..width),
    ]
}

/// Finds the largest 8-connected region of pixels darker than `threshold`.
pub fn largest_content_region(gray: &OwnedImage, threshold: u8) -> Option<ContentRegion> {
    let width = gray.width();
    let height = gray.height();
    let mut visited = vec![false; width * height];
    let mut stack = Vec::new();
    let mut best: Option<ContentRegion> = None;

    for start in 0..width * height {
        if visited[start] || gray.data()[start] >= threshold {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut region = ContentRegion {
            min_x: start % width,
            min_y: start / width,
            max_x: start % width,
            max_y: start / width,
            pixels: 0,
        };

        while let Some(idx) = stack.pop() {
            let x = idx % width;
            let y = idx / width;
            region.pixels += 1;
            region.min_x = region.min_x.min(x);
            region.max_x = region.max_x.max(x);
            region.min_y = region.min_y.min(y);
            region.max_y = region.max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    if !visited[n] && gray.data()[n] < threshold {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if best.map_or(true, |b| region.pixels > b.pixels) {
            best = Some(region);
        }
    }

    best
}

/// Crops a light matte away from `image` when the heuristic triggers.
///
/// Returns an unchanged copy when fewer than `min_light_edges` edges are
/// light, when no content is found, or when the content bounding box is
/// outside the accepted coverage range.
pub fn remove_light_border(
    image: &ColorImage,
    cfg: &PreprocessConfig,
) -> IconMatchResult<ColorImage> {
    let gray = image.to_gray();
    let edges = edge_brightness(&gray, cfg.edge_band);
    let light_edges = edges
        .iter()
        .filter(|&&mean| mean > cfg.light_threshold as f32)
        .count();
    if light_edges < cfg.min_light_edges {
        return Ok(image.clone());
    }

    let Some(region) = largest_content_region(&gray, cfg.light_threshold) else {
        return Ok(image.clone());
    };

    let width = image.width();
    let height = image.height();
    let cover_x = region.width() as f32 / width as f32;
    let cover_y = region.height() as f32 / height as f32;
    let accepted = cfg.min_content_fraction..=cfg.max_content_fraction;
    if !accepted.contains(&cover_x) || !accepted.contains(&cover_y) {
        return Ok(image.clone());
    }

    let x0 = region.min_x.saturating_sub(cfg.crop_padding);
    let y0 = region.min_y.saturating_sub(cfg.crop_padding);
    let x1 = (region.max_x + cfg.crop_padding).min(width - 1);
    let y1 = (region.max_y + cfg.crop_padding).min(height - 1);
    let cropped = image.crop(x0, y0, x1 - x0 + 1, y1 - y0 + 1)?;
    resize_color(&cropped, width, height)
}

#[cfg(test)]
mod tests {
    use super::{edge_brightness, largest_content_region};
    use crate::image::OwnedImage;

    #[test]
    fn largest_region_picks_biggest_component() {
        let mut data = vec![255u8; 10 * 10];
        data[11] = 0;
        for y in 4..8 {
            for x in 3..9 {
                data[y * 10 + x] = 20;
            }
        }
        let gray = OwnedImage::new(data, 10, 10).unwrap();
        let region = largest_content_region(&gray, 230).unwrap();
        assert_eq!((region.min_x, region.min_y), (3, 4));
        assert_eq!((region.max_x, region.max_y), (8, 7));
        assert_eq!(region.pixels, 24);
    }

    #[test]
    fn edge_brightness_reports_each_side() {
        let mut data = vec![0u8; 6 * 6];
        for x in 0..6 {
            data[x] = 255;
        }
        let gray = OwnedImage::new(data, 6, 6).unwrap();
        let [top, bottom, left, right] = edge_brightness(&gray, 1);
        assert_eq!(top, 255.0);
        assert_eq!(bottom, 0.0);
        assert!(left > 0.0 && left < 255.0);
        assert!((left - right).abs() < 1e-6);
    }
}
