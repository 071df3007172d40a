//! Separable resampling for icon-sized rasters.
//!
//! Each axis is resampled independently: shrinking uses area averaging
//! (each destination sample is the coverage-weighted mean of the source
//! samples under its footprint) and enlarging uses bilinear interpolation
//! with pixel centers at `i + 0.5`. Results are rounded to the nearest
//! integer and clamped to `[0, 255]`.

use crate::image::{ColorImage, OwnedImage};
use crate::util::{IconMatchError, IconMatchResult};

type AxisTaps = Vec<Vec<(usize, f32)>>;

fn axis_taps(src_len: usize, dst_len: usize) -> AxisTaps {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|d| {
            if dst_len < src_len {
                let start = d as f32 * scale;
                let end = ((d + 1) as f32 * scale).min(src_len as f32);
                let first = start.floor() as usize;
                let last = (end.ceil() as usize).min(src_len);
                let mut taps = Vec::with_capacity(last - first);
                for s in first..last {
                    let lo = start.max(s as f32);
                    let hi = end.min((s + 1) as f32);
                    let w = hi - lo;
                    if w > 0.0 {
                        taps.push((s, w / scale));
                    }
                }
                taps
            } else {
                let pos = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, (src_len - 1) as f32);
                let i0 = pos.floor() as usize;
                let i1 = (i0 + 1).min(src_len - 1);
                let frac = pos - i0 as f32;
                if i0 == i1 || frac <= 0.0 {
                    vec![(i0, 1.0)]
                } else {
                    vec![(i0, 1.0 - frac), (i1, frac)]
                }
            }
        })
        .collect()
}

fn resample(
    data: &[u8],
    src_w: usize,
    src_h: usize,
    channels: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let x_taps = axis_taps(src_w, dst_w);
    let y_taps = axis_taps(src_h, dst_h);

    let mut horizontal = vec![0.0f32; src_h * dst_w * channels];
    for y in 0..src_h {
        let src_row = &data[y * src_w * channels..(y + 1) * src_w * channels];
        let dst_row = &mut horizontal[y * dst_w * channels..(y + 1) * dst_w * channels];
        for (dx, taps) in x_taps.iter().enumerate() {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for &(sx, w) in taps {
                    acc += w * src_row[sx * channels + c] as f32;
                }
                dst_row[dx * channels + c] = acc;
            }
        }
    }

    let row_len = dst_w * channels;
    let mut out = vec![0u8; dst_h * row_len];
    for (dy, taps) in y_taps.iter().enumerate() {
        let dst_row = &mut out[dy * row_len..(dy + 1) * row_len];
        for (i, value) in dst_row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for &(sy, w) in taps {
                acc += w * horizontal[sy * row_len + i];
            }
            *value = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Resizes a color image to `width x height`.
///
/// Returns a clone when the size already matches.
pub fn resize_color(src: &ColorImage, width: usize, height: usize) -> IconMatchResult<ColorImage> {
    if width == 0 || height == 0 {
        return Err(IconMatchError::InvalidDimensions { width, height });
    }
    if src.width() == width && src.height() == height {
        return Ok(src.clone());
    }
    let data = resample(
        src.data(),
        src.width(),
        src.height(),
        ColorImage::CHANNELS,
        width,
        height,
    );
    ColorImage::new(data, width, height)
}

/// Resizes a single-channel image to `width x height`.
pub fn resize_gray(src: &OwnedImage, width: usize, height: usize) -> IconMatchResult<OwnedImage> {
    if width == 0 || height == 0 {
        return Err(IconMatchError::InvalidDimensions { width, height });
    }
    if src.width() == width && src.height() == height {
        return Ok(src.clone());
    }
    let data = resample(src.data(), src.width(), src.height(), 1, width, height);
    OwnedImage::new(data, width, height)
}

#[cfg(test)]
mod tests {
    use super::{axis_taps, resize_gray};
    use crate::image::OwnedImage;

    #[test]
    fn area_taps_sum_to_one() {
        for (src, dst) in [(10, 3), (160, 64), (7, 2)] {
            for taps in axis_taps(src, dst) {
                let sum: f32 = taps.iter().map(|&(_, w)| w).sum();
                assert!((sum - 1.0).abs() < 1e-4, "{src}->{dst}: {sum}");
            }
        }
    }

    #[test]
    fn halving_averages_blocks() {
        let img = OwnedImage::new((0u8..16).collect(), 4, 4).unwrap();
        let half = resize_gray(&img, 2, 2).unwrap();
        assert_eq!(half.data(), &[3, 5, 11, 13]);
    }

    #[test]
    fn constant_image_stays_constant_when_enlarged() {
        let img = OwnedImage::filled(5, 3, 77).unwrap();
        let big = resize_gray(&img, 17, 11).unwrap();
        assert!(big.data().iter().all(|&v| v == 77));
    }
}
