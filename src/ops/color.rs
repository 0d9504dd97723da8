// ============================================================================
// COLOR PRIMITIVES — channel reordering and color-space conversions
// ============================================================================
//
// All conversions are pure functions returning new buffers. HSV uses the
// 8-bit convention common to camera pipelines: H in [0, 180), S and V in
// [0, 255]. Hue offsets elsewhere in the crate are expressed in those units.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

/// Convert an RGB buffer to grayscale using the BT.709 luminance weights:
/// 0.2126 R + 0.7152 G + 0.0722 B.
pub fn to_gray(src: &RgbImage) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let src_raw = src.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h];

    dst_raw.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 3;
            let r = row_in[pi] as f32;
            let g = row_in[pi + 1] as f32;
            let b = row_in[pi + 2] as f32;
            row_out[x] = (0.2126 * r + 0.7152 * g + 0.0722 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Replicate a single-channel buffer into all three RGB channels.
pub fn gray_to_rgb(src: &GrayImage) -> RgbImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(w * 3)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * w..(y + 1) * w];
            for x in 0..w {
                let v = row_in[x];
                let pi = x * 3;
                row_out[pi] = v;
                row_out[pi + 1] = v;
                row_out[pi + 2] = v;
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Swap the first and third channels (RGB <-> BGR). Applying it twice
/// returns the original buffer.
pub fn swap_channels(src: &RgbImage) -> RgbImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let src_raw = src.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                let pi = x * 3;
                row_out[pi] = row_in[pi + 2];
                row_out[pi + 1] = row_in[pi + 1];
                row_out[pi + 2] = row_in[pi];
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// RGB (0..255 each) to 8-bit HSV: H in [0, 180), S and V in [0, 255].
#[inline]
pub fn rgb_px_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let h_deg = if delta <= 0.0 {
        0.0
    } else if (max - rf).abs() < f32::EPSILON {
        let mut h = 60.0 * (gf - bf) / delta;
        if h < 0.0 {
            h += 360.0;
        }
        h
    } else if (max - gf).abs() < f32::EPSILON {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };

    // Halved degrees so the full wheel fits one byte.
    let h = (h_deg / 2.0).round();
    let h = if h >= 180.0 { 0.0 } else { h };
    (h as u8, s.round().clamp(0.0, 255.0) as u8, v.round() as u8)
}

/// Inverse of [`rgb_px_to_hsv`].
#[inline]
pub fn hsv_px_to_rgb(h: u8, s: u8, v: u8) -> (u8, u8, u8) {
    let h_deg = h as f32 * 2.0;
    let s = s as f32 / 255.0;
    let v = v as f32;

    if s <= 0.0 {
        let g = v.round().clamp(0.0, 255.0) as u8;
        return (g, g, g);
    }

    let sector = h_deg / 60.0;
    let i = sector.floor() as i32 % 6;
    let f = sector - sector.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (rf, gf, bf) = match i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    (
        rf.round().clamp(0.0, 255.0) as u8,
        gf.round().clamp(0.0, 255.0) as u8,
        bf.round().clamp(0.0, 255.0) as u8,
    )
}

/// Convert a whole RGB buffer to packed 8-bit HSV (same layout, channels
/// reinterpreted as H, S, V).
pub fn rgb_to_hsv(src: &RgbImage) -> RgbImage {
    map_triplets(src, |r, g, b| rgb_px_to_hsv(r, g, b))
}

/// Convert a packed 8-bit HSV buffer back to RGB.
pub fn hsv_to_rgb(src: &RgbImage) -> RgbImage {
    map_triplets(src, |h, s, v| hsv_px_to_rgb(h, s, v))
}

/// Row-parallel per-pixel triplet map shared by the conversions above.
pub(crate) fn map_triplets<F>(src: &RgbImage, f: F) -> RgbImage
where
    F: Fn(u8, u8, u8) -> (u8, u8, u8) + Sync,
{
    let w = src.width() as usize;
    let h = src.height() as usize;
    let src_raw = src.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                let pi = x * 3;
                let (a, b, c) = f(row_in[pi], row_in[pi + 1], row_in[pi + 2]);
                row_out[pi] = a;
                row_out[pi + 1] = b;
                row_out[pi + 2] = c;
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn gray_of_white_is_white() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let gray = to_gray(&img);
        assert!(gray.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn gray_of_mid_gray_is_mid_gray() {
        let img = RgbImage::from_pixel(3, 3, Rgb([128, 128, 128]));
        let gray = to_gray(&img);
        assert!(gray.as_raw().iter().all(|&v| v == 128));
    }

    #[test]
    fn swap_channels_is_involution() {
        let mut img = RgbImage::new(5, 3);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([x as u8 * 10, y as u8 * 20, 7]);
        }
        let twice = swap_channels(&swap_channels(&img));
        assert_eq!(img.as_raw(), twice.as_raw());
    }

    #[test]
    fn hsv_of_pure_gray_has_zero_saturation() {
        let (h, s, v) = rgb_px_to_hsv(128, 128, 128);
        assert_eq!(h, 0);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn hsv_of_pure_red() {
        let (h, s, v) = rgb_px_to_hsv(255, 0, 0);
        assert_eq!(h, 0);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
    }

    #[test]
    fn hsv_roundtrip_is_close() {
        let samples = [
            (12u8, 200u8, 99u8),
            (255, 128, 0),
            (0, 0, 0),
            (17, 17, 17),
            (80, 160, 240),
        ];
        for (r, g, b) in samples {
            let (h, s, v) = rgb_px_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_px_to_rgb(h, s, v);
            // Quantizing hue to half-degrees costs a little precision.
            assert!((r as i32 - r2 as i32).abs() <= 6, "r {r} vs {r2}");
            assert!((g as i32 - g2 as i32).abs() <= 6, "g {g} vs {g2}");
            assert!((b as i32 - b2 as i32).abs() <= 6, "b {b} vs {b2}");
        }
    }
}
