// ============================================================================
// LOW-LEVEL FILTERS — shared raster primitives
// ============================================================================
//
// The building blocks the stylization filters and the mask extractor are
// assembled from: separable Gaussian blur, local mean, median blur, adaptive
// mean thresholding, and a joint spatial/range bilateral filter. Everything
// is parallelized by row and clamps at the image border.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

/// Build a normalized 1-D Gaussian kernel of length `2 * radius + 1`.
pub fn gaussian_kernel(radius: usize, sigma: f32) -> Vec<f32> {
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel = vec![0.0f32; len];
    let mut sum = 0.0f32;
    for (i, v) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *v = (-x * x / s2).exp();
        sum += *v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Derive a blur sigma from an odd kernel size, matching the convention of
/// classical imaging libraries: `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
#[inline]
fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Separable Gaussian blur of a single-channel buffer with an odd kernel
/// size. Borders are clamp-extended.
pub fn gaussian_blur_gray(src: &GrayImage, ksize: u32) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || ksize < 3 {
        return src.clone();
    }

    let radius = (ksize / 2) as usize;
    let kernel = gaussian_kernel(radius, sigma_for_kernel(ksize));
    let src_raw = src.as_raw();

    // Horizontal pass (parallel by row).
    let mut buf_h = vec![0.0f32; w * h];
    buf_h.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize)
                    .clamp(0, w as isize - 1) as usize;
                acc += row_in[sx] as f32 * kv;
            }
            row_out[x] = acc;
        }
    });

    // Vertical pass (parallel by row).
    let mut dst_raw = vec![0u8; w * h];
    dst_raw.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize)
                    .clamp(0, h as isize - 1) as usize;
                acc += buf_h[sy * w + x] * kv;
            }
            row_out[x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Separable Gaussian blur of a 3-channel buffer with an odd kernel size.
pub fn gaussian_blur_rgb(src: &RgbImage, ksize: u32) -> RgbImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || ksize < 3 {
        return src.clone();
    }

    let radius = (ksize / 2) as usize;
    let kernel = gaussian_kernel(radius, sigma_for_kernel(ksize));
    let src_raw = src.as_raw();
    let stride = w * 3;

    let mut buf_h = vec![0.0f32; w * h * 3];
    buf_h
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - radius as isize)
                        .clamp(0, w as isize - 1) as usize;
                    let si = sx * 3;
                    acc[0] += row_in[si] as f32 * kv;
                    acc[1] += row_in[si + 1] as f32 * kv;
                    acc[2] += row_in[si + 2] as f32 * kv;
                }
                let pi = x * 3;
                row_out[pi] = acc[0];
                row_out[pi + 1] = acc[1];
                row_out[pi + 2] = acc[2];
            }
        });

    let mut dst_raw = vec![0u8; w * h * 3];
    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - radius as isize)
                        .clamp(0, h as isize - 1) as usize;
                    let si = sy * stride + x * 3;
                    acc[0] += buf_h[si] * kv;
                    acc[1] += buf_h[si + 1] * kv;
                    acc[2] += buf_h[si + 2] * kv;
                }
                let pi = x * 3;
                row_out[pi] = acc[0].round().clamp(0.0, 255.0) as u8;
                row_out[pi + 1] = acc[1].round().clamp(0.0, 255.0) as u8;
                row_out[pi + 2] = acc[2].round().clamp(0.0, 255.0) as u8;
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Local mean of a clamped square window (`block` must be odd).
pub fn box_mean_gray(src: &GrayImage, block: u32) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let r = (block / 2) as i32;
    let count = block * block;
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; w * h];

    dst_raw.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut sum = 0u32;
            for dy in -r..=r {
                let sy = (y as i32 + dy).clamp(0, h as i32 - 1) as usize;
                for dx in -r..=r {
                    let sx = (x as i32 + dx).clamp(0, w as i32 - 1) as usize;
                    sum += src_raw[sy * w + sx] as u32;
                }
            }
            row_out[x] = (sum / count) as u8;
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Per-pixel binarization against the local window mean: pixels that fall
/// below `mean - bias` become 0, everything else 255.
pub fn adaptive_threshold_mean(src: &GrayImage, block: u32, bias: f32) -> GrayImage {
    let w = src.width();
    let h = src.height();
    if w == 0 || h == 0 {
        return src.clone();
    }

    let local = box_mean_gray(src, block);
    let src_raw = src.as_raw();
    let local_raw = local.as_raw();
    let mut dst_raw = vec![0u8; (w * h) as usize];

    dst_raw.par_iter_mut().enumerate().for_each(|(i, out)| {
        let value = src_raw[i] as f32;
        let threshold = local_raw[i] as f32 - bias;
        *out = if value > threshold { 255 } else { 0 };
    });

    GrayImage::from_raw(w, h, dst_raw).unwrap()
}

/// Median blur of a single-channel buffer (`ksize` odd). Gathers the clamped
/// window and sorts it per pixel; windows here are small.
pub fn median_blur_gray(src: &GrayImage, ksize: u32) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || ksize < 3 {
        return src.clone();
    }

    let r = (ksize / 2) as i32;
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; w * h];

    dst_raw.par_chunks_mut(w).enumerate().for_each(|(y, row_out)| {
        let mut window: Vec<u8> = Vec::with_capacity((ksize * ksize) as usize);
        for x in 0..w {
            window.clear();
            for dy in -r..=r {
                let sy = (y as i32 + dy).clamp(0, h as i32 - 1) as usize;
                for dx in -r..=r {
                    let sx = (x as i32 + dx).clamp(0, w as i32 - 1) as usize;
                    window.push(src_raw[sy * w + sx]);
                }
            }
            window.sort_unstable();
            row_out[x] = window[window.len() / 2];
        }
    });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Joint spatial/range bilateral filter over all three channels. `d` is the
/// pixel neighbourhood diameter; when `d <= 0` the radius is derived from
/// `sigma_space` instead.
pub fn bilateral_rgb(src: &RgbImage, d: i32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let radius = if d <= 0 {
        (sigma_space * 1.5).ceil() as i32
    } else {
        d / 2
    };
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let src_raw = src.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let ci = y * stride + x * 3;
                let center = [
                    src_raw[ci] as f32,
                    src_raw[ci + 1] as f32,
                    src_raw[ci + 2] as f32,
                ];

                let mut sum = [0.0f32; 3];
                let mut sum_weight = 0.0f32;

                for dy in -radius..=radius {
                    let sy = y as i32 + dy;
                    if sy < 0 || sy >= h as i32 {
                        continue;
                    }
                    for dx in -radius..=radius {
                        let sx = x as i32 + dx;
                        if sx < 0 || sx >= w as i32 {
                            continue;
                        }
                        let si = sy as usize * stride + sx as usize * 3;
                        let pr = src_raw[si] as f32;
                        let pg = src_raw[si + 1] as f32;
                        let pb = src_raw[si + 2] as f32;

                        let dr = pr - center[0];
                        let dg = pg - center[1];
                        let db = pb - center[2];
                        let color_dist_sq = dr * dr + dg * dg + db * db;
                        let space_dist_sq = (dx * dx + dy * dy) as f32;

                        let weight =
                            (space_dist_sq * space_coeff + color_dist_sq * color_coeff).exp();
                        sum[0] += pr * weight;
                        sum[1] += pg * weight;
                        sum[2] += pb * weight;
                        sum_weight += weight;
                    }
                }

                let pi = x * 3;
                let inv = 1.0 / sum_weight;
                row_out[pi] = (sum[0] * inv).round().clamp(0.0, 255.0) as u8;
                row_out[pi + 1] = (sum[1] * inv).round().clamp(0.0, 255.0) as u8;
                row_out[pi + 2] = (sum[2] * inv).round().clamp(0.0, 255.0) as u8;
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn gaussian_preserves_constant_image() {
        let img = GrayImage::from_pixel(16, 16, Luma([90]));
        let out = gaussian_blur_gray(&img, 5);
        assert_eq!(out.dimensions(), (16, 16));
        assert!(out.as_raw().iter().all(|&v| (v as i32 - 90).abs() <= 1));
    }

    #[test]
    fn gaussian_rgb_preserves_dimensions() {
        let img = RgbImage::from_pixel(13, 7, Rgb([10, 200, 50]));
        let out = gaussian_blur_rgb(&img, 21);
        assert_eq!(out.dimensions(), (13, 7));
    }

    #[test]
    fn median_removes_isolated_spike() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([50]));
        img.put_pixel(4, 4, Luma([255]));
        let out = median_blur_gray(&img, 5);
        assert_eq!(out.get_pixel(4, 4)[0], 50);
    }

    #[test]
    fn adaptive_threshold_uniform_image_is_white() {
        // Every pixel sits exactly on its local mean, above mean - bias.
        let img = GrayImage::from_pixel(12, 12, Luma([77]));
        let out = adaptive_threshold_mean(&img, 9, 2.0);
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn adaptive_threshold_marks_dark_ink() {
        let mut img = GrayImage::from_pixel(15, 15, Luma([200]));
        for y in 6..9 {
            for x in 6..9 {
                img.put_pixel(x, y, Luma([10]));
            }
        }
        let out = adaptive_threshold_mean(&img, 9, 2.0);
        assert_eq!(out.get_pixel(7, 7)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn bilateral_preserves_constant_image() {
        let img = RgbImage::from_pixel(10, 10, Rgb([120, 60, 30]));
        let out = bilateral_rgb(&img, 9, 250.0, 250.0);
        for (a, b) in img.as_raw().iter().zip(out.as_raw()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }
}
