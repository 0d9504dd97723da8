// ============================================================================
// STYLIZATION FILTERS — cartoon, sketch, oil-paint, color-shift
// ============================================================================
//
// Each filter is a pure function from an RGB buffer to a new RGB buffer of
// the same dimensions. All four are deterministic. None of them is
// idempotent: re-running a filter on its own output degrades it further
// (the edge masks re-binarize, the dodge re-brightens), so callers should
// always re-derive from the untouched source image.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::error::Error;
use crate::ops::{color, filters};

// Recognized tunables. These are deliberately constants, not parameters:
// the interactive sliders of earlier revisions added nothing but latent
// uninitialized-value bugs.
pub const MEDIAN_BLUR_KERNEL: u32 = 5;
pub const ADAPTIVE_BLOCK_SIZE: u32 = 9;
pub const ADAPTIVE_BIAS: f32 = 2.0;
pub const LINEART_BIAS: f32 = 10.0;
pub const BILATERAL_DIAMETER: i32 = 9;
pub const BILATERAL_SIGMA_COLOR: f32 = 250.0;
pub const BILATERAL_SIGMA_SPACE: f32 = 250.0;
pub const SKETCH_BLUR_KERNEL: u32 = 21;
pub const SKETCH_DODGE_SCALE: u32 = 256;
pub const OIL_SIGMA_SPATIAL: f32 = 60.0;
pub const OIL_SIGMA_RANGE: f32 = 0.4;
pub const OIL_ITERATIONS: u32 = 3;
pub const SATURATION_BOOST: u8 = 30;
pub const VALUE_BOOST: u8 = 20;

fn ensure_nonempty(img: &RgbImage) -> Result<(), Error> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::InvalidInput("zero-sized image"));
    }
    Ok(())
}

// ============================================================================
// CARTOON
// ============================================================================

/// Cartoon look: flatten color regions with a heavy bilateral filter, then
/// draw black outlines where the adaptively-thresholded edge mask fires.
///
/// The edge mask comes from the median-smoothed grayscale image: a pixel
/// more than [`ADAPTIVE_BIAS`] below its local window mean is an edge.
pub fn cartoon_core(flat: &RgbImage) -> Result<RgbImage, Error> {
    ensure_nonempty(flat)?;

    let gray = color::to_gray(flat);
    let smoothed = filters::median_blur_gray(&gray, MEDIAN_BLUR_KERNEL);
    let edges = filters::adaptive_threshold_mean(&smoothed, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_BIAS);
    let flattened = filters::bilateral_rgb(
        flat,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );

    // Mask the smoothed color image with the edge mask: edge pixels go black.
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    let stride = w * 3;
    let flat_raw = flattened.as_raw();
    let edge_raw = edges.as_raw();
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &flat_raw[y * stride..(y + 1) * stride];
            let edge_row = &edge_raw[y * w..(y + 1) * w];
            for x in 0..w {
                let pi = x * 3;
                if edge_row[x] != 0 {
                    row_out[pi..pi + 3].copy_from_slice(&row_in[pi..pi + 3]);
                }
            }
        });

    Ok(RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap())
}

// ============================================================================
// SKETCH
// ============================================================================

/// Pencil sketch via color dodge: grayscale, invert, blur the inversion,
/// then divide the grayscale by the blurred inversion. Light regions wash
/// out to paper white; strong gradients survive as pencil strokes.
pub fn sketch_core(flat: &RgbImage) -> Result<RgbImage, Error> {
    ensure_nonempty(flat)?;

    let gray = color::to_gray(flat);
    let w = gray.width();
    let h = gray.height();

    let inverted_raw: Vec<u8> = gray.as_raw().iter().map(|&v| 255 - v).collect();
    let inverted = GrayImage::from_raw(w, h, inverted_raw).unwrap();
    let blurred = filters::gaussian_blur_gray(&inverted, SKETCH_BLUR_KERNEL);

    let gray_raw = gray.as_raw();
    let blur_raw = blurred.as_raw();
    let mut dodged = vec![0u8; (w * h) as usize];
    dodged.par_iter_mut().enumerate().for_each(|(i, out)| {
        let denom = 255 - blur_raw[i] as u32;
        *out = if denom == 0 {
            255
        } else {
            ((gray_raw[i] as u32 * SKETCH_DODGE_SCALE) / denom).min(255) as u8
        };
    });

    Ok(color::gray_to_rgb(
        &GrayImage::from_raw(w, h, dodged).unwrap(),
    ))
}

/// Line-art sketch, the harsher alternate to [`sketch_core`]: a plain
/// adaptive threshold of the grayscale image. Output pixels are strictly
/// 0 or 255 before channel replication.
pub fn sketch_lineart_core(flat: &RgbImage) -> Result<RgbImage, Error> {
    ensure_nonempty(flat)?;
    let gray = color::to_gray(flat);
    let binary = filters::adaptive_threshold_mean(&gray, ADAPTIVE_BLOCK_SIZE, LINEART_BIAS);
    Ok(color::gray_to_rgb(&binary))
}

// ============================================================================
// OIL PAINT
// ============================================================================

/// Oil-paint look: an edge-preserving, region-flattening recursive filter
/// (domain transform, Gastal & Oliveira style) applied to the color image.
/// Flat regions melt together while hard color boundaries stay put.
pub fn oil_paint_core(flat: &RgbImage) -> Result<RgbImage, Error> {
    ensure_nonempty(flat)?;

    let w = flat.width() as usize;
    let h = flat.height() as usize;
    let stride = w * 3;
    let src_raw = flat.as_raw();

    // Domain-transform derivatives, computed once from the input. A large
    // color step between neighbours inflates the domain distance, which
    // stops the recursive averaging from crossing the edge.
    let ratio = OIL_SIGMA_SPATIAL / OIL_SIGMA_RANGE;
    let mut dhdx = vec![1.0f32; w * h];
    dhdx.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 1..w {
            let pi = x * 3;
            let qi = pi - 3;
            let mut acc = 0.0f32;
            for c in 0..3 {
                acc += (row_in[pi + c] as f32 - row_in[qi + c] as f32).abs();
            }
            row[x] = 1.0 + ratio * acc / 255.0;
        }
    });

    let mut dvdy = vec![1.0f32; w * h];
    dvdy.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        if y == 0 {
            return;
        }
        for x in 0..w {
            let pi = y * stride + x * 3;
            let qi = pi - stride;
            let mut acc = 0.0f32;
            for c in 0..3 {
                acc += (src_raw[pi + c] as f32 - src_raw[qi + c] as f32).abs();
            }
            row[x] = 1.0 + ratio * acc / 255.0;
        }
    });

    let mut work: Vec<f32> = src_raw.iter().map(|&v| v as f32).collect();
    let n = OIL_ITERATIONS;

    for i in 0..n {
        // Per-iteration sigma shrinks so the overall response stays Gaussian.
        let sigma_i = OIL_SIGMA_SPATIAL * 3.0f32.sqrt() * 2.0f32.powi((n - i - 1) as i32)
            / (4.0f32.powi(n as i32) - 1.0).sqrt();
        let a = (-(2.0f32.sqrt()) / sigma_i).exp();

        // Horizontal passes, parallel by row: left-to-right, right-to-left.
        work.par_chunks_mut(stride)
            .zip(dhdx.par_chunks(w))
            .for_each(|(row, drow)| {
                for x in 1..w {
                    let ad = a.powf(drow[x]);
                    let pi = x * 3;
                    for c in 0..3 {
                        let prev = row[pi - 3 + c];
                        let cur = row[pi + c];
                        row[pi + c] = cur + ad * (prev - cur);
                    }
                }
                for x in (0..w.saturating_sub(1)).rev() {
                    let ad = a.powf(drow[x + 1]);
                    let pi = x * 3;
                    for c in 0..3 {
                        let next = row[pi + 3 + c];
                        let cur = row[pi + c];
                        row[pi + c] = cur + ad * (next - cur);
                    }
                }
            });

        // Vertical passes: the recursion runs along columns, so these two
        // walk whole rows top-to-bottom and bottom-to-top.
        for y in 1..h {
            for x in 0..w {
                let ad = a.powf(dvdy[y * w + x]);
                let pi = y * stride + x * 3;
                for c in 0..3 {
                    let prev = work[pi - stride + c];
                    let cur = work[pi + c];
                    work[pi + c] = cur + ad * (prev - cur);
                }
            }
        }
        for y in (0..h.saturating_sub(1)).rev() {
            for x in 0..w {
                let ad = a.powf(dvdy[(y + 1) * w + x]);
                let pi = y * stride + x * 3;
                for c in 0..3 {
                    let next = work[pi + stride + c];
                    let cur = work[pi + c];
                    work[pi + c] = cur + ad * (next - cur);
                }
            }
        }
    }

    let dst_raw: Vec<u8> = work
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    Ok(RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap())
}

// ============================================================================
// COLOR SHIFT
// ============================================================================

/// The "dreamy" filter: push saturation and value up by a fixed amount in
/// HSV space, leaving hue untouched. Purely tonal; no spatial filtering.
pub fn color_shift_core(flat: &RgbImage) -> Result<RgbImage, Error> {
    ensure_nonempty(flat)?;
    Ok(color::map_triplets(flat, |r, g, b| {
        let (h, s, v) = color::rgb_px_to_hsv(r, g, b);
        color::hsv_px_to_rgb(
            h,
            s.saturating_add(SATURATION_BOOST),
            v.saturating_add(VALUE_BOOST),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8]);
        }
        img
    }

    #[test]
    fn all_filters_preserve_dimensions() {
        let img = gradient_image(24, 17);
        for out in [
            cartoon_core(&img).unwrap(),
            sketch_core(&img).unwrap(),
            sketch_lineart_core(&img).unwrap(),
            oil_paint_core(&img).unwrap(),
            color_shift_core(&img).unwrap(),
        ] {
            assert_eq!(out.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn zero_sized_input_is_rejected() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            cartoon_core(&img),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(sketch_core(&img), Err(Error::InvalidInput(_))));
        assert!(matches!(oil_paint_core(&img), Err(Error::InvalidInput(_))));
        assert!(matches!(
            color_shift_core(&img),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn cartoon_outlines_hard_boundaries() {
        let mut img = RgbImage::from_pixel(32, 32, Rgb([220, 220, 220]));
        for y in 10..22 {
            for x in 10..22 {
                img.put_pixel(x, y, Rgb([15, 15, 15]));
            }
        }
        let out = cartoon_core(&img).unwrap();
        let blacks = out.pixels().filter(|p| p.0 == [0, 0, 0]).count();
        assert!(blacks > 0, "expected black outline pixels");
    }

    #[test]
    fn cartoon_of_uniform_image_has_no_outlines() {
        let img = RgbImage::from_pixel(16, 16, Rgb([100, 140, 180]));
        let out = cartoon_core(&img).unwrap();
        assert!(out.pixels().all(|p| p.0 != [0, 0, 0]));
    }

    #[test]
    fn pencil_sketch_of_flat_image_is_paper_white() {
        // Dodge of a constant image divides a value by itself.
        let img = RgbImage::from_pixel(20, 20, Rgb([87, 87, 87]));
        let out = sketch_core(&img).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn lineart_output_is_strictly_binary() {
        let img = gradient_image(30, 30);
        let out = sketch_lineart_core(&img).unwrap();
        assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn oil_paint_preserves_constant_image() {
        let img = RgbImage::from_pixel(12, 9, Rgb([40, 90, 160]));
        let out = oil_paint_core(&img).unwrap();
        for (a, b) in img.as_raw().iter().zip(out.as_raw()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn oil_paint_flattens_low_contrast_texture() {
        // Faint checkerboard ripple, well below the range sigma: it should
        // melt toward its mean. (High-contrast steps are edges and survive.)
        let mut img = RgbImage::new(16, 16);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let v = if (x + y) % 2 == 0 { 98 } else { 102 };
            *px = Rgb([v, v, v]);
        }
        let out = oil_paint_core(&img).unwrap();
        let center = out.get_pixel(8, 8)[0] as i32;
        assert!((center - 100).abs() <= 1, "center {center} not flattened");
    }

    #[test]
    fn color_shift_boosts_saturation_and_value_of_mid_gray() {
        let img = RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]));
        let out = color_shift_core(&img).unwrap();
        let p = out.get_pixel(50, 50);
        let (h, s, v) = color::rgb_px_to_hsv(p[0], p[1], p[2]);
        assert_eq!(h, 0, "hue must stay put");
        assert_eq!(v, 148, "value boosted by 20");
        // Saturation of pure gray is 0, so it lands on the boost (within
        // one step of u8 quantization through the roundtrip).
        assert!((29..=31).contains(&s), "saturation {s} not near 30");
    }
}
