// ============================================================================
// CLONE COMPOSITOR — multi-instance collage of the masked subject
// ============================================================================
//
// Lays several copies of the masked subject onto a synthesized canvas. The
// first (center) placement is always the untouched original; every other
// placement gets an independent hue/saturation perturbation, and alternating
// placements are additionally rescaled. All jitter is derived from an
// explicit seed through deterministic hashing, so a layout can be reproduced
// exactly in tests and across runs.
//
// A single bad placement never aborts the whole composition: its error is
// logged and the placement is skipped.
// ============================================================================

use image::{imageops, GrayImage, Rgb, RgbImage};

use crate::error::Error;
use crate::ops::{color, mask};

pub const CANVAS_WIDTH_FACTOR: f32 = 1.3;
pub const CANVAS_HEIGHT_FACTOR: f32 = 1.1;
/// Hue jitter bound, in half-degree hue units (the 8-bit HSV convention).
pub const HUE_JITTER: i32 = 20;
pub const SAT_JITTER_MIN: f32 = 0.8;
pub const SAT_JITTER_MAX: f32 = 1.2;
pub const SCALE_JITTER_MIN: f32 = 0.9;
pub const SCALE_JITTER_MAX: f32 = 1.1;
/// Fixed canvas fill; a light neutral the clone rims read well against.
pub const CANVAS_BACKGROUND: [u8; 3] = [236, 236, 236];

/// One instance in the collage: where it goes and how it is perturbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub offset_x: i32,
    pub offset_y: i32,
    pub scale: f32,
    pub hue_shift: i32,
    pub sat_mul: f32,
}

// ----------------------------------------------------------------------------
// Deterministic jitter
// ----------------------------------------------------------------------------

/// Simple hash for deterministic noise.
#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(
        x.wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(seed),
    );
    (h & 0x00FFFFFF) as f32 / 16777216.0
}

// ----------------------------------------------------------------------------
// Layout
// ----------------------------------------------------------------------------

/// Compute the placement list for a subject of `src_w` x `src_h` on a canvas
/// of `canvas_w` x `canvas_h`.
///
/// The base layout is three bottom-anchored positions (center, left, right);
/// when the canvas has vertical headroom, top-left and top-right are
/// appended for five total. Index 0 is the identity placement and carries no
/// perturbation.
pub fn plan_layout(
    src_w: u32,
    src_h: u32,
    canvas_w: u32,
    canvas_h: u32,
    seed: u32,
) -> Vec<Placement> {
    let span_x = canvas_w.saturating_sub(src_w) as i32;
    let y_base = canvas_h.saturating_sub(src_h) as i32;

    let mut positions = vec![(span_x / 2, y_base), (0, y_base), (span_x, y_base)];

    let headroom = canvas_h.saturating_sub(src_h);
    if headroom >= (src_h / 10).max(1) {
        positions.push((0, 0));
        positions.push((span_x, 0));
    }

    positions
        .into_iter()
        .enumerate()
        .map(|(i, (x, y))| {
            if i == 0 {
                // The original instance: never perturbed.
                return Placement {
                    offset_x: x,
                    offset_y: y,
                    scale: 1.0,
                    hue_shift: 0,
                    sat_mul: 1.0,
                };
            }
            let i = i as u32;
            let hue_shift =
                (hash_f32(i, 0x48, seed) * (2 * HUE_JITTER + 1) as f32).floor() as i32 - HUE_JITTER;
            let sat_mul =
                SAT_JITTER_MIN + hash_f32(i, 0x53, seed) * (SAT_JITTER_MAX - SAT_JITTER_MIN);
            // Alternating placements also jitter their size.
            let scale = if i % 2 == 0 {
                SCALE_JITTER_MIN + hash_f32(i, 0x5A, seed) * (SCALE_JITTER_MAX - SCALE_JITTER_MIN)
            } else {
                1.0
            };
            Placement {
                offset_x: x,
                offset_y: y,
                scale,
                hue_shift,
                sat_mul,
            }
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Compositing
// ----------------------------------------------------------------------------

/// Composite one placement into the canvas in place. Any geometry or shape
/// problem is reported back as a plain string for the caller to log; the
/// canvas is left untouched in that case.
fn composite_placement(
    canvas: &mut RgbImage,
    subject: &RgbImage,
    subject_mask: &GrayImage,
    p: &Placement,
) -> Result<(), String> {
    let src_w = subject.width();
    let src_h = subject.height();

    // Rescale clone and mask together, keeping the clone anchored to its
    // slot by recentering the offset.
    let (clone_img, clone_mask, offset_x, offset_y) = if (p.scale - 1.0).abs() > f32::EPSILON {
        let new_w = ((src_w as f32 * p.scale).round() as u32).max(1);
        let new_h = ((src_h as f32 * p.scale).round() as u32).max(1);
        (
            imageops::resize(subject, new_w, new_h, imageops::FilterType::Triangle),
            imageops::resize(subject_mask, new_w, new_h, imageops::FilterType::Triangle),
            p.offset_x + (src_w as i32 - new_w as i32) / 2,
            p.offset_y + (src_h as i32 - new_h as i32) / 2,
        )
    } else {
        (
            subject.clone(),
            subject_mask.clone(),
            p.offset_x,
            p.offset_y,
        )
    };

    let clone_img = if p.hue_shift != 0 || (p.sat_mul - 1.0).abs() > f32::EPSILON {
        let shift = p.hue_shift;
        let sat_mul = p.sat_mul;
        color::map_triplets(&clone_img, |r, g, b| {
            let (h, s, v) = color::rgb_px_to_hsv(r, g, b);
            let h = (h as i32 + shift).rem_euclid(180) as u8;
            let s = (s as f32 * sat_mul).round().clamp(0.0, 255.0) as u8;
            color::hsv_px_to_rgb(h, s, v)
        })
    } else {
        clone_img
    };

    let cw = clone_img.width() as i32;
    let ch = clone_img.height() as i32;
    if clone_mask.width() as i32 != cw || clone_mask.height() as i32 != ch {
        return Err(format!(
            "clone {}x{} and mask {}x{} disagree in shape",
            cw,
            ch,
            clone_mask.width(),
            clone_mask.height()
        ));
    }

    // Clip the target rectangle to the canvas bounds.
    let canvas_w = canvas.width() as i32;
    let canvas_h = canvas.height() as i32;
    let x0 = offset_x.max(0);
    let y0 = offset_y.max(0);
    let x1 = (offset_x + cw).min(canvas_w);
    let y1 = (offset_y + ch).min(canvas_h);
    if x1 <= x0 || y1 <= y0 {
        return Err("clipped region has zero area".into());
    }

    // Weight blend: canvas = canvas * (1 - w) + clone * w.
    let canvas_stride = canvas_w as usize * 3;
    let clone_raw = clone_img.as_raw();
    let mask_raw = clone_mask.as_raw();
    let canvas_raw = canvas.as_mut();

    for y in y0..y1 {
        let sy = (y - offset_y) as usize;
        for x in x0..x1 {
            let sx = (x - offset_x) as usize;
            let weight = mask_raw[sy * cw as usize + sx] as f32 / 255.0;
            if weight <= 0.0 {
                continue;
            }
            let si = (sy * cw as usize + sx) * 3;
            let di = y as usize * canvas_stride + x as usize * 3;
            for c in 0..3 {
                let base = canvas_raw[di + c] as f32;
                let top = clone_raw[si + c] as f32;
                canvas_raw[di + c] =
                    (base * (1.0 - weight) + top * weight).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(())
}

/// Produce the clone collage: a canvas of `round(w*1.3) x round(h*1.1)`
/// with the masked subject composited at every planned placement.
///
/// Individual placements may be skipped (logged), but the call only fails
/// if its inputs are unusable up front.
pub fn clone_collage(src: &RgbImage, subject_mask: &GrayImage, seed: u32) -> Result<RgbImage, Error> {
    let w = src.width();
    let h = src.height();
    if w == 0 || h == 0 {
        return Err(Error::InvalidInput("zero-sized image"));
    }
    if subject_mask.dimensions() != src.dimensions() {
        return Err(Error::InvalidInput("mask dimensions do not match image"));
    }

    let canvas_w = (w as f32 * CANVAS_WIDTH_FACTOR).round() as u32;
    let canvas_h = (h as f32 * CANVAS_HEIGHT_FACTOR).round() as u32;
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb(CANVAS_BACKGROUND));

    let subject = mask::apply_mask(src, subject_mask);
    let layout = plan_layout(w, h, canvas_w, canvas_h, seed);

    for (i, placement) in layout.iter().enumerate() {
        if let Err(why) = composite_placement(&mut canvas, &subject, subject_mask, placement) {
            crate::log_warn!("clone placement {} skipped: {}", i, why);
        }
    }

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn canvas_dimensions_follow_the_factors() {
        let src = RgbImage::from_pixel(50, 50, Rgb([10, 20, 30]));
        let mask = GrayImage::from_pixel(50, 50, Luma([255]));
        let out = clone_collage(&src, &mask, 0).unwrap();
        assert_eq!(out.dimensions(), (65, 55));
    }

    #[test]
    fn first_placement_is_identity() {
        for seed in [0u32, 1, 7, 12345] {
            let layout = plan_layout(100, 80, 130, 88, seed);
            let p0 = layout[0];
            assert_eq!(p0.scale, 1.0);
            assert_eq!(p0.hue_shift, 0);
            assert_eq!(p0.sat_mul, 1.0);
            assert_eq!(p0.offset_x, 15);
        }
    }

    #[test]
    fn layout_has_five_slots_with_headroom_and_three_without() {
        assert_eq!(plan_layout(100, 80, 130, 88, 0).len(), 5);
        // No vertical headroom: canvas exactly as tall as the subject.
        assert_eq!(plan_layout(100, 80, 130, 80, 0).len(), 3);
    }

    #[test]
    fn jitter_stays_in_range() {
        for seed in 0..50u32 {
            for p in plan_layout(64, 64, 83, 70, seed).iter().skip(1) {
                assert!((-HUE_JITTER..=HUE_JITTER).contains(&p.hue_shift));
                assert!((SAT_JITTER_MIN..=SAT_JITTER_MAX).contains(&p.sat_mul));
                assert!(p.scale >= SCALE_JITTER_MIN && p.scale <= SCALE_JITTER_MAX);
            }
        }
    }

    #[test]
    fn layouts_are_deterministic_per_seed() {
        let a = plan_layout(64, 64, 83, 70, 42);
        let b = plan_layout(64, 64, 83, 70, 42);
        assert_eq!(a, b);
        let c = plan_layout(64, 64, 83, 70, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn center_region_matches_the_unmodified_subject() {
        // A 2x2 hard-masked block whose center placement does not overlap
        // any other slot, so the identity invariant is observable directly.
        let mut src = RgbImage::new(20, 10);
        for (x, y, px) in src.enumerate_pixels_mut() {
            *px = Rgb([x as u8 * 3, y as u8 * 5, 77]);
        }
        let mut mask = GrayImage::new(20, 10);
        for y in 4..6 {
            for x in 9..11 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let out = clone_collage(&src, &mask, 9).unwrap();
        assert_eq!(out.dimensions(), (26, 11));

        // Center placement offset: ((26 - 20) / 2, 11 - 10) = (3, 1).
        for y in 4..6 {
            for x in 9..11 {
                assert_eq!(
                    out.get_pixel(x + 3, y + 1),
                    src.get_pixel(x, y),
                    "identity placement altered pixel ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn empty_mask_leaves_background_untouched() {
        let src = RgbImage::from_pixel(30, 30, Rgb([1, 2, 3]));
        let mask = GrayImage::new(30, 30);
        let out = clone_collage(&src, &mask, 5).unwrap();
        assert!(out.pixels().all(|p| p.0 == CANVAS_BACKGROUND));
    }

    #[test]
    fn collage_survives_the_ellipse_fallback_mask() {
        let src = RgbImage::new(50, 50);
        let mask = crate::ops::mask::subject_mask(&src);
        let out = clone_collage(&src, &mask, 0).unwrap();
        assert_eq!(out.dimensions(), (65, 55));
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let src = RgbImage::new(10, 10);
        let mask = GrayImage::new(4, 4);
        assert!(matches!(
            clone_collage(&src, &mask, 0),
            Err(Error::InvalidInput(_))
        ));
    }
}
