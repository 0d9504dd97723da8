// ============================================================================
// SUBJECT MASK EXTRACTION — classical edge/contour heuristic
// ============================================================================
//
// Derives a soft single-channel mask approximating the dominant foreground
// subject: Canny edges, morphological close + dilate to connect the subject
// boundary, largest external contour filled, Gaussian-feathered rim. This is
// a heuristic, not a segmenter; when no contour is found at all it degrades
// to a centered ellipse so downstream compositing always has something to
// work with.
// ============================================================================

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::ops::{color, filters};

pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;
pub const MORPH_KERNEL_SIZE: u32 = 5;
pub const DILATE_ITERATIONS: u32 = 3;
pub const FEATHER_KERNEL: u32 = 5;

const PRESMOOTH_KERNEL: u32 = 5;

// ============================================================================
// CANNY EDGE DETECTION
// ============================================================================

/// Gradient magnitudes and quantized directions (0 = E/W, 1 = NE/SW,
/// 2 = N/S, 3 = NW/SE) from a 3x3 Sobel. Border pixels stay zero.
fn gradients_and_directions(src: &GrayImage) -> (Vec<f32>, Vec<u8>) {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let data = src.as_raw();
    let mut magnitude = vec![0.0f32; w * h];
    let mut direction = vec![0u8; w * h];

    magnitude
        .par_chunks_mut(w)
        .zip(direction.par_chunks_mut(w))
        .enumerate()
        .for_each(|(y, (mag_row, dir_row))| {
            if y == 0 || y + 1 >= h {
                return;
            }
            let r0 = &data[(y - 1) * w..y * w];
            let r1 = &data[y * w..(y + 1) * w];
            let r2 = &data[(y + 1) * w..(y + 2) * w];

            for x in 1..w - 1 {
                let p00 = r0[x - 1] as f32;
                let p01 = r0[x] as f32;
                let p02 = r0[x + 1] as f32;
                let p10 = r1[x - 1] as f32;
                let p12 = r1[x + 1] as f32;
                let p20 = r2[x - 1] as f32;
                let p21 = r2[x] as f32;
                let p22 = r2[x + 1] as f32;

                let gx = -p00 + p02 - 2.0 * p10 + 2.0 * p12 - p20 + p22;
                let gy = -p00 - 2.0 * p01 - p02 + p20 + 2.0 * p21 + p22;

                mag_row[x] = (gx * gx + gy * gy).sqrt();

                let abs_gx = gx.abs();
                let abs_gy = gy.abs();
                let tan_22_5 = 0.41421356;
                dir_row[x] = if abs_gy <= abs_gx * tan_22_5 {
                    0
                } else if abs_gx <= abs_gy * tan_22_5 {
                    2
                } else if gx * gy > 0.0 {
                    1
                } else {
                    3
                };
            }
        });

    (magnitude, direction)
}

/// Keep only pixels that are local maxima along their gradient direction.
fn non_max_suppression(w: usize, h: usize, mag: &[f32], dir: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];

    out.par_chunks_mut(w).enumerate().for_each(|(y, out_row)| {
        if y == 0 || y + 1 >= h {
            return;
        }
        let r0 = (y - 1) * w;
        let r1 = y * w;
        let r2 = (y + 1) * w;

        for x in 1..w - 1 {
            let m = mag[r1 + x];
            let (m1, m2) = match dir[r1 + x] {
                0 => (mag[r1 + x - 1], mag[r1 + x + 1]),
                1 => (mag[r0 + x + 1], mag[r2 + x - 1]),
                2 => (mag[r0 + x], mag[r2 + x]),
                _ => (mag[r0 + x - 1], mag[r2 + x + 1]),
            };
            if m >= m1 && m >= m2 {
                out_row[x] = m;
            }
        }
    });

    out
}

/// Double-threshold hysteresis: strong pixels seed a flood that promotes
/// connected weak pixels.
fn hysteresis(w: usize, h: usize, nms: &[f32], low: f32, high: f32) -> GrayImage {
    const STRONG: u8 = 255;
    const WEAK: u8 = 75;

    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let idx = y * w + x;
            let v = nms[idx];
            if v >= high {
                state[idx] = STRONG;
                stack.push((x, y));
            } else if v >= low {
                state[idx] = WEAK;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        let x0 = x.saturating_sub(1);
        let x1 = (x + 1).min(w - 1);
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                let nidx = ny * w + nx;
                if state[nidx] == WEAK {
                    state[nidx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }

    let raw: Vec<u8> = state
        .iter()
        .map(|&s| if s == STRONG { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(w as u32, h as u32, raw).unwrap()
}

/// Canny edge detector: Gaussian presmooth, Sobel gradients, non-maximum
/// suppression, double-threshold hysteresis.
pub fn canny(src: &GrayImage, low: f32, high: f32) -> GrayImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w < 3 || h < 3 {
        return GrayImage::new(src.width(), src.height());
    }

    let blurred = filters::gaussian_blur_gray(src, PRESMOOTH_KERNEL);
    let (mag, dir) = gradients_and_directions(&blurred);
    let nms = non_max_suppression(w, h, &mag, &dir);
    hysteresis(w, h, &nms, low, high.max(low))
}

// ============================================================================
// MORPHOLOGY
// ============================================================================

/// Offsets of an elliptical structuring element of the given odd size.
fn morph_kernel_ellipse(size: u32) -> Vec<(i32, i32)> {
    let c = size as i32 / 2;
    let r = size as f32 / 2.0;
    let mut kernel = Vec::new();
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let dx = (x - c) as f32;
            let dy = (y - c) as f32;
            if (dx * dx) / (r * r) + (dy * dy) / (r * r) <= 1.0 {
                kernel.push((x - c, y - c));
            }
        }
    }
    kernel
}

fn dilate_once(src: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    let w = src.width() as i32;
    let h = src.height() as i32;
    let data = src.as_raw();
    let mut dst_raw = vec![0u8; (w * h) as usize];

    dst_raw
        .par_chunks_mut(w as usize)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut max_val = 0u8;
                for &(kx, ky) in kernel {
                    let px = x + kx;
                    let py = y as i32 + ky;
                    if px >= 0 && px < w && py >= 0 && py < h {
                        max_val = max_val.max(data[(py * w + px) as usize]);
                    }
                }
                row_out[x as usize] = max_val;
            }
        });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

fn erode_once(src: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    let w = src.width() as i32;
    let h = src.height() as i32;
    let data = src.as_raw();
    let mut dst_raw = vec![0u8; (w * h) as usize];

    dst_raw
        .par_chunks_mut(w as usize)
        .enumerate()
        .for_each(|(y, row_out)| {
            for x in 0..w {
                let mut min_val = 255u8;
                for &(kx, ky) in kernel {
                    let px = x + kx;
                    let py = y as i32 + ky;
                    if px >= 0 && px < w && py >= 0 && py < h {
                        min_val = min_val.min(data[(py * w + px) as usize]);
                    }
                }
                row_out[x as usize] = min_val;
            }
        });

    GrayImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

fn dilate(src: &GrayImage, kernel: &[(i32, i32)], iterations: u32) -> GrayImage {
    let mut out = src.clone();
    for _ in 0..iterations {
        out = dilate_once(&out, kernel);
    }
    out
}

/// Morphological closing: dilate then erode with the same element.
fn close(src: &GrayImage, kernel: &[(i32, i32)]) -> GrayImage {
    erode_once(&dilate_once(src, kernel), kernel)
}

// ============================================================================
// CONTOURS
// ============================================================================

const DIRS_8: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

#[derive(Debug, Clone)]
struct Contour {
    points: Vec<(i32, i32)>,
}

fn in_bounds(x: i32, y: i32, w: i32, h: i32) -> bool {
    x >= 0 && y >= 0 && x < w && y < h
}

fn is_foreground(data: &[u8], w: i32, h: i32, x: i32, y: i32) -> bool {
    in_bounds(x, y, w, h) && data[(y * w + x) as usize] > 0
}

fn is_boundary(data: &[u8], w: i32, h: i32, x: i32, y: i32) -> bool {
    if !is_foreground(data, w, h, x, y) {
        return false;
    }
    for (dx, dy) in DIRS_8 {
        let nx = x + dx;
        let ny = y + dy;
        if !in_bounds(nx, ny, w, h) || !is_foreground(data, w, h, nx, ny) {
            return true;
        }
    }
    false
}

/// Moore boundary tracing from a starting boundary pixel.
fn trace_boundary(data: &[u8], w: i32, h: i32, sx: i32, sy: i32) -> Vec<(i32, i32)> {
    let mut contour = Vec::new();
    let mut current = (sx, sy);
    let mut prev_dir = 4usize; // as if we arrived from the west
    let start = current;
    let start_prev_dir = prev_dir;
    let max_steps = (w as usize * h as usize).saturating_mul(8).max(32);

    for _ in 0..max_steps {
        contour.push(current);

        let mut found = None;
        for step in 1..=8 {
            let k = (prev_dir + step) % 8;
            let nx = current.0 + DIRS_8[k].0;
            let ny = current.1 + DIRS_8[k].1;
            if is_foreground(data, w, h, nx, ny) {
                prev_dir = (k + 6) % 8;
                found = Some((nx, ny));
                break;
            }
        }

        let Some(next) = found else { break };
        if next == start && prev_dir == start_prev_dir && contour.len() > 1 {
            break;
        }
        current = next;
    }

    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    contour
}

/// Find external contours in a binary image (non-zero pixels are foreground).
fn find_external_contours(binary: &GrayImage) -> Vec<Contour> {
    let w = binary.width() as i32;
    let h = binary.height() as i32;
    let data = binary.as_raw();
    let mut visited = vec![false; (w * h) as usize];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if visited[idx] || !is_boundary(data, w, h, x, y) {
                continue;
            }
            let points = trace_boundary(data, w, h, x, y);
            if points.len() >= 3 {
                for &(px, py) in &points {
                    visited[(py * w + px) as usize] = true;
                }
                contours.push(Contour { points });
            } else {
                visited[idx] = true;
            }
        }
    }

    contours
}

/// Shoelace area of an ordered contour.
fn contour_area(contour: &Contour) -> f64 {
    let n = contour.points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0f64;
    for i in 0..n {
        let (x0, y0) = contour.points[i];
        let (x1, y1) = contour.points[(i + 1) % n];
        area += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
    }
    area.abs() * 0.5
}

/// Rasterize the interior of a closed contour with an even-odd scanline
/// fill; the boundary pixels themselves are stamped too.
fn fill_contour(w: u32, h: u32, contour: &Contour) -> GrayImage {
    let mut mask = GrayImage::new(w, h);
    let pts = &contour.points;
    let n = pts.len();

    for y in 0..h as i32 {
        let yc = y as f64 + 0.5;
        let mut xs: Vec<f64> = Vec::new();
        for i in 0..n {
            let (x0, y0) = pts[i];
            let (x1, y1) = pts[(i + 1) % n];
            let (y0, y1) = (y0 as f64, y1 as f64);
            if (y0 <= yc) != (y1 <= yc) {
                let t = (yc - y0) / (y1 - y0);
                xs.push(x0 as f64 + t * (x1 as f64 - x0 as f64));
            }
        }
        xs.sort_by(|a, b| a.total_cmp(b));
        for pair in xs.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().max(0.0) as i64;
            let end = (pair[1] - 0.5).floor().min(w as f64 - 1.0) as i64;
            for x in start..=end {
                mask.put_pixel(x as u32, y as u32, image::Luma([255]));
            }
        }
    }

    for &(x, y) in pts {
        if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
            mask.put_pixel(x as u32, y as u32, image::Luma([255]));
        }
    }

    mask
}

// ============================================================================
// MASK EXTRACTION
// ============================================================================

/// Centered elliptical mask covering roughly the central third of the width
/// and half of the height. The guaranteed floor under contour extraction.
pub(crate) fn fallback_ellipse(w: u32, h: u32) -> GrayImage {
    let mut mask = GrayImage::new(w, h);
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let a = (w as f32 / 6.0).max(1.0);
    let b = (h as f32 / 4.0).max(1.0);

    for (x, y, px) in mask.enumerate_pixels_mut() {
        let dx = (x as f32 + 0.5 - cx) / a;
        let dy = (y as f32 + 0.5 - cy) / b;
        if dx * dx + dy * dy <= 1.0 {
            *px = image::Luma([255]);
        }
    }

    filters::gaussian_blur_gray(&mask, FEATHER_KERNEL)
}

/// Extract a soft mask of the dominant foreground subject.
///
/// Never fails: if the edge map yields no usable contour, a centered
/// ellipse is synthesized instead (logged as a warning).
pub fn subject_mask(src: &RgbImage) -> GrayImage {
    let w = src.width();
    let h = src.height();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let gray = color::to_gray(src);
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let kernel = morph_kernel_ellipse(MORPH_KERNEL_SIZE);
    let connected = dilate(&close(&edges, &kernel), &kernel, DILATE_ITERATIONS);

    let contours = find_external_contours(&connected);
    let best = contours
        .into_iter()
        .max_by(|a, b| contour_area(a).total_cmp(&contour_area(b)))
        .filter(|c| contour_area(c) > 0.0);

    match best {
        Some(contour) => {
            let filled = fill_contour(w, h, &contour);
            filters::gaussian_blur_gray(&filled, FEATHER_KERNEL)
        }
        None => {
            crate::log_warn!(
                "subject mask: no contour found in {}x{} image, using centered ellipse",
                w,
                h
            );
            fallback_ellipse(w, h)
        }
    }
}

/// Isolate the subject: pixels under the mask keep their color, background
/// pixels are zeroed.
pub fn apply_mask(src: &RgbImage, mask: &GrayImage) -> RgbImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    let src_raw = src.as_raw();
    let mask_raw = mask.as_raw();
    let stride = w * 3;
    let mut dst_raw = vec![0u8; w * h * 3];

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            let mask_row = &mask_raw[y * w..(y + 1) * w];
            for x in 0..w {
                if mask_row[x] > 0 {
                    let pi = x * 3;
                    row_out[pi..pi + 3].copy_from_slice(&row_in[pi..pi + 3]);
                }
            }
        });

    RgbImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn canny_of_uniform_image_is_empty() {
        let img = GrayImage::from_pixel(32, 32, Luma([128]));
        let edges = canny(&img, CANNY_LOW, CANNY_HIGH);
        assert!(edges.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn canny_finds_square_boundary() {
        let mut img = GrayImage::new(32, 32);
        for y in 8..24 {
            for x in 8..24 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let edges = canny(&img, CANNY_LOW, CANNY_HIGH);
        assert!(edges.as_raw().iter().any(|&v| v > 0));
    }

    #[test]
    fn all_black_image_falls_back_to_ellipse() {
        let img = RgbImage::new(50, 50);
        let mask = subject_mask(&img);
        assert_eq!(mask.dimensions(), (50, 50));
        // Centered, non-empty, background untouched in the corners.
        assert!(mask.get_pixel(25, 25)[0] > 200);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(49, 49)[0], 0);
    }

    #[test]
    fn bright_square_yields_covering_mask() {
        let mut img = RgbImage::new(50, 50);
        for y in 12..38 {
            for x in 12..38 {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let mask = subject_mask(&img);
        assert_eq!(mask.dimensions(), (50, 50));
        assert!(mask.get_pixel(25, 25)[0] > 0, "subject center not covered");
    }

    #[test]
    fn fallback_ellipse_spans_central_region() {
        let mask = fallback_ellipse(60, 40);
        assert!(mask.get_pixel(30, 20)[0] > 200);
        // Just inside the horizontal extent of a w/3-wide ellipse.
        assert!(mask.get_pixel(22, 20)[0] > 0);
        // Well outside it.
        assert_eq!(mask.get_pixel(5, 20)[0], 0);
    }

    #[test]
    fn apply_mask_zeroes_background() {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(3, 3, Luma([255]));
        let out = apply_mask(&img, &mask);
        assert_eq!(out.get_pixel(3, 3).0, [10, 20, 30]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
