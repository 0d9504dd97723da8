// ============================================================================
// IMAGE I/O — decode to RGB, encode-and-write for export
// ============================================================================

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageError, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Export formats the core guarantees. PNG is the canonical output; JPEG
/// and BMP ride along on the same encoder path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
        }
    }
}

/// Decode any supported image file into a 3-channel RGB buffer.
pub fn decode_image(path: &Path) -> Result<RgbImage, String> {
    let img = image::open(path).map_err(|e| format!("decode error: {}", e))?;
    Ok(img.to_rgb8())
}

/// Encode and write an image to a file. A failure here leaves the caller's
/// in-memory buffer untouched and reusable.
///
/// This is a standalone function (no session borrow) so it can be called
/// from a background thread if a caller wants non-blocking saves.
pub fn encode_and_write(
    image: &RgbImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn png_roundtrip_preserves_pixels() {
        let mut img = RgbImage::new(9, 6);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([x as u8 * 20, y as u8 * 30, 200]);
        }

        let path = std::env::temp_dir().join("cartoonify_io_roundtrip_test.png");
        encode_and_write(&img, &path, SaveFormat::Png, 90).unwrap();
        let back = decode_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.dimensions(), img.dimensions());
        assert_eq!(back.as_raw(), img.as_raw());
    }

    #[test]
    fn decode_of_missing_file_reports_an_error() {
        let missing = Path::new("/nonexistent/cartoonify/input.png");
        assert!(decode_image(missing).is_err());
    }
}
