use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError};

use crate::error::RecompressError;

/// Bounding box for recompressed images.
pub const MAX_DIMENSION: u32 = 1000;
pub const JPEG_QUALITY: u8 = 80;

/// Decode, shrink to fit within `MAX_DIMENSION` on both sides (never
/// enlarging) and re-encode as JPEG.
///
/// CPU bound; call through [`recompress_blocking`] from async code.
pub fn recompress(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes)?;

    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Run [`recompress`] on the blocking pool so request handling keeps going.
pub async fn recompress_blocking(bytes: Vec<u8>) -> Result<Vec<u8>, RecompressError> {
    Ok(tokio::task::spawn_blocking(move || recompress(&bytes)).await??)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    /// PNG of pseudo-random pixels; noise keeps it from compressing well.
    pub(crate) fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [_, r, g, b] = state.to_le_bytes();
            image::Rgb([r, g, b])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn large_image_fits_bounding_box() {
        let out = recompress(&noise_png(1600, 800)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.width(), 1000);
        assert_eq!(img.height(), 500);
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let out = recompress(&noise_png(400, 300)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (400, 300));
    }

    #[test]
    fn garbage_fails() {
        assert!(recompress(b"definitely not an image").is_err());
    }

    #[tokio::test]
    async fn blocking_failure_is_typed() {
        let err = recompress_blocking(b"still not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, RecompressError::Image(_)));
    }
}
