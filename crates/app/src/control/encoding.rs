//! JPEG encoding of annotated frames for the preview server.

use anyhow::{Result, anyhow};
use image::{RgbImage, codecs::jpeg::JpegEncoder};

/// Encode an annotated RGB canvas. Quality is clamped to `1..=100`.
pub(crate) fn encode_jpeg(canvas: &RgbImage, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(canvas.as_raw().len() / 8);
    let quality = jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(canvas)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn produces_jpeg_markers() {
        let canvas = RgbImage::from_pixel(16, 8, Rgb([10, 200, 30]));
        let jpeg = encode_jpeg(&canvas, 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn zero_quality_is_clamped() {
        let canvas = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        assert!(encode_jpeg(&canvas, 0).is_ok());
    }
}
