//! Decode downloaded bytes and re-encode them as fixed-quality JPEG

use crate::error::Result;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

/// Decode any supported image format and encode it as JPEG at `quality`.
///
/// Alpha is dropped; JPEG has no transparency.
pub fn transcode_to_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data)?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8.into())?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageCacheError;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_becomes_jpeg_with_same_dimensions() {
        let jpeg = transcode_to_jpeg(&png_bytes(12, 7), 90).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 7));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = transcode_to_jpeg(b"definitely not an image", 90).unwrap_err();
        assert!(matches!(err, ImageCacheError::Decode(_)));
    }
}
