use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("cannot identify image file: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Decode encoded image bytes (JPEG, PNG, WebP, ...) into an RGB raster.
///
/// Alpha and any extra channels are dropped; greyscale is expanded to RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
    let _s = common::span_debug!("decode_rgb");

    let image = image::load_from_memory(bytes)?.to_rgb8();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }

    tracing::trace!(
        width = image.width(),
        height = image.height(),
        encoded_bytes = bytes.len(),
        "Decoded upload"
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decode_png_drops_alpha() {
        let rgba = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 0]));
        let decoded = decode_rgb(&encode(&rgba, ImageFormat::Png)).unwrap();

        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(decoded.as_raw().len(), 4 * 3 * 3, "Output must be 3 channels");
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let result = decode_rgb(b"definitely not an image");

        assert!(
            matches!(result, Err(PreprocessError::Decode(_))),
            "Garbage bytes should be a decode error"
        );
    }

    #[test]
    fn test_decode_rejects_empty_input() {
        assert!(decode_rgb(&[]).is_err());
    }
}
