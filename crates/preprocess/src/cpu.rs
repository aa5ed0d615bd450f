use crate::config::{DEFAULT_INPUT_SIZE, LETTERBOX_COLOR};
use crate::{Letterbox, Preprocess, PreprocessResult};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use std::default::Default;

pub struct CpuPreProcessor {
    pub input_size: (u32, u32),
    letterboxed_buffer: Vec<u8>,
}

impl CpuPreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self {
            input_size,
            letterboxed_buffer: vec![LETTERBOX_COLOR; (input_size.0 * input_size.1 * 3) as usize],
        }
    }

    /// Square preprocessor, the shape YOLO exports use.
    pub fn square(size: u32) -> Self {
        Self::new((size, size))
    }

    pub fn preprocess_image(&mut self, image: &RgbImage) -> anyhow::Result<PreprocessResult> {
        self.preprocess(image.as_raw(), image.width(), image.height())
    }

    pub fn preprocess_from_u8_slice(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(Array<f32, IxDyn>, f32, f32, f32)> {
        let _s = span!("preprocess_image");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing image dimensions"
        );

        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        let expected_size = (width * height * 3) as usize;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        let (scale, offset_x, offset_y, resized) =
            self.resize_and_letterbox(pixels, width, height)?;
        let input = Self::normalize(&resized)?;
        Ok((input, scale, offset_x, offset_y))
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32, Image<'_>)> {
        let _s = span!("resize_and_letterbox");

        let scale =
            (self.input_size.0 as f32 / width as f32).min(self.input_size.1 as f32 / height as f32);
        // Extreme aspect ratios would otherwise collapse one side to zero pixels
        let new_width = ((width as f32 * scale) as u32).clamp(1, self.input_size.0);
        let new_height = ((height as f32 * scale) as u32).clamp(1, self.input_size.1);

        let offset_x = (self.input_size.0 - new_width) / 2;
        let offset_y = (self.input_size.1 - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;

        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = self.input_size.0 * 3;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + (new_width * 3) as usize]
                .copy_from_slice(&resized_data[src_row..src_row + (new_width * 3) as usize]);
        }

        let final_img = Image::from_slice_u8(
            self.input_size.0,
            self.input_size.1,
            &mut self.letterboxed_buffer,
            PixelType::U8x3,
        )?;

        Ok((scale, offset_x as f32, offset_y as f32, final_img))
    }

    /// HWC u8 to NCHW f32 in [0, 1]. YOLO graphs take unnormalised RGB.
    fn normalize(image: &Image) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = image.width() as usize;
        let height = image.height() as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];
        let buf = image.buffer();

        for (i, px) in buf.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult> {
        let (tensor, scale, offset_x, offset_y) =
            self.preprocess_from_u8_slice(pixels, width, height)?;
        Ok(PreprocessResult {
            tensor,
            letterbox: Letterbox {
                scale,
                offset_x,
                offset_y,
                orig_width: width,
                orig_height: height,
            },
        })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Test RGB preprocessing
    #[test]
    fn test_rgb_preprocessing() {
        let pixels = vec![
            255, 0, 0, // Red pixel
            0, 255, 0, // Green pixel
            0, 0, 255, // Blue pixel
            255, 255, 255, // White pixel
        ];

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_from_u8_slice(&pixels, 2, 2);

        assert!(result.is_ok(), "RGB preprocessing should succeed");
        let (output, _, _, _) = result.unwrap();
        assert_eq!(output.shape(), &[1, 3, 640, 640]);
    }

    /// Test buffer size mismatch detection
    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_from_u8_slice(&pixels, 10, 10);

        assert!(result.is_err(), "Size mismatch should return error");
        assert!(
            result.unwrap_err().to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let pixels = vec![128u8; 800 * 600 * 3];

        let mut preprocessor = CpuPreProcessor::square(640);
        let (output, scale, offset_x, offset_y) = preprocessor
            .preprocess_from_u8_slice(&pixels, 800, 600)
            .unwrap();

        // Scale should be min(640/800, 640/600) = 0.8
        assert_eq!(scale, 0.8, "Scale should preserve aspect ratio");

        // Resized dimensions: 800*0.8 = 640, 600*0.8 = 480
        // Offset X: (640 - 640) / 2 = 0
        // Offset Y: (640 - 480) / 2 = 80
        assert_eq!(offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(offset_y, 80.0, "Y offset should center vertically");

        assert_eq!(output.shape(), &[1, 3, 640, 640]);
    }

    /// Padding uses the YOLO grey and pixel values are scaled to [0, 1]
    #[test]
    fn test_padding_and_unit_scaling() {
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 0, 51]));

        let mut preprocessor = CpuPreProcessor::square(64);
        let result = preprocessor.preprocess_image(&image).unwrap();
        let output = result.tensor;

        // Top rows are padding (offset_y = 16)
        assert_eq!(result.letterbox.offset_y, 16.0);
        let pad = LETTERBOX_COLOR as f32 / 255.0;
        assert!((output[[0, 0, 0, 0]] - pad).abs() < 1e-6);

        // Centre pixel comes from the image
        assert!((output[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
        assert!(output[[0, 1, 32, 32]].abs() < 1e-6);
        assert!((output[[0, 2, 32, 32]] - 0.2).abs() < 1e-6);
    }

    /// Extreme aspect ratios still produce a valid tensor
    #[test]
    fn test_extreme_aspect_ratio_does_not_collapse() {
        let image = RgbImage::from_pixel(4000, 1, Rgb([0, 0, 0]));

        let mut preprocessor = CpuPreProcessor::square(64);
        let result = preprocessor.preprocess_image(&image).unwrap();

        assert_eq!(result.tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(result.letterbox.orig_width, 4000);
        assert_eq!(result.letterbox.orig_height, 1);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let mut preprocessor = CpuPreProcessor::square(64);
        assert!(preprocessor.preprocess_from_u8_slice(&[], 0, 0).is_err());
    }

    /// Test the Preprocess trait implementation
    #[test]
    fn test_preprocess_trait() {
        let pixels = vec![128u8; 100 * 100 * 3];
        let mut preprocessor = CpuPreProcessor::default();

        let result = preprocessor.preprocess(&pixels, 100, 100);
        assert!(result.is_ok());

        let preprocess_result = result.unwrap();
        assert_eq!(preprocess_result.tensor.shape(), &[1, 3, 640, 640]);
        assert!(preprocess_result.letterbox.scale > 0.0);
        assert_eq!(preprocessor.input_size(), (640, 640));
    }
}
