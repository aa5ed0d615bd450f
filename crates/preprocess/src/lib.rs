pub mod config;
pub mod cpu;
pub mod decode;

use ndarray::{Array, IxDyn};

pub use config::DEFAULT_INPUT_SIZE;
pub use cpu::CpuPreProcessor;
pub use decode::{PreprocessError, decode_rgb};

/// Letterbox transformation applied to an image, needed to map model-space
/// coordinates back onto the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor applied during letterboxing
    pub scale: f32,
    /// X offset from letterboxing (in pixels)
    pub offset_x: f32,
    /// Y offset from letterboxing (in pixels)
    pub offset_y: f32,
    pub orig_width: u32,
    pub orig_height: u32,
}

impl Letterbox {
    /// Map a point from model input space back to the original image, clipped to
    /// the image bounds.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let oy = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (ox, oy)
    }
}

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// NCHW float tensor, RGB, values in [0, 1]
    pub tensor: Array<f32, IxDyn>,
    pub letterbox: Letterbox,
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Preprocess an image for inference
    ///
    /// # Arguments
    /// * `pixels` - RGB pixel data in HWC format
    /// * `width` - Image width
    /// * `height` - Image height
    ///
    /// # Returns
    /// Preprocessed result with transformation parameters
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_original_undoes_letterbox() {
        let letterbox = Letterbox {
            scale: 0.5,
            offset_x: 0.0,
            offset_y: 80.0,
            orig_width: 1280,
            orig_height: 960,
        };

        assert_eq!(letterbox.to_original(100.0, 180.0), (200.0, 200.0));
    }

    #[test]
    fn test_to_original_clips_to_image_bounds() {
        let letterbox = Letterbox {
            scale: 1.0,
            offset_x: 10.0,
            offset_y: 10.0,
            orig_width: 100,
            orig_height: 50,
        };

        // Points inside the padding land outside the image and get clipped
        assert_eq!(letterbox.to_original(0.0, 0.0), (0.0, 0.0));
        assert_eq!(letterbox.to_original(500.0, 500.0), (100.0, 50.0));
    }
}
