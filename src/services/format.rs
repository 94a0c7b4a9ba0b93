//! Output encoding service
//!
//! Keeps JPEG encoding and preview resizing out of the pipeline so the
//! processor only deals with pixels.

use crate::error::{CanvasError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Longest side of preview images
pub const PREVIEW_MAX_SIDE: u32 = 800;

/// JPEG quality used for previews
pub const PREVIEW_QUALITY: u8 = 75;

/// Service for encoding composed canvases
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGB image as baseline JPEG
    ///
    /// # Errors
    /// - Quality outside 1-100
    /// - Encoder failure
    ///
    /// # Examples
    /// ```rust
    /// use listing_canvas::services::OutputFormatHandler;
    /// use image::RgbImage;
    ///
    /// let bytes = OutputFormatHandler::encode_jpeg(&RgbImage::new(16, 16), 90)?;
    /// assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
        if !(1..=100).contains(&quality) {
            return Err(CanvasError::field_value_error("quality", quality, "1-100"));
        }

        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(image)?;
        Ok(buffer)
    }

    /// Shrink an image so its longer side is at most `max_side`
    ///
    /// Images already within the limit are returned unchanged.
    #[must_use]
    pub fn downscale_for_preview(image: &RgbImage, max_side: u32) -> RgbImage {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if longest <= max_side || max_side == 0 {
            return image.clone();
        }

        let scale = max_side as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        imageops::resize(image, new_width, new_height, FilterType::Triangle)
    }
}
