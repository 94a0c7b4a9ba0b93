//! Letterbox preprocessing for segmentation models
//!
//! The model sees a square, padded copy of the photo. [`Letterbox`] records
//! how the photo was placed so the predicted mask can be mapped back onto
//! the original pixel grid.

use crate::error::{CanvasError, Result};
use image::{DynamicImage, ImageBuffer, RgbImage, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Normalization and input size expected by a segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Side of the square model input
    pub target_size: u32,
    /// Per-channel mean subtracted after scaling to 0-1
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// ImageNet normalization at the given input size
    #[must_use]
    pub fn imagenet(target_size: u32) -> Self {
        Self {
            target_size,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self::imagenet(1024)
    }
}

/// Placement of the original photo inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale applied to the original photo
    pub scale: f32,
    /// Left padding in model pixels
    pub offset_x: u32,
    /// Top padding in model pixels
    pub offset_y: u32,
    /// Side of the square model input
    pub target_size: u32,
    /// Width of the resized photo inside the input
    pub scaled_width: u32,
    /// Height of the resized photo inside the input
    pub scaled_height: u32,
}

impl Letterbox {
    /// Compute the placement of a `width` x `height` photo in a `target_size` square
    ///
    /// # Errors
    /// - Zero-sized photo or target
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fit(width: u32, height: u32, target_size: u32) -> Result<Self> {
        if width == 0 || height == 0 || target_size == 0 {
            return Err(CanvasError::processing(format!(
                "Cannot letterbox {width}x{height} into {target_size}x{target_size}"
            )));
        }

        let target = target_size as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let (scaled_width, scaled_height) = Self::scaled(width, height, scale, target_size);

        Ok(Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
            scaled_width,
            scaled_height,
        })
    }

    fn scaled(width: u32, height: u32, scale: f32, target_size: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let h = ((height as f32 * scale).round() as u32).clamp(1, target_size);
        (w, h)
    }

    /// Model-space coordinate for an original pixel, if it falls inside the input
    ///
    /// Pixel centers are mapped and clamped to the resized photo, so the last
    /// row and column never land in the padding.
    #[must_use]
    pub fn map(&self, x: u32, y: u32) -> Option<(usize, usize)> {
        let tx = Self::project(x, self.scale, self.scaled_width) + self.offset_x;
        let ty = Self::project(y, self.scale, self.scaled_height) + self.offset_y;
        (tx < self.target_size && ty < self.target_size).then_some((tx as usize, ty as usize))
    }

    fn project(coordinate: u32, scale: f32, extent: u32) -> u32 {
        let projected = ((coordinate as f32 + 0.5) * scale).floor() as u32;
        projected.min(extent.saturating_sub(1))
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Letterbox the image onto a white square and normalize it into an NCHW tensor
    ///
    /// # Errors
    /// - Zero-sized input
    pub fn preprocess(
        image: &DynamicImage,
        config: &PreprocessingConfig,
    ) -> Result<(Letterbox, Array4<f32>)> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();
        let letterbox = Letterbox::fit(width, height, config.target_size)?;
        let (new_width, new_height) =
            Letterbox::scaled(width, height, letterbox.scale, config.target_size);

        let resized = image::imageops::resize(
            &rgb_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas = ImageBuffer::from_pixel(
            config.target_size,
            config.target_size,
            image::Rgb([255, 255, 255]),
        );
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok((letterbox, Self::canvas_to_tensor(&canvas, config)))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = (f32::from(pixel[channel]) / 255.0
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
            }
        }

        tensor
    }

    /// Map a `(1, 1, H, W)` model output back onto the original photo as alpha
    ///
    /// Values are clamped to 0-1 before scaling to 0-255. Pixels that map
    /// outside the model output are treated as background.
    ///
    /// # Errors
    /// - Output tensor is not a single-channel batch of one
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply_mask(
        image: &DynamicImage,
        output: &Array4<f32>,
        letterbox: &Letterbox,
    ) -> Result<RgbaImage> {
        let shape = output.shape();
        if shape[0] != 1 || shape[1] != 1 {
            return Err(CanvasError::inference(format!(
                "Expected a (1, 1, H, W) mask tensor, got {shape:?}"
            )));
        }

        let mut result = image.to_rgba8();
        for (x, y, pixel) in result.enumerate_pixels_mut() {
            let value = letterbox
                .map(x, y)
                .and_then(|(tx, ty)| output.get([0, 0, ty, tx]).copied())
                .unwrap_or(0.0);
            let alpha = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            if alpha == 0 {
                *pixel = image::Rgba([0, 0, 0, 0]);
            } else {
                pixel[3] = alpha;
            }
        }

        Ok(result)
    }
}
