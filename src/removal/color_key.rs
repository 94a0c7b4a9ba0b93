//! Border color keying
//!
//! Works well for studio shots on a plain sweep: the border is sampled, its
//! median color is taken as the background, and pixels close to it become
//! transparent with a short soft ramp.

use super::BackgroundRemover;
use crate::error::{CanvasError, Result};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};

/// Removes a uniform background by keying out the dominant border color
#[derive(Debug, Clone, Copy)]
pub struct ColorKeyRemover {
    /// Max channel difference treated as background
    pub tolerance: u8,
    /// Width of the soft edge ramp above the tolerance
    pub feather: u8,
}

impl Default for ColorKeyRemover {
    fn default() -> Self {
        Self {
            tolerance: 30,
            feather: 12,
        }
    }
}

impl ColorKeyRemover {
    #[must_use]
    pub fn new(tolerance: u8, feather: u8) -> Self {
        Self { tolerance, feather }
    }

    /// Per-channel median of the outer band of pixels
    #[must_use]
    pub fn border_color(image: &RgbaImage) -> [u8; 3] {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return [255, 255, 255];
        }
        let band = (width.min(height) / 50).max(1);

        let mut channels: [Vec<u8>; 3] = Default::default();
        for (x, y, pixel) in image.enumerate_pixels() {
            if x < band || y < band || x >= width - band || y >= height - band {
                for (values, &value) in channels.iter_mut().zip(pixel.0.iter()) {
                    values.push(value);
                }
            }
        }

        let mut median = [255u8; 3];
        for (slot, values) in median.iter_mut().zip(channels.iter_mut()) {
            if !values.is_empty() {
                let mid = values.len() / 2;
                *slot = *values.select_nth_unstable(mid).1;
            }
        }
        median
    }

    /// Alpha for a pixel at the given distance from the key color
    fn alpha_for(&self, distance: u8) -> u8 {
        if distance <= self.tolerance {
            0
        } else if self.feather == 0 || distance >= self.tolerance.saturating_add(self.feather) {
            255
        } else {
            let ramp = u32::from(distance - self.tolerance) * 255 / u32::from(self.feather);
            ramp.min(255) as u8
        }
    }

    /// Key out the border color of `image`
    #[must_use]
    pub fn key_out(&self, image: &RgbaImage) -> RgbaImage {
        let key = Self::border_color(image);
        let mut result = image.clone();
        for pixel in result.pixels_mut() {
            let distance = pixel
                .0
                .iter()
                .zip(key.iter())
                .map(|(&a, &b)| a.abs_diff(b))
                .max()
                .unwrap_or(0);
            let alpha = self.alpha_for(distance).min(pixel[3]);
            *pixel = if alpha == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([pixel[0], pixel[1], pixel[2], alpha])
            };
        }
        result
    }
}

#[async_trait]
impl BackgroundRemover for ColorKeyRemover {
    fn name(&self) -> &'static str {
        "color-key"
    }

    async fn remove(&self, image: &DynamicImage, _encoded: &[u8]) -> Result<RgbaImage> {
        let remover = *self;
        let image = image.clone();

        tokio::task::spawn_blocking(move || remover.key_out(&image.to_rgba8()))
            .await
            .map_err(|e| CanvasError::internal(format!("Color key task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn product_on(background: [u8; 4], size: u32) -> RgbaImage {
        let quarter = size / 4;
        RgbaImage::from_fn(size, size, |x, y| {
            if (quarter..size - quarter).contains(&x) && (quarter..size - quarter).contains(&y) {
                Rgba([20, 90, 160, 255])
            } else {
                Rgba(background)
            }
        })
    }

    #[test]
    fn test_border_color_is_median() {
        let mut image = product_on([240, 240, 240, 255], 40);
        // A stray dark pixel on the border does not move the median
        image.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(ColorKeyRemover::border_color(&image), [240, 240, 240]);
    }

    #[test]
    fn test_key_out_removes_background() {
        let image = product_on([250, 250, 250, 255], 40);
        let cutout = ColorKeyRemover::default().key_out(&image);

        assert_eq!(cutout.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(cutout.get_pixel(20, 20), &Rgba([20, 90, 160, 255]));
    }

    #[test]
    fn test_feather_ramp() {
        let remover = ColorKeyRemover::new(30, 12);
        assert_eq!(remover.alpha_for(10), 0);
        assert_eq!(remover.alpha_for(30), 0);
        let mid = remover.alpha_for(36);
        assert!(mid > 0 && mid < 255);
        assert_eq!(remover.alpha_for(42), 255);
        assert_eq!(ColorKeyRemover::new(30, 0).alpha_for(31), 255);
    }

    #[test]
    fn test_uniform_image_becomes_empty() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([128, 64, 32, 255]));
        let cutout = ColorKeyRemover::default().key_out(&image);
        assert!(cutout.pixels().all(|p| p[3] == 0));
    }

    #[tokio::test]
    async fn test_remove_yields_to_other_tasks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let image = DynamicImage::ImageRgba8(product_on([250, 250, 250, 255], 1200));
        let cutout = ColorKeyRemover::default().remove(&image, &[]).await.unwrap();
        ticker.abort();

        assert_eq!(cutout.dimensions(), (1200, 1200));
        // The single-threaded runtime only polls the ticker if keying ran off-thread
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_dimensions() {
        let image = DynamicImage::ImageRgba8(product_on([255, 255, 255, 255], 32));
        let cutout = ColorKeyRemover::default().remove(&image, &[]).await.unwrap();
        assert_eq!(cutout.dimensions(), (32, 32));
    }
}
