use super::BackgroundRemover;
use crate::error::{CanvasError, Result};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};

/// Keeps the whole photo, fully opaque
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRemover;

impl PassthroughRemover {
    /// Opaque RGBA copy of `image`
    #[must_use]
    pub fn opaque(image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            pixel[3] = 255;
        }
        rgba
    }
}

#[async_trait]
impl BackgroundRemover for PassthroughRemover {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn remove(&self, image: &DynamicImage, _encoded: &[u8]) -> Result<RgbaImage> {
        let image = image.clone();
        tokio::task::spawn_blocking(move || Self::opaque(&image))
            .await
            .map_err(|e| CanvasError::internal(format!("Passthrough task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_passthrough_is_opaque() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 0])));
        let cutout = PassthroughRemover.remove(&image, &[]).await.unwrap();
        assert_eq!(cutout.dimensions(), (3, 2));
        assert!(cutout.pixels().all(|p| *p == Rgba([9, 8, 7, 255])));
    }
}
