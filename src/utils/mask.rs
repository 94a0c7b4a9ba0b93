//! Alpha mask cleanup and foreground bounding boxes
//!
//! Background removers rarely return a perfectly binary mask: remote APIs
//! leave faint halos and the local model produces soft gradients far from
//! the subject. These helpers snap near-transparent and near-opaque values,
//! then find the tight box around what is left so the subject can be
//! cropped before it is scaled onto the canvas.

use image::{imageops, RgbaImage};
use serde::Serialize;

/// Alpha at or below this is treated as background
pub const DEFAULT_LOW_ALPHA: u8 = 10;

/// Alpha at or above this is treated as fully opaque
pub const DEFAULT_HIGH_ALPHA: u8 = 245;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Number of pixels covered
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Snap alpha values to 0 / 255 outside the `(low, high)` band
///
/// Fully transparent pixels also get their color zeroed so that resampling
/// does not bleed background color into the subject's edges.
pub fn clean_alpha(image: &mut RgbaImage, low: u8, high: u8) {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3];
        if alpha <= low {
            *pixel = image::Rgba([0, 0, 0, 0]);
        } else if alpha >= high {
            pixel[3] = 255;
        }
    }
}

/// Tight box around pixels whose alpha exceeds `threshold`
///
/// Returns `None` when nothing in the image is above the threshold.
#[must_use]
pub fn foreground_bbox(image: &RgbaImage, threshold: u8) -> Option<BoundingBox> {
    let (width, height) = image.dimensions();
    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > threshold {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Copy out the region covered by `bbox`
#[must_use]
pub fn crop_to_bbox(image: &RgbaImage, bbox: BoundingBox) -> RgbaImage {
    imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
}

/// Fraction of pixels with alpha above `threshold`
#[must_use]
pub fn coverage(image: &RgbaImage, threshold: u8) -> f32 {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let covered = image.pixels().filter(|p| p[3] > threshold).count();
    covered as f32 / total as f32
}
