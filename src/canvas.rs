//! Canvas geometry and composition
//!
//! A cutout is cleaned, cropped to its foreground, scaled so its longer
//! relative side fills `fill_ratio` of the canvas, and alpha-blended at the
//! center of a solid background. An optional soft drop shadow is drawn
//! underneath.

use crate::config::{CanvasConfig, MAX_CANVAS_SIDE, MIN_CANVAS_SIDE};
use crate::error::{CanvasError, Result};
use crate::utils::mask::{
    clean_alpha, crop_to_bbox, foreground_bbox, DEFAULT_HIGH_ALPHA, DEFAULT_LOW_ALPHA,
};
use crate::utils::BackgroundColor;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Shadow alpha relative to the subject's alpha
pub const SHADOW_OPACITY: f32 = 0.35;

/// Shadow blur sigma as a fraction of the subject's longer side
pub const SHADOW_BLUR_FRACTION: f32 = 0.015;

/// Downward shadow offset as a fraction of the subject's height
pub const SHADOW_OFFSET_FRACTION: f32 = 0.02;

/// Fully resolved settings for rendering one canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub fill_ratio: f32,
    pub background: BackgroundColor,
    pub shadow: bool,
    pub enhance: bool,
    /// JPEG quality used when the canvas is encoded
    pub quality: u8,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::from(&CanvasConfig::default())
    }
}

impl From<&CanvasConfig> for CanvasSpec {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fill_ratio: config.fill_ratio,
            background: config.background,
            shadow: config.shadow,
            enhance: config.enhance,
            quality: config.jpeg_quality,
        }
    }
}

impl CanvasSpec {
    /// Copy with a different canvas size
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Copy with a different background
    #[must_use]
    pub fn with_background(mut self, background: BackgroundColor) -> Self {
        self.background = background;
        self
    }

    /// Copy with the shadow switched on or off
    #[must_use]
    pub fn with_shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }

    /// Check dimensions, fill ratio and quality against the accepted ranges
    ///
    /// # Errors
    /// - Any value outside its range, reported as invalid input
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_CANVAS_SIDE..=MAX_CANVAS_SIDE).contains(&value) {
                return Err(CanvasError::field_value_error(field, value, "100-10000"));
            }
        }
        if !(0.1..=1.0).contains(&self.fill_ratio) {
            return Err(CanvasError::field_value_error(
                "fill_ratio",
                self.fill_ratio,
                "0.1-1.0",
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(CanvasError::field_value_error("quality", self.quality, "1-100"));
        }
        Ok(())
    }
}

/// Marketplace product categories with their preferred fill ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    General,
    Apparel,
    Electronics,
    Shoes,
    Jewelry,
    Furniture,
    Beauty,
    Toys,
}

impl ProductCategory {
    pub const ALL: [Self; 8] = [
        Self::General,
        Self::Apparel,
        Self::Electronics,
        Self::Shoes,
        Self::Jewelry,
        Self::Furniture,
        Self::Beauty,
        Self::Toys,
    ];

    /// Fraction of the canvas the product should occupy
    #[must_use]
    pub fn fill_ratio(self) -> f32 {
        match self {
            Self::General | Self::Apparel | Self::Electronics | Self::Toys => 0.85,
            Self::Shoes | Self::Beauty => 0.80,
            // Small items read better with more breathing room
            Self::Jewelry => 0.70,
            Self::Furniture => 0.90,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Apparel => "apparel",
            Self::Electronics => "electronics",
            Self::Shoes => "shoes",
            Self::Jewelry => "jewelry",
            Self::Furniture => "furniture",
            Self::Beauty => "beauty",
            Self::Toys => "toys",
        }
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                CanvasError::invalid_input(format!(
                    "Unknown category '{}'. Expected one of: {}",
                    s.trim(),
                    names.join(", ")
                ))
            })
    }
}

/// Largest size with the source aspect ratio inside `fill_ratio` of the canvas
///
/// Both returned dimensions are at least 1 and never exceed the canvas.
///
/// # Examples
/// ```rust
/// use listing_canvas::canvas::fit_dimensions;
///
/// // A wide 400x200 product on a 1000x1000 canvas at 80% fill
/// assert_eq!(fit_dimensions(400, 200, 1000, 1000, 0.8), (800, 400));
/// ```
#[must_use]
pub fn fit_dimensions(
    src_width: u32,
    src_height: u32,
    canvas_width: u32,
    canvas_height: u32,
    fill_ratio: f32,
) -> (u32, u32) {
    let src_w = src_width.max(1) as f32;
    let src_h = src_height.max(1) as f32;
    let max_w = (canvas_width as f32 * fill_ratio).max(1.0);
    let max_h = (canvas_height as f32 * fill_ratio).max(1.0);

    let scale = (max_w / src_w).min(max_h / src_h);
    let width = ((src_w * scale).round() as u32).clamp(1, canvas_width.max(1));
    let height = ((src_h * scale).round() as u32).clamp(1, canvas_height.max(1));
    (width, height)
}

/// Top-left position that centers `item` on `canvas`
#[must_use]
pub fn centered_offset(item: (u32, u32), canvas: (u32, u32)) -> (i64, i64) {
    (
        (i64::from(canvas.0) - i64::from(item.0)) / 2,
        (i64::from(canvas.1) - i64::from(item.1)) / 2,
    )
}

/// Place a cutout on a solid canvas
///
/// The cutout's alpha is cleaned, it is cropped to its foreground (the
/// whole image when nothing is opaque), resized with Lanczos3 and blended
/// at the center. Enhancement and the drop shadow are applied when enabled.
///
/// # Errors
/// - Invalid canvas settings
/// - Empty cutout
#[instrument(skip(cutout), fields(src_width = cutout.width(), src_height = cutout.height()))]
pub fn compose(cutout: &RgbaImage, spec: &CanvasSpec) -> Result<RgbImage> {
    spec.validate()?;
    if cutout.width() == 0 || cutout.height() == 0 {
        return Err(CanvasError::processing("Cannot compose an empty cutout"));
    }

    let mut subject = cutout.clone();
    clean_alpha(&mut subject, DEFAULT_LOW_ALPHA, DEFAULT_HIGH_ALPHA);
    let subject = match foreground_bbox(&subject, DEFAULT_LOW_ALPHA) {
        Some(bbox) => {
            debug!(?bbox, "cropped to foreground");
            crop_to_bbox(&subject, bbox)
        },
        None => subject,
    };

    let (width, height) = fit_dimensions(
        subject.width(),
        subject.height(),
        spec.width,
        spec.height,
        spec.fill_ratio,
    );
    let mut resized = imageops::resize(&subject, width, height, FilterType::Lanczos3);
    if spec.enhance {
        resized = enhance(&resized);
    }

    let bg = spec.background;
    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, Rgba([bg.r, bg.g, bg.b, 255]));
    let (offset_x, offset_y) = centered_offset((width, height), (spec.width, spec.height));

    if spec.shadow {
        let (shadow, pad) = drop_shadow(&resized);
        let drop = (height as f32 * SHADOW_OFFSET_FRACTION).round() as i64;
        imageops::overlay(&mut canvas, &shadow, offset_x - pad, offset_y - pad + drop);
    }
    imageops::overlay(&mut canvas, &resized, offset_x, offset_y);

    debug!(width, height, offset_x, offset_y, "placed subject");
    Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// Mild sharpening and contrast, keeping the original alpha
fn enhance(image: &RgbaImage) -> RgbaImage {
    let sharpened = imageops::unsharpen(image, 1.0, 2);
    let mut enhanced = imageops::contrast(&sharpened, 4.0);
    for (out, src) in enhanced.pixels_mut().zip(image.pixels()) {
        out[3] = src[3];
    }
    enhanced
}

/// Black, blurred copy of the subject's silhouette
///
/// Returns the shadow and the padding added on every side so the blur is
/// not clipped.
fn drop_shadow(subject: &RgbaImage) -> (RgbaImage, i64) {
    let (width, height) = subject.dimensions();
    let sigma = (width.max(height) as f32 * SHADOW_BLUR_FRACTION).max(1.0);
    let pad = (sigma * 3.0).ceil() as u32;
    let (padded_w, padded_h) = (width + 2 * pad, height + 2 * pad);

    let mut alpha = GrayImage::new(padded_w, padded_h);
    for (x, y, pixel) in subject.enumerate_pixels() {
        let value = (f32::from(pixel[3]) * SHADOW_OPACITY).round() as u8;
        alpha.put_pixel(x + pad, y + pad, Luma([value]));
    }

    // Large blurs run on a quarter-size copy
    let factor = if sigma >= 8.0 { 4 } else { 1 };
    let blurred = if factor > 1 {
        let small = imageops::resize(
            &alpha,
            (padded_w / factor).max(1),
            (padded_h / factor).max(1),
            FilterType::Triangle,
        );
        let small = imageops::blur(&small, sigma / factor as f32);
        imageops::resize(&small, padded_w, padded_h, FilterType::Triangle)
    } else {
        imageops::blur(&alpha, sigma)
    };

    let shadow = RgbaImage::from_fn(padded_w, padded_h, |x, y| {
        Rgba([0, 0, 0, blurred.get_pixel(x, y)[0]])
    });
    (shadow, i64::from(pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(width: u32, height: u32, pad: u32) -> RgbaImage {
        RgbaImage::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
            let inside = x >= pad && x < width + pad && y >= pad && y < height + pad;
            if inside {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    fn small_spec() -> CanvasSpec {
        CanvasSpec::default().with_size(200, 200)
    }

    #[test]
    fn test_fit_dimensions() {
        assert_eq!(fit_dimensions(400, 200, 1000, 1000, 0.8), (800, 400));
        assert_eq!(fit_dimensions(100, 300, 1000, 1000, 0.9), (300, 900));
        // Small inputs are scaled up
        assert_eq!(fit_dimensions(10, 10, 2000, 2000, 0.85), (1700, 1700));
        // Extreme aspect ratios never collapse to zero
        let (w, h) = fit_dimensions(10_000, 1, 100, 100, 0.5);
        assert_eq!(w, 50);
        assert_eq!(h, 1);
        assert_eq!(fit_dimensions(0, 0, 100, 100, 1.0), (100, 100));
    }

    #[test]
    fn test_centered_offset() {
        assert_eq!(centered_offset((100, 50), (200, 200)), (50, 75));
        assert_eq!(centered_offset((200, 200), (200, 200)), (0, 0));
        assert_eq!(centered_offset((300, 100), (200, 200)), (-50, 50));
    }

    #[test]
    fn test_compose_centers_product_on_white() {
        let cutout = product(50, 50, 25);
        let canvas = compose(&cutout, &small_spec()).unwrap();

        assert_eq!(canvas.dimensions(), (200, 200));
        // Corners stay background
        assert_eq!(canvas.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(199, 199), &image::Rgb([255, 255, 255]));
        // Cropped subject scaled to 170px and centered
        let center = canvas.get_pixel(100, 100);
        assert!(center[0] > 150 && center[1] < 80);
        assert_eq!(canvas.get_pixel(10, 100), &image::Rgb([255, 255, 255]));
        let inside_edge = canvas.get_pixel(20, 100);
        assert!(inside_edge[1] < 80);
    }

    #[test]
    fn test_compose_custom_background() {
        let cutout = product(20, 20, 0);
        let spec = small_spec().with_background(BackgroundColor::new(0, 0, 255));
        let canvas = compose(&cutout, &spec).unwrap();
        assert_eq!(canvas.get_pixel(2, 2), &image::Rgb([0, 0, 255]));
    }

    #[test]
    fn test_compose_without_foreground_uses_whole_image() {
        let cutout = RgbaImage::from_pixel(40, 20, Rgba([10, 10, 10, 0]));
        let canvas = compose(&cutout, &small_spec()).unwrap();
        // Fully transparent subject leaves the canvas untouched
        assert!(canvas.pixels().all(|p| *p == image::Rgb([255, 255, 255])));
    }

    #[test]
    fn test_shadow_darkens_below_subject() {
        let cutout = product(60, 60, 0);
        let plain = compose(&cutout, &small_spec()).unwrap();
        let shadowed = compose(&cutout, &small_spec().with_shadow(true)).unwrap();

        // Just below the subject's bottom edge
        let below = (100, 100 + 85 + 2);
        assert_eq!(plain.get_pixel(below.0, below.1), &image::Rgb([255, 255, 255]));
        assert!(shadowed.get_pixel(below.0, below.1)[0] < 255);
        // Far corner unaffected
        assert_eq!(shadowed.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn test_enhance_preserves_size() {
        let cutout = product(30, 30, 5);
        let spec = CanvasSpec {
            enhance: true,
            ..small_spec()
        };
        let canvas = compose(&cutout, &spec).unwrap();
        assert_eq!(canvas.dimensions(), (200, 200));
    }

    #[test]
    fn test_enhance_sharpens_edges_and_keeps_alpha() {
        let image = RgbaImage::from_fn(20, 10, |x, _| {
            let gray = if x < 10 { 100 } else { 160 };
            Rgba([gray, gray, gray, (x * 12 + 10) as u8])
        });
        let enhanced = enhance(&image);

        assert_eq!(enhanced.dimensions(), image.dimensions());
        // Both sides of the edge are pushed apart
        assert!(enhanced.get_pixel(9, 5)[0] < 100);
        assert!(enhanced.get_pixel(10, 5)[0] > 160);
        for (out, src) in enhanced.pixels().zip(image.pixels()) {
            assert_eq!(out[3], src[3]);
        }
    }

    #[test]
    fn test_compose_rejects_bad_spec() {
        let cutout = product(10, 10, 0);
        let err = compose(&cutout, &CanvasSpec::default().with_size(50, 50)).unwrap_err();
        assert!(err.is_client_error());

        let spec = CanvasSpec {
            fill_ratio: 0.0,
            ..small_spec()
        };
        assert!(compose(&cutout, &spec).is_err());
        assert!(compose(&RgbaImage::new(0, 0), &small_spec()).is_err());
    }

    #[test]
    fn test_category_presets() {
        assert!(("jewelry".parse::<ProductCategory>().unwrap().fill_ratio() - 0.70).abs() < 1e-6);
        assert!(("Furniture".parse::<ProductCategory>().unwrap().fill_ratio() - 0.90).abs() < 1e-6);
        assert!(("shoes".parse::<ProductCategory>().unwrap().fill_ratio() - 0.80).abs() < 1e-6);
        assert_eq!(" toys ".parse::<ProductCategory>().unwrap(), ProductCategory::Toys);

        let err = "spaceships".parse::<ProductCategory>().unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("jewelry"));
    }
}
