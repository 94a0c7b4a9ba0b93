//! Marketplace main-image compliance checks
//!
//! Runs on the decoded upload only; no background removal is involved.

use crate::services::io::{ImageIOService, SUPPORTED_FORMATS};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// Largest accepted file in bytes
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Longest side needed for zoom
pub const MIN_LONGEST_SIDE: u32 = 1000;

/// Shortest side below which a listing looks blurry
pub const MIN_SHORTEST_SIDE: u32 = 500;

/// Longest side accepted
pub const MAX_LONGEST_SIDE: u32 = 10_000;

/// Allowed deviation from a square aspect ratio
pub const ASPECT_TOLERANCE: f32 = 0.05;

/// Channel value at or above which a pixel counts as white
pub const WHITE_THRESHOLD: u8 = 245;

/// Share of border pixels that must be white
pub const MIN_WHITE_BORDER: f32 = 0.95;

/// Share of the image the product's longer side should cover
pub const MIN_PRODUCT_FILL: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Outcome of a single rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub severity: Severity,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &str, severity: Severity, passed: bool, detail: String) -> Self {
        Self {
            name: name.to_string(),
            severity,
            passed,
            detail,
        }
    }
}

/// Full validation result returned by `/process/validate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no error-severity check failed
    pub passed: bool,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub file_size_bytes: usize,
    pub checks: Vec<Check>,
}

impl ValidationReport {
    /// Look up a check by name
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Checks that failed with the given severity
    pub fn failures(&self, severity: Severity) -> impl Iterator<Item = &Check> {
        self.checks
            .iter()
            .filter(move |c| !c.passed && c.severity == severity)
    }
}

/// Run every listing check against an uploaded image
#[must_use]
pub fn validate_listing_image(
    bytes: &[u8],
    image: &DynamicImage,
    format: ImageFormat,
) -> ValidationReport {
    let (width, height) = (image.width(), image.height());
    let longest = width.max(height);
    let shortest = width.min(height);
    let rgba = image.to_rgba8();
    let format_name = ImageIOService::format_name(format);

    let mut checks = Vec::with_capacity(7);

    checks.push(Check::new(
        "format",
        Severity::Error,
        SUPPORTED_FORMATS.contains(&format),
        format!("{format_name} (accepted: JPEG, PNG, TIFF, GIF, WEBP)"),
    ));

    checks.push(Check::new(
        "file_size",
        Severity::Error,
        bytes.len() <= MAX_FILE_BYTES,
        format!(
            "{:.2} MB (max {} MB)",
            bytes.len() as f64 / (1024.0 * 1024.0),
            MAX_FILE_BYTES / (1024 * 1024)
        ),
    ));

    let mut min_detail = format!("longest side {longest}px (min {MIN_LONGEST_SIDE}px for zoom)");
    if shortest < MIN_SHORTEST_SIDE {
        min_detail.push_str(&format!(
            "; shortest side {shortest}px is below {MIN_SHORTEST_SIDE}px"
        ));
    }
    checks.push(Check::new(
        "min_dimension",
        Severity::Error,
        longest >= MIN_LONGEST_SIDE,
        min_detail,
    ));

    checks.push(Check::new(
        "max_dimension",
        Severity::Error,
        longest <= MAX_LONGEST_SIDE,
        format!("longest side {longest}px (max {MAX_LONGEST_SIDE}px)"),
    ));

    let ratio = width as f32 / height.max(1) as f32;
    checks.push(Check::new(
        "aspect_ratio",
        Severity::Warning,
        (ratio - 1.0).abs() <= ASPECT_TOLERANCE,
        format!("{ratio:.3}:1 (recommended 1:1)"),
    ));

    let white_share = white_border_share(&rgba);
    checks.push(Check::new(
        "white_background",
        Severity::Error,
        white_share >= MIN_WHITE_BORDER,
        format!(
            "{:.1}% of border pixels are white (min {:.0}%)",
            white_share * 100.0,
            MIN_WHITE_BORDER * 100.0
        ),
    ));

    let fill_check = match product_fill(&rgba) {
        Some(fill) => Check::new(
            "product_fill",
            Severity::Warning,
            fill >= MIN_PRODUCT_FILL,
            format!(
                "product covers {:.1}% of the frame (recommended {:.0}%)",
                fill * 100.0,
                MIN_PRODUCT_FILL * 100.0
            ),
        ),
        None => Check::new(
            "product_fill",
            Severity::Warning,
            false,
            "no product detected against the background".to_string(),
        ),
    };
    checks.push(fill_check);

    let passed = checks
        .iter()
        .all(|c| c.passed || c.severity == Severity::Warning);

    ValidationReport {
        passed,
        width,
        height,
        format: format_name.to_string(),
        file_size_bytes: bytes.len(),
        checks,
    }
}

fn is_white(pixel: &image::Rgba<u8>) -> bool {
    pixel[3] == 255 && pixel.0[..3].iter().all(|&c| c >= WHITE_THRESHOLD)
}

/// Share of pixels in the outer band (1% of the shorter side, at least 1px) that are white
fn white_border_share(image: &RgbaImage) -> f32 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let band = (width.min(height) / 100).max(1);

    let mut total = 0u64;
    let mut white = 0u64;
    for (x, y, pixel) in image.enumerate_pixels() {
        let on_border = x < band || y < band || x >= width - band || y >= height - band;
        if on_border {
            total += 1;
            if is_white(pixel) {
                white += 1;
            }
        }
    }

    if total == 0 {
        0.0
    } else {
        white as f32 / total as f32
    }
}

/// Larger of the non-white bounding box's relative width and height
fn product_fill(image: &RgbaImage) -> Option<f32> {
    let (width, height) = image.dimensions();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if !is_white(pixel) {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }

    bounds.map(|(x0, y0, x1, y1)| {
        let w = (x1 - x0 + 1) as f32 / width as f32;
        let h = (y1 - y0 + 1) as f32 / height as f32;
        w.max(h)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn listing(size: u32, product_side: u32) -> DynamicImage {
        let offset = (size - product_side) / 2;
        let image = RgbImage::from_fn(size, size, |x, y| {
            let inside = x >= offset && x < offset + product_side && y >= offset && y < offset + product_side;
            if inside {
                Rgb([40, 60, 200])
            } else {
                Rgb([255, 255, 255])
            }
        });
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_compliant_image_passes() {
        let image = listing(1200, 1050);
        let report = validate_listing_image(&[0u8; 2048], &image, ImageFormat::Jpeg);

        assert!(report.passed);
        assert_eq!(report.checks.len(), 7);
        assert!(report.checks.iter().all(|c| c.passed), "{report:?}");
        assert_eq!(report.format, "JPEG");
        assert_eq!(report.file_size_bytes, 2048);
    }

    #[test]
    fn test_small_image_fails_dimension() {
        let image = listing(400, 350);
        let report = validate_listing_image(&[0u8; 10], &image, ImageFormat::Png);

        assert!(!report.passed);
        let check = report.check("min_dimension").unwrap();
        assert!(!check.passed);
        assert!(check.detail.contains("shortest side 400px"));
    }

    #[test]
    fn test_colored_background_fails() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1000, 1000, Rgb([200, 200, 200])));
        let report = validate_listing_image(&[0u8; 10], &image, ImageFormat::Jpeg);

        assert!(!report.passed);
        assert!(!report.check("white_background").unwrap().passed);
        assert_eq!(report.failures(Severity::Error).count(), 1);
    }

    #[test]
    fn test_small_product_is_only_a_warning() {
        let image = listing(1000, 300);
        let report = validate_listing_image(&[0u8; 10], &image, ImageFormat::Jpeg);

        assert!(report.passed);
        let fill = report.check("product_fill").unwrap();
        assert!(!fill.passed);
        assert_eq!(fill.severity, Severity::Warning);
    }

    #[test]
    fn test_wide_image_warns_on_aspect_ratio() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1600, 1000, Rgb([255, 255, 255])));
        let report = validate_listing_image(&[0u8; 10], &image, ImageFormat::Png);

        assert!(!report.check("aspect_ratio").unwrap().passed);
        // Blank frame has no product either
        assert!(report.check("product_fill").unwrap().detail.contains("no product"));
        assert!(report.passed);
    }

    #[test]
    fn test_oversized_file_and_format() {
        let image = listing(1000, 900);
        let bytes = vec![0u8; MAX_FILE_BYTES + 1];
        let report = validate_listing_image(&bytes, &image, ImageFormat::Bmp);

        assert!(!report.passed);
        assert!(!report.check("file_size").unwrap().passed);
        assert!(!report.check("format").unwrap().passed);
    }

    #[test]
    fn test_report_serializes() {
        let image = listing(1000, 900);
        let report = validate_listing_image(&[0u8; 10], &image, ImageFormat::Jpeg);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["checks"][0]["name"], "format");
        assert_eq!(json["checks"][0]["severity"], "error");
    }
}
