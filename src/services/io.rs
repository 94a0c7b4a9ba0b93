//! Upload decoding and file loading
//!
//! Uploads are sniffed by content, never by the client's filename or
//! content type.

use crate::error::{CanvasError, Result};
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::debug;

/// Formats accepted as uploads
pub const SUPPORTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Service for decoding uploads and loading local files
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an uploaded image after checking size and format
    ///
    /// # Errors
    /// - Empty upload (`InvalidInput`)
    /// - Upload larger than `limit` bytes (`PayloadTooLarge`)
    /// - Unrecognized or unsupported format (`UnsupportedFormat`)
    /// - Corrupt image data (`InvalidInput`)
    pub fn decode_upload(bytes: &[u8], limit: usize) -> Result<(DynamicImage, ImageFormat)> {
        if bytes.is_empty() {
            return Err(CanvasError::invalid_input("Uploaded file is empty"));
        }
        if bytes.len() > limit {
            return Err(CanvasError::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }

        let format = image::guess_format(bytes).map_err(|_| {
            CanvasError::unsupported_format("Upload is not a recognized image format")
        })?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(CanvasError::unsupported_format(format!(
                "{} images are not supported (use JPEG, PNG, TIFF, GIF or WEBP)",
                Self::format_name(format)
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            CanvasError::invalid_input(format!(
                "Failed to decode {} upload: {e}",
                Self::format_name(format)
            ))
        })?;

        debug!(
            format = Self::format_name(format),
            width = image.width(),
            height = image.height(),
            bytes = bytes.len(),
            "decoded upload"
        );
        Ok((image, format))
    }

    /// Short uppercase name of a format for reports and messages
    #[must_use]
    pub fn format_name(format: ImageFormat) -> &'static str {
        match format {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Gif => "GIF",
            ImageFormat::WebP => "WEBP",
            ImageFormat::Bmp => "BMP",
            ImageFormat::Ico => "ICO",
            _ => "UNKNOWN",
        }
    }

    /// Read a local image file for the CLI
    ///
    /// # Errors
    /// - File cannot be read
    /// - Any error from [`Self::decode_upload`]
    pub fn load_image_file<P: AsRef<Path>>(
        path: P,
        limit: usize,
    ) -> Result<(Vec<u8>, DynamicImage, ImageFormat)> {
        let bytes = std::fs::read(path.as_ref())?;
        let (image, format) = Self::decode_upload(&bytes, limit)?;
        Ok((bytes, image, format))
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_extension<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif" | "gif"
                )
            })
    }

    /// Turn a client filename into a safe stem for output names
    ///
    /// Directory components and the extension are dropped; anything outside
    /// `[A-Za-z0-9_-]` becomes `_`. Falls back to `image`.
    ///
    /// # Examples
    /// ```rust
    /// use listing_canvas::services::ImageIOService;
    ///
    /// assert_eq!(ImageIOService::sanitize_stem("../My Shoe (2).JPG"), "My_Shoe__2_");
    /// assert_eq!(ImageIOService::sanitize_stem(""), "image");
    /// ```
    #[must_use]
    pub fn sanitize_stem(filename: &str) -> String {
        let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        let stem = match base.rfind('.') {
            Some(index) if index > 0 => &base[..index],
            _ => base,
        };

        let cleaned: String = stem
            .chars()
            .take(64)
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if cleaned.chars().all(|c| c == '_') {
            "image".to_string()
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([1, 2, 3]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_upload() {
        let bytes = png_bytes(12, 8);
        let (image, format) = ImageIOService::decode_upload(&bytes, 1 << 20).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!((image.width(), image.height()), (12, 8));
    }

    #[test]
    fn test_decode_upload_rejects_empty() {
        let err = ImageIOService::decode_upload(&[], 1024).unwrap_err();
        assert!(matches!(err, CanvasError::InvalidInput(_)));
    }

    #[test]
    fn test_decode_upload_rejects_oversize() {
        let bytes = png_bytes(12, 8);
        let err = ImageIOService::decode_upload(&bytes, 10).unwrap_err();
        assert!(matches!(err, CanvasError::PayloadTooLarge { limit: 10, .. }));
    }

    #[test]
    fn test_decode_upload_rejects_non_image() {
        let err = ImageIOService::decode_upload(b"hello, this is text", 1024).unwrap_err();
        assert!(matches!(err, CanvasError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decode_upload_rejects_truncated_png() {
        let bytes = png_bytes(12, 8);
        let err = ImageIOService::decode_upload(&bytes[..40], 1024).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(ImageIOService::sanitize_stem("product.jpg"), "product");
        assert_eq!(ImageIOService::sanitize_stem("C:\\photos\\red-mug.png"), "red-mug");
        assert_eq!(ImageIOService::sanitize_stem(".hidden"), "_hidden");
        assert_eq!(ImageIOService::sanitize_stem("???.png"), "image");
        assert_eq!(ImageIOService::sanitize_stem("a.b.c"), "a_b");
    }

    #[test]
    fn test_supported_extensions() {
        assert!(ImageIOService::is_supported_extension("a/b/photo.JPG"));
        assert!(ImageIOService::is_supported_extension("photo.webp"));
        assert!(!ImageIOService::is_supported_extension("notes.txt"));
        assert!(!ImageIOService::is_supported_extension("README"));
    }

    #[test]
    fn test_load_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(5, 5)).unwrap();

        let (bytes, image, format) = ImageIOService::load_image_file(&path, 1 << 20).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(image.width(), 5);
        assert_eq!(format, ImageFormat::Png);

        let missing = ImageIOService::load_image_file(dir.path().join("nope.png"), 1 << 20);
        assert!(matches!(missing, Err(CanvasError::Io(_))));
    }
}
