//! Utility modules shared by removers, the compositor and the server

pub mod color;
pub mod mask;
pub mod preprocessing;

// Re-export commonly used items for convenience
pub use color::{BackgroundColor, ColorParser};
pub use mask::{clean_alpha, coverage, crop_to_bbox, foreground_bbox, BoundingBox};
pub use preprocessing::{ImagePreprocessor, Letterbox, PreprocessingConfig};
