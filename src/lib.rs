#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

//! # Listing Canvas
//!
//! Turns product photos into marketplace listing images: the background is
//! removed, the product is centered on a solid canvas at a category-specific
//! fill ratio, optionally with a soft drop shadow, and the result is encoded
//! as JPEG.
//!
//! ## Features
//!
//! - **Pluggable removal**: remove.bg compatible HTTP API, local ONNX model
//!   through Tract, border color keying, or none
//! - **Graceful fallback**: a failed removal still yields a listing image
//!   built from the original photo (unless strict mode is on)
//! - **HTTP service**: Axum endpoints for single images, previews, custom
//!   canvases, batches, listing packs and compliance validation
//! - **Daily rate limiting** per API key or client address
//! - **CLI**: serve, process local folders, validate files (`cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use listing_canvas::{process_product_photo, ServiceConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! let photo = std::fs::read("mug.jpg")?;
//!
//! let listing = process_product_photo(photo, &config).await?;
//! std::fs::write("mug_listing.jpg", &listing.bytes)?;
//! println!("{}", listing.timings.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): local ONNX segmentation model backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod processor;
pub mod rate_limit;
pub mod removal;
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;
pub mod validation;

// Public API exports
pub use backends::*;
pub use canvas::{compose, CanvasSpec, ProductCategory};
pub use config::{CanvasConfig, CanvasConfigBuilder, RemovalBackendKind, ServiceConfig};
pub use error::{CanvasError, Result};
pub use inference::InferenceBackend;
pub use processor::{ListingProcessor, ProcessorConfig, ProcessorConfigBuilder};
pub use rate_limit::{client_key, DailyRateLimiter, RateDecision};
pub use removal::{
    build_remover, BackgroundRemover, ColorKeyRemover, ModelRemover, PassthroughRemover,
    RemoteApiRemover,
};
pub use server::{build_router, serve, AppState};
pub use services::{ArchiveBuilder, ImageIOService, OutputFormatHandler};
pub use types::{Cutout, ProcessedImage, ProcessingTimings, RemovalOutcome};
pub use utils::{BackgroundColor, ColorParser, ImagePreprocessor, PreprocessingConfig};
pub use validation::{validate_listing_image, ValidationReport};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Turn one product photo into a listing image
///
/// Builds the remover selected by `config` and renders with its default
/// canvas. For many images, build a [`ListingProcessor`] once instead.
///
/// # Errors
/// - Invalid configuration or remover initialization failure
/// - Any error from [`ListingProcessor::process`]
pub async fn process_product_photo(
    image_bytes: Vec<u8>,
    config: &ServiceConfig,
) -> Result<ProcessedImage> {
    config.validate()?;
    let remover = build_remover(config)?;
    let processor = ListingProcessor::new(remover, ProcessorConfig::from(config));
    let spec = processor.config().default_spec();
    processor.process(image_bytes, &spec).await
}
