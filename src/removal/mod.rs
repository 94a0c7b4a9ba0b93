//! Background removers
//!
//! A [`BackgroundRemover`] turns a decoded photo into an RGBA cutout of the
//! same size. [`build_remover`] picks the implementation from the service
//! configuration.

mod color_key;
mod model;
mod passthrough;
mod remote;

pub use color_key::ColorKeyRemover;
pub use model::ModelRemover;
pub use passthrough::PassthroughRemover;
pub use remote::RemoteApiRemover;

use crate::config::{RemovalBackendKind, ServiceConfig};
use crate::error::{CanvasError, Result};
use async_trait::async_trait;
use image::{imageops, DynamicImage, RgbaImage};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Something that can isolate a product from its background
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Short name reported in logs and the `X-Background-Removal` header
    fn name(&self) -> &'static str;

    /// Produce a cutout with the same dimensions as `image`
    ///
    /// `encoded` holds the original upload bytes for removers that forward
    /// them unchanged.
    ///
    /// # Errors
    /// - Remote API, network or model failures (`Removal`, `Inference`)
    async fn remove(&self, image: &DynamicImage, encoded: &[u8]) -> Result<RgbaImage>;
}

/// Build the remover selected by `config`
///
/// # Errors
/// - Remote backend without an API key
/// - Model backend without a model path, or without the `tract` feature
/// - Model or HTTP client initialization failures
pub fn build_remover(config: &ServiceConfig) -> Result<Arc<dyn BackgroundRemover>> {
    let kind = config.resolved_backend();
    let remover: Arc<dyn BackgroundRemover> = match kind {
        RemovalBackendKind::Remote => {
            let api_key = config.remove_bg_api_key.clone().ok_or_else(|| {
                CanvasError::invalid_config("Remote removal backend requires REMOVE_BG_API_KEY")
            })?;
            Arc::new(RemoteApiRemover::new(
                config.remove_bg_api_url.clone(),
                api_key,
                Duration::from_secs(config.remote_timeout_secs),
            )?)
        },
        RemovalBackendKind::Model => build_model_remover(config)?,
        RemovalBackendKind::Auto | RemovalBackendKind::ColorKey => {
            Arc::new(ColorKeyRemover::default())
        },
        RemovalBackendKind::None => Arc::new(PassthroughRemover),
    };

    info!(requested = %config.removal_backend, backend = remover.name(), "background remover ready");
    Ok(remover)
}

#[cfg(feature = "tract")]
fn build_model_remover(config: &ServiceConfig) -> Result<Arc<dyn BackgroundRemover>> {
    let path = config
        .model_path
        .as_ref()
        .ok_or_else(|| CanvasError::invalid_config("Model removal backend requires MODEL_PATH"))?;
    Ok(Arc::new(ModelRemover::from_model_path(
        path,
        config.model_input_size,
    )?))
}

#[cfg(not(feature = "tract"))]
fn build_model_remover(_config: &ServiceConfig) -> Result<Arc<dyn BackgroundRemover>> {
    Err(CanvasError::invalid_config(
        "Model removal backend requires the `tract` feature",
    ))
}

/// Resize a cutout back to the original dimensions if a remover changed them
pub(crate) fn match_dimensions(cutout: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if cutout.dimensions() == (width, height) {
        cutout
    } else {
        imageops::resize(&cutout, width, height, imageops::FilterType::Lanczos3)
    }
}
