//! Client for remove.bg compatible HTTP APIs

use super::{match_dimensions, BackgroundRemover};
use crate::error::{CanvasError, Result};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const BACKEND: &str = "remote";

/// Longest error body kept in error messages
const MAX_ERROR_BODY: usize = 300;

/// Sends the original upload to a remove-background API and decodes the PNG it returns
pub struct RemoteApiRemover {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl RemoteApiRemover {
    /// Create a client with its own connection pool
    ///
    /// # Errors
    /// - HTTP client construction failure
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CanvasError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, api_url, api_key))
    }

    /// Create a remover reusing an existing [`reqwest::Client`]
    #[must_use]
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    fn truncate(body: &str) -> String {
        let trimmed = body.trim();
        if trimmed.chars().count() <= MAX_ERROR_BODY {
            trimmed.to_string()
        } else {
            let head: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
            format!("{head}...")
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemoteApiRemover {
    fn name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip_all, fields(bytes = encoded.len()))]
    async fn remove(&self, image: &DynamicImage, encoded: &[u8]) -> Result<RgbaImage> {
        let form = Form::new()
            .part("image_file", Part::bytes(encoded.to_vec()).file_name("upload"))
            .text("size", "auto")
            .text("format", "png");

        let response = self
            .client
            .post(&self.api_url)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CanvasError::removal_error_with_backend(BACKEND, None, &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "remove-background API rejected the request");
            return Err(CanvasError::removal_error_with_backend(
                BACKEND,
                Some(status.as_u16()),
                &Self::truncate(&body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CanvasError::removal_error_with_backend(BACKEND, None, &e.to_string()))?;
        let cutout = image::load_from_memory(&bytes)
            .map_err(|e| {
                CanvasError::removal_error_with_backend(
                    BACKEND,
                    Some(status.as_u16()),
                    &format!("response is not an image: {e}"),
                )
            })?
            .to_rgba8();

        debug!(
            width = cutout.width(),
            height = cutout.height(),
            "received cutout"
        );
        Ok(match_dimensions(cutout, image.width(), image.height()))
    }
}
