//! Listing image processor
//!
//! `ListingProcessor` owns the whole pipeline used by both the HTTP server
//! and the CLI: decode the upload, cut out the product, compose it onto a
//! canvas and encode the result. Listing packs and batches reuse the same
//! steps and package the results as ZIP archives.

use crate::{
    canvas::{compose, CanvasSpec},
    config::{CanvasConfig, ServiceConfig},
    error::{CanvasError, Result},
    removal::{BackgroundRemover, PassthroughRemover},
    services::{ArchiveBuilder, ImageIOService, OutputFormatHandler, PREVIEW_MAX_SIDE, PREVIEW_QUALITY},
    types::{Cutout, ProcessedImage, ProcessingTimings, RemovalOutcome},
    utils::{
        foreground_bbox,
        mask::{coverage, DEFAULT_LOW_ALPHA},
        BackgroundColor, ColorParser,
    },
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use instant::Instant;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, span, warn, Instrument, Level, Span};

/// Configuration for the listing processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Propagate removal failures instead of falling back to the original photo
    pub strict_removal: bool,
    /// Maximum size of a single upload in bytes
    pub max_upload_bytes: usize,
    /// Default canvas settings
    pub canvas: CanvasConfig,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Default canvas settings as a renderable spec
    #[must_use]
    pub fn default_spec(&self) -> CanvasSpec {
        CanvasSpec::from(&self.canvas)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            strict_removal: false,
            max_upload_bytes: 15 * 1024 * 1024,
            canvas: CanvasConfig::default(),
        }
    }
}

impl From<&ServiceConfig> for ProcessorConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            strict_removal: config.strict_removal,
            max_upload_bytes: config.max_upload_bytes,
            canvas: config.canvas.clone(),
        }
    }
}

/// Builder for `ProcessorConfig`
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    #[must_use]
    pub fn strict_removal(mut self, strict: bool) -> Self {
        self.config.strict_removal = strict;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    #[must_use]
    pub fn canvas(mut self, canvas: CanvasConfig) -> Self {
        self.config.canvas = canvas;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Zero upload limit
    /// - Invalid canvas settings
    pub fn build(self) -> Result<ProcessorConfig> {
        if self.config.max_upload_bytes == 0 {
            return Err(CanvasError::invalid_config("Upload limit must be non-zero"));
        }
        self.config.canvas.validate()?;
        Ok(self.config)
    }
}

impl Default for ProcessorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of one file in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Ok,
    Error,
}

/// Manifest row for one batch input
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    /// 1-based position in the request
    pub index: usize,
    /// Filename as sent by the client
    pub filename: String,
    pub status: EntryStatus,
    /// Archive entry name when processing succeeded
    pub output: Option<String>,
    pub outcome: Option<RemovalOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchManifest<'a> {
    total: usize,
    succeeded: usize,
    failed: usize,
    files: &'a [BatchEntry],
}

#[derive(Debug, Serialize)]
struct PackEntry {
    name: &'static str,
    width: u32,
    height: u32,
    background: String,
    shadow: bool,
    bytes: usize,
}

#[derive(Debug, Serialize)]
struct PackManifest<'a> {
    source: &'a str,
    outcome: &'a RemovalOutcome,
    files: Vec<PackEntry>,
    timings: ProcessingTimings,
}

/// Variants rendered into a listing pack
const PACK_VARIANTS: [(&str, PackVariant); 5] = [
    ("main_white.jpg", PackVariant::MainWhite),
    ("main_shadow.jpg", PackVariant::MainShadow),
    ("alt_light_gray.jpg", PackVariant::AltLightGray),
    ("square_1000.jpg", PackVariant::Square(1000)),
    ("thumbnail_500.jpg", PackVariant::Square(500)),
];

#[derive(Debug, Clone, Copy)]
enum PackVariant {
    MainWhite,
    MainShadow,
    AltLightGray,
    Square(u32),
}

impl PackVariant {
    fn apply(self, base: &CanvasSpec) -> CanvasSpec {
        match self {
            Self::MainWhite => base
                .clone()
                .with_background(BackgroundColor::white())
                .with_shadow(false),
            Self::MainShadow => base
                .clone()
                .with_background(BackgroundColor::white())
                .with_shadow(true),
            Self::AltLightGray => base
                .clone()
                .with_background(BackgroundColor::light_gray())
                .with_shadow(true),
            Self::Square(side) => base.clone().with_size(side, side),
        }
    }
}

/// End-to-end listing image pipeline
pub struct ListingProcessor {
    remover: Arc<dyn BackgroundRemover>,
    config: ProcessorConfig,
}

impl ListingProcessor {
    #[must_use]
    pub fn new(remover: Arc<dyn BackgroundRemover>, config: ProcessorConfig) -> Self {
        Self { remover, config }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Name of the configured remover
    #[must_use]
    pub fn remover_name(&self) -> &'static str {
        self.remover.name()
    }

    /// Decode an upload and cut out the product
    ///
    /// Removal failures and empty masks fall back to the opaque original
    /// unless strict removal is enabled.
    ///
    /// # Errors
    /// - Upload rejected by [`ImageIOService::decode_upload`]
    /// - Removal failure or empty mask in strict mode
    #[instrument(skip_all, fields(bytes = bytes.len(), remover = self.remover.name()))]
    pub async fn cutout(&self, bytes: Vec<u8>) -> Result<(Cutout, ImageFormat, ProcessingTimings)> {
        let mut timings = ProcessingTimings::default();
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let limit = self.config.max_upload_bytes;
        let (bytes, image, format) = blocking(move || {
            let _span = span!(Level::DEBUG, "decode").entered();
            let (image, format) = ImageIOService::decode_upload(&bytes, limit)?;
            Ok((bytes, image, format))
        })
        .await?;
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        let removal_start = Instant::now();
        let removal_span = span!(Level::DEBUG, "removal", backend = self.remover.name());
        let result = self
            .remover
            .remove(&image, &bytes)
            .instrument(removal_span)
            .await;
        let backend = self.remover.name();
        let strict = self.config.strict_removal;
        let span = Span::current();
        let cutout = blocking(move || {
            let _span = span.entered();
            Self::resolve_cutout(backend, strict, result, &image)
        })
        .await?;
        timings.removal_ms = removal_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        debug!(outcome = ?cutout.outcome, removal_ms = timings.removal_ms, "cutout ready");
        Ok((cutout, format, timings))
    }

    /// Apply the fallback policy to a remover result
    fn resolve_cutout(
        backend: &'static str,
        strict: bool,
        result: Result<RgbaImage>,
        image: &DynamicImage,
    ) -> Result<Cutout> {
        let failure = match result {
            Ok(cutout) => {
                let cutout = crate::removal::match_dimensions(cutout, image.width(), image.height());
                if foreground_bbox(&cutout, DEFAULT_LOW_ALPHA).is_some() {
                    debug!(
                        backend,
                        coverage = coverage(&cutout, DEFAULT_LOW_ALPHA),
                        "foreground isolated"
                    );
                    return Ok(Cutout {
                        image: cutout,
                        outcome: RemovalOutcome::Removed {
                            backend: backend.to_string(),
                        },
                    });
                }
                CanvasError::removal_error_with_backend(backend, None, "no foreground detected")
            },
            Err(err @ CanvasError::Removal(_)) => err,
            Err(err) => CanvasError::removal_error_with_backend(backend, None, &err.to_string()),
        };

        if strict {
            return Err(failure);
        }

        warn!(error = %failure, "background removal failed, using original photo");
        Ok(Cutout {
            image: PassthroughRemover::opaque(image),
            outcome: RemovalOutcome::Fallback {
                reason: failure.to_string(),
            },
        })
    }

    /// Compose and encode a prepared cutout
    ///
    /// # Errors
    /// - Invalid canvas settings
    /// - Encoding failure
    pub fn render(cutout: &Cutout, spec: &CanvasSpec) -> Result<ProcessedImage> {
        Self::render_canvas(cutout, spec, None)
    }

    fn render_canvas(
        cutout: &Cutout,
        spec: &CanvasSpec,
        preview_side: Option<u32>,
    ) -> Result<ProcessedImage> {
        let compose_start = Instant::now();
        let canvas = {
            let _span = span!(Level::DEBUG, "compose").entered();
            let canvas = compose(&cutout.image, spec)?;
            match preview_side {
                Some(side) => OutputFormatHandler::downscale_for_preview(&canvas, side),
                None => canvas,
            }
        };
        let compose_ms = compose_start.elapsed().as_millis() as u64;

        let encode_start = Instant::now();
        let quality = if preview_side.is_some() {
            PREVIEW_QUALITY
        } else {
            spec.quality
        };
        let bytes = {
            let _span = span!(Level::DEBUG, "encode").entered();
            OutputFormatHandler::encode_jpeg(&canvas, quality)?
        };

        Ok(ProcessedImage {
            width: canvas.width(),
            height: canvas.height(),
            bytes,
            outcome: cutout.outcome.clone(),
            timings: ProcessingTimings {
                compose_ms,
                encode_ms: encode_start.elapsed().as_millis() as u64,
                ..ProcessingTimings::default()
            },
        })
    }

    /// Full pipeline: decode, remove, compose, encode
    ///
    /// # Errors
    /// - Invalid canvas settings (checked before any removal work)
    /// - Any error from [`Self::cutout`] or [`Self::render`]
    pub async fn process(&self, bytes: Vec<u8>, spec: &CanvasSpec) -> Result<ProcessedImage> {
        self.process_inner(bytes, spec, None).await
    }

    /// Same as [`Self::process`], downscaled for a quick look
    ///
    /// # Errors
    /// - Any error from [`Self::process`]
    pub async fn preview(&self, bytes: Vec<u8>, spec: &CanvasSpec) -> Result<ProcessedImage> {
        self.process_inner(bytes, spec, Some(PREVIEW_MAX_SIDE)).await
    }

    async fn process_inner(
        &self,
        bytes: Vec<u8>,
        spec: &CanvasSpec,
        preview_side: Option<u32>,
    ) -> Result<ProcessedImage> {
        spec.validate()?;
        let total_start = Instant::now();

        let (cutout, _, mut timings) = self.cutout(bytes).await?;
        let render_spec = spec.clone();
        let mut processed =
            blocking(move || Self::render_canvas(&cutout, &render_spec, preview_side)).await?;

        timings.compose_ms = processed.timings.compose_ms;
        timings.encode_ms = processed.timings.encode_ms;
        timings.total_ms = total_start.elapsed().as_millis() as u64;
        processed.timings = timings;

        info!(
            width = processed.width,
            height = processed.height,
            bytes = processed.bytes.len(),
            outcome = %processed.outcome.header_value(),
            timings = %processed.timings.summary(),
            "listing image processed"
        );
        Ok(processed)
    }

    /// Render the standard set of listing images from one upload
    ///
    /// Removal runs once; every variant reuses the cutout.
    ///
    /// # Errors
    /// - Any error from [`Self::cutout`] or [`Self::render`]
    /// - Archive assembly failure
    #[instrument(skip_all, fields(source = %source_name))]
    pub async fn listing_pack(
        &self,
        source_name: &str,
        bytes: Vec<u8>,
        spec: &CanvasSpec,
    ) -> Result<(Vec<u8>, RemovalOutcome)> {
        spec.validate()?;
        let total_start = Instant::now();
        let (cutout, _, mut timings) = self.cutout(bytes).await?;

        let base = spec.clone();
        let source = source_name.to_string();
        let (archive, (render_timings, outcome)) = blocking(move || {
            let mut archive = ArchiveBuilder::new();
            let mut files = Vec::with_capacity(PACK_VARIANTS.len());
            let mut render_timings = ProcessingTimings::default();

            for (name, variant) in PACK_VARIANTS {
                let variant_spec = variant.apply(&base);
                let rendered = Self::render(&cutout, &variant_spec)?;
                render_timings.compose_ms += rendered.timings.compose_ms;
                render_timings.encode_ms += rendered.timings.encode_ms;
                archive.add_file(name, &rendered.bytes)?;
                files.push(PackEntry {
                    name,
                    width: rendered.width,
                    height: rendered.height,
                    background: ColorParser::to_hex(&variant_spec.background, true),
                    shadow: variant_spec.shadow,
                    bytes: rendered.bytes.len(),
                });
            }

            archive.add_json(
                "manifest.json",
                &PackManifest {
                    source: &source,
                    outcome: &cutout.outcome,
                    files,
                    timings: render_timings.clone(),
                },
            )?;
            Ok((archive.finish()?, (render_timings, cutout.outcome)))
        })
        .await?;

        timings.compose_ms = render_timings.compose_ms;
        timings.encode_ms = render_timings.encode_ms;
        timings.total_ms = total_start.elapsed().as_millis() as u64;
        info!(bytes = archive.len(), timings = %timings.summary(), "listing pack built");
        Ok((archive, outcome))
    }

    /// Process many uploads into one archive
    ///
    /// Each successful file becomes `NNN_<stem>.jpg`. Failures are recorded
    /// in `manifest.json` and do not abort the batch.
    ///
    /// # Errors
    /// - Empty file list
    /// - Invalid canvas settings
    /// - Archive assembly failure
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn batch(&self, files: Vec<(String, Vec<u8>)>, spec: &CanvasSpec) -> Result<Vec<u8>> {
        if files.is_empty() {
            return Err(CanvasError::invalid_input("No files were uploaded"));
        }
        spec.validate()?;

        let mut archive = ArchiveBuilder::new();
        let mut entries = Vec::with_capacity(files.len());

        for (position, (filename, bytes)) in files.into_iter().enumerate() {
            let index = position + 1;
            let output = format!("{index:03}_{}.jpg", ImageIOService::sanitize_stem(&filename));

            match self.process(bytes, spec).await {
                Ok(processed) => {
                    archive.add_file(&output, &processed.bytes)?;
                    entries.push(BatchEntry {
                        index,
                        filename,
                        status: EntryStatus::Ok,
                        output: Some(output),
                        outcome: Some(processed.outcome),
                        error: None,
                    });
                },
                Err(err) => {
                    warn!(index, filename = %filename, error = %err, "batch item failed");
                    entries.push(BatchEntry {
                        index,
                        filename,
                        status: EntryStatus::Error,
                        output: None,
                        outcome: None,
                        error: Some(err.to_string()),
                    });
                },
            }
        }

        let failed = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Error)
            .count();
        archive.add_json(
            "manifest.json",
            &BatchManifest {
                total: entries.len(),
                succeeded: entries.len() - failed,
                failed,
                files: &entries,
            },
        )?;

        info!(total = entries.len(), failed, "batch finished");
        archive.finish()
    }
}

/// Run CPU-bound work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CanvasError::internal(format!("Blocking task failed: {e}")))?
}
