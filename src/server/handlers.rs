//! Route handlers

use super::error::ApiResult;
use super::state::AppState;
use super::upload::UploadForm;
use crate::error::CanvasError;
use crate::services::ImageIOService;
use crate::types::{ProcessedImage, RemovalOutcome};
use crate::validation::{validate_listing_image, ValidationReport};
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::info;

/// Header describing how the background was handled
pub const REMOVAL_HEADER: HeaderName = HeaderName::from_static("x-background-removal");

/// Header with the server-side processing time
pub const PROCESSING_TIME_HEADER: HeaderName = HeaderName::from_static("x-processing-time-ms");

const ENDPOINTS: [&str; 8] = [
    "GET /",
    "GET /health",
    "POST /process",
    "POST /process/preview",
    "POST /process/validate",
    "POST /process/batch",
    "POST /process/custom",
    "POST /process/listing-pack",
];

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub removal_backend: &'static str,
    pub endpoints: &'static [&'static str],
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET / -- service description
pub async fn index(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        removal_backend: state.processor.remover_name(),
        endpoints: &ENDPOINTS,
    })
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /process -- full-size listing JPEG
pub async fn process(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let (file, form) = UploadForm::from_multipart(multipart).await?.into_single_file()?;
    let spec = form.canvas_spec(&state.processor.config().default_spec())?;

    let processed = state.processor.process(file.bytes, &spec).await?;
    let name = format!("{}_listing.jpg", ImageIOService::sanitize_stem(&file.filename));
    Ok(jpeg_response(processed, &name, "attachment"))
}

/// POST /process/preview -- downscaled JPEG for quick inspection
pub async fn preview(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let (file, form) = UploadForm::from_multipart(multipart).await?.into_single_file()?;
    let spec = form.canvas_spec(&state.processor.config().default_spec())?;

    let processed = state.processor.preview(file.bytes, &spec).await?;
    let name = format!("{}_preview.jpg", ImageIOService::sanitize_stem(&file.filename));
    Ok(jpeg_response(processed, &name, "inline"))
}

/// POST /process/custom -- listing JPEG with caller-chosen canvas settings
pub async fn custom(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let (file, form) = UploadForm::from_multipart(multipart).await?.into_single_file()?;
    let spec = form.custom_canvas_spec(&state.processor.config().default_spec())?;

    let processed = state.processor.process(file.bytes, &spec).await?;
    let name = format!(
        "{}_{}x{}.jpg",
        ImageIOService::sanitize_stem(&file.filename),
        spec.width,
        spec.height
    );
    Ok(jpeg_response(processed, &name, "attachment"))
}

/// POST /process/validate -- marketplace compliance report
pub async fn validate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ValidationReport>> {
    let (file, _) = UploadForm::from_multipart(multipart).await?.into_single_file()?;
    let limit = state.config.max_upload_bytes;

    let report = tokio::task::spawn_blocking(move || {
        let (image, format) = ImageIOService::decode_upload(&file.bytes, limit)?;
        Ok::<_, CanvasError>(validate_listing_image(&file.bytes, &image, format))
    })
    .await
    .map_err(|e| CanvasError::internal(format!("Validation task failed: {e}")))??;

    info!(
        passed = report.passed,
        width = report.width,
        height = report.height,
        format = %report.format,
        "image validated"
    );
    Ok(Json(report))
}

/// POST /process/batch -- ZIP of listing images plus a manifest
pub async fn batch(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let form = UploadForm::from_multipart(multipart).await?;
    let max_files = state.config.max_batch_files;
    if form.files.len() > max_files {
        return Err(CanvasError::field_value_error(
            "files",
            form.files.len(),
            &format!("at most {max_files} files per batch"),
        )
        .into());
    }

    let spec = form.canvas_spec(&state.processor.config().default_spec())?;
    let files = form
        .files
        .into_iter()
        .map(|file| (file.filename, file.bytes))
        .collect();

    let archive = state.processor.batch(files, &spec).await?;
    Ok(zip_response(archive, "listing_batch.zip", None))
}

/// POST /process/listing-pack -- ZIP with the standard set of listing shots
pub async fn listing_pack(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let (file, form) = UploadForm::from_multipart(multipart).await?.into_single_file()?;
    let spec = form.canvas_spec(&state.processor.config().default_spec())?;

    let (archive, outcome) = state
        .processor
        .listing_pack(&file.filename, file.bytes, &spec)
        .await?;
    let name = format!(
        "{}_listing_pack.zip",
        ImageIOService::sanitize_stem(&file.filename)
    );
    Ok(zip_response(archive, &name, Some(&outcome)))
}

fn content_disposition(disposition: &str, filename: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{disposition}; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn outcome_header(outcome: &RemovalOutcome) -> HeaderValue {
    HeaderValue::from_str(&outcome.header_value())
        .unwrap_or_else(|_| HeaderValue::from_static("fallback"))
}

fn jpeg_response(processed: ProcessedImage, filename: &str, disposition: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(disposition, filename),
    );
    headers.insert(REMOVAL_HEADER, outcome_header(&processed.outcome));
    headers.insert(
        PROCESSING_TIME_HEADER,
        HeaderValue::from(processed.timings.total_ms),
    );
    (headers, processed.bytes).into_response()
}

fn zip_response(archive: Vec<u8>, filename: &str, outcome: Option<&RemovalOutcome>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition("attachment", filename),
    );
    if let Some(outcome) = outcome {
        headers.insert(REMOVAL_HEADER, outcome_header(outcome));
    }
    (headers, archive).into_response()
}
