//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use listing_canvas::{
    build_router, AppState, BackgroundRemover, CanvasConfig, ColorKeyRemover, RemovalBackendKind,
    ServiceConfig,
};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "listing-canvas-test-boundary";

/// Product color used in generated photos
pub const PRODUCT: [u8; 3] = [200, 40, 40];

/// Service config with a small canvas and no rate limit
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        removal_backend: RemovalBackendKind::ColorKey,
        daily_request_limit: 0,
        max_upload_bytes: 2 * 1024 * 1024,
        max_batch_files: 5,
        request_timeout_secs: 30,
        canvas: CanvasConfig::builder()
            .dimensions(400, 400)
            .build()
            .expect("valid test canvas"),
        ..ServiceConfig::default()
    }
}

pub fn build_app(config: ServiceConfig, remover: Arc<dyn BackgroundRemover>) -> Router {
    let state = AppState::with_remover(config, remover).expect("valid test state");
    build_router(state)
}

/// Router with the color-key remover and [`test_config`]
pub fn color_key_app() -> Router {
    build_app(test_config(), Arc::new(ColorKeyRemover::default()))
}

/// A red box on a near-white studio background
pub fn product_photo(width: u32, height: u32) -> RgbImage {
    let (x0, x1) = (width / 4, width * 3 / 4);
    let (y0, y1) = (height / 4, height * 3 / 4);
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb(PRODUCT)
        } else {
            Rgb([250, 250, 250])
        }
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).expect("encode test image");
    buffer.into_inner()
}

pub fn product_png(width: u32, height: u32) -> Vec<u8> {
    encode(&product_photo(width, height), ImageFormat::Png)
}

/// Transparent PNG with only the product opaque, as a removal API returns it
pub fn cutout_png(width: u32, height: u32) -> Vec<u8> {
    let photo = product_photo(width, height);
    let cutout = RgbaImage::from_fn(width, height, |x, y| {
        let p = photo.get_pixel(x, y);
        if p.0 == PRODUCT {
            Rgba([p[0], p[1], p[2], 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut buffer = Cursor::new(Vec::new());
    cutout
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode cutout");
    buffer.into_inner()
}

/// Minimal multipart/form-data body builder
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_multipart(app: Router, uri: &str, body: MultipartBody) -> Response<Body> {
    post_multipart_with(app, uri, body, &[]).await
}

pub async fn post_multipart_with(
    app: Router,
    uri: &str,
    body: MultipartBody,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut request = Request::post(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    app.oneshot(request.body(Body::from(body.finish())).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}
