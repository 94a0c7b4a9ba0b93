//! Remote removal API tests against a mock remove.bg server

mod common;

use axum::http::StatusCode;
use common::{body_json, build_app, cutout_png, header, post_multipart, product_png, test_config};
use httpmock::prelude::*;
use image::DynamicImage;
use listing_canvas::{BackgroundRemover, CanvasError, RemoteApiRemover};
use std::sync::Arc;
use std::time::Duration;

fn remote_app(server: &MockServer, strict: bool) -> axum::Router {
    let remover = RemoteApiRemover::new(
        server.url("/v1.0/removebg"),
        "test-key".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();
    let mut config = test_config();
    config.strict_removal = strict;
    build_app(config, Arc::new(remover))
}

#[tokio::test]
async fn remote_cutout_is_used() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1.0/removebg")
                .header("x-api-key", "test-key");
            then.status(200)
                .header("content-type", "image/png")
                .body(cutout_png(200, 160));
        })
        .await;

    let body = common::MultipartBody::new().file("file", "mug.png", &product_png(200, 160));
    let response = post_multipart(remote_app(&server, false), "/process", body).await;

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "x-background-removal"),
        "removed; backend=remote"
    );
}

#[tokio::test]
async fn smaller_cutout_is_scaled_to_original() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(200).body(cutout_png(100, 80));
        })
        .await;

    let remover = RemoteApiRemover::new(
        server.url("/v1.0/removebg"),
        "test-key".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();
    let image = DynamicImage::ImageRgb8(common::product_photo(200, 160));
    let cutout = remover
        .remove(&image, &product_png(200, 160))
        .await
        .unwrap();

    assert_eq!(cutout.dimensions(), (200, 160));
    assert_eq!(cutout.get_pixel(100, 80)[3], 255);
    assert_eq!(cutout.get_pixel(5, 5)[3], 0);
}

#[tokio::test]
async fn api_error_falls_back_to_original() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(402)
                .body(r#"{"errors":[{"title":"Insufficient credits"}]}"#);
        })
        .await;

    let body = common::MultipartBody::new().file("file", "mug.png", &product_png(200, 160));
    let response = post_multipart(remote_app(&server, false), "/process", body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-background-removal"), "fallback");
}

#[tokio::test]
async fn api_error_in_strict_mode_is_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(402)
                .body(r#"{"errors":[{"title":"Insufficient credits"}]}"#);
        })
        .await;

    let body = common::MultipartBody::new().file("file", "mug.png", &product_png(200, 160));
    let response = post_multipart(remote_app(&server, true), "/process", body).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "REMOVAL_FAILED");
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("HTTP 402"));
    assert!(message.contains("Insufficient credits"));
}

#[tokio::test]
async fn non_image_response_is_removal_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let remover = RemoteApiRemover::new(
        server.url("/v1.0/removebg"),
        "test-key".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();
    let image = DynamicImage::ImageRgb8(common::product_photo(40, 40));
    let err = remover.remove(&image, b"bytes").await.unwrap_err();

    assert!(matches!(err, CanvasError::Removal(_)));
    assert!(err.to_string().contains("not an image"));
}
