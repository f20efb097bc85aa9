//! HTTP endpoint behaviour through the router, without binding a socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use common::*;
use gaugeread::server::{self, ApiState, DetectResponse, ErrorResponse};
use std::sync::Arc;
use tower::ServiceExt;

fn app(reader: GaugeReader) -> axum::Router {
    let state = ApiState {
        reader: Arc::new(reader),
        jpeg_quality: 90,
    };
    server::router(state, &ServerConfig::default())
}

async fn post(app: axum::Router, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/det/single")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn image_body(width: u32, height: u32) -> String {
    let png = encode_png(&test_image(width, height));
    serde_json::json!({ "data": STANDARD.encode(png) }).to_string()
}

fn decode_output_image(response: &DetectResponse) -> image::DynamicImage {
    let jpeg = STANDARD.decode(&response.output_image).unwrap();
    image::load_from_memory(&jpeg).unwrap()
}

#[tokio::test]
async fn test_returns_reading_and_annotated_image() {
    let app = app(single_gauge_reader(gauge_box(), 0.30));
    let (status, body) = post(app, image_body(640, 480)).await;

    assert_eq!(status, StatusCode::OK);
    let response: DetectResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.results.len(), 1);

    let result = &response.results[0];
    assert_eq!(result.kind, "meter");
    assert_eq!(result.angle, -1);
    assert_close(result.scale_value, 0.312, 1e-4);
    assert_close(result.bbox[0], 100.0, 1e-3);
    assert_close(result.bbox[1], 100.0, 1e-3);
    assert_close(result.bbox[2], 200.0, 1e-3);
    assert_close(result.bbox[3], 150.0, 1e-3);

    let output = decode_output_image(&response);
    assert_eq!((output.width(), output.height()), (640, 480));
}

#[tokio::test]
async fn test_json_field_names() {
    let app = app(single_gauge_reader(gauge_box(), 0.70));
    let (status, body) = post(app, image_body(640, 480)).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let result = &json["results"][0];
    assert_eq!(result["type"], "meter");
    assert_eq!(result["angle"], -1);
    assert_eq!(result["box"].as_array().map(|b| b.len()), Some(4));
    assert!(result["scale_value"].is_number());
    assert!(json["output_image"].is_string());
}

#[tokio::test]
async fn test_no_objects_returns_empty_results() {
    let app = app(reader_with(FakeDetector::empty(), ScriptedPose::ratio(0.3)));
    let (status, body) = post(app, image_body(320, 240)).await;

    assert_eq!(status, StatusCode::OK);
    let response: DetectResponse = serde_json::from_slice(&body).unwrap();
    assert!(response.results.is_empty());

    let output = decode_output_image(&response);
    assert_eq!((output.width(), output.height()), (320, 240));
}

#[tokio::test]
async fn test_no_readings_returns_empty_results() {
    let reader = reader_with(
        FakeDetector::for_frame(640, 480, &[(gauge_box(), 0.9)]),
        ScriptedPose::new(vec![PoseScript::Fail]),
    );
    let (status, body) = post(app(reader), image_body(640, 480)).await;

    assert_eq!(status, StatusCode::OK);
    let response: DetectResponse = serde_json::from_slice(&body).unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_malformed_base64_is_bad_request() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let body = serde_json::json!({ "data": "!!!not base64!!!" }).to_string();
    let (status, body) = post(app, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(error.error.contains("base64"), "unexpected message: {}", error.error);
}

#[tokio::test]
async fn test_missing_data_is_bad_request() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let (status, body) = post(app, r#"{"image": "abc"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Missing 'data' field in request body.");
}

#[tokio::test]
async fn test_non_string_data_is_bad_request() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let (status, _) = post(app, r#"{"data": 42}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let (status, body) = post(app, "{ this is not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(error.error.starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_undecodable_image_is_bad_request() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let body = serde_json::json!({ "data": STANDARD.encode(b"plain text, not pixels") }).to_string();
    let (status, body) = post(app, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Failed to decode image. Invalid image data.");
}

#[tokio::test]
async fn test_data_url_prefix_is_accepted() {
    let app = app(single_gauge_reader(gauge_box(), 0.3));
    let png = encode_png(&test_image(640, 480));
    let body = serde_json::json!({
        "data": format!("data:image/png;base64,{}", STANDARD.encode(png))
    })
    .to_string();
    let (status, body) = post(app, body).await;

    assert_eq!(status, StatusCode::OK);
    let response: DetectResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.results.len(), 1);
}

#[tokio::test]
async fn test_crashed_inference_is_internal_error() {
    // First request panics inside the blocking task, the second reads normally
    let reader = reader_with(
        FakeDetector::for_frame(640, 480, &[(gauge_box(), 0.9)]),
        ScriptedPose::new(vec![PoseScript::Panic, PoseScript::Ratio(0.3)]),
    );
    let app = app(reader);

    let (status, body) = post(app.clone(), image_body(640, 480)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(
        error.error.starts_with("Internal Server Error: "),
        "unexpected message: {}",
        error.error
    );

    let (status, body) = post(app, image_body(640, 480)).await;
    assert_eq!(status, StatusCode::OK);
    let response: DetectResponse = serde_json::from_slice(&body).unwrap();
    assert_close(response.results[0].scale_value, 0.312, 1e-4);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let state = ApiState {
        reader: Arc::new(single_gauge_reader(gauge_box(), 0.3)),
        jpeg_quality: 90,
    };
    let config = ServerConfig {
        max_body_bytes: 1024,
        ..ServerConfig::default()
    };
    let app = server::router(state, &config);
    let (status, _) = post(app, image_body(640, 480)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_reader() {
    let app = app(single_gauge_reader(gauge_box(), 0.7));

    let requests = (0..4).map(|_| post(app.clone(), image_body(640, 480)));
    for (status, body) in spawn_all(requests).await {
        assert_eq!(status, StatusCode::OK);
        let response: DetectResponse = serde_json::from_slice(&body).unwrap();
        assert_close(response.results[0].scale_value, 0.708, 1e-4);
    }
}

/// Runs the request futures on separate tasks and collects their results in order
async fn spawn_all<F>(futures: impl Iterator<Item = F>) -> Vec<(StatusCode, Vec<u8>)>
where
    F: std::future::Future<Output = (StatusCode, Vec<u8>)> + Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[test]
fn test_decode_request_strips_whitespace() {
    let body = serde_json::json!({ "data": format!("  {}\n", STANDARD.encode(b"abc")) }).to_string();
    let bytes = server::decode_request(body.as_bytes()).unwrap();
    assert_eq!(bytes, b"abc");
}
