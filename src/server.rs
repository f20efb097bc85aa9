// HTTP front end: one JSON endpoint that reads every gauge in an uploaded image

use crate::config::ServerConfig;
use crate::error::GaugeError;
use crate::models::{Frame, PipelineResult};
use crate::pipeline::GaugeReader;
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every request
#[derive(Clone)]
pub struct ApiState {
    pub reader: Arc<GaugeReader>,
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MeterResult {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    /// Reserved; always -1
    pub angle: i32,
    pub scale_value: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub results: Vec<MeterResult>,
    pub output_image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request failure mapped onto a status code
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {}", message),
            ),
        };
        if status.is_server_error() {
            tracing::error!(%error, "request failed");
        } else {
            tracing::warn!(%error, "rejected request");
        }
        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub fn router(state: ApiState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/v1/det/single", post(detect_single))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c
pub async fn serve(reader: Arc<GaugeReader>, config: &ServerConfig) -> anyhow::Result<()> {
    let state = ApiState {
        reader,
        jpeg_quality: config.jpeg_quality,
    };
    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}

/// Pull the base64 payload out of a request body
pub fn decode_request(body: &[u8]) -> Result<Vec<u8>, ApiError> {
    let request: DetectRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    let data = match request.data {
        Some(serde_json::Value::String(data)) => data,
        Some(_) => return Err(ApiError::BadRequest("'data' must be a base64 string.".to_string())),
        None => return Err(ApiError::BadRequest("Missing 'data' field in request body.".to_string())),
    };

    // Browsers often send a data URL
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data.as_str(),
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image data: {}", e)))
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, GaugeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    image
        .write_with_encoder(encoder)
        .map_err(|e| GaugeError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn to_response(result: &PipelineResult, rendered: &RgbImage, quality: u8) -> Result<DetectResponse, GaugeError> {
    let results = result
        .readings()
        .iter()
        .map(|r| MeterResult {
            kind: "meter".to_string(),
            bbox: r.object.bbox.to_array(),
            angle: -1,
            scale_value: r.value,
        })
        .collect();

    Ok(DetectResponse {
        results,
        output_image: STANDARD.encode(encode_jpeg(rendered, quality)?),
    })
}

async fn detect_single(State(state): State<ApiState>, body: Bytes) -> Result<Json<DetectResponse>, ApiError> {
    let bytes = decode_request(&body)?;
    let frame = Frame::decode(&bytes)
        .map_err(|_| ApiError::BadRequest("Failed to decode image. Invalid image data.".to_string()))?;

    tracing::debug!(width = frame.width(), height = frame.height(), "decoded request image");

    // Inference is CPU bound; keep it off the async workers
    let reader = state.reader.clone();
    let quality = state.jpeg_quality;
    let response = tokio::task::spawn_blocking(move || -> Result<DetectResponse, GaugeError> {
        let result = reader.read(&frame)?;
        // Without readings the caller gets the frame back untouched
        let rendered = if result.is_empty() {
            frame.image().clone()
        } else {
            reader.render(&frame, &result)
        };
        to_response(&result, &rendered, quality)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("inference task failed: {}", e)))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(response))
}
