use std::sync::Arc;

use axum::{extract::{rejection::JsonRejection, State}, http::StatusCode, Json, response::IntoResponse};
use serde_json::Value;
use tracing::debug;

use crate::AppState;
use crate::api::error::ApiError;
use crate::models::emotion::{AnalyzeRequest, AnalyzeResponse, HealthResponse};
use crate::pipeline::decode;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        deepface_available: state.model_available,
        classifier: state.classifier.name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// A body that is absent, not JSON, or lacks `image` is a 400; anything that
/// goes wrong after that (a non-string `image` included) is a 500.
pub async fn analyze_emotion(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let image = match body {
        Ok(Json(req)) => match req.image {
            None | Some(Value::Null) => return Err(ApiError::MissingImage),
            Some(Value::String(image)) => image,
            Some(_) => return Err(ApiError::ImageNotString),
        },
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::BodyTooLarge(rejection.body_text()));
        }
        Err(rejection) => {
            debug!("unusable request body: {}", rejection.body_text());
            return Err(ApiError::MissingImage);
        }
    };
    debug!("analyze-emotion: {} bytes of image payload", image.len());

    let classifier = state.classifier.clone();
    let classification = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let rgb = decode::decode_image(&image)?;
        debug!("decoded {}x{} image", rgb.width(), rgb.height());
        Ok(classifier.classify(&rgb)?)
    })
    .await??;

    debug!("{} -> {} ({:.3})", state.classifier.name(), classification.emotion, classification.confidence);
    Ok(Json(AnalyzeResponse {
        success: true,
        emotion: classification.emotion,
        confidence: classification.confidence,
        emotions: classification.emotions,
    }))
}
