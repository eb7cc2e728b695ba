use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::emotion::ErrorResponse;
use crate::pipeline::decode::DecodeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image provided")]
    MissingImage,
    #[error("{0}")]
    BodyTooLarge(String),
    #[error("image must be a base64 string")]
    ImageNotString,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{0:#}")]
    Classification(#[from] anyhow::Error),
    #[error("analysis task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_client_error() {
            debug!("analyze-emotion rejected ({}): {}", status.as_u16(), message);
        } else {
            warn!("analyze-emotion failed ({}): {}", status.as_u16(), message);
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
