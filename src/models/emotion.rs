use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /api/analyze-emotion`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, optionally prefixed with a `data:...;base64,` header.
    /// Kept untyped so a wrong type is told apart from a missing field.
    #[serde(default)]
    pub image: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub emotion: String,
    pub confidence: f64,
    pub emotions: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub deepface_available: bool,
    pub classifier: String,
    pub version: String,
}
