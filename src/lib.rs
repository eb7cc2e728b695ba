pub mod utils;
pub mod models;
pub mod pipeline;
pub mod api;

use std::sync::Arc;

use pipeline::{ClassifierSelection, EmotionClassifier};

/// Shared, read-only handler state. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn EmotionClassifier>,
    /// Whether the model-backed classifier loaded at startup.
    pub model_available: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(selection: ClassifierSelection, max_body_bytes: usize) -> Self {
        Self {
            classifier: selection.classifier,
            model_available: selection.model_available,
            max_body_bytes,
        }
    }
}
