pub mod decode;
pub mod fallback;
#[cfg(feature = "emotion-model")]
pub mod face;
#[cfg(feature = "emotion-model")]
pub mod model;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;
use tracing::{info, warn};

use crate::utils::config::Config;

/// Face bounding box in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One analysed face (or the whole frame when no face was localized).
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionAnalysis {
    /// label -> score in [0, 100]
    pub emotion: BTreeMap<String, f64>,
    pub dominant_emotion: String,
    pub region: Option<FaceRegion>,
    pub face_confidence: Option<f32>,
}

/// What the HTTP layer reports for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub emotion: String,
    pub confidence: f64,
    pub emotions: BTreeMap<String, f64>,
}

impl Classification {
    /// Summarize a model run. Only the first record is used; its confidence is
    /// the dominant score scaled to [0, 1], or 0 when the dominant label has no
    /// score.
    pub fn from_analyses(analyses: Vec<EmotionAnalysis>) -> Result<Self> {
        let first = analyses
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("emotion model produced no analysis"))?;
        let raw = first.emotion.get(&first.dominant_emotion).copied().unwrap_or(0.0);
        Ok(Self {
            emotion: first.dominant_emotion,
            confidence: raw / 100.0,
            emotions: first.emotion,
        })
    }
}

/// Strategy seam between the HTTP layer and whatever produces emotions.
pub trait EmotionClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, image: &RgbImage) -> Result<Classification>;
}

/// The classifier chosen at startup plus whether it is model-backed.
#[derive(Clone)]
pub struct ClassifierSelection {
    pub classifier: Arc<dyn EmotionClassifier>,
    pub model_available: bool,
}

impl ClassifierSelection {
    pub fn model(classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self { classifier, model_available: true }
    }

    pub fn fallback() -> Self {
        Self {
            classifier: Arc::new(fallback::RandomClassifier::new()),
            model_available: false,
        }
    }
}

/// Try to bring up the model-backed classifier; any failure switches the
/// process into fallback mode.
pub async fn load_classifier(cfg: &Config) -> ClassifierSelection {
    if cfg.force_fallback {
        info!("EMOTION_FORCE_FALLBACK set, using random fallback classifier");
        return ClassifierSelection::fallback();
    }

    #[cfg(feature = "emotion-model")]
    {
        match model::OnnxEmotionClassifier::initialize(cfg).await {
            Ok(classifier) => {
                info!("Emotion model loaded (face detector: {})", classifier.has_face_detector());
                return ClassifierSelection::model(Arc::new(classifier));
            }
            Err(e) => warn!("Emotion model not available, using random fallback: {:#}", e),
        }
    }

    #[cfg(not(feature = "emotion-model"))]
    {
        warn!("Built without the emotion-model feature, using random fallback");
    }

    ClassifierSelection::fallback()
}
