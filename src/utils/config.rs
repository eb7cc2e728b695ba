use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub models_dir: PathBuf,
    pub auto_download: bool,
    pub face_detection: bool,
    pub face_confidence_threshold: f32,
    pub face_nms_iou_threshold: f32,
    pub max_body_bytes: usize,
    pub force_fallback: bool,
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "TRUE") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "FALSE") => false,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(5001);
        let models_dir = env::var("EMOTION_MODELS_DIR").unwrap_or_else(|_| "models".to_string());
        let auto_download = env_flag("EMOTION_MODEL_AUTO_DOWNLOAD", true);
        let face_detection = env_flag("EMOTION_FACE_DETECTION", true);
        let face_confidence_threshold = env::var("EMOTION_FACE_CONFIDENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.5);
        let face_nms_iou_threshold = env::var("EMOTION_FACE_NMS_IOU_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.4);
        let max_body_bytes = env::var("EMOTION_MAX_BODY_BYTES").ok().and_then(|v| v.parse().ok()).unwrap_or(16 * 1024 * 1024);
        let force_fallback = env_flag("EMOTION_FORCE_FALLBACK", false);
        Self {
            port,
            models_dir: PathBuf::from(models_dir),
            auto_download,
            face_detection,
            face_confidence_threshold,
            face_nms_iou_threshold,
            max_body_bytes,
            force_fallback,
        }
    }
}
