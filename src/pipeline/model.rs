use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::face::{FaceBbox, FaceDetector};
use super::{Classification, EmotionAnalysis, EmotionClassifier, FaceRegion};
use crate::utils::config::Config;

pub const EMOTION_MODEL_FILE: &str = "emotion-ferplus-8.onnx";
pub const FACE_MODEL_FILE: &str = "scrfd_500m_bnkps.onnx";

const FERPLUS_MODEL_URL: &str = "https://github.com/onnx/models/raw/5faef4c33eba0395177850e1e31c4a6a9e634c82/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";
const SCRFD_MODEL_URL_HF: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_detect/scrfd_onnx/scrfd_500m_bnkps.onnx";
const SCRFD_MODEL_URL_GH: &str = "https://github.com/deepinsight/insightface/releases/download/v0.7/scrfd_500m_bnkps.onnx";

/// FER+ output order, reported with the short labels clients expect.
pub const FERPLUS_LABELS: [&str; 8] = ["neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt"];
const FERPLUS_INPUT: u32 = 64;

/// FER+ emotion model, optionally preceded by an SCRFD face detector.
pub struct OnnxEmotionClassifier {
    session: Mutex<Session>,
    detector: Option<FaceDetector>,
}

impl OnnxEmotionClassifier {
    /// Fetch missing models (when allowed) and load them. Only the emotion
    /// model is mandatory; without a detector whole frames are analysed.
    pub async fn initialize(cfg: &Config) -> Result<Self> {
        std::fs::create_dir_all(&cfg.models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", cfg.models_dir))?;

        if cfg.auto_download {
            if let Err(e) = download_models(&cfg.models_dir, cfg.face_detection).await {
                warn!("Model auto-download failed: {:#}", e);
            }
        } else {
            info!("Model auto-download disabled.");
        }

        let mut classifier = Self::load(&cfg.models_dir.join(EMOTION_MODEL_FILE))?;
        if cfg.face_detection {
            match FaceDetector::load(
                &cfg.models_dir.join(FACE_MODEL_FILE),
                cfg.face_confidence_threshold,
                cfg.face_nms_iou_threshold,
            ) {
                Ok(detector) => classifier.detector = Some(detector),
                Err(e) => warn!("Face detector not loaded, analysing whole frames: {:#}", e),
            }
        }
        Ok(classifier)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Emotion model missing; expected FER+ at {:?}", path);
        }
        let session = Session::builder()?
            .commit_from_file(path)
            .context("Failed to create emotion model session")?;
        info!("Emotion model loaded from {:?}", path);
        Ok(Self { session: Mutex::new(session), detector: None })
    }

    pub fn has_face_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// One record per detected face, highest detector confidence first. Face
    /// detection is not enforced: with no face the whole frame is one record.
    pub fn analyze(&self, image: &RgbImage) -> Result<Vec<EmotionAnalysis>> {
        let faces = match &self.detector {
            Some(detector) => detector.detect(image).unwrap_or_else(|e| {
                warn!("Face detection failed, analysing whole frame: {:#}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let targets = crop_targets(&faces, image.width(), image.height());
        if targets.iter().all(|(_, conf)| conf.is_none()) {
            debug!("No face localized, analysing whole frame");
        }

        let mut analyses = Vec::with_capacity(targets.len());
        for (region, face_confidence) in targets {
            let mut analysis = match face_confidence {
                Some(_) => {
                    let crop = imageops::crop_imm(image, region.x, region.y, region.w, region.h).to_image();
                    self.run_emotion(&crop)?
                }
                None => self.run_emotion(image)?,
            };
            analysis.region = Some(region);
            analysis.face_confidence = face_confidence;
            analyses.push(analysis);
        }
        Ok(analyses)
    }

    fn run_emotion(&self, face: &RgbImage) -> Result<EmotionAnalysis> {
        let (shape, data) = preprocess_ferplus(face);
        let mut session = self.session.lock();
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Emotion model declares no inputs")?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .context("Emotion model declares no outputs")?;

        let input = Value::from_array((shape.to_vec(), data))
            .context("Failed to create emotion input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("Emotion inference failed")?;
        let logits = outputs
            .get(output_name.as_str())
            .context("Emotion model produced no output")?
            .try_extract_tensor::<f32>()
            .context("Emotion output is not an f32 tensor")?
            .1
            .to_vec();

        analysis_from_logits(&logits)
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn name(&self) -> &'static str {
        "onnx-ferplus"
    }

    fn classify(&self, image: &RgbImage) -> Result<Classification> {
        let analyses = self.analyze(image)?;
        if let Some(first) = analyses.first() {
            debug!(
                "{} face record(s); first: {} region={:?} face_confidence={:?}",
                analyses.len(),
                first.dominant_emotion,
                first.region,
                first.face_confidence
            );
        }
        Classification::from_analyses(analyses)
    }
}

/// Regions to analyse, paired with the detector confidence, in detector
/// order. Boxes that collapse inside the frame are skipped; with nothing left
/// the whole frame is the single target.
pub fn crop_targets(faces: &[FaceBbox], width: u32, height: u32) -> Vec<(FaceRegion, Option<f32>)> {
    let targets: Vec<_> = faces
        .iter()
        .filter_map(|face| Some((face.region(width, height)?, Some(face.confidence))))
        .collect();
    if targets.is_empty() {
        return vec![(FaceRegion { x: 0, y: 0, w: width, h: height }, None)];
    }
    targets
}

/// Grayscale 64x64, raw 0..255 values, NCHW with a single channel.
pub fn preprocess_ferplus(face: &RgbImage) -> ([i64; 4], Vec<f32>) {
    let gray = imageops::grayscale(face);
    let resized = imageops::resize(&gray, FERPLUS_INPUT, FERPLUS_INPUT, imageops::FilterType::Triangle);
    let data = resized.pixels().map(|p| p[0] as f32).collect();
    ([1, 1, FERPLUS_INPUT as i64, FERPLUS_INPUT as i64], data)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Percent scores per label plus the arg-max label.
pub fn analysis_from_logits(logits: &[f32]) -> Result<EmotionAnalysis> {
    if logits.len() != FERPLUS_LABELS.len() {
        anyhow::bail!("Expected {} emotion logits, got {}", FERPLUS_LABELS.len(), logits.len());
    }
    let probs = softmax(logits);
    let mut dominant = (FERPLUS_LABELS[0], f32::NEG_INFINITY);
    let mut emotion = BTreeMap::new();
    for (&label, &p) in FERPLUS_LABELS.iter().zip(probs.iter()) {
        if p > dominant.1 {
            dominant = (label, p);
        }
        emotion.insert(label.to_string(), p as f64 * 100.0);
    }
    Ok(EmotionAnalysis {
        emotion,
        dominant_emotion: dominant.0.to_string(),
        region: None,
        face_confidence: None,
    })
}

async fn download_models(models_dir: &Path, with_face_detector: bool) -> Result<()> {
    let client = create_http_client()?;

    let emotion_path = models_dir.join(EMOTION_MODEL_FILE);
    if !emotion_path.exists() {
        info!("Downloading FER+ emotion model...");
        download_file(&client, FERPLUS_MODEL_URL, &emotion_path).await?;
    }

    let face_path = models_dir.join(FACE_MODEL_FILE);
    if with_face_detector && !face_path.exists() {
        info!("Downloading SCRFD face detection model...");
        if let Err(e) = download_file(&client, SCRFD_MODEL_URL_HF, &face_path).await {
            warn!("Failed to download from Hugging Face: {:#}. Trying GitHub...", e);
            download_file(&client, SCRFD_MODEL_URL_GH, &face_path).await?;
        }
    }
    Ok(())
}

fn create_http_client() -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Ok(token) = std::env::var("HF_TOKEN") {
        if !token.is_empty() {
            info!("Using Hugging Face token for model download.");
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("Failed to create HTTP client")
}

async fn download_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download model from {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download model: HTTP {}", response.status());
    }
    let bytes = response.bytes().await.context("Failed to read response body")?;
    // ONNX files are never this small; an HTML error page is the usual culprit.
    if bytes.len() < 1024 {
        anyhow::bail!("Downloaded file is suspiciously small ({} bytes), may be corrupted", bytes.len());
    }

    // Write beside the target, then rename into place.
    let partial = partial_path(path);
    std::fs::write(&partial, &bytes).with_context(|| format!("Failed to write file: {:?}", partial))?;
    let written = std::fs::metadata(&partial)
        .with_context(|| format!("Failed to read metadata for downloaded file: {:?}", partial))?
        .len();
    if written != bytes.len() as u64 {
        let _ = std::fs::remove_file(&partial);
        anyhow::bail!("File integrity check failed: expected {} bytes, got {} bytes", bytes.len(), written);
    }
    std::fs::rename(&partial, path).with_context(|| format!("Failed to move model into place: {:?}", path))?;

    info!("Downloaded model to {:?} ({} bytes, verified)", path, bytes.len());
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
