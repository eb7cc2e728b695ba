use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::FaceRegion;

const SCRFD_INPUT: u32 = 640;
const STRIDES: [u32; 3] = [8, 16, 32];
const MIN_FACE_PX: f32 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBbox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBbox {
    /// Integer crop rectangle, or `None` if it collapses to nothing.
    pub fn region(&self, width: u32, height: u32) -> Option<FaceRegion> {
        let x1 = self.x1.max(0.0) as u32;
        let y1 = self.y1.max(0.0) as u32;
        let x2 = (self.x2.min(width as f32) as u32).min(width);
        let y2 = (self.y2.min(height as f32) as u32).min(height);
        if x2 > x1 && y2 > y1 {
            Some(FaceRegion { x: x1, y: y1, w: x2 - x1, h: y2 - y1 })
        } else {
            None
        }
    }
}

/// SCRFD face detector.
pub struct FaceDetector {
    session: Mutex<Session>,
    confidence_threshold: f32,
    nms_iou_threshold: f32,
}

impl FaceDetector {
    pub fn load(path: &Path, confidence_threshold: f32, nms_iou_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .commit_from_file(path)
            .context("Failed to create SCRFD session")?;
        info!("Face detector loaded from {:?}", path);
        Ok(Self {
            session: Mutex::new(session),
            confidence_threshold,
            nms_iou_threshold,
        })
    }

    /// Faces sorted by detector confidence, highest first.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBbox>> {
        let (shape, data, scale) = preprocess_scrfd(image);
        let mut session = self.session.lock();
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("SCRFD model declares no inputs")?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let input = Value::from_array((shape.to_vec(), data))
            .context("Failed to create SCRFD input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("SCRFD inference failed")?;

        let mut tensors: Vec<(String, Vec<f32>)> = Vec::with_capacity(output_names.len());
        for name in &output_names {
            if let Some(value) = outputs.get(name.as_str()) {
                let (_, slice) = value
                    .try_extract_tensor::<f32>()
                    .with_context(|| format!("SCRFD output {} is not f32", name))?;
                tensors.push((name.clone(), slice.to_vec()));
            }
        }

        let per_stride = split_stride_outputs(&tensors);
        let (img_w, img_h) = (image.width() as f32, image.height() as f32);
        let mut raw = Vec::new();
        for (stride, scores, boxes) in per_stride {
            decode_stride(stride, scores, boxes, scale, img_w, img_h, self.confidence_threshold, &mut raw);
        }
        debug!("SCRFD: {} candidates over threshold {:.2}", raw.len(), self.confidence_threshold);

        let keep = nms(&raw, self.nms_iou_threshold);
        Ok(keep.into_iter().map(|i| raw[i].clone()).collect())
    }
}

/// Letterbox into a 640x640 top-left aligned canvas, NCHW RGB scaled to
/// roughly [-1, 1]. Returns the shape, the tensor data and the resize scale.
pub fn preprocess_scrfd(image: &RgbImage) -> ([i64; 4], Vec<f32>, f32) {
    let side = SCRFD_INPUT;
    let (ow, oh) = (image.width() as f32, image.height() as f32);
    let scale = side as f32 / ow.max(oh);
    let nw = ((ow * scale) as u32).clamp(1, side);
    let nh = ((oh * scale) as u32).clamp(1, side);
    let resized = imageops::resize(image, nw, nh, imageops::FilterType::Triangle);
    let mut padded = RgbImage::new(side, side);
    imageops::overlay(&mut padded, &resized, 0, 0);

    let plane = (side * side) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, p) in padded.enumerate_pixels() {
        let idx = (y * side + x) as usize;
        for c in 0..3 {
            data[c * plane + idx] = (p[c] as f32 - 127.5) / 128.0;
        }
    }
    ([1, 3, side as i64, side as i64], data, scale)
}

/// Pair score and box tensors per stride. Exported models either name them
/// `score_8`/`bbox_8`/... or emit scores for strides 8, 16, 32 followed by the
/// boxes (and landmarks, ignored).
fn split_stride_outputs(tensors: &[(String, Vec<f32>)]) -> Vec<(u32, &[f32], &[f32])> {
    let find = |name: String| tensors.iter().find(|(n, _)| *n == name).map(|(_, t)| t.as_slice());

    let named: Vec<_> = STRIDES
        .iter()
        .filter_map(|&s| Some((s, find(format!("score_{}", s))?, find(format!("bbox_{}", s))?)))
        .collect();
    if !named.is_empty() {
        return named;
    }

    if tensors.len() >= 6 {
        return STRIDES
            .iter()
            .enumerate()
            .map(|(i, &s)| (s, tensors[i].1.as_slice(), tensors[i + 3].1.as_slice()))
            .collect();
    }
    Vec::new()
}

#[allow(clippy::too_many_arguments)]
fn decode_stride(
    stride: u32,
    scores: &[f32],
    boxes: &[f32],
    scale: f32,
    img_w: f32,
    img_h: f32,
    threshold: f32,
    out: &mut Vec<FaceBbox>,
) {
    let grid = (SCRFD_INPUT / stride) as usize;
    let points = grid * grid;
    if scores.is_empty() || scores.len() % points != 0 || boxes.len() < scores.len() * 4 {
        debug!("SCRFD stride {}: unexpected tensor sizes ({} scores, {} boxes)", stride, scores.len(), boxes.len());
        return;
    }
    let anchors = scores.len() / points;
    let stride = stride as f32;

    for (idx, &conf) in scores.iter().enumerate() {
        if conf < threshold {
            continue;
        }
        let point = idx / anchors;
        let cx = (point % grid) as f32 * stride;
        let cy = (point / grid) as f32 * stride;
        let b = &boxes[idx * 4..idx * 4 + 4];

        let x1 = ((cx - b[0] * stride) / scale).clamp(0.0, img_w);
        let y1 = ((cy - b[1] * stride) / scale).clamp(0.0, img_h);
        let x2 = ((cx + b[2] * stride) / scale).clamp(0.0, img_w);
        let y2 = ((cy + b[3] * stride) / scale).clamp(0.0, img_h);
        if x2 - x1 < MIN_FACE_PX || y2 - y1 < MIN_FACE_PX {
            continue;
        }
        out.push(FaceBbox { x1, y1, x2, y2, confidence: conf });
    }
}

/// Greedy non-maximum suppression. Returned indices are ordered by confidence.
pub fn nms(boxes: &[FaceBbox], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| {
        boxes[b]
            .confidence
            .partial_cmp(&boxes[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for (i, &ia) in indices.iter().enumerate() {
        if suppressed[ia] {
            continue;
        }
        keep.push(ia);
        for &ib in indices.iter().skip(i + 1) {
            if !suppressed[ib] && iou(&boxes[ia], &boxes[ib]) > iou_threshold {
                suppressed[ib] = true;
            }
        }
    }
    keep
}

pub fn iou(a: &FaceBbox, b: &FaceBbox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let intersection = (x2 - x1) * (y2 - y1);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
