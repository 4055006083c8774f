use crate::detector::group_candidates;
use crate::types::{Detection, Rect};
use anyhow::{bail, Result};
use image::{imageops::FilterType, Rgb, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const LETTERBOX_FILL: u8 = 114;

/// Thresholds handed to the emotion model on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub image_size: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.45,
            iou_threshold: 0.45,
            image_size: 640,
        }
    }
}

/// Runs the emotion model over an image (a face crop or a whole frame).
pub trait EmotionClassifier {
    fn classify(&mut self, image: &RgbImage, params: &DetectionParams) -> Result<Vec<Detection>>;
}

/// Highest-confidence (class id, confidence) among `detections`.
/// Ties keep the earliest detection.
pub fn top_prediction(detections: &[Detection]) -> Option<(usize, f32)> {
    detections.iter().fold(None, |best, d| match best {
        Some((_, conf)) if d.confidence <= conf => best,
        _ => Some((d.class_id, d.confidence)),
    })
}

/// YOLO detector exported from ultralytics, one class per emotion.
pub struct YoloEmotionModel {
    session: Session,
}

impl YoloEmotionModel {
    pub fn new(model_path: &Path) -> Result<Self> {
        if !model_path.exists() {
            bail!("Model not found at {}", model_path.display());
        }

        info!("Loading emotion model from {}", model_path.display());
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)?;

        Ok(Self { session })
    }
}

impl EmotionClassifier for YoloEmotionModel {
    fn classify(&mut self, image: &RgbImage, params: &DetectionParams) -> Result<Vec<Detection>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        if params.image_size == 0 {
            bail!("Model input size must be greater than 0");
        }

        let letterbox = Letterbox::fit(image.width(), image.height(), params.image_size);
        let input = letterbox.tensor(image)?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        if shape.len() != 3 {
            bail!("Unexpected YOLO output rank {}", shape.len());
        }
        let (d1, d2) = (shape[1] as usize, shape[2] as usize);

        let candidates = decode_predictions(data, d1, d2, params.confidence_threshold);
        let detections = suppress_per_class(candidates, params.iou_threshold)
            .into_iter()
            .map(|d| Detection {
                bbox: letterbox.unmap(&d.bbox),
                ..d
            })
            .collect::<Vec<_>>();

        debug!("Emotion model returned {} detection(s)", detections.len());
        Ok(detections)
    }
}

/// Square model input with the image scaled to fit and centered.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    size: u32,
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    src_w: u32,
    src_h: u32,
}

impl Letterbox {
    fn fit(src_w: u32, src_h: u32, size: u32) -> Self {
        let scale = (size as f32 / src_w as f32).min(size as f32 / src_h as f32);
        let new_w = (src_w as f32 * scale).round();
        let new_h = (src_h as f32 * scale).round();
        Self {
            size,
            scale,
            pad_x: ((size as f32 - new_w) / 2.0).floor(),
            pad_y: ((size as f32 - new_h) / 2.0).floor(),
            src_w,
            src_h,
        }
    }

    fn tensor(&self, image: &RgbImage) -> Result<Tensor<f32>> {
        let new_w = ((self.src_w as f32 * self.scale).round() as u32).clamp(1, self.size.max(1));
        let new_h = ((self.src_h as f32 * self.scale).round() as u32).clamp(1, self.size.max(1));
        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([LETTERBOX_FILL; 3]));
        image::imageops::overlay(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);

        let size = self.size as usize;
        let mut input_data = Vec::with_capacity(3 * size * size);
        for c in 0..3 {
            input_data.extend(canvas.pixels().map(|p| p[c] as f32 / 255.0));
        }

        Ok(Tensor::from_array((vec![1, 3, size, size], input_data))?)
    }

    /// Model input coordinates back to source image coordinates.
    fn unmap(&self, r: &Rect) -> Rect {
        let max_x = self.src_w as f32;
        let max_y = self.src_h as f32;
        let x1 = ((r.x - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y1 = ((r.y - self.pad_y) / self.scale).clamp(0.0, max_y);
        let x2 = ((r.x2() - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y2 = ((r.y2() - self.pad_y) / self.scale).clamp(0.0, max_y);
        Rect::from_corners(x1, y1, x2, y2)
    }
}

/// Reads a `[1, 4 + classes, anchors]` head (or its transpose) into
/// candidate detections in model-input pixels.
fn decode_predictions(data: &[f32], d1: usize, d2: usize, conf_threshold: f32) -> Vec<Detection> {
    // The attribute axis is the short one.
    let (attrs, anchors, attr_major) = if d1 <= d2 { (d1, d2, true) } else { (d2, d1, false) };
    if attrs <= 4 || data.len() < attrs * anchors {
        return Vec::new();
    }
    let at = |attr: usize, anchor: usize| {
        if attr_major {
            data[attr * anchors + anchor]
        } else {
            data[anchor * attrs + attr]
        }
    };

    let mut out = Vec::new();
    for j in 0..anchors {
        let mut class_id = 0;
        let mut confidence = f32::MIN;
        for c in 0..attrs - 4 {
            let s = at(4 + c, j);
            if s > confidence {
                confidence = s;
                class_id = c;
            }
        }
        if confidence <= conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, j), at(1, j), at(2, j), at(3, j));
        out.push(Detection {
            bbox: Rect::new(cx - w / 2.0, cy - h / 2.0, w, h),
            class_id,
            confidence,
        });
    }
    out
}

/// NMS run separately for each class, results ordered by confidence.
fn suppress_per_class(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut class_ids: Vec<usize> = candidates.iter().map(|d| d.class_id).collect();
    class_ids.sort_unstable();
    class_ids.dedup();

    let mut kept: Vec<Detection> = class_ids
        .into_iter()
        .flat_map(|class_id| {
            let boxes = candidates
                .iter()
                .filter(|d| d.class_id == class_id)
                .map(|d| (d.bbox, d.confidence))
                .collect();
            group_candidates(boxes, iou_threshold)
                .into_iter()
                .map(move |g| Detection {
                    bbox: g.rect,
                    class_id,
                    confidence: g.score,
                })
        })
        .collect();

    kept.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, confidence: f32) -> Detection {
        Detection {
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            class_id,
            confidence,
        }
    }

    #[test]
    fn top_prediction_picks_highest_and_keeps_first_on_tie() {
        assert_eq!(top_prediction(&[]), None);
        assert_eq!(top_prediction(&[det(1, 0.4), det(4, 0.8), det(6, 0.8)]), Some((4, 0.8)));
    }

    #[test]
    fn decode_reads_attribute_major_head() {
        // 2 classes, 3 anchors: rows are cx, cy, w, h, class0, class1
        let data = vec![
            10.0, 50.0, 90.0, //
            10.0, 50.0, 90.0, //
            4.0, 4.0, 4.0, //
            4.0, 4.0, 4.0, //
            0.9, 0.1, 0.2, //
            0.05, 0.3, 0.7, //
        ];
        let out = decode_predictions(&data, 6, 3, 0.45);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].class_id, 0);
        assert_eq!(out[1].class_id, 1);
        assert!((out[1].confidence - 0.7).abs() < 1e-6);
        assert_eq!(out[0].bbox, Rect::new(8.0, 8.0, 4.0, 4.0));
    }

    #[test]
    fn nms_keeps_overlaps_of_different_classes() {
        let a = det(0, 0.9);
        let b = det(0, 0.6);
        let c = det(3, 0.7);
        let kept = suppress_per_class(vec![a, b, c], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 0);
        assert_eq!(kept[1].class_id, 3);
    }

    #[test]
    fn letterbox_maps_back_to_source() {
        let lb = Letterbox::fit(200, 100, 640);
        assert!((lb.scale - 3.2).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 160.0);
        let r = lb.unmap(&Rect::new(32.0, 192.0, 64.0, 32.0));
        assert!((r.x - 10.0).abs() < 1e-4);
        assert!((r.y - 10.0).abs() < 1e-4);
        assert!((r.width - 20.0).abs() < 1e-4);
        assert!((r.height - 10.0).abs() < 1e-4);
    }
}
