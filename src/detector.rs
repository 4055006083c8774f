use crate::types::Rect;
use anyhow::{Context, Result};
use image::{imageops::FilterType, GrayImage, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, trace};

const INPUT_W: u32 = 320;
const INPUT_H: u32 = 240;
/// Raw anchors overlapping more than this belong to the same face.
const GROUP_IOU: f32 = 0.3;

/// Finds faces in a full frame.
pub trait FaceLocator {
    fn locate(&mut self, frame: &RgbImage) -> Result<Vec<Rect>>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocatorParams {
    pub score_threshold: f32,
    /// Raw hits a face needs before it is reported.
    pub min_neighbors: usize,
    /// Smallest face side in frame pixels.
    pub min_size: u32,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            score_threshold: 0.7,
            min_neighbors: 1,
            min_size: 40,
        }
    }
}

/// Locator used when no face model is installed. Every frame goes to the
/// whole-frame classifier path.
pub struct NoFaceLocator;

impl FaceLocator for NoFaceLocator {
    fn locate(&mut self, _frame: &RgbImage) -> Result<Vec<Rect>> {
        Ok(Vec::new())
    }
}

/// UltraFace (RFB-320) running on a grayscale copy of the frame.
pub struct UltraFaceLocator {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h
    params: LocatorParams,
}

impl UltraFaceLocator {
    pub fn new(model_path: &Path, params: LocatorParams) -> Result<Self> {
        info!("Loading face locator from {}", model_path.display());
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load face model {}", model_path.display()))?;

        let anchors = generate_anchors(INPUT_W as usize, INPUT_H as usize);
        Ok(Self {
            session,
            anchors,
            params,
        })
    }

    fn input_tensor(gray: &GrayImage) -> Result<Tensor<f32>> {
        let resized = image::imageops::resize(gray, INPUT_W, INPUT_H, FilterType::Triangle);
        let plane = (INPUT_W * INPUT_H) as usize;

        // NCHW with the luma plane repeated for each channel.
        let mut input_data = Vec::with_capacity(3 * plane);
        for _ in 0..3 {
            input_data.extend(resized.pixels().map(|p| (p[0] as f32 - 127.0) / 128.0));
        }

        let shape = vec![1, 3, INPUT_H as usize, INPUT_W as usize];
        Ok(Tensor::from_array((shape, input_data))?)
    }
}

impl FaceLocator for UltraFaceLocator {
    fn locate(&mut self, frame: &RgbImage) -> Result<Vec<Rect>> {
        let gray = image::imageops::grayscale(frame);
        let input = Self::input_tensor(&gray)?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (_scores_shape, scores) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes) = outputs["boxes"].try_extract_tensor::<f32>()?;

        let candidates = decode_candidates(&self.anchors, scores, boxes, self.params.score_threshold);

        let sx = frame.width() as f32 / INPUT_W as f32;
        let sy = frame.height() as f32 / INPUT_H as f32;
        let min_side = self.params.min_size as f32;

        let faces: Vec<Rect> = group_candidates(candidates, GROUP_IOU)
            .into_iter()
            .filter(|g| g.neighbors >= self.params.min_neighbors)
            .inspect(|g| trace!("Face group score {:.2} ({} hits)", g.score, g.neighbors))
            .map(|g| {
                Rect::new(
                    g.rect.x * sx,
                    g.rect.y * sy,
                    g.rect.width * sx,
                    g.rect.height * sy,
                )
            })
            .filter(|r| r.width >= min_side && r.height >= min_side)
            .collect();

        debug!("Located {} face(s)", faces.len());
        Ok(faces)
    }
}

/// A surviving box and how many raw boxes it absorbed (itself included).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Group {
    pub rect: Rect,
    pub score: f32,
    pub neighbors: usize,
}

/// Greedy non-maximum suppression. Candidates are visited best-first; each
/// suppressed box counts as a neighbor of the box that suppressed it.
pub(crate) fn group_candidates(mut candidates: Vec<(Rect, f32)>, iou_threshold: f32) -> Vec<Group> {
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut groups: Vec<Group> = Vec::new();
    for (rect, score) in candidates {
        match groups.iter_mut().find(|g| g.rect.iou(&rect) > iou_threshold) {
            Some(group) => group.neighbors += 1,
            None => groups.push(Group {
                rect,
                score,
                neighbors: 1,
            }),
        }
    }
    groups
}

/// Decodes every anchor above `threshold` into a box in model input pixels.
fn decode_candidates(
    anchors: &[(f32, f32, f32, f32)],
    scores_raw: &[f32],
    boxes_raw: &[f32],
    threshold: f32,
) -> Vec<(Rect, f32)> {
    // UltraFace variances
    let center_variance = 0.1;
    let size_variance = 0.2;

    let usable = anchors
        .len()
        .min(scores_raw.len() / 2)
        .min(boxes_raw.len() / 4);

    let mut out = Vec::new();
    for (i, &(ax, ay, aw, ah)) in anchors.iter().enumerate().take(usable) {
        let score = scores_raw[i * 2 + 1];
        if score <= threshold {
            continue;
        }

        let cx = boxes_raw[i * 4] * center_variance * aw + ax;
        let cy = boxes_raw[i * 4 + 1] * center_variance * ah + ay;
        let w = (boxes_raw[i * 4 + 2] * size_variance).exp() * aw;
        let h = (boxes_raw[i * 4 + 3] * size_variance).exp() * ah;

        let x = (cx - w / 2.0) * INPUT_W as f32;
        let y = (cy - h / 2.0) * INPUT_H as f32;
        out.push((Rect::new(x, y, w * INPUT_W as f32, h * INPUT_H as f32), score));
    }
    out
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];
    let mut anchors = Vec::new();

    let w = width as f32;
    let h = height as f32;

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let feature_h = (h / shrinkage as f32).ceil() as usize;
        let feature_w = (w / shrinkage as f32).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * shrinkage as f32 + shrinkage as f32 / 2.0) / w;
                let cy = (v as f32 * shrinkage as f32 + shrinkage as f32 / 2.0) / h;

                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}
