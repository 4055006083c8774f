use crate::classifier::{top_prediction, DetectionParams, EmotionClassifier};
use crate::detector::FaceLocator;
use crate::overlay::{Annotator, FACE_COLOR, FRAME_COLOR};
use crate::types::{ClassLabel, DominantEmotion, Rect};
use anyhow::Result;
use image::RgbImage;
use tracing::trace;

/// Share of the larger face side added around each face before cropping.
pub const FACE_PADDING: f32 = 0.15;

pub struct FrameOutput {
    pub annotated: RgbImage,
    pub dominant: DominantEmotion,
}

/// Decides the frame's dominant emotion and returns an annotated copy.
///
/// Faces found by `locator` are padded, cropped and classified one by one.
/// If no face is found the whole frame is classified instead, for models
/// that were trained on full scenes. Either way a result only becomes
/// dominant when its confidence is strictly higher than the best so far.
///
/// Errors from the locator or classifier are returned as-is; callers are
/// expected to drop the frame and carry on.
pub fn aggregate(
    frame: &RgbImage,
    locator: &mut dyn FaceLocator,
    classifier: &mut dyn EmotionClassifier,
    params: &DetectionParams,
    annotator: &Annotator,
) -> Result<(RgbImage, DominantEmotion)> {
    let mut annotated = frame.clone();
    let mut dominant = DominantEmotion::none();

    let faces = locator.locate(frame)?;

    if faces.is_empty() {
        trace!("No faces, classifying whole frame");
        for det in classifier.classify(frame, params)? {
            let label = det.label();
            dominant.consider(label, det.confidence);
            annotator.draw_labeled_box(
                &mut annotated,
                &det.bbox,
                &format_label(label, det.confidence),
                FRAME_COLOR,
            );
        }
        return Ok((annotated, dominant));
    }

    for face in &faces {
        let region = padded_region(face, frame.width(), frame.height());

        let prediction = match region {
            Some((x, y, w, h)) => {
                let crop = image::imageops::crop_imm(frame, x, y, w, h).to_image();
                top_prediction(&classifier.classify(&crop, params)?)
            }
            None => None,
        };

        let text = match prediction {
            Some((class_id, confidence)) => {
                let label = ClassLabel::from_class_id(class_id);
                dominant.consider(label, confidence);
                format_label(label, confidence)
            }
            None => "...".to_string(),
        };

        let outline = match region {
            Some((x, y, w, h)) => Rect::new(x as f32, y as f32, w as f32, h as f32),
            None => *face,
        };
        annotator.draw_labeled_box(&mut annotated, &outline, &text, FACE_COLOR);
    }

    Ok((annotated, dominant))
}

/// Face rectangle grown by [`FACE_PADDING`] of its larger side and clamped
/// to the frame, as `(x, y, width, height)`. `None` when nothing is left.
pub fn padded_region(face: &Rect, frame_w: u32, frame_h: u32) -> Option<(u32, u32, u32, u32)> {
    let pad = (FACE_PADDING * face.width.max(face.height)).floor();
    let x1 = (face.x.floor() - pad).max(0.0);
    let y1 = (face.y.floor() - pad).max(0.0);
    let x2 = (face.x2().floor() + pad).min(frame_w as f32);
    let y2 = (face.y2().floor() + pad).min(frame_h as f32);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}

pub fn format_label(label: ClassLabel, confidence: f32) -> String {
    format!("{} {:.2}", label, confidence)
}

/// Locator, classifier and thresholds bundled for the frame loop.
pub struct EmotionPipeline {
    locator: Box<dyn FaceLocator>,
    classifier: Box<dyn EmotionClassifier>,
    params: DetectionParams,
    annotator: Annotator,
}

impl EmotionPipeline {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        classifier: Box<dyn EmotionClassifier>,
        params: DetectionParams,
        annotator: Annotator,
    ) -> Self {
        Self {
            locator,
            classifier,
            params,
            annotator,
        }
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameOutput> {
        let (annotated, dominant) = aggregate(
            frame,
            self.locator.as_mut(),
            self.classifier.as_mut(),
            &self.params,
            &self.annotator,
        )?;
        Ok(FrameOutput {
            annotated,
            dominant,
        })
    }
}
