use std::fmt;

/// Axis-aligned rectangle in pixel coordinates of the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union. Zero when either box is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.x2().min(other.x2());
        let iy2 = self.y2().min(other.y2());
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One box produced by the emotion model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Rect,
    pub class_id: usize,
    pub confidence: f32,
}

impl Detection {
    pub fn label(&self) -> ClassLabel {
        ClassLabel::from_class_id(self.class_id)
    }
}

/// Emotion classes in the order the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmotionLabel {
    Anger,
    Content,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 8] = [
        EmotionLabel::Anger,
        EmotionLabel::Content,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Neutral,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
    ];

    pub fn from_class_id(class_id: usize) -> Option<Self> {
        Self::ALL.get(class_id).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Anger => "anger",
            EmotionLabel::Content => "content",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a class id means to us. Ids past the label table keep their number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    Emotion(EmotionLabel),
    Unknown(usize),
}

impl ClassLabel {
    pub fn from_class_id(class_id: usize) -> Self {
        match EmotionLabel::from_class_id(class_id) {
            Some(label) => ClassLabel::Emotion(label),
            None => ClassLabel::Unknown(class_id),
        }
    }

    pub fn emotion(&self) -> Option<EmotionLabel> {
        match self {
            ClassLabel::Emotion(label) => Some(*label),
            ClassLabel::Unknown(_) => None,
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Emotion(label) => f.write_str(label.as_str()),
            ClassLabel::Unknown(id) => write!(f, "{}", id),
        }
    }
}

/// Strongest emotion seen in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DominantEmotion {
    pub label: Option<ClassLabel>,
    pub confidence: f32,
}

impl DominantEmotion {
    pub fn none() -> Self {
        Self::default()
    }

    /// Takes the candidate only if it beats the current confidence outright,
    /// so on a tie the earlier candidate stays dominant.
    pub fn consider(&mut self, label: ClassLabel, confidence: f32) -> bool {
        if confidence > self.confidence {
            self.label = Some(label);
            self.confidence = confidence;
            true
        } else {
            false
        }
    }

    pub fn is_none(&self) -> bool {
        self.label.is_none()
    }
}
