use crate::playlist::playlist_for_class;
use crate::types::{ClassLabel, DominantEmotion};

/// A capture that resolved to a playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub label: ClassLabel,
    pub confidence: f32,
    pub playlist_uri: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// No emotion seen yet; the user should try again.
    NothingToCapture,
    Unmapped(ClassLabel),
    Ready(CaptureRequest),
}

/// Latest emotion reading, carried from frame to frame so a capture always
/// sees the most recent real detection.
#[derive(Debug, Default)]
pub struct Session {
    current: DominantEmotion,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &DominantEmotion {
        &self.current
    }

    /// Frames that detected nothing leave the previous reading in place.
    pub fn observe(&mut self, frame: &DominantEmotion) {
        if frame.label.is_some() {
            self.current = *frame;
        }
    }

    pub fn reset(&mut self) {
        self.current = DominantEmotion::none();
    }

    pub fn capture(&self) -> CaptureOutcome {
        self.capture_with(playlist_for_class)
    }

    /// Same as [`Session::capture`] with a custom lookup.
    pub fn capture_with<F>(&self, lookup: F) -> CaptureOutcome
    where
        F: FnOnce(&ClassLabel) -> Option<&'static str>,
    {
        let Some(label) = self.current.label else {
            return CaptureOutcome::NothingToCapture;
        };

        match lookup(&label) {
            Some(playlist_uri) => CaptureOutcome::Ready(CaptureRequest {
                label,
                confidence: self.current.confidence,
                playlist_uri,
            }),
            None => CaptureOutcome::Unmapped(label),
        }
    }

    /// Text for the on-screen status line.
    pub fn status_line(&self) -> String {
        match self.current.label {
            Some(label) => format!("Current: {} (conf {:.2})", label, self.current.confidence),
            None => format!("Current: None (conf {:.2})", self.current.confidence),
        }
    }
}
