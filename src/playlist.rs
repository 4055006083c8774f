//! Which playlist goes with which emotion.

use crate::types::{ClassLabel, EmotionLabel};

pub const SPOTIFY_PLAYLIST_PREFIX: &str = "spotify:playlist:";

const PLAYLISTS: [(EmotionLabel, &str); 8] = [
    (EmotionLabel::Anger, "spotify:playlist:37i9dQZF1DX8tZsk68tuDw"), // Rock Hard
    (EmotionLabel::Content, "spotify:playlist:37i9dQZF1DX4WYpdgoIcn6"), // Chill Vibes
    (EmotionLabel::Disgust, "spotify:playlist:37i9dQZF1DX4VvfRBFClxm"), // Intense Beats
    (EmotionLabel::Fear, "spotify:playlist:37i9dQZF1DWXRqgorJj26U"),  // Calm Down
    (EmotionLabel::Happy, "spotify:playlist:37i9dQZF1DXdPec7aLTmlC"), // Happy Hits
    (EmotionLabel::Neutral, "spotify:playlist:37i9dQZF1DX4sWSpwq3LiO"), // Acoustic Chill
    (EmotionLabel::Sad, "spotify:playlist:37i9dQZF1DX7qK8ma5wgG1"),   // Sad Songs
    (EmotionLabel::Surprise, "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"), // Top Hits
];

pub fn playlist_for(label: EmotionLabel) -> Option<&'static str> {
    PLAYLISTS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, uri)| *uri)
}

/// Raw class ids have no playlist.
pub fn playlist_for_class(label: &ClassLabel) -> Option<&'static str> {
    label.emotion().and_then(playlist_for)
}

pub fn playlist_for_name(name: &str) -> Option<&'static str> {
    EmotionLabel::from_name(name).and_then(playlist_for)
}

/// `https://open.spotify.com/playlist/<id>` for a `spotify:playlist:<id>` URI.
pub fn web_url(uri: &str) -> Option<String> {
    uri.strip_prefix(SPOTIFY_PLAYLIST_PREFIX)
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://open.spotify.com/playlist/{}", id))
}
