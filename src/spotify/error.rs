use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spotify returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No Spotify playback device available")]
    NoDevice,

    #[error("No authorization code found in the pasted redirect")]
    MissingCode,

    #[error("Spotify client is not configured: {0}")]
    NotConfigured(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, SpotifyError>;
