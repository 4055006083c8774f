use crate::session::{CaptureOutcome, CaptureRequest, Session};
use crate::spotify::{CredentialCache, PlaybackDispatcher, PlaybackOutcome};
use crate::types::ClassLabel;
use colored::*;
use tracing::{error, info};

/// Result of one press of the capture key.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureReport {
    NothingToCapture,
    Unmapped(ClassLabel),
    AuthorizationFailed(String),
    Attempted {
        request: CaptureRequest,
        outcome: PlaybackOutcome,
    },
}

impl CaptureReport {
    /// Only a real playback attempt ends the run; the other cases let the
    /// user try again.
    pub fn attempted(&self) -> bool {
        matches!(self, CaptureReport::Attempted { .. })
    }

    pub fn print(&self) {
        match self {
            CaptureReport::NothingToCapture => {
                println!("{}", "No emotion detected yet. Keep your face in frame and try again.".yellow());
            }
            CaptureReport::Unmapped(label) => {
                println!("{}", format!("No playlist mapped for emotion: {}", label).yellow());
            }
            CaptureReport::AuthorizationFailed(reason) => {
                println!("{}", format!("Spotify authorization failed: {}", reason).red());
                println!("Press R to re-authorize and try again.");
            }
            CaptureReport::Attempted { outcome, .. } => match outcome {
                PlaybackOutcome::Played { .. } => {
                    println!("{}", "Playback started via Spotify API.".green());
                }
                PlaybackOutcome::FallbackOpened { .. } => {
                    println!("{}", "Playback fallback used (opened app/web).".yellow());
                }
                PlaybackOutcome::FallbackFailed { reason, fallback_error } => {
                    println!("{}", format!("Playback failed: {}", reason).red());
                    println!("{}", format!("Could not open the playlist either: {}", fallback_error).red());
                }
            },
        }
    }
}

/// Turns the session's current reading into playback: playlist lookup,
/// credential, then the dispatcher.
pub fn capture(session: &Session, credentials: &CredentialCache, dispatcher: &PlaybackDispatcher) -> CaptureReport {
    let request = match session.capture() {
        CaptureOutcome::NothingToCapture => return CaptureReport::NothingToCapture,
        CaptureOutcome::Unmapped(label) => return CaptureReport::Unmapped(label),
        CaptureOutcome::Ready(request) => request,
    };

    println!(
        "{}",
        format!("Captured emotion: {} (conf {:.2})", request.label, request.confidence).cyan()
    );
    info!("Playlist for {}: {}", request.label, request.playlist_uri);

    let token = match credentials.ensure_credential() {
        Ok(token) => token,
        Err(e) => {
            error!("Authorization failed: {}", e);
            return CaptureReport::AuthorizationFailed(e.to_string());
        }
    };

    let outcome = dispatcher.play(credentials, &token, request.playlist_uri);
    CaptureReport::Attempted { request, outcome }
}
