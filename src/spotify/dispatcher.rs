use super::api::{Device, PlaybackApi};
use super::credentials::CredentialCache;
use super::error::{Result, SpotifyError};
use super::oauth::{now_epoch, TokenRecord};
use crate::launcher::UriLauncher;
use tracing::{info, warn};

/// How a capture's playlist ended up playing (or not).
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// The Web API started playback on this device.
    Played { device_id: String },
    /// The API path failed; the playlist was handed to the OS instead.
    FallbackOpened { reason: String },
    /// Neither path worked.
    FallbackFailed { reason: String, fallback_error: String },
}

impl PlaybackOutcome {
    pub fn played_via_api(&self) -> bool {
        matches!(self, PlaybackOutcome::Played { .. })
    }
}

/// First active device, otherwise the first one listed.
pub fn choose_device(devices: &[Device]) -> Option<&Device> {
    devices
        .iter()
        .find(|d| d.is_active)
        .or_else(|| devices.first())
}

pub struct PlaybackDispatcher {
    api: Box<dyn PlaybackApi>,
    launcher: Box<dyn UriLauncher>,
}

impl PlaybackDispatcher {
    pub fn new(api: Box<dyn PlaybackApi>, launcher: Box<dyn UriLauncher>) -> Self {
        Self { api, launcher }
    }

    pub fn play(&self, credentials: &CredentialCache, token: &TokenRecord, playlist_uri: &str) -> PlaybackOutcome {
        self.play_at(credentials, token, playlist_uri, now_epoch())
    }

    /// Tries the Web API and, on any failure, opens the playlist through the
    /// launcher exactly once.
    pub fn play_at(
        &self,
        credentials: &CredentialCache,
        token: &TokenRecord,
        playlist_uri: &str,
        now: i64,
    ) -> PlaybackOutcome {
        match self.play_via_api(credentials, token, playlist_uri, now) {
            Ok(device_id) => PlaybackOutcome::Played { device_id },
            Err(e) => {
                let reason = e.to_string();
                warn!("Playback via API failed: {}", reason);
                match self.launcher.launch(playlist_uri) {
                    Ok(()) => {
                        info!("Opened {} locally", playlist_uri);
                        PlaybackOutcome::FallbackOpened { reason }
                    }
                    Err(fallback) => PlaybackOutcome::FallbackFailed {
                        reason,
                        fallback_error: format!("{:#}", fallback),
                    },
                }
            }
        }
    }

    fn play_via_api(
        &self,
        credentials: &CredentialCache,
        token: &TokenRecord,
        playlist_uri: &str,
        now: i64,
    ) -> Result<String> {
        let token = credentials.refresh_if_expired(token, now)?;
        let devices = self.api.list_devices(&token.access_token)?;
        let device = choose_device(&devices).ok_or(SpotifyError::NoDevice)?;
        let device_id = device.id.clone().ok_or(SpotifyError::NoDevice)?;
        info!("Playing on {} ({})", device.name, device.kind);
        self.api
            .start_playback(&token.access_token, &device_id, playlist_uri)?;
        Ok(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::credentials::AuthPrompt;
    use crate::spotify::oauth::AuthClient;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    const NOW: i64 = 1_700_000_000;
    const URI: &str = "spotify:playlist:37i9dQZF1DXdPec7aLTmlC";

    struct FakeApi {
        devices: Vec<Device>,
        played: Rc<RefCell<Vec<(String, String)>>>,
        fail_play: bool,
    }

    impl PlaybackApi for FakeApi {
        fn list_devices(&self, _access_token: &str) -> Result<Vec<Device>> {
            Ok(self.devices.clone())
        }

        fn start_playback(&self, _access_token: &str, device_id: &str, context_uri: &str) -> Result<()> {
            if self.fail_play {
                return Err(SpotifyError::Api {
                    status: 403,
                    message: "Player command failed: Premium required".into(),
                });
            }
            self.played
                .borrow_mut()
                .push((device_id.to_string(), context_uri.to_string()));
            Ok(())
        }
    }

    struct FakeLauncher {
        launched: Rc<RefCell<Vec<String>>>,
        fails: bool,
    }

    impl UriLauncher for FakeLauncher {
        fn launch(&self, uri: &str) -> anyhow::Result<()> {
            self.launched.borrow_mut().push(uri.to_string());
            if self.fails {
                return Err(anyhow!("no handler for spotify:"));
            }
            Ok(())
        }
    }

    struct NoAuth;

    impl AuthClient for NoAuth {
        fn authorize_url(&self) -> Result<String> {
            Err(SpotifyError::NotConfigured("test".into()))
        }
        fn exchange_code(&self, _code: &str) -> Result<TokenRecord> {
            Err(SpotifyError::NotConfigured("test".into()))
        }
        fn refresh(&self, _refresh_token: &str) -> Result<TokenRecord> {
            Err(SpotifyError::NotConfigured("test".into()))
        }
    }

    struct NoPrompt;

    impl AuthPrompt for NoPrompt {
        fn request_redirect(&self, _url: &str) -> Result<String> {
            Err(SpotifyError::MissingCode)
        }
    }

    fn device(id: Option<&str>, active: bool) -> Device {
        Device {
            id: id.map(str::to_string),
            name: "Desk".into(),
            is_active: active,
            kind: "Computer".into(),
        }
    }

    fn token(expires_at: i64) -> TokenRecord {
        TokenRecord {
            access_token: "tok".into(),
            refresh_token: Some("ref".into()),
            expires_at,
            token_type: None,
            scope: None,
            expires_in: None,
        }
    }

    struct Harness {
        dispatcher: PlaybackDispatcher,
        credentials: CredentialCache,
        played: Rc<RefCell<Vec<(String, String)>>>,
        launched: Rc<RefCell<Vec<String>>>,
        _dir: tempfile::TempDir,
    }

    fn harness(devices: Vec<Device>, fail_play: bool, launcher_fails: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let played = Rc::new(RefCell::new(Vec::new()));
        let launched = Rc::new(RefCell::new(Vec::new()));
        let dispatcher = PlaybackDispatcher::new(
            Box::new(FakeApi {
                devices,
                played: played.clone(),
                fail_play,
            }),
            Box::new(FakeLauncher {
                launched: launched.clone(),
                fails: launcher_fails,
            }),
        );
        let credentials = CredentialCache::new(
            dir.path().join(".cache-spotify"),
            Box::new(NoAuth),
            Box::new(NoPrompt),
        );
        Harness {
            dispatcher,
            credentials,
            played,
            launched,
            _dir: dir,
        }
    }

    #[test]
    fn prefers_active_device() {
        let devices = vec![device(Some("a"), false), device(Some("b"), true)];
        assert_eq!(choose_device(&devices).unwrap().id.as_deref(), Some("b"));
        let devices = vec![device(Some("a"), false), device(Some("b"), false)];
        assert_eq!(choose_device(&devices).unwrap().id.as_deref(), Some("a"));
        assert!(choose_device(&[]).is_none());
    }

    #[test]
    fn plays_on_active_device() {
        let h = harness(vec![device(Some("a"), false), device(Some("b"), true)], false, false);
        let outcome = h.dispatcher.play_at(&h.credentials, &token(NOW + 3600), URI, NOW);
        assert_eq!(outcome, PlaybackOutcome::Played { device_id: "b".into() });
        assert!(outcome.played_via_api());
        assert_eq!(*h.played.borrow(), vec![("b".to_string(), URI.to_string())]);
        assert!(h.launched.borrow().is_empty());
    }

    #[test]
    fn empty_device_list_falls_back_once() {
        let h = harness(Vec::new(), false, false);
        let outcome = h.dispatcher.play_at(&h.credentials, &token(NOW + 3600), URI, NOW);
        assert!(!outcome.played_via_api());
        assert!(matches!(outcome, PlaybackOutcome::FallbackOpened { .. }));
        assert_eq!(*h.launched.borrow(), vec![URI.to_string()]);
    }

    #[test]
    fn device_without_id_falls_back() {
        let h = harness(vec![device(None, true)], false, false);
        let outcome = h.dispatcher.play_at(&h.credentials, &token(NOW + 3600), URI, NOW);
        assert!(!outcome.played_via_api());
        assert!(h.played.borrow().is_empty());
        assert_eq!(h.launched.borrow().len(), 1);
    }

    #[test]
    fn api_error_and_failed_fallback_are_both_reported() {
        let h = harness(vec![device(Some("a"), true)], true, true);
        match h.dispatcher.play_at(&h.credentials, &token(NOW + 3600), URI, NOW) {
            PlaybackOutcome::FallbackFailed { reason, fallback_error } => {
                assert!(reason.contains("Premium required"));
                assert!(fallback_error.contains("no handler"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(h.launched.borrow().len(), 1);
    }

    #[test]
    fn failed_refresh_goes_to_fallback() {
        let h = harness(vec![device(Some("a"), true)], false, false);
        let outcome = h.dispatcher.play_at(&h.credentials, &token(NOW + 5), URI, NOW);
        assert!(matches!(outcome, PlaybackOutcome::FallbackOpened { .. }));
        assert!(h.played.borrow().is_empty());
        assert_eq!(h.launched.borrow().len(), 1);
    }
}
