use super::error::Result;
use super::{build_client, send_with_retry};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const API_BASE: &str = "https://api.spotify.com/v1";

/// A Spotify Connect device as listed by `/me/player/devices`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Serialize)]
struct PlayRequest<'a> {
    context_uri: &'a str,
}

/// The two playback calls the app needs.
pub trait PlaybackApi {
    fn list_devices(&self, access_token: &str) -> Result<Vec<Device>>;
    fn start_playback(&self, access_token: &str, device_id: &str, context_uri: &str) -> Result<()>;
}

pub struct SpotifyWebApi {
    client: Client,
}

impl SpotifyWebApi {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

impl PlaybackApi for SpotifyWebApi {
    fn list_devices(&self, access_token: &str) -> Result<Vec<Device>> {
        let url = format!("{}/me/player/devices", API_BASE);
        let response = send_with_retry(|| self.client.get(&url).bearer_auth(access_token))?;
        let body: DevicesResponse = response.json()?;
        debug!("Spotify reports {} device(s)", body.devices.len());
        Ok(body.devices)
    }

    fn start_playback(&self, access_token: &str, device_id: &str, context_uri: &str) -> Result<()> {
        let url = Url::parse_with_params(
            &format!("{}/me/player/play", API_BASE),
            &[("device_id", device_id)],
        )?;
        let body = PlayRequest { context_uri };
        send_with_retry(|| {
            self.client
                .put(url.clone())
                .bearer_auth(access_token)
                .json(&body)
        })?;
        info!("Started {} on device {}", context_uri, device_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_list() {
        let json = r#"{"devices":[
            {"id":"abc","is_active":false,"name":"Kitchen","type":"Speaker","volume_percent":40},
            {"id":null,"is_active":true,"name":"Restricted","type":"Computer"}
        ]}"#;
        let body: DevicesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.devices.len(), 2);
        assert_eq!(body.devices[0].id.as_deref(), Some("abc"));
        assert_eq!(body.devices[0].kind, "Speaker");
        assert!(body.devices[1].is_active);
        assert_eq!(body.devices[1].id, None);
    }

    #[test]
    fn missing_device_list_is_empty() {
        let body: DevicesResponse = serde_json::from_str("{}").unwrap();
        assert!(body.devices.is_empty());
    }

    #[test]
    fn play_body_names_context() {
        let body = serde_json::to_string(&PlayRequest { context_uri: "spotify:playlist:x" }).unwrap();
        assert_eq!(body, r#"{"context_uri":"spotify:playlist:x"}"#);
    }
}
