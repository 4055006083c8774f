use super::error::{Result, SpotifyError};
use super::{build_client, send_with_retry};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use url::Url;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SCOPE: &str = "user-read-playback-state user-modify-playback-state user-read-currently-playing";

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Cached OAuth credential. Field names match the token cache written by
/// spotipy so an existing `.cache-spotify` file keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl TokenRecord {
    pub fn seconds_left(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.seconds_left(now) < EXPIRY_MARGIN_SECS
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// A refresh response may omit the refresh token, in which case the one
    /// we refreshed with stays valid.
    fn into_record(self, now: i64, previous_refresh: Option<&str>) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: now + self.expires_in,
            token_type: self.token_type,
            scope: self.scope,
            expires_in: Some(self.expires_in),
        }
    }
}

/// Authorization-code OAuth against the Spotify accounts service.
pub trait AuthClient {
    fn authorize_url(&self) -> Result<String>;
    fn exchange_code(&self, code: &str) -> Result<TokenRecord>;
    fn refresh(&self, refresh_token: &str) -> Result<TokenRecord>;
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
}

pub struct SpotifyAuth {
    client: Client,
    settings: OAuthSettings,
}

impl SpotifyAuth {
    pub fn new(settings: OAuthSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            settings,
        })
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.settings.client_id.is_empty() {
            return Err(SpotifyError::NotConfigured("client_id is empty".into()));
        }
        if self.settings.client_secret.is_empty() {
            return Err(SpotifyError::NotConfigured("client_secret is empty".into()));
        }
        Ok(())
    }

    fn request_token(&self, form: &[(&str, &str)], previous_refresh: Option<&str>) -> Result<TokenRecord> {
        self.ensure_configured()?;
        let response = send_with_retry(|| {
            self.client
                .post(TOKEN_URL)
                .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
                .form(form)
        })?;
        let body: TokenResponse = response.json()?;
        Ok(body.into_record(now_epoch(), previous_refresh))
    }
}

impl AuthClient for SpotifyAuth {
    fn authorize_url(&self) -> Result<String> {
        if self.settings.client_id.is_empty() {
            return Err(SpotifyError::NotConfigured("client_id is empty".into()));
        }
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", self.settings.scope.as_str()),
                ("show_dialog", "false"),
            ],
        )?;
        Ok(url.into())
    }

    fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
        info!("Exchanging authorization code for a token");
        self.request_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ],
            None,
        )
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        debug!("Refreshing access token");
        self.request_token(
            &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
            Some(refresh_token),
        )
    }
}

/// Accepts either the full redirect URL the browser landed on or just the
/// code itself.
pub fn parse_response_code(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SpotifyError::MissingCode);
    }

    match Url::parse(input) {
        Ok(url) => {
            let mut error = None;
            for (key, value) in url.query_pairs() {
                match key.as_ref() {
                    "code" if !value.is_empty() => return Ok(value.into_owned()),
                    "error" => error = Some(value.into_owned()),
                    _ => {}
                }
            }
            match error {
                Some(e) => Err(SpotifyError::Authorization(e)),
                None => Err(SpotifyError::MissingCode),
            }
        }
        Err(_) => {
            let code = input.strip_prefix("code=").unwrap_or(input);
            if code.is_empty() || code.contains(char::is_whitespace) {
                Err(SpotifyError::MissingCode)
            } else {
                Ok(code.to_string())
            }
        }
    }
}
