use super::error::{Result, SpotifyError};
use super::oauth::{now_epoch, parse_response_code, AuthClient, TokenRecord};
use crate::launcher::UriLauncher;
use colored::*;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Gets the authorization redirect back from the user.
pub trait AuthPrompt {
    fn request_redirect(&self, authorize_url: &str) -> Result<String>;
}

/// Prints the authorization URL, tries to open it, and reads the pasted
/// redirect URL from stdin.
pub struct ConsolePrompt {
    launcher: Option<Box<dyn UriLauncher>>,
}

impl ConsolePrompt {
    pub fn new(launcher: Option<Box<dyn UriLauncher>>) -> Self {
        Self { launcher }
    }
}

impl AuthPrompt for ConsolePrompt {
    fn request_redirect(&self, authorize_url: &str) -> Result<String> {
        println!("{}", "Opening browser for Spotify authorization.".cyan());
        println!("{}", authorize_url);
        if let Some(launcher) = &self.launcher {
            if let Err(e) = launcher.launch(authorize_url) {
                warn!("Could not open browser: {:#}", e);
            }
        }
        println!("After authorizing, Spotify redirects to the redirect URI.");
        println!("Copy the full redirect URL from the browser address bar and paste it here.");
        print!("Paste redirect URL: ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// The single on-disk OAuth credential plus the logic to keep it valid.
pub struct CredentialCache {
    path: PathBuf,
    auth: Box<dyn AuthClient>,
    prompt: Box<dyn AuthPrompt>,
}

impl CredentialCache {
    pub fn new(path: impl Into<PathBuf>, auth: Box<dyn AuthClient>, prompt: Box<dyn AuthPrompt>) -> Self {
        Self {
            path: path.into(),
            auth,
            prompt,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached token, if the file exists and parses. A broken file counts as
    /// no file.
    pub fn load(&self) -> Option<TokenRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed reading token cache {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, token: &TokenRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        debug!("Token cache written to {}", self.path.display());
        Ok(())
    }

    /// A failed write only costs a re-authorization next run.
    fn persist(&self, token: &TokenRecord) {
        if let Err(e) = self.store(token) {
            warn!("Failed writing token cache: {}", e);
        }
    }

    pub fn ensure_credential(&self) -> Result<TokenRecord> {
        self.ensure_credential_at(now_epoch())
    }

    /// Returns a token good for at least another minute: the cached one,
    /// a silently refreshed one, or a fresh one from the interactive flow.
    pub fn ensure_credential_at(&self, now: i64) -> Result<TokenRecord> {
        if let Some(token) = self.load() {
            if !token.is_expired(now) {
                debug!("Using cached token ({}s left)", token.seconds_left(now));
                return Ok(token);
            }

            match token.refresh_token.as_deref() {
                Some(refresh_token) => match self.auth.refresh(refresh_token) {
                    Ok(fresh) => {
                        info!("Access token refreshed");
                        self.persist(&fresh);
                        return Ok(fresh);
                    }
                    Err(e) => warn!("Refresh failed: {}", e),
                },
                None => info!("Cached token expired and has no refresh token"),
            }
        }

        self.authorize_interactively()
    }

    /// Refreshes `token` when it is expired by the same 60s rule, persisting
    /// the result.
    pub fn refresh_if_expired(&self, token: &TokenRecord, now: i64) -> Result<TokenRecord> {
        if !token.is_expired(now) {
            return Ok(token.clone());
        }
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| SpotifyError::Authorization("token expired and has no refresh token".into()))?;
        let fresh = self.auth.refresh(refresh_token)?;
        self.persist(&fresh);
        Ok(fresh)
    }

    /// Deletes the cache so the next [`ensure_credential`](Self::ensure_credential)
    /// goes through the browser. Returns whether a file was removed.
    pub fn force_reauth(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted token cache {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn authorize_interactively(&self) -> Result<TokenRecord> {
        let url = self.auth.authorize_url()?;
        let pasted = self.prompt.request_redirect(&url)?;
        let code = parse_response_code(&pasted)?;
        let token = self.auth.exchange_code(&code)?;
        self.persist(&token);
        Ok(token)
    }
}
