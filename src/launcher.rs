use crate::playlist::{web_url, SPOTIFY_PLAYLIST_PREFIX};
use anyhow::{bail, Context, Result};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Opens a URI outside the app (Spotify client, browser, ...).
pub trait UriLauncher {
    fn launch(&self, uri: &str) -> Result<()>;
}

/// One command to try.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchStep {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchStep {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn run(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Desktop flavor, which decides the commands that open a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// The registered URI handler. On Windows this goes through `start`,
    /// since `explorer` exits non-zero even after opening the URI.
    fn os_handler(self, uri: &str) -> LaunchStep {
        match self {
            Platform::MacOs => LaunchStep::new("open", &[uri]),
            Platform::Windows => LaunchStep::new("cmd", &["/C", "start", "", uri]),
            Platform::Unix => LaunchStep::new("xdg-open", &[uri]),
        }
    }

    fn shell_open(self, uri: &str) -> LaunchStep {
        match self {
            Platform::Windows => LaunchStep::new("rundll32", &["url.dll,FileProtocolHandler", uri]),
            Platform::MacOs | Platform::Unix => LaunchStep::new("sh", &["-c", "open \"$1\"", "sh", uri]),
        }
    }
}

/// Hands the URI to the desktop: the OS URI handler first, then a plain
/// `open` command, and for Spotify playlists finally the web player URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn plan(uri: &str) -> Vec<LaunchStep> {
        Self::plan_for(Platform::current(), uri)
    }

    pub fn plan_for(platform: Platform, uri: &str) -> Vec<LaunchStep> {
        if !uri.starts_with(SPOTIFY_PLAYLIST_PREFIX) {
            return vec![platform.os_handler(uri)];
        }
        let mut steps = vec![platform.os_handler(uri), platform.shell_open(uri)];
        if let Some(url) = web_url(uri) {
            steps.push(platform.os_handler(&url));
        }
        steps
    }
}

impl UriLauncher for SystemLauncher {
    fn launch(&self, uri: &str) -> Result<()> {
        let mut last_error = None;
        for step in Self::plan(uri) {
            debug!("Trying {} {:?}", step.program, step.args);
            match step.run() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("{:#}", e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e.context(format!("Could not open {}", uri))),
            None => bail!("Nothing to try for {}", uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_plan_ends_with_web_player() {
        let steps = SystemLauncher::plan("spotify:playlist:37i9dQZF1DXdPec7aLTmlC");
        assert_eq!(steps.len(), 3);
        assert!(steps[0].args.iter().any(|a| a == "spotify:playlist:37i9dQZF1DXdPec7aLTmlC"));
        assert!(steps[2]
            .args
            .iter()
            .any(|a| a == "https://open.spotify.com/playlist/37i9dQZF1DXdPec7aLTmlC"));
    }

    #[test]
    fn windows_opens_through_start_once() {
        let uri = "spotify:playlist:37i9dQZF1DXdPec7aLTmlC";
        let steps = SystemLauncher::plan_for(Platform::Windows, uri);
        assert_eq!(steps[0], LaunchStep::new("cmd", &["/C", "start", "", uri]));
        assert!(steps.iter().all(|s| s.program != "explorer"));
        assert_eq!(steps.iter().filter(|s| s.program == "cmd").count(), 2);
        assert_eq!(steps[1].program, "rundll32");
    }

    #[test]
    fn unix_plan_uses_xdg_open() {
        let steps = SystemLauncher::plan_for(Platform::Unix, "https://example.com/x");
        assert_eq!(steps, vec![LaunchStep::new("xdg-open", &["https://example.com/x"])]);
    }

    #[test]
    fn other_uris_are_opened_directly() {
        let steps = SystemLauncher::plan("https://example.com/x");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].args.last().map(String::as_str), Some("https://example.com/x"));
    }
}
