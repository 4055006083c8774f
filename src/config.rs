use crate::classifier::DetectionParams;
use crate::detector::LocatorParams;
use crate::spotify::oauth::{OAuthSettings, SCOPE};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub locator: LocatorConfig,
    pub spotify: SpotifyConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub image_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Face detector model. When the file is missing the whole frame is
    /// classified instead.
    pub model_path: PathBuf,
    pub score_threshold: f32,
    pub min_neighbors: usize,
    pub min_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub cache_path: PathBuf,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub mirror_mode: bool,
    pub exit_after_capture: bool,
    pub font_family: String,
    pub font_size_pt: f32,
    pub text_scale: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectionParams::default();
        Self {
            model_path: PathBuf::from("models/emotion.onnx"),
            confidence_threshold: params.confidence_threshold,
            iou_threshold: params.iou_threshold,
            image_size: params.image_size,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let params = LocatorParams::default();
        Self {
            model_path: PathBuf::from("models/face_detection.onnx"),
            score_threshold: params.score_threshold,
            min_neighbors: params.min_neighbors,
            min_size: params.min_size,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            cache_path: PathBuf::from(".cache-spotify"),
            request_timeout_secs: 10,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mirror_mode: false,
            exit_after_capture: true,
            font_family: "Monospace".to_string(),
            font_size_pt: 18.0,
            text_scale: 2,
        }
    }
}

impl DetectionConfig {
    pub fn params(&self) -> DetectionParams {
        DetectionParams {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            image_size: self.image_size,
        }
    }
}

impl LocatorConfig {
    pub fn params(&self) -> LocatorParams {
        LocatorParams {
            score_threshold: self.score_threshold,
            min_neighbors: self.min_neighbors,
            min_size: self.min_size,
        }
    }
}

impl SpotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn oauth_settings(&self) -> OAuthSettings {
        OAuthSettings {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: SCOPE.to_string(),
        }
    }

    /// `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and `SPOTIFY_REDIRECT_URI`
    /// win over the file so secrets can stay out of it.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = pick("SPOTIFY_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = pick("SPOTIFY_CLIENT_SECRET") {
            self.client_secret = v;
        }
        if let Some(v) = pick("SPOTIFY_REDIRECT_URI") {
            self.redirect_uri = v;
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Loads `path`, creating it with defaults when missing. The file is
    /// always written back so newly added fields show up in it.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save(path)?;
        Ok(config)
    }

    /// Rejects values the models cannot run with.
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if detection.image_size == 0 {
            bail!("detection.image_size must be greater than 0");
        }
        for (name, value) in [
            ("detection.confidence_threshold", detection.confidence_threshold),
            ("detection.iou_threshold", detection.iou_threshold),
            ("locator.score_threshold", self.locator.score_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be between 0 and 1, got {}", name, value);
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(config.detection.confidence_threshold, 0.45);
        assert_eq!(config.spotify.cache_path, PathBuf::from(".cache-spotify"));
        assert!(!config.ui.mirror_mode);
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"detection":{"confidence_threshold":0.6},"ui":{"mirror_mode":true}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.detection.confidence_threshold, 0.6);
        assert_eq!(config.detection.iou_threshold, 0.45);
        assert!(config.ui.mirror_mode);
        assert!(config.ui.exit_after_capture);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("request_timeout_secs"));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn zero_image_size_is_rejected_and_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let original = r#"{"detection":{"image_size":0}}"#;
        fs::write(&path, original).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("image_size"));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.detection.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_non_empty_values_only() {
        let vars: HashMap<&str, &str> = [("SPOTIFY_CLIENT_ID", "from-env"), ("SPOTIFY_CLIENT_SECRET", "  ")]
            .into_iter()
            .collect();
        let mut spotify = SpotifyConfig {
            client_secret: "file-secret".into(),
            ..SpotifyConfig::default()
        };
        spotify.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(spotify.client_id, "from-env");
        assert_eq!(spotify.client_secret, "file-secret");
        assert_eq!(spotify.oauth_settings().scope, SCOPE);
    }
}
