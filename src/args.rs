use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// Configuration file, created with defaults when missing
    #[arg(long, default_value = AppConfig::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Emotion model to load instead of the configured one
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Mirror the camera output (`--mirror false` turns a configured mirror off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub mirror: Option<bool>,

    /// List available cameras
    #[arg(long)]
    pub list: bool,

    /// Forget the cached Spotify token before starting
    #[arg(long)]
    pub reauth: bool,
}

impl Args {
    /// The flag wins over the configured value when given.
    pub fn mirror_mode(&self, configured: bool) -> bool {
        self.mirror.unwrap_or(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["emotify"]);
        assert_eq!(args.cam_index, 0);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(args.model.is_none());
        assert!(!args.reauth);
        assert!(!args.mirror_mode(false));
        assert!(args.mirror_mode(true));
    }

    #[test]
    fn overrides() {
        let args = Args::parse_from(["emotify", "-c", "2", "--model", "m.onnx", "--mirror", "--reauth"]);
        assert_eq!(args.cam_index, 2);
        assert_eq!(args.model, Some(PathBuf::from("m.onnx")));
        assert!(args.mirror_mode(false));
        assert!(args.reauth);
    }

    #[test]
    fn mirror_flag_can_turn_configured_mirror_off() {
        let args = Args::parse_from(["emotify", "--mirror", "false"]);
        assert_eq!(args.mirror, Some(false));
        assert!(!args.mirror_mode(true));
    }
}
