use anyhow::{anyhow, Context, Result};
use colored::*;
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};
use std::time::Duration;
use tracing::{info, warn};

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn new(index: u32) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .with_context(|| format!("Failed to open camera {}", index))?;

        camera
            .open_stream()
            .map_err(|e| anyhow!(e))
            .context("Failed to open camera stream")?;

        println!("{}", format!("Opened camera: {}", camera.info().human_name()).green());
        info!("Camera format: {}", camera.camera_format());

        Ok(Self { camera })
    }

    pub fn capture(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| anyhow!(e))
            .context("Failed to get frame")?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow!(e))
            .context("Failed to decode frame")?;
        Ok(decoded)
    }

    pub fn width(&self) -> u32 {
        self.camera.resolution().width()
    }

    pub fn height(&self) -> u32 {
        self.camera.resolution().height()
    }
}

/// Consecutive frame failures after which the camera counts as gone.
pub const MAX_FRAME_FAILURES: u32 = 50;
const FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Tracks back-to-back capture failures so the frame loop can back off and
/// eventually give up.
#[derive(Debug, Default)]
pub struct FrameFailures {
    consecutive: u32,
}

impl FrameFailures {
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Logs `error` and returns how long to wait before the next read, or
    /// an error once the camera has failed too many times in a row.
    pub fn record_failure(&mut self, error: &anyhow::Error) -> Result<Duration> {
        self.consecutive += 1;
        warn!("Frame read failed ({}/{}): {:#}", self.consecutive, MAX_FRAME_FAILURES, error);
        if self.consecutive >= MAX_FRAME_FAILURES {
            return Err(anyhow!("Camera unavailable: {:#}", error));
        }
        Ok(FAILURE_BACKOFF)
    }
}

/// Prints the cameras the OS reports, for `--list`.
pub fn list_cameras() -> Result<()> {
    let cameras = nokhwa::query(ApiBackend::Auto).context("Failed to enumerate cameras")?;
    println!("{}", "Available Cameras:".bold());
    println!("{:<5} | {:<30} | {:<10}", "Index", "Name", "Misc");
    println!("{}", "-".repeat(60));
    for cam in cameras {
        println!("{:<5} | {:<30} | {:?}", cam.index(), cam.human_name(), cam.misc());
    }
    Ok(())
}
