use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process::ExitCode;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use emotify::app::capture;
use emotify::args::Args;
use emotify::camera::{list_cameras, CameraSource, FrameFailures};
use emotify::classifier::YoloEmotionModel;
use emotify::config::AppConfig;
use emotify::detector::{FaceLocator, NoFaceLocator, UltraFaceLocator};
use emotify::launcher::SystemLauncher;
use emotify::output::{Control, WindowOutput};
use emotify::overlay::{Annotator, STATUS_COLOR};
use emotify::pipeline::EmotionPipeline;
use emotify::session::Session;
use emotify::spotify::{ConsolePrompt, CredentialCache, PlaybackDispatcher, SpotifyAuth, SpotifyWebApi};
use emotify::ttf::FontRenderer;

fn build_locator(config: &AppConfig) -> Result<Box<dyn FaceLocator>> {
    let path = &config.locator.model_path;
    if !path.exists() {
        warn!(
            "Face model not found at {}; classifying whole frames",
            path.display()
        );
        return Ok(Box::new(NoFaceLocator));
    }
    Ok(Box::new(UltraFaceLocator::new(path, config.locator.params())?))
}

fn run(args: Args) -> Result<()> {
    if args.list {
        return list_cameras();
    }

    // 0. Config
    let mut config = AppConfig::load(&args.config)?;
    if let Some(model) = args.model.clone() {
        config.detection.model_path = model;
    }
    config.spotify.apply_env();
    let mirror_mode = args.mirror_mode(config.ui.mirror_mode);

    // 1. Spotify
    let credentials = CredentialCache::new(
        config.spotify.cache_path.clone(),
        Box::new(SpotifyAuth::new(config.spotify.oauth_settings(), config.spotify.timeout())?),
        Box::new(ConsolePrompt::new(Some(Box::new(SystemLauncher)))),
    );
    let dispatcher = PlaybackDispatcher::new(
        Box::new(SpotifyWebApi::new(config.spotify.timeout())?),
        Box::new(SystemLauncher),
    );
    if args.reauth && credentials.force_reauth()? {
        println!("Cleared cached Spotify token.");
    }

    // 2. Models
    let classifier = YoloEmotionModel::new(&config.detection.model_path)?;
    let locator = build_locator(&config)?;
    let annotator = Annotator::new(
        FontRenderer::try_load(&config.ui.font_family),
        config.ui.font_size_pt,
        config.ui.text_scale,
    );
    let mut pipeline = EmotionPipeline::new(
        locator,
        Box::new(classifier),
        config.detection.params(),
        annotator,
    );

    // 3. Camera + window
    let mut camera = CameraSource::new(args.cam_index)?;
    let mut window = WindowOutput::new(
        "Emotify",
        camera.width() as usize,
        camera.height() as usize,
    )
    .context("Failed to open preview window")?;

    println!("{}", "Webcam started.".green());
    println!("Controls: [Q] capture emotion and play playlist  [R] re-authorize Spotify  [Esc] exit");

    let mut session = Session::new();

    // 4. Loop
    let mut failures = FrameFailures::default();
    'frames: while window.is_open() {
        match camera.capture() {
            Ok(mut frame) => {
                failures.record_success();
                if mirror_mode {
                    image::imageops::flip_horizontal_in_place(&mut frame);
                }

                let mut display = match pipeline.process(&frame) {
                    Ok(output) => {
                        session.observe(&output.dominant);
                        output.annotated
                    }
                    Err(e) => {
                        warn!("Skipping frame: {:#}", e);
                        frame
                    }
                };

                let status_y = display.height() as i32 - pipeline.annotator().line_height() as i32 - 10;
                pipeline
                    .annotator()
                    .draw_text(&mut display, 10, status_y, &session.status_line(), STATUS_COLOR);
                window.show(&display)?;
            }
            Err(e) => {
                let backoff = failures.record_failure(&e)?;
                window.idle();
                thread::sleep(backoff);
            }
        }

        for control in window.controls() {
            match control {
                Control::Exit => {
                    println!("Exit requested. Goodbye.");
                    break 'frames;
                }
                Control::Reauth => match credentials.force_reauth() {
                    Ok(true) => println!("Cached token deleted; you will re-authorize on the next capture."),
                    Ok(false) => println!("No cached token; you will authorize on the next capture."),
                    Err(e) => error!("Could not delete token cache: {}", e),
                },
                Control::Capture => {
                    let report = capture(&session, &credentials, &dispatcher);
                    report.print();
                    if report.attempted() && config.ui.exit_after_capture {
                        println!("Done. Exiting.");
                        break 'frames;
                    }
                }
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("emotify=info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
