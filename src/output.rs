use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use std::time::Duration;

/// What the user asked for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Capture,
    Reauth,
    Exit,
}

impl Control {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Q => Some(Control::Capture),
            Key::R => Some(Control::Reauth),
            Key::Escape => Some(Control::Exit),
            _ => None,
        }
    }
}

pub struct WindowOutput {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl WindowOutput {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("Failed to create window: {}", e))?;

        window.limit_update_rate(Some(Duration::from_micros(16600))); // ~60 FPS

        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Keys pressed since the last update, mapped to controls, in press order.
    pub fn controls(&self) -> Vec<Control> {
        self.window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .filter_map(Control::from_key)
            .collect()
    }

    /// Pumps window events without a new frame, so keys and the close
    /// button keep working while the camera is failing.
    pub fn idle(&mut self) {
        self.window.update();
    }

    pub fn show(&mut self, frame: &RgbImage) -> Result<()> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
        }
        pack_argb(frame, &mut self.buffer);

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("Window update failed: {}", e))
    }
}

/// RGB8 pixels into minifb's 0RGB u32 layout.
fn pack_argb(frame: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        frame
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}
