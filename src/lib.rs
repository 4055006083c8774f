pub mod app;
pub mod args;
pub mod camera;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod font;
pub mod launcher;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod playlist;
pub mod session;
pub mod spotify;
pub mod ttf;
pub mod types;
