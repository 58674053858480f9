pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod log;
pub mod pages;
pub mod progress;
pub mod util;
pub mod workflow;

// Decoupled game loop architecture
pub mod actors;
pub mod app;
pub mod render;
pub mod ui;

pub use error::{Error, Result};
