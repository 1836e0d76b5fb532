//! Smart light remote control: per-light control panels, wake word voice
//! commands, and a transport seam for delivering commands to the lights.

pub mod app;
pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod light;
pub mod panel;
pub mod picker;
pub mod recognizer;
pub mod transport;
pub mod tui;
pub mod voice;
pub mod wake_word;
