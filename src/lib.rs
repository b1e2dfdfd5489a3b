//! termtosvg - record terminal sessions and render them as animated SVG.
//!
//! The render pipeline replays an asciicast recording through a terminal
//! emulator, normalises the resulting screen timeline into frames, and lays
//! the frames out into an SVG template:
//!
//! ```text
//! cast file -> cast -> emulator -> timing -> layout -> render -> SVG
//! ```
//!
//! The record side ([`record`]) runs the program on a PTY and produces the
//! cast files the renderer consumes.

pub mod cast;
pub mod emulator;
pub mod error;
pub mod layout;
pub mod record;
pub mod render;
pub mod screen;
pub mod template;
pub mod templates;
pub mod timing;

pub use error::{Error, Result};
pub use render::{RenderOptions, RenderSummary};
pub use template::Template;
