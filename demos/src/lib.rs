//! # Kiln Demos
//!
//! Headless demos driving the Kiln model renderer.
//!
//! ## Available Demos
//!
//! - `model_renderer_demo` - Animated grid and strip instances rendered for a
//!   fixed number of frames, logging render stats

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
