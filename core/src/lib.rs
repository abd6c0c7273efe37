//! # Kiln Core
//!
//! GPU-agnostic model data for the Kiln renderer: shared model definitions,
//! model instances, and the CPU routines that build renderer vertex data.

pub mod math;
pub mod model;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once at startup.
pub fn init() {
    log::info!("Kiln Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
