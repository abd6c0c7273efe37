//! # Kiln Graphics
//!
//! Vertex data preparation, upload and draw recording for model renderers.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - Buffer creation and shared vertex input layouts
//! - [`DeviceCommandContext`] - Per-frame command recording and [`RenderStats`]
//! - [`VertexArray`] / [`VertexIndexArray`] - Interleaved vertex data with a
//!   CPU backing store and upload-if-needed semantics
//! - [`ShaderModelVertexRenderer`] - The model vertex renderer, driven per
//!   frame by [`ModelRenderer`]
//! - [`backend`] - GPU backend abstraction with a host-memory dummy backend
//!
//! ## Example
//!
//! ```ignore
//! use kiln_graphics::{DeviceParameters, GraphicsDevice, ModelRenderer, ShaderModelVertexRenderer};
//!
//! let device = GraphicsDevice::new(DeviceParameters::new())?;
//! let mut ctx = device.create_command_context();
//! let mut renderer = ModelRenderer::new(ShaderModelVertexRenderer::new(device));
//!
//! ctx.begin_frame();
//! renderer.draw_models(&mut ctx, &shader, &mut models)?;
//! ctx.submit()?;
//! ```

pub mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod renderer;
pub mod resources;
pub mod types;
pub mod vertex;

// Re-export main types for convenience
pub use backend::{BackendType, DummyBackend, GpuBackend};
pub use command::{DeviceCommand, DeviceCommandContext, RenderStats};
pub use device::{DeviceCapabilities, DeviceParameters, GraphicsDevice};
pub use error::GraphicsError;
pub use renderer::{
    MODEL_VERTEX_ATTRIBUTE_NORMAL_OFFSET, MODEL_VERTEX_ATTRIBUTE_POSITION_OFFSET,
    MODEL_VERTEX_ATTRIBUTE_STRIDE, ModelRenderer, ModelVertexRenderer, ShaderModel,
    ShaderModelDef, ShaderModelVertexRenderer, ShaderProgram,
};
pub use resources::{Buffer, BufferId};
pub use types::{BufferDescriptor, BufferKind, BufferUsage, Format};
pub use vertex::{
    AttributeHandle, AttributeWriter, VertexArray, VertexArrayAttribute, VertexAttributeFormat,
    VertexAttributeStream, VertexIndexArray, VertexInputLayout,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the library versions. Call once at startup.
pub fn init() {
    kiln_core::init();
    log::info!("Kiln Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy");
    }
}
