//! Model data consumed by renderers.
//!
//! - [`ModelDef`] - immutable shape shared by all instances, with a
//!   per-renderer render-data cache
//! - [`Model`] - one placed instance with pose, dirty flags and its own
//!   render data
//! - [`build`] - CPU routines that fill renderer vertex storage
//! - [`generators`] - procedural definitions for tests and demos

pub mod build;
mod def;
pub mod generators;
mod instance;

pub use build::VertexSink;
pub use def::{
    MAX_BONE_INFLUENCES, ModelDef, ModelFace, ModelVertex, NO_BONE, RenderDataKey, VertexBlend,
};
pub use instance::{Model, ModelRenderData, UpdateFlags};
