//! Model vertex renderers.
//!
//! A [`ModelVertexRenderer`] owns the GPU-side vertex data of models for one
//! render path. Per frame, every model goes through the same fixed sequence:
//!
//! 1. [`create_model_data`](ModelVertexRenderer::create_model_data) once per
//!    model, which also builds the per-definition data on first use
//! 2. [`update_model_data`](ModelVertexRenderer::update_model_data) with the
//!    model's pending [`UpdateFlags`]
//! 3. [`upload_model_data`](ModelVertexRenderer::upload_model_data)
//! 4. [`prepare_model_def`](ModelVertexRenderer::prepare_model_def) once per
//!    distinct definition
//! 5. [`render_model`](ModelVertexRenderer::render_model) per model of that
//!    definition
//!
//! [`ModelRenderer`] drives this sequence over a slice of models.

mod model_renderer;
mod shader_model;

use std::any::Any;

use kiln_core::model::{Model, ModelDef, RenderDataKey, UpdateFlags};

use crate::command::DeviceCommandContext;
use crate::error::GraphicsError;
use crate::vertex::{VertexAttributeStream, VertexInputLayout};

pub use model_renderer::ModelRenderer;
pub use shader_model::{
    MODEL_VERTEX_ATTRIBUTE_NORMAL_OFFSET, MODEL_VERTEX_ATTRIBUTE_POSITION_OFFSET,
    MODEL_VERTEX_ATTRIBUTE_STRIDE, ShaderModel, ShaderModelDef, ShaderModelVertexRenderer,
};

/// Builds, uploads and draws the vertex data of models for one render path.
///
/// Device failures are returned as errors. Calling the operations out of
/// order is a programming error and panics.
pub trait ModelVertexRenderer {
    /// Per-instance data stored in the model's render-data slot.
    type ModelData: Any + Send + Sync;

    /// Key under which this renderer caches per-definition data.
    fn key(&self) -> RenderDataKey;

    /// Create the per-instance data for `model`, building and caching the
    /// per-definition data if the definition has none for this renderer.
    fn create_model_data(
        &mut self,
        key: RenderDataKey,
        model: &Model,
    ) -> Result<Self::ModelData, GraphicsError>;

    /// Rebuild CPU-side data for the changes in `flags` and prepare the
    /// instance buffers for binding.
    fn update_model_data(
        &mut self,
        model: &Model,
        data: &mut Self::ModelData,
        flags: UpdateFlags,
    ) -> Result<(), GraphicsError>;

    /// Transfer any pending definition and instance data to the device.
    fn upload_model_data(
        &mut self,
        ctx: &mut DeviceCommandContext,
        model: &Model,
        data: &Self::ModelData,
    ) -> Result<(), GraphicsError>;

    /// Bind the state shared by every instance of `def`.
    fn prepare_model_def(&mut self, ctx: &mut DeviceCommandContext, def: &ModelDef);

    /// Bind the instance state of `model` and draw it.
    fn render_model(
        &mut self,
        ctx: &mut DeviceCommandContext,
        shader: &ShaderProgram,
        model: &Model,
        data: &Self::ModelData,
    );
}

/// Shader program a model is drawn with.
///
/// Only the vertex inputs matter to the vertex renderer: drawing checks that
/// the bound layout feeds every stream the program reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderProgram {
    label: Option<String>,
    inputs: Vec<VertexAttributeStream>,
}

impl ShaderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the vertex streams the program reads.
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = VertexAttributeStream>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn inputs(&self) -> &[VertexAttributeStream] {
        &self.inputs
    }

    /// First input `layout` does not provide, if any.
    pub fn missing_input(&self, layout: &VertexInputLayout) -> Option<VertexAttributeStream> {
        self.inputs
            .iter()
            .copied()
            .find(|&stream| !layout.has_stream(stream))
    }
}
