//! Shader-skinned model vertex renderer.
//!
//! Vertex data is split across two vertex-input slots:
//!
//! - slot 0: static UVs, one [`ShaderModelDef`] per model definition, built
//!   once and cached on the definition
//! - slot 1: dynamic positions and normals, one [`ShaderModel`] per instance,
//!   rebuilt on the CPU whenever the instance's vertices change
//!
//! The shared vertex input layout describes slot 1 with the fixed
//! `MODEL_VERTEX_ATTRIBUTE_*` constants. Every instance array is laid out by
//! the generic [`VertexArray::layout`] and checked against those constants
//! when created.

use std::sync::{Arc, Weak};

use kiln_core::model::build::{build_indices, build_position_and_normals, build_uv};
use kiln_core::model::{Model, ModelDef, RenderDataKey, UpdateFlags};

use super::{ModelVertexRenderer, ShaderProgram};
use crate::command::DeviceCommandContext;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferKind, BufferUsage, Format};
use crate::vertex::{
    AttributeHandle, VertexArray, VertexAttributeFormat, VertexAttributeStream, VertexIndexArray,
    VertexInputLayout,
};

/// Bytes per vertex of the instance position/normal buffer.
pub const MODEL_VERTEX_ATTRIBUTE_STRIDE: u32 = 32;
/// Byte offset of the position inside an instance vertex.
pub const MODEL_VERTEX_ATTRIBUTE_POSITION_OFFSET: u32 = 16;
/// Byte offset of the normal inside an instance vertex.
pub const MODEL_VERTEX_ATTRIBUTE_NORMAL_OFFSET: u32 = 0;

const UV_SLOT: u32 = 0;
const INSTANCE_SLOT: u32 = 1;

/// Static vertex data shared by every instance of one model definition.
///
/// Holds the UV array, the index array and the vertex input layout combining
/// both vertex-input slots. Both arrays are uploaded on construction and
/// their CPU copies released; the data never changes afterwards.
#[derive(Debug)]
pub struct ShaderModelDef {
    uv: VertexArray,
    uv_attributes: Vec<AttributeHandle>,
    indices: VertexIndexArray,
    layout: Arc<VertexInputLayout>,
}

impl ShaderModelDef {
    /// Build, upload and lay out the static data of `def`.
    ///
    /// Panics if `def` has no vertices, no faces or no UV set.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot create the buffers.
    pub fn new(device: &GraphicsDevice, def: &ModelDef) -> Result<Self, GraphicsError> {
        kiln_core::profile_function!();

        let num_vertices = def.num_vertices();
        let num_uvs = def.num_uvs_per_vertex();
        assert!(num_vertices > 0, "model definition has no vertices");
        assert!(def.num_faces() > 0, "model definition has no faces");
        assert!(num_uvs >= 1, "model definition has no UV set");

        let mut uv = VertexArray::new(BufferKind::Vertex, BufferUsage::empty())
            .with_label(format!("{} uv", def.name().unwrap_or("model")));
        let uv_attributes: Vec<AttributeHandle> = (0..num_uvs)
            .map(|_| uv.add_attribute(Format::R32G32Float))
            .collect();
        uv.set_number_of_vertices(num_vertices);
        uv.layout();
        for (set, &attribute) in uv_attributes.iter().enumerate() {
            build_uv(def, &mut uv.writer::<[f32; 2]>(attribute), set);
        }
        uv.upload(device)?;
        uv.free_backing_store();

        let mut indices = VertexIndexArray::new(BufferUsage::empty())
            .with_label(format!("{} indices", def.name().unwrap_or("model")));
        indices.set_number_of_indices(def.num_faces() * 3);
        indices.layout();
        build_indices(def, &mut indices.writer());
        indices.upload(device)?;
        indices.free_backing_store();

        let uv_format = |set: usize| {
            let attribute = uv.attribute(uv_attributes[set]);
            VertexAttributeFormat::new(
                VertexAttributeStream::uv(set).unwrap_or(VertexAttributeStream::Uv0),
                Format::R32G32Float,
                attribute.offset,
                uv.stride(),
                UV_SLOT,
            )
        };
        let mut attributes = vec![
            uv_format(0),
            VertexAttributeFormat::new(
                VertexAttributeStream::Position,
                Format::R32G32B32Float,
                MODEL_VERTEX_ATTRIBUTE_POSITION_OFFSET,
                MODEL_VERTEX_ATTRIBUTE_STRIDE,
                INSTANCE_SLOT,
            ),
            VertexAttributeFormat::new(
                VertexAttributeStream::Normal,
                Format::R32G32B32Float,
                MODEL_VERTEX_ATTRIBUTE_NORMAL_OFFSET,
                MODEL_VERTEX_ATTRIBUTE_STRIDE,
                INSTANCE_SLOT,
            ),
        ];
        if num_uvs >= 2 {
            attributes.push(uv_format(1));
        }
        let layout = device.vertex_input_layout(&attributes);

        log::debug!(
            "ShaderModelDef: built {:?} ({} vertices, {} indices, {} UV sets)",
            def.name(),
            num_vertices,
            indices.number_of_indices(),
            num_uvs
        );

        Ok(Self {
            uv,
            uv_attributes,
            indices,
            layout,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.uv.number_of_vertices()
    }

    pub fn num_indices(&self) -> usize {
        self.indices.number_of_indices()
    }

    /// The static UV array. Its backing store has been released.
    pub fn uv_array(&self) -> &VertexArray {
        &self.uv
    }

    /// Attribute holding UV set `set`, if the definition has it.
    pub fn uv_attribute(&self, set: usize) -> Option<AttributeHandle> {
        self.uv_attributes.get(set).copied()
    }

    pub fn index_array(&self) -> &VertexIndexArray {
        &self.indices
    }

    /// Layout combining the UV slot and the instance slot.
    pub fn vertex_input_layout(&self) -> &Arc<VertexInputLayout> {
        &self.layout
    }

    pub fn uv_buffer(&self) -> Option<&Arc<Buffer>> {
        self.uv.buffer()
    }

    pub fn index_buffer(&self) -> Option<&Arc<Buffer>> {
        self.indices.buffer()
    }

    /// Transfer the static arrays if they have not been transferred yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a transfer fails.
    pub fn upload_if_needed(&self, ctx: &mut DeviceCommandContext) -> Result<(), GraphicsError> {
        self.uv.upload_if_needed(ctx)?;
        self.indices.upload_if_needed(ctx)
    }
}

/// Per-instance position and normal data.
#[derive(Debug)]
pub struct ShaderModel {
    key: RenderDataKey,
    vertices: VertexArray,
    position: AttributeHandle,
    normal: AttributeHandle,
}

impl ShaderModel {
    /// Lay out a dynamic position/normal array for the vertices of `def`.
    ///
    /// Panics if the computed layout differs from the
    /// `MODEL_VERTEX_ATTRIBUTE_*` constants the shared layout is built from.
    pub fn new(key: RenderDataKey, def: &ModelDef) -> Self {
        let mut vertices = VertexArray::new(BufferKind::Vertex, BufferUsage::DYNAMIC)
            .with_label(format!("{} positions", def.name().unwrap_or("model")));
        let position = vertices.add_attribute(Format::R32G32B32A32Float);
        let normal = vertices.add_attribute(Format::R32G32B32A32Float);
        vertices.set_number_of_vertices(def.num_vertices());
        vertices.layout();

        assert_eq!(
            vertices.stride(),
            MODEL_VERTEX_ATTRIBUTE_STRIDE,
            "instance vertex stride does not match the shared layout"
        );
        assert_eq!(
            vertices.attribute(position).offset,
            MODEL_VERTEX_ATTRIBUTE_POSITION_OFFSET,
            "instance position offset does not match the shared layout"
        );
        assert_eq!(
            vertices.attribute(normal).offset,
            MODEL_VERTEX_ATTRIBUTE_NORMAL_OFFSET,
            "instance normal offset does not match the shared layout"
        );

        Self {
            key,
            vertices,
            position,
            normal,
        }
    }

    /// Key of the render path that created this data.
    pub fn key(&self) -> RenderDataKey {
        self.key
    }

    /// The dynamic position/normal array.
    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertices
    }

    pub fn position_attribute(&self) -> AttributeHandle {
        self.position
    }

    pub fn normal_attribute(&self) -> AttributeHandle {
        self.normal
    }

    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.vertices.buffer()
    }

    /// Rebuild positions and normals if `flags` contains
    /// [`UpdateFlags::VERTICES`], then prepare the array for binding.
    ///
    /// Without the flag, the last uploaded contents are reused as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot create the instance buffer.
    pub fn update(
        &mut self,
        device: &GraphicsDevice,
        model: &Model,
        flags: UpdateFlags,
    ) -> Result<(), GraphicsError> {
        if flags.contains(UpdateFlags::VERTICES) {
            kiln_core::profile_scope!("ShaderModel::rebuild");
            assert_eq!(
                model.def().num_vertices(),
                self.vertices.number_of_vertices(),
                "model does not match the definition its data was created for"
            );
            {
                let (mut positions, mut normals) = self
                    .vertices
                    .writer_pair::<[f32; 4], [f32; 4]>(self.position, self.normal);
                build_position_and_normals(model, &mut positions, &mut normals);
            }
            self.vertices.upload(device)?;
        }
        self.vertices.prepare_for_rendering();
        Ok(())
    }

    /// Transfer rebuilt data if the array was prepared since its last
    /// transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    pub fn upload_if_needed(&self, ctx: &mut DeviceCommandContext) -> Result<(), GraphicsError> {
        self.vertices.upload_if_needed(ctx)
    }
}

struct ShaderModelRendererInternals {
    // Valid between prepare_model_def and the draws of that definition
    prepared_def: Weak<ShaderModelDef>,
    defs_built: usize,
}

/// Renders models with shader-side transforms and CPU-built vertex data.
///
/// # Example
///
/// ```ignore
/// let mut renderer = ShaderModelVertexRenderer::new(Arc::clone(&device));
/// let mut data = renderer.create_model_data(key, &model)?;
/// renderer.update_model_data(&model, &mut data, UpdateFlags::all())?;
/// renderer.upload_model_data(&mut ctx, &model, &data)?;
/// renderer.prepare_model_def(&mut ctx, model.def());
/// renderer.render_model(&mut ctx, &shader, &model, &data);
/// ```
pub struct ShaderModelVertexRenderer {
    device: Arc<GraphicsDevice>,
    key: RenderDataKey,
    internals: ShaderModelRendererInternals,
}

impl ShaderModelVertexRenderer {
    /// Create a renderer with its own definition cache key.
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        Self {
            device,
            key: RenderDataKey::unique(),
            internals: ShaderModelRendererInternals {
                prepared_def: Weak::new(),
                defs_built: 0,
            },
        }
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Number of [`ShaderModelDef`]s this renderer has built.
    pub fn defs_built(&self) -> usize {
        self.internals.defs_built
    }

    /// Cached definition data of `def`, if built.
    pub fn model_def_data(&self, def: &ModelDef) -> Option<Arc<ShaderModelDef>> {
        def.render_data::<ShaderModelDef>(self.key)
    }

    fn cached_def(&self, def: &ModelDef) -> Arc<ShaderModelDef> {
        let Some(shader_def) = self.model_def_data(def) else {
            panic!(
                "model definition {:?} has no cached data; create model data first",
                def.name()
            );
        };
        shader_def
    }
}

impl ModelVertexRenderer for ShaderModelVertexRenderer {
    type ModelData = ShaderModel;

    fn key(&self) -> RenderDataKey {
        self.key
    }

    fn create_model_data(
        &mut self,
        key: RenderDataKey,
        model: &Model,
    ) -> Result<ShaderModel, GraphicsError> {
        let def = model.def();
        if self.model_def_data(def).is_none() {
            let shader_def = ShaderModelDef::new(&self.device, def)?;
            def.set_render_data(self.key, Arc::new(shader_def));
            self.internals.defs_built += 1;
        }
        Ok(ShaderModel::new(key, def))
    }

    fn update_model_data(
        &mut self,
        model: &Model,
        data: &mut ShaderModel,
        flags: UpdateFlags,
    ) -> Result<(), GraphicsError> {
        data.update(&self.device, model, flags)
    }

    fn upload_model_data(
        &mut self,
        ctx: &mut DeviceCommandContext,
        model: &Model,
        data: &ShaderModel,
    ) -> Result<(), GraphicsError> {
        self.cached_def(model.def()).upload_if_needed(ctx)?;
        data.upload_if_needed(ctx)
    }

    fn prepare_model_def(&mut self, ctx: &mut DeviceCommandContext, def: &ModelDef) {
        let shader_def = self.cached_def(def);
        let Some(uv_buffer) = shader_def.uv_buffer() else {
            panic!("definition UV array was never uploaded");
        };

        ctx.set_vertex_input_layout(shader_def.vertex_input_layout());
        ctx.set_vertex_buffer(UV_SLOT, uv_buffer, 0);
        self.internals.prepared_def = Arc::downgrade(&shader_def);
    }

    fn render_model(
        &mut self,
        ctx: &mut DeviceCommandContext,
        shader: &ShaderProgram,
        model: &Model,
        data: &ShaderModel,
    ) {
        let Some(prepared) = self.internals.prepared_def.upgrade() else {
            panic!("render_model called without a prepared model definition");
        };
        let cached = self.model_def_data(model.def());
        assert!(
            cached.is_some_and(|cached| Arc::ptr_eq(&cached, &prepared)),
            "model {:?} is not an instance of the prepared definition",
            model.def().name()
        );
        if let Some(stream) = shader.missing_input(prepared.vertex_input_layout()) {
            panic!(
                "shader {:?} reads {:?}, which the model layout does not provide",
                shader.label(),
                stream
            );
        }
        let (Some(vertex_buffer), Some(index_buffer)) = (data.buffer(), prepared.index_buffer())
        else {
            panic!("render_model called before the model data was uploaded");
        };

        ctx.set_vertex_buffer(INSTANCE_SLOT, vertex_buffer, 0);
        ctx.set_index_buffer(index_buffer, prepared.index_array().format());

        let Ok(num_indices) = u32::try_from(prepared.num_indices()) else {
            panic!("index count {} does not fit a draw", prepared.num_indices());
        };
        let Ok(last_vertex) = u32::try_from(prepared.num_vertices() - 1) else {
            panic!("vertex count {} does not fit a draw", prepared.num_vertices());
        };
        ctx.draw_indexed_in_range(0, num_indices, 0, last_vertex);
        ctx.stats_mut().model_tris += num_indices / 3;
    }
}

impl std::fmt::Debug for ShaderModelVertexRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModelVertexRenderer")
            .field("key", &self.key)
            .field("defs_built", &self.internals.defs_built)
            .field("prepared", &(self.internals.prepared_def.strong_count() > 0))
            .finish()
    }
}

static_assertions::assert_impl_all!(ShaderModelDef: Send, Sync);
static_assertions::assert_impl_all!(ShaderModel: Send, Sync);
