//! Common utilities for model renderer integration tests.

use std::sync::Arc;

use kiln_core::model::{Model, ModelDef};
use kiln_graphics::{
    BackendType, Buffer, DeviceCommand, DeviceCommandContext, DeviceParameters, GraphicsDevice,
    ModelRenderer, ShaderModel, ShaderModelVertexRenderer, ShaderProgram, VertexAttributeStream,
};

/// Install a test logger once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Context
// ============================================================================

/// Device, command context and model renderer for one test.
pub struct TestContext {
    pub device: Arc<GraphicsDevice>,
    pub ctx: DeviceCommandContext,
    pub renderer: ModelRenderer<ShaderModelVertexRenderer>,
    pub shader: ShaderProgram,
}

impl TestContext {
    pub fn new(backend: BackendType) -> Self {
        init_logging();
        let device = GraphicsDevice::new(
            DeviceParameters::new()
                .with_backend(backend)
                .with_label("test device"),
        )
        .expect("Failed to create device");
        let ctx = device.create_command_context();
        let renderer = ModelRenderer::new(ShaderModelVertexRenderer::new(Arc::clone(&device)));
        let shader = ShaderProgram::new().with_label("model").with_inputs([
            VertexAttributeStream::Position,
            VertexAttributeStream::Normal,
            VertexAttributeStream::Uv0,
        ]);

        Self {
            device,
            ctx,
            renderer,
            shader,
        }
    }

    /// Run one full frame over `models` and submit it.
    ///
    /// Recorded commands are returned, since submitting clears them.
    pub fn frame(&mut self, models: &mut [Model]) -> Vec<DeviceCommand> {
        self.ctx.begin_frame();
        self.renderer
            .draw_models(&mut self.ctx, &self.shader, models)
            .expect("Failed to draw models");
        let commands = self.ctx.commands().to_vec();
        self.ctx.submit().expect("Failed to submit");
        commands
    }

    /// Instance data of `model`.
    pub fn model_data<'a>(&self, model: &'a Model) -> &'a ShaderModel {
        self.renderer
            .try_model_data(model)
            .expect("model has no render data")
    }

    /// Read back the whole contents of `buffer`.
    pub fn read(&self, buffer: &Buffer) -> Vec<u8> {
        self.device
            .read_buffer(buffer)
            .expect("Failed to read buffer")
    }
}

// ============================================================================
// Command inspection
// ============================================================================

/// `(first_index, index_count, start, end)` of every recorded draw.
pub fn draws(commands: &[DeviceCommand]) -> Vec<(u32, u32, u32, u32)> {
    commands
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::DrawIndexedInRange {
                first_index,
                index_count,
                start,
                end,
            } => Some((*first_index, *index_count, *start, *end)),
            _ => None,
        })
        .collect()
}

/// Number of recorded uploads into `buffer`.
pub fn uploads_to(commands: &[DeviceCommand], buffer: &Arc<Buffer>) -> usize {
    commands
        .iter()
        .filter(|command| {
            matches!(command, DeviceCommand::UploadBuffer { buffer: uploaded, .. }
                if Arc::ptr_eq(uploaded, buffer))
        })
        .count()
}

/// Decode `[f32; 4]` values at `offset` within each `stride`-byte vertex.
pub fn read_vec4s(bytes: &[u8], stride: u32, offset: u32) -> Vec<[f32; 4]> {
    bytes
        .chunks_exact(stride as usize)
        .map(|vertex| {
            let start = offset as usize;
            bytemuck::pod_read_unaligned(&vertex[start..start + 16])
        })
        .collect()
}

/// Decode 16-bit indices.
pub fn read_indices(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Instances of `def`, one per entry of `count`.
pub fn instances(def: &Arc<ModelDef>, count: usize) -> Vec<Model> {
    (0..count).map(|_| Model::new(Arc::clone(def))).collect()
}
