//! Device command recording.
//!
//! A [`DeviceCommandContext`] is the renderer's view of the device for one
//! frame. It records uploads, bindings and draws as [`DeviceCommand`]s, keeps
//! the currently bound state so draws can be validated, and accumulates the
//! frame's [`RenderStats`].
//!
//! ```ignore
//! let mut ctx = device.create_command_context();
//! ctx.begin_frame();
//! ctx.set_vertex_input_layout(&layout);
//! ctx.set_vertex_buffer(0, &uvs, 0);
//! ctx.set_vertex_buffer(1, &positions, 0);
//! ctx.set_index_buffer(&indices, Format::R16Uint);
//! ctx.draw_indexed_in_range(0, 6, 0, 3);
//! ctx.submit()?;
//! ```

use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferKind, BufferUsage, Format};
use crate::vertex::VertexInputLayout;

/// A recorded device operation.
#[derive(Debug, Clone)]
pub enum DeviceCommand {
    /// Host data was transferred into `buffer`.
    UploadBuffer { buffer: Arc<Buffer>, size: u64 },
    /// Bind the vertex input layout used by following draws.
    SetVertexInputLayout(Arc<VertexInputLayout>),
    /// Bind a vertex buffer to a vertex-input slot.
    SetVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer>,
        offset: u64,
    },
    /// Bind the index buffer used by following draws.
    SetIndexBuffer { buffer: Arc<Buffer>, format: Format },
    /// Draw `index_count` indices starting at `first_index`. Every index
    /// lies within `start..=end`.
    DrawIndexedInRange {
        first_index: u32,
        index_count: u32,
        start: u32,
        end: u32,
    },
}

/// Per-frame render counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Model triangles submitted.
    pub model_tris: u32,
    /// Buffer uploads performed.
    pub buffer_uploads: u32,
    /// Bytes transferred by those uploads.
    pub uploaded_bytes: u64,
}

impl RenderStats {
    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Records device commands for a frame and tracks bound state.
pub struct DeviceCommandContext {
    device: Arc<GraphicsDevice>,
    commands: Vec<DeviceCommand>,
    stats: RenderStats,
    layout: Option<Arc<VertexInputLayout>>,
    vertex_buffers: Vec<Option<(Arc<Buffer>, u64)>>,
    index_buffer: Option<(Arc<Buffer>, Format)>,
}

impl DeviceCommandContext {
    /// Create a context (called by GraphicsDevice).
    pub(crate) fn new(device: Arc<GraphicsDevice>) -> Self {
        let slots = device.capabilities().max_vertex_buffer_slots as usize;
        Self {
            device,
            commands: Vec::new(),
            stats: RenderStats::default(),
            layout: None,
            vertex_buffers: vec![None; slots],
            index_buffer: None,
        }
    }

    /// Get the device this context records for.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Start a new frame: reset stats and clear all bindings.
    ///
    /// Recorded commands are kept until [`submit`](Self::submit).
    pub fn begin_frame(&mut self) {
        self.stats.reset();
        self.layout = None;
        self.vertex_buffers.iter_mut().for_each(|slot| *slot = None);
        self.index_buffer = None;
    }

    /// Transfer `data` into the start of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer was not created with
    /// [`BufferUsage::TRANSFER_DST`], if `data` does not fit, or if the
    /// backend write fails.
    pub fn upload_buffer(
        &mut self,
        buffer: &Arc<Buffer>,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if !buffer.usage().contains(BufferUsage::TRANSFER_DST) {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} is not an upload destination",
                buffer.label()
            )));
        }
        let size = data.len() as u64;
        if size > buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload of {} bytes exceeds buffer size {}",
                size,
                buffer.size()
            )));
        }

        self.device.backend().write_buffer(buffer.gpu(), 0, data)?;

        log::trace!(
            "DeviceCommandContext: uploaded {} bytes to {:?}",
            size,
            buffer.label()
        );
        self.stats.buffer_uploads += 1;
        self.stats.uploaded_bytes += size;
        self.commands.push(DeviceCommand::UploadBuffer {
            buffer: Arc::clone(buffer),
            size,
        });
        Ok(())
    }

    /// Bind the vertex input layout for following draws.
    pub fn set_vertex_input_layout(&mut self, layout: &Arc<VertexInputLayout>) {
        self.layout = Some(Arc::clone(layout));
        self.commands
            .push(DeviceCommand::SetVertexInputLayout(Arc::clone(layout)));
    }

    /// Bind a vertex buffer to `slot`, starting `offset` bytes in.
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &Arc<Buffer>, offset: u64) {
        assert!(
            (slot as usize) < self.vertex_buffers.len(),
            "vertex buffer slot {} exceeds the device limit of {}",
            slot,
            self.vertex_buffers.len()
        );
        assert_eq!(
            buffer.kind(),
            BufferKind::Vertex,
            "only vertex buffers can be bound to a vertex-input slot"
        );
        assert!(offset <= buffer.size(), "vertex buffer offset out of range");

        self.vertex_buffers[slot as usize] = Some((Arc::clone(buffer), offset));
        self.commands.push(DeviceCommand::SetVertexBuffer {
            slot,
            buffer: Arc::clone(buffer),
            offset,
        });
    }

    /// Bind the index buffer for following draws.
    pub fn set_index_buffer(&mut self, buffer: &Arc<Buffer>, format: Format) {
        assert_eq!(
            buffer.kind(),
            BufferKind::Index,
            "only index buffers can be bound as the index buffer"
        );
        assert!(
            format == Format::R16Uint,
            "index format must be R16Uint, got {format:?}"
        );

        self.index_buffer = Some((Arc::clone(buffer), format));
        self.commands.push(DeviceCommand::SetIndexBuffer {
            buffer: Arc::clone(buffer),
            format,
        });
    }

    /// Draw `index_count` indices from the bound index buffer, starting at
    /// `first_index`. All referenced vertices lie within `start..=end`.
    ///
    /// Panics if no layout or index buffer is bound, if a slot read by the
    /// layout has no vertex buffer, or if either range does not fit the
    /// bound buffers.
    pub fn draw_indexed_in_range(
        &mut self,
        first_index: u32,
        index_count: u32,
        start: u32,
        end: u32,
    ) {
        kiln_core::profile_function!();

        let Some(layout) = &self.layout else {
            panic!("draw without a bound vertex input layout");
        };
        assert!(start <= end, "invalid vertex range {start}..={end}");

        for slot in layout.binding_slots() {
            let bound = self.vertex_buffers.get(slot as usize).and_then(Option::as_ref);
            let Some((buffer, offset)) = bound else {
                panic!("layout reads slot {slot} but no vertex buffer is bound");
            };
            let stride = layout.slot_stride(slot).unwrap_or(0) as u64;
            let needed = offset + (end as u64 + 1) * stride;
            assert!(
                needed <= buffer.size(),
                "vertex range ..={} needs {} bytes in slot {} but the buffer holds {}",
                end,
                needed,
                slot,
                buffer.size()
            );
        }

        let Some((index_buffer, format)) = &self.index_buffer else {
            panic!("draw without a bound index buffer");
        };
        let index_end = (first_index as u64 + index_count as u64) * format.size() as u64;
        assert!(
            index_end <= index_buffer.size(),
            "indices {}..{} exceed the bound index buffer",
            first_index,
            first_index as u64 + index_count as u64
        );

        self.stats.draw_calls += 1;
        self.commands.push(DeviceCommand::DrawIndexedInRange {
            first_index,
            index_count,
            start,
            end,
        });
    }

    /// Commands recorded since the last submit.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Buffers uploaded since the last submit, in upload order.
    pub fn uploads(&self) -> impl Iterator<Item = &Arc<Buffer>> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::UploadBuffer { buffer, .. } => Some(buffer),
            _ => None,
        })
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RenderStats {
        &mut self.stats
    }

    /// Currently bound vertex input layout.
    pub fn bound_vertex_input_layout(&self) -> Option<&Arc<VertexInputLayout>> {
        self.layout.as_ref()
    }

    /// Buffer currently bound to `slot`.
    pub fn bound_vertex_buffer(&self, slot: u32) -> Option<&Arc<Buffer>> {
        self.vertex_buffers
            .get(slot as usize)
            .and_then(Option::as_ref)
            .map(|(buffer, _)| buffer)
    }

    /// Currently bound index buffer.
    pub fn bound_index_buffer(&self) -> Option<&Arc<Buffer>> {
        self.index_buffer.as_ref().map(|(buffer, _)| buffer)
    }

    /// Hand recorded commands to the backend and clear the recording.
    ///
    /// Bindings and stats stay in place until the next
    /// [`begin_frame`](Self::begin_frame).
    ///
    /// # Errors
    ///
    /// Returns the backend error if execution fails. The recording is
    /// cleared either way.
    pub fn submit(&mut self) -> Result<(), GraphicsError> {
        kiln_core::profile_scope!("submit");

        let commands = std::mem::take(&mut self.commands);
        log::trace!(
            "DeviceCommandContext: submitting {} commands ({} draw calls)",
            commands.len(),
            self.stats.draw_calls
        );
        kiln_core::profile_plot!("draw_calls", self.stats.draw_calls);
        self.device.backend().execute(&commands)
    }
}

impl std::fmt::Debug for DeviceCommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCommandContext")
            .field("commands", &self.commands.len())
            .field("stats", &self.stats)
            .field("layout", &self.layout.is_some())
            .field("index_buffer", &self.index_buffer.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(DeviceCommandContext: Send, Sync);
