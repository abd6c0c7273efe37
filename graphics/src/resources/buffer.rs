//! GPU buffer resource.

use crate::backend::GpuBuffer;
use crate::types::{BufferDescriptor, BufferKind, BufferUsage};

/// Device-unique buffer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u64);

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are
/// reference-counted.
///
/// # Example
///
/// ```ignore
/// let desc = BufferDescriptor::new(BufferKind::Vertex, 1024, BufferUsage::TRANSFER_DST);
/// let buffer = device.create_buffer(&desc)?;
/// println!("Buffer size: {}", buffer.size());
/// ```
///
/// [`GraphicsDevice::create_buffer`]: crate::GraphicsDevice::create_buffer
pub struct Buffer {
    id: BufferId,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
}

impl Buffer {
    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn new(id: BufferId, descriptor: BufferDescriptor, gpu: GpuBuffer) -> Self {
        Self {
            id,
            descriptor,
            gpu,
        }
    }

    /// Get the buffer identity.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub fn kind(&self) -> BufferKind {
        self.descriptor.kind
    }

    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Backend allocation (internal use only).
    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id.0)
            .field("kind", &self.descriptor.kind)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
