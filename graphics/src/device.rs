//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources.
//! It owns the backend, validates buffer requests against its
//! [`DeviceCapabilities`], shares identical vertex input layouts and hands out
//! [`DeviceCommandContext`]s for recording work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::backend::{self, BackendType, GpuBackend};
use crate::command::DeviceCommandContext;
use crate::error::GraphicsError;
use crate::resources::{Buffer, BufferId};
use crate::types::BufferDescriptor;
use crate::vertex::{VertexAttributeFormat, VertexInputLayout};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Number of vertex-input slots buffers can be bound to.
    pub max_vertex_buffer_slots: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_buffer_size: 1 << 30, // 1 GB
            max_vertex_buffer_slots: 16,
        }
    }
}

/// Parameters for creating a [`GraphicsDevice`].
#[derive(Debug, Clone, Default)]
pub struct DeviceParameters {
    /// Backend to create the device on.
    pub backend: BackendType,
    /// Limits the device enforces.
    pub capabilities: DeviceCapabilities,
    /// Debug label.
    pub label: Option<String>,
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
/// Resource creation and the layout cache use interior mutability.
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(DeviceParameters::new())?;
///
/// let buffer = device.create_buffer(&BufferDescriptor::new(
///     BufferKind::Vertex,
///     1024,
///     BufferUsage::TRANSFER_DST,
/// ))?;
/// let mut ctx = device.create_command_context();
/// ```
pub struct GraphicsDevice {
    backend: Arc<dyn GpuBackend>,
    label: Option<String>,
    capabilities: DeviceCapabilities,
    next_buffer_id: AtomicU64,
    // Weak references, for live-resource counts
    buffers: RwLock<Vec<Weak<Buffer>>>,
    vertex_input_layouts: Mutex<HashMap<VertexInputLayout, Arc<VertexInputLayout>>>,
}

impl GraphicsDevice {
    /// Create a device on the backend named by `parameters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub fn new(parameters: DeviceParameters) -> Result<Arc<Self>, GraphicsError> {
        let backend = backend::create_backend(parameters.backend)?;
        Ok(Self::with_backend(
            backend,
            parameters.capabilities,
            parameters.label,
        ))
    }

    /// Create a device on an already constructed backend.
    pub fn with_backend(
        backend: Arc<dyn GpuBackend>,
        capabilities: DeviceCapabilities,
        label: Option<String>,
    ) -> Arc<Self> {
        log::info!(
            "Creating GraphicsDevice {:?} on backend {}",
            label,
            backend.name()
        );
        Arc::new(Self {
            backend,
            label,
            capabilities,
            next_buffer_id: AtomicU64::new(0),
            buffers: RwLock::new(Vec::new()),
            vertex_input_layouts: Mutex::new(HashMap::new()),
        })
    }

    /// Get the device label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Name of the backend the device runs on.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Get the GPU backend (internal use only).
    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size is zero, exceeds device limits, or
    /// allocation fails.
    pub fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let gpu = self.backend.create_buffer(descriptor)?;
        let id = BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let buffer = Arc::new(Buffer::new(id, descriptor.clone(), gpu));

        self.buffers.write().push(Arc::downgrade(&buffer));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, kind={:?}, size={}",
            descriptor.label,
            descriptor.kind,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Read the whole contents of `buffer` back from the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot read the buffer.
    pub fn read_buffer(&self, buffer: &Buffer) -> Result<Vec<u8>, GraphicsError> {
        self.backend.read_buffer(buffer.gpu(), 0, buffer.size())
    }

    /// Get the shared vertex input layout for `attributes`.
    ///
    /// Identical attribute lists yield the same `Arc`. Panics if the
    /// attributes do not form a valid layout.
    pub fn vertex_input_layout(
        &self,
        attributes: &[VertexAttributeFormat],
    ) -> Arc<VertexInputLayout> {
        let layout = VertexInputLayout::new(attributes.to_vec());
        if let Err(reason) = layout.validate() {
            panic!("invalid vertex input layout: {reason}");
        }

        let mut layouts = self.vertex_input_layouts.lock();
        if let Some(existing) = layouts.get(&layout) {
            return Arc::clone(existing);
        }

        log::debug!(
            "GraphicsDevice: new vertex input layout with {} attributes",
            attributes.len()
        );
        let shared = Arc::new(layout.clone());
        layouts.insert(layout, Arc::clone(&shared));
        shared
    }

    /// Number of distinct vertex input layouts created so far.
    pub fn vertex_input_layouts(&self) -> usize {
        self.vertex_input_layouts.lock().len()
    }

    /// Total number of buffers created by this device.
    pub fn buffers_created(&self) -> u64 {
        self.next_buffer_id.load(Ordering::Relaxed)
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        self.buffers
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Clean up dead weak references to released buffers.
    pub fn cleanup_dead_resources(&self) {
        self.buffers.write().retain(|w| w.strong_count() > 0);
    }

    /// Create a command context recording against this device.
    pub fn create_command_context(self: &Arc<Self>) -> DeviceCommandContext {
        DeviceCommandContext::new(Arc::clone(self))
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("label", &self.label)
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferKind, BufferUsage, Format};
    use crate::vertex::VertexAttributeStream;

    fn create_test_device() -> Arc<GraphicsDevice> {
        GraphicsDevice::new(DeviceParameters::new().with_label("test")).unwrap()
    }

    fn uv_attribute(slot: u32) -> VertexAttributeFormat {
        VertexAttributeFormat::new(VertexAttributeStream::Uv0, Format::R32G32Float, 0, 8, slot)
    }

    #[test]
    fn test_device_label_and_backend() {
        let device = create_test_device();
        assert_eq!(device.label(), Some("test"));
        assert_eq!(device.backend_name(), "Dummy");
    }

    #[test]
    fn test_create_buffer() {
        let device = create_test_device();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(
                BufferKind::Vertex,
                1024,
                BufferUsage::TRANSFER_DST,
            ))
            .unwrap();
        assert_eq!(buffer.size(), 1024);
        assert_eq!(device.buffer_count(), 1);
        assert_eq!(device.buffers_created(), 1);
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let device = create_test_device();
        let result = device.create_buffer(&BufferDescriptor::new(
            BufferKind::Vertex,
            0,
            BufferUsage::TRANSFER_DST,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_buffer_over_limit() {
        let capabilities = DeviceCapabilities {
            max_buffer_size: 64,
            ..Default::default()
        };
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_capabilities(capabilities)).unwrap();
        let result = device.create_buffer(&BufferDescriptor::new(
            BufferKind::Index,
            65,
            BufferUsage::TRANSFER_DST,
        ));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(device.buffers_created(), 0);
    }

    #[test]
    fn test_vertex_input_layout_is_shared() {
        let device = create_test_device();
        let a = device.vertex_input_layout(&[uv_attribute(0)]);
        let b = device.vertex_input_layout(&[uv_attribute(0)]);
        let c = device.vertex_input_layout(&[uv_attribute(1)]);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(device.vertex_input_layouts(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid vertex input layout")]
    fn test_invalid_vertex_input_layout_panics() {
        let device = create_test_device();
        device.vertex_input_layout(&[uv_attribute(0), uv_attribute(1)]);
    }

    #[test]
    fn test_resource_cleanup() {
        let device = create_test_device();
        {
            let _buffer = device
                .create_buffer(&BufferDescriptor::new(
                    BufferKind::Vertex,
                    1024,
                    BufferUsage::TRANSFER_DST,
                ))
                .unwrap();
            assert_eq!(device.buffer_count(), 1);
        }
        // Buffer dropped
        device.cleanup_dead_resources();
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.buffers_created(), 1);
    }
}
