//! Buffer types and descriptors.

use bitflags::bitflags;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferKind {
    /// Vertex attribute data, bound to a numbered vertex-input slot.
    #[default]
    Vertex,
    /// Index data for indexed draws.
    Index,
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Contents are rewritten frequently (per frame).
        const DYNAMIC = 1 << 0;
        /// Buffer can be copied to (uploads).
        const TRANSFER_DST = 1 << 2;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// How the buffer is bound.
    pub kind: BufferKind,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(kind: BufferKind, size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            kind,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the buffer is rewritten every frame.
    pub fn is_dynamic(&self) -> bool {
        self.usage.contains(BufferUsage::DYNAMIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let desc = BufferDescriptor::new(
            BufferKind::Vertex,
            256,
            BufferUsage::DYNAMIC | BufferUsage::TRANSFER_DST,
        )
        .with_label("positions");

        assert_eq!(desc.label.as_deref(), Some("positions"));
        assert_eq!(desc.size, 256);
        assert!(desc.is_dynamic());

        let index = BufferDescriptor::new(BufferKind::Index, 6, BufferUsage::TRANSFER_DST);
        assert!(!index.is_dynamic());
    }
}
