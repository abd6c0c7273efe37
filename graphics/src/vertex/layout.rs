//! Vertex input layouts.
//!
//! A vertex input layout maps the bytes of one or more vertex buffers to
//! shader input streams. Each attribute names the binding slot it reads
//! from, so a layout can combine buffers with different update rates:
//!
//! ```ignore
//! // Slot 0: static UVs, uploaded once per model definition
//! // Slot 1: dynamic position/normal, rebuilt per instance and frame
//! let layout = VertexInputLayout::new(vec![
//!     VertexAttributeFormat::new(VertexAttributeStream::Uv0, Format::R32G32Float, 0, 8, 0),
//!     VertexAttributeFormat::new(VertexAttributeStream::Position, Format::R32G32B32Float, 16, 32, 1),
//!     VertexAttributeFormat::new(VertexAttributeStream::Normal, Format::R32G32B32Float, 0, 32, 1),
//! ]);
//! ```
//!
//! Layouts are created through
//! [`GraphicsDevice::vertex_input_layout`](crate::GraphicsDevice::vertex_input_layout),
//! which shares one `Arc` between identical attribute lists.

use crate::types::Format;

/// Shader input stream an attribute feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexAttributeStream {
    Position,
    Normal,
    Uv0,
    Uv1,
}

impl VertexAttributeStream {
    /// Texture coordinate stream for UV set `index`, if one exists.
    pub fn uv(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Uv0),
            1 => Some(Self::Uv1),
            _ => None,
        }
    }
}

/// One attribute of a vertex input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeFormat {
    /// Stream this attribute feeds.
    pub stream: VertexAttributeStream,
    /// Element format.
    pub format: Format,
    /// Byte offset within one vertex of the bound buffer.
    pub offset: u32,
    /// Byte distance between consecutive vertices of the bound buffer.
    pub stride: u32,
    /// Vertex-input slot the buffer is bound to.
    pub binding_slot: u32,
}

impl VertexAttributeFormat {
    /// Create a per-vertex attribute.
    pub fn new(
        stream: VertexAttributeStream,
        format: Format,
        offset: u32,
        stride: u32,
        binding_slot: u32,
    ) -> Self {
        Self {
            stream,
            format,
            offset,
            stride,
            binding_slot,
        }
    }
}

/// Immutable description of how bound vertex buffers map to shader streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexInputLayout {
    attributes: Vec<VertexAttributeFormat>,
}

impl VertexInputLayout {
    /// Create a layout from its attributes.
    pub fn new(attributes: Vec<VertexAttributeFormat>) -> Self {
        Self { attributes }
    }

    /// All attributes, in declaration order.
    pub fn attributes(&self) -> &[VertexAttributeFormat] {
        &self.attributes
    }

    /// Check if this layout feeds a specific stream.
    pub fn has_stream(&self, stream: VertexAttributeStream) -> bool {
        self.attributes.iter().any(|attr| attr.stream == stream)
    }

    /// Get an attribute by stream.
    pub fn get_attribute(&self, stream: VertexAttributeStream) -> Option<&VertexAttributeFormat> {
        self.attributes.iter().find(|attr| attr.stream == stream)
    }

    /// Binding slots read by this layout, ascending and without duplicates.
    pub fn binding_slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.attributes.iter().map(|a| a.binding_slot).collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    /// Stride of the buffer bound to `slot`, if any attribute reads it.
    pub fn slot_stride(&self, slot: u32) -> Option<u32> {
        self.attributes
            .iter()
            .find(|attr| attr.binding_slot == slot)
            .map(|attr| attr.stride)
    }

    /// Validate the layout.
    ///
    /// Checks that no stream is fed twice, that attributes sharing a slot
    /// agree on the stride, and that every attribute fits inside its stride.
    pub fn validate(&self) -> Result<(), String> {
        for (index, attr) in self.attributes.iter().enumerate() {
            if self.attributes[..index]
                .iter()
                .any(|other| other.stream == attr.stream)
            {
                return Err(format!("stream {:?} is fed more than once", attr.stream));
            }
            if let Some(stride) = self.slot_stride(attr.binding_slot)
                && stride != attr.stride
            {
                return Err(format!(
                    "slot {} used with strides {} and {}",
                    attr.binding_slot, stride, attr.stride
                ));
            }
            if attr.offset + attr.format.size() > attr.stride {
                return Err(format!(
                    "attribute {:?} at offset {} ({} bytes) exceeds stride {}",
                    attr.stream,
                    attr.offset,
                    attr.format.size(),
                    attr.stride
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_layout() -> VertexInputLayout {
        VertexInputLayout::new(vec![
            VertexAttributeFormat::new(VertexAttributeStream::Uv0, Format::R32G32Float, 0, 8, 0),
            VertexAttributeFormat::new(
                VertexAttributeStream::Position,
                Format::R32G32B32Float,
                16,
                32,
                1,
            ),
            VertexAttributeFormat::new(
                VertexAttributeStream::Normal,
                Format::R32G32B32Float,
                0,
                32,
                1,
            ),
        ])
    }

    #[test]
    fn test_split_layout_queries() {
        let layout = split_layout();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.binding_slots(), vec![0, 1]);
        assert_eq!(layout.slot_stride(0), Some(8));
        assert_eq!(layout.slot_stride(1), Some(32));
        assert_eq!(layout.slot_stride(2), None);
        assert!(layout.has_stream(VertexAttributeStream::Normal));
        assert!(!layout.has_stream(VertexAttributeStream::Uv1));
        assert_eq!(
            layout
                .get_attribute(VertexAttributeStream::Position)
                .map(|a| a.offset),
            Some(16)
        );
    }

    #[test]
    fn test_validation_rejects_duplicate_stream() {
        let uv = VertexAttributeFormat::new(VertexAttributeStream::Uv0, Format::R32G32Float, 0, 8, 0);
        let layout = VertexInputLayout::new(vec![uv, uv]);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_stride_mismatch() {
        let layout = VertexInputLayout::new(vec![
            VertexAttributeFormat::new(VertexAttributeStream::Uv0, Format::R32G32Float, 0, 16, 0),
            VertexAttributeFormat::new(VertexAttributeStream::Uv1, Format::R32G32Float, 8, 8, 0),
        ]);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_overflowing_attribute() {
        let layout = VertexInputLayout::new(vec![VertexAttributeFormat::new(
            VertexAttributeStream::Position,
            Format::R32G32B32A32Float,
            24,
            32,
            1,
        )]);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_uv_streams() {
        assert_eq!(VertexAttributeStream::uv(0), Some(VertexAttributeStream::Uv0));
        assert_eq!(VertexAttributeStream::uv(1), Some(VertexAttributeStream::Uv1));
        assert_eq!(VertexAttributeStream::uv(2), None);
    }
}
