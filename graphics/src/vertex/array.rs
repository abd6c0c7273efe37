//! Vertex arrays with a CPU backing store.
//!
//! A [`VertexArray`] describes one interleaved vertex buffer. Attributes are
//! registered first, then [`layout`](VertexArray::layout) assigns offsets and
//! allocates a zeroed backing store that attribute writers fill in place.
//!
//! Uploading is split in two steps. [`upload`](VertexArray::upload) creates the
//! GPU buffer on first use and snapshots the backing store as pending data;
//! [`upload_if_needed`](VertexArray::upload_if_needed) transfers that data
//! through a [`DeviceCommandContext`]. Dynamic arrays transfer only after
//! [`prepare_for_rendering`](VertexArray::prepare_for_rendering), so an array
//! that was rebuilt but not drawn this frame costs no transfer.

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::Pod;
use kiln_core::model::VertexSink;
use parking_lot::Mutex;

use crate::command::DeviceCommandContext;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferKind, BufferUsage, Format};

/// Handle to an attribute registered with a [`VertexArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeHandle(usize);

/// Format and byte offset of one attribute inside a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayAttribute {
    pub format: Format,
    pub offset: u32,
}

/// One interleaved vertex (or index) buffer and its CPU backing store.
pub struct VertexArray {
    kind: BufferKind,
    usage: BufferUsage,
    label: Option<String>,
    attributes: Vec<VertexArrayAttribute>,
    stride: u32,
    number_of_vertices: usize,
    backing_store: Option<Vec<u8>>,
    laid_out: bool,
    buffer: Option<Arc<Buffer>>,
    // Snapshot taken by `upload`, consumed by `upload_if_needed`
    pending: Mutex<Option<Vec<u8>>>,
    needed: AtomicBool,
}

impl VertexArray {
    /// Create an empty array bound as `kind`.
    ///
    /// `usage` is combined with [`BufferUsage::TRANSFER_DST`] when the GPU
    /// buffer is created. Arrays with [`BufferUsage::DYNAMIC`] only transfer
    /// after being prepared for rendering.
    pub fn new(kind: BufferKind, usage: BufferUsage) -> Self {
        Self {
            kind,
            usage,
            label: None,
            attributes: Vec::new(),
            stride: 0,
            number_of_vertices: 0,
            backing_store: None,
            laid_out: false,
            buffer: None,
            pending: Mutex::new(None),
            needed: AtomicBool::new(false),
        }
    }

    /// Set the debug label passed to the GPU buffer.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn is_dynamic(&self) -> bool {
        self.usage.contains(BufferUsage::DYNAMIC)
    }

    /// Register an attribute. Offsets are assigned by [`layout`](Self::layout).
    pub fn add_attribute(&mut self, format: Format) -> AttributeHandle {
        assert!(!self.laid_out, "attributes must be added before layout");
        self.attributes.push(VertexArrayAttribute { format, offset: 0 });
        AttributeHandle(self.attributes.len() - 1)
    }

    pub fn set_number_of_vertices(&mut self, count: usize) {
        assert!(!self.laid_out, "vertex count is fixed once laid out");
        self.number_of_vertices = count;
    }

    pub fn number_of_vertices(&self) -> usize {
        self.number_of_vertices
    }

    /// Assign attribute offsets and allocate a zeroed backing store.
    ///
    /// Attributes are packed in reverse registration order, so the last one
    /// registered sits at offset 0. Vertex arrays keep every offset and the
    /// stride 4-byte aligned.
    pub fn layout(&mut self) {
        assert!(!self.laid_out, "vertex array already laid out");
        assert!(!self.attributes.is_empty(), "vertex array has no attributes");

        let align = self.kind == BufferKind::Vertex;
        let mut stride = 0u32;
        for attribute in self.attributes.iter_mut().rev() {
            attribute.offset = stride;
            stride += attribute.format.size();
            if align {
                stride = stride.next_multiple_of(4);
            }
        }
        self.stride = stride;

        self.backing_store = Some(vec![0u8; stride as usize * self.number_of_vertices]);
        self.laid_out = true;
    }

    /// Bytes per vertex. Zero until laid out.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attribute(&self, handle: AttributeHandle) -> VertexArrayAttribute {
        self.attributes[handle.0]
    }

    /// Size in bytes of the whole array.
    pub fn size_in_bytes(&self) -> u64 {
        self.stride as u64 * self.number_of_vertices as u64
    }

    /// Whether CPU-side data is still available.
    pub fn has_backing_store(&self) -> bool {
        self.backing_store.is_some()
    }

    /// Raw backing store, if not freed.
    pub fn backing_store(&self) -> Option<&[u8]> {
        self.backing_store.as_deref()
    }

    /// Strided writer over one attribute of the backing store.
    ///
    /// Panics if the backing store has been freed or if `T` is larger than
    /// the attribute's format.
    pub fn writer<T: Pod>(&mut self, handle: AttributeHandle) -> AttributeWriter<'_, T> {
        let offset = self.checked_offset::<T>(handle);
        let (stride, count) = (self.stride as usize, self.number_of_vertices);
        AttributeWriter::new(self.cells(), offset, stride, count)
    }

    /// Writers over two attributes of the same vertices, for builders that
    /// fill both in one pass.
    pub fn writer_pair<A: Pod, B: Pod>(
        &mut self,
        first: AttributeHandle,
        second: AttributeHandle,
    ) -> (AttributeWriter<'_, A>, AttributeWriter<'_, B>) {
        assert_ne!(first, second, "writer pair needs two distinct attributes");
        let first_offset = self.checked_offset::<A>(first);
        let second_offset = self.checked_offset::<B>(second);
        let (stride, count) = (self.stride as usize, self.number_of_vertices);
        let cells = self.cells();
        (
            AttributeWriter::new(cells, first_offset, stride, count),
            AttributeWriter::new(cells, second_offset, stride, count),
        )
    }

    fn checked_offset<T: Pod>(&self, handle: AttributeHandle) -> usize {
        let attribute = self.attributes[handle.0];
        assert!(
            std::mem::size_of::<T>() <= attribute.format.size() as usize,
            "{} byte values do not fit attribute format {:?}",
            std::mem::size_of::<T>(),
            attribute.format
        );
        attribute.offset as usize
    }

    fn cells(&mut self) -> &[Cell<u8>] {
        let Some(data) = self.backing_store.as_deref_mut() else {
            panic!("vertex array backing store is not available");
        };
        Cell::from_mut(data).as_slice_of_cells()
    }

    /// Read one attribute value back from the backing store.
    pub fn read<T: Pod>(&self, handle: AttributeHandle, index: usize) -> T {
        let attribute = self.attributes[handle.0];
        let Some(data) = self.backing_store.as_deref() else {
            panic!("vertex array backing store is not available");
        };
        assert!(index < self.number_of_vertices, "vertex {index} out of range");
        let start = index * self.stride as usize + attribute.offset as usize;
        bytemuck::pod_read_unaligned(&data[start..start + std::mem::size_of::<T>()])
    }

    /// Create the GPU buffer on first use and queue the backing store for
    /// transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot create the buffer.
    pub fn upload(&mut self, device: &GraphicsDevice) -> Result<(), GraphicsError> {
        kiln_core::profile_function!();

        let Some(data) = self.backing_store.as_deref() else {
            panic!("upload of a vertex array without backing store");
        };

        if self.buffer.is_none() {
            let mut descriptor = BufferDescriptor::new(
                self.kind,
                self.size_in_bytes(),
                self.usage | BufferUsage::TRANSFER_DST,
            );
            if let Some(label) = &self.label {
                descriptor = descriptor.with_label(label.clone());
            }
            self.buffer = Some(device.create_buffer(&descriptor)?);
        }

        *self.pending.lock() = Some(data.to_vec());
        Ok(())
    }

    /// Transfer pending data, if any and if the array is due.
    ///
    /// Static arrays transfer their pending data once. Dynamic arrays also
    /// require a [`prepare_for_rendering`](Self::prepare_for_rendering)
    /// since their last transfer.
    ///
    /// # Errors
    ///
    /// Returns the command context error if the transfer fails. Pending data
    /// is kept for a later attempt.
    pub fn upload_if_needed(&self, ctx: &mut DeviceCommandContext) -> Result<(), GraphicsError> {
        let Some(buffer) = &self.buffer else {
            return Ok(());
        };
        if self.is_dynamic() && !self.needed.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut pending = self.pending.lock();
        let Some(data) = pending.take() else {
            return Ok(());
        };
        if let Err(err) = ctx.upload_buffer(buffer, &data) {
            *pending = Some(data);
            return Err(err);
        }
        self.needed.store(false, Ordering::Release);
        Ok(())
    }

    /// Mark the array as drawn this frame.
    pub fn prepare_for_rendering(&self) {
        self.needed.store(true, Ordering::Release);
    }

    /// Whether `upload` queued data that has not been transferred yet.
    pub fn has_pending_upload(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Drop the CPU copy. Later writer access panics.
    pub fn free_backing_store(&mut self) {
        self.backing_store = None;
    }

    /// GPU buffer, once uploaded.
    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref()
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("kind", &self.kind)
            .field("usage", &self.usage)
            .field("label", &self.label)
            .field("attributes", &self.attributes)
            .field("stride", &self.stride)
            .field("number_of_vertices", &self.number_of_vertices)
            .field("backing_store", &self.backing_store.is_some())
            .field("buffer", &self.buffer.as_ref().map(|b| b.id()))
            .finish()
    }
}

/// Index buffer of 16-bit indices with the same upload semantics as
/// [`VertexArray`].
#[derive(Debug)]
pub struct VertexIndexArray {
    array: VertexArray,
    attribute: AttributeHandle,
}

impl VertexIndexArray {
    pub fn new(usage: BufferUsage) -> Self {
        let mut array = VertexArray::new(BufferKind::Index, usage);
        let attribute = array.add_attribute(Format::R16Uint);
        Self { array, attribute }
    }

    /// Set the debug label passed to the GPU buffer.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.array = self.array.with_label(label);
        self
    }

    /// Index element format.
    pub fn format(&self) -> Format {
        Format::R16Uint
    }

    pub fn set_number_of_indices(&mut self, count: usize) {
        self.array.set_number_of_vertices(count);
    }

    pub fn number_of_indices(&self) -> usize {
        self.array.number_of_vertices()
    }

    pub fn layout(&mut self) {
        self.array.layout();
    }

    pub fn writer(&mut self) -> AttributeWriter<'_, u16> {
        self.array.writer(self.attribute)
    }

    pub fn read(&self, index: usize) -> u16 {
        self.array.read(self.attribute, index)
    }

    /// See [`VertexArray::upload`].
    pub fn upload(&mut self, device: &GraphicsDevice) -> Result<(), GraphicsError> {
        self.array.upload(device)
    }

    /// See [`VertexArray::upload_if_needed`].
    pub fn upload_if_needed(&self, ctx: &mut DeviceCommandContext) -> Result<(), GraphicsError> {
        self.array.upload_if_needed(ctx)
    }

    pub fn prepare_for_rendering(&self) {
        self.array.prepare_for_rendering();
    }

    pub fn has_pending_upload(&self) -> bool {
        self.array.has_pending_upload()
    }

    pub fn has_backing_store(&self) -> bool {
        self.array.has_backing_store()
    }

    pub fn free_backing_store(&mut self) {
        self.array.free_backing_store();
    }

    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.array.buffer()
    }
}

/// Strided view of one attribute inside a vertex array's backing store.
///
/// Several writers may view the same store at once, one per attribute.
pub struct AttributeWriter<'a, T> {
    data: &'a [Cell<u8>],
    offset: usize,
    stride: usize,
    count: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod> AttributeWriter<'a, T> {
    fn new(data: &'a [Cell<u8>], offset: usize, stride: usize, count: usize) -> Self {
        Self {
            data,
            offset,
            stride,
            count,
            _marker: PhantomData,
        }
    }

    /// Read back the value at `index`.
    pub fn get(&self, index: usize) -> T {
        let mut value = T::zeroed();
        for (byte, cell) in bytemuck::bytes_of_mut(&mut value)
            .iter_mut()
            .zip(self.cells(index))
        {
            *byte = cell.get();
        }
        value
    }

    fn cells(&self, index: usize) -> &'a [Cell<u8>] {
        assert!(
            index < self.count,
            "attribute index {index} out of range ({} vertices)",
            self.count
        );
        let start = index * self.stride + self.offset;
        &self.data[start..start + std::mem::size_of::<T>()]
    }
}

impl<T: Pod> VertexSink<T> for AttributeWriter<'_, T> {
    fn len(&self) -> usize {
        self.count
    }

    fn set(&mut self, index: usize, value: T) {
        for (cell, byte) in self.cells(index).iter().zip(bytemuck::bytes_of(&value)) {
            cell.set(*byte);
        }
    }
}

static_assertions::assert_impl_all!(VertexArray: Send, Sync);
static_assertions::assert_impl_all!(VertexIndexArray: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceParameters;

    fn device() -> Arc<GraphicsDevice> {
        GraphicsDevice::new(DeviceParameters::new()).unwrap()
    }

    fn position_normal_array(
        vertices: usize,
        usage: BufferUsage,
    ) -> (VertexArray, AttributeHandle, AttributeHandle) {
        let mut array = VertexArray::new(BufferKind::Vertex, usage);
        let position = array.add_attribute(Format::R32G32B32A32Float);
        let normal = array.add_attribute(Format::R32G32B32A32Float);
        array.set_number_of_vertices(vertices);
        array.layout();
        (array, position, normal)
    }

    #[test]
    fn test_layout_packs_in_reverse_order() {
        let (array, position, normal) = position_normal_array(3, BufferUsage::DYNAMIC);
        assert_eq!(array.attribute(normal).offset, 0);
        assert_eq!(array.attribute(position).offset, 16);
        assert_eq!(array.stride(), 32);
        assert_eq!(array.backing_store().map(<[u8]>::len), Some(96));
    }

    #[test]
    fn test_layout_two_uv_sets() {
        let mut array = VertexArray::new(BufferKind::Vertex, BufferUsage::empty());
        let uv0 = array.add_attribute(Format::R32G32Float);
        let uv1 = array.add_attribute(Format::R32G32Float);
        array.set_number_of_vertices(4);
        array.layout();

        assert_eq!(array.attribute(uv1).offset, 0);
        assert_eq!(array.attribute(uv0).offset, 8);
        assert_eq!(array.stride(), 16);
    }

    #[test]
    fn test_vertex_layout_aligns_to_four_bytes() {
        let mut array = VertexArray::new(BufferKind::Vertex, BufferUsage::empty());
        let position = array.add_attribute(Format::R32G32B32Float);
        let id = array.add_attribute(Format::R16Uint);
        array.set_number_of_vertices(1);
        array.layout();

        assert_eq!(array.attribute(id).offset, 0);
        assert_eq!(array.attribute(position).offset, 4);
        assert_eq!(array.stride(), 16);

        let mut indices = VertexIndexArray::new(BufferUsage::empty());
        indices.set_number_of_indices(3);
        indices.layout();
        assert_eq!(indices.array.stride(), 2);
    }

    #[test]
    fn test_writer_is_strided() {
        let (mut array, position, normal) = position_normal_array(2, BufferUsage::DYNAMIC);
        {
            let mut writer = array.writer::<[f32; 4]>(position);
            writer.set(1, [1.0, 2.0, 3.0, 1.0]);
            assert_eq!(writer.get(1), [1.0, 2.0, 3.0, 1.0]);
        }
        array.writer::<[f32; 4]>(normal).set(1, [0.0, 0.0, 1.0, 0.0]);

        assert_eq!(array.read::<[f32; 4]>(position, 1), [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(array.read::<[f32; 4]>(normal, 1), [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(array.read::<[f32; 4]>(position, 0), [0.0; 4]);
    }

    #[test]
    fn test_writer_pair_shares_vertices() {
        let (mut array, position, normal) = position_normal_array(2, BufferUsage::DYNAMIC);
        {
            let (mut positions, mut normals) =
                array.writer_pair::<[f32; 4], [f32; 4]>(position, normal);
            for index in 0..2 {
                positions.set(index, [index as f32, 0.0, 0.0, 1.0]);
                normals.set(index, [0.0, 1.0, 0.0, 0.0]);
            }
        }

        assert_eq!(array.read::<[f32; 4]>(position, 1), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(array.read::<[f32; 4]>(normal, 0), [0.0, 1.0, 0.0, 0.0]);
        let store = array.backing_store().unwrap();
        let first_normal: [f32; 4] = bytemuck::pod_read_unaligned(&store[0..16]);
        assert_eq!(first_normal, [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "backing store is not available")]
    fn test_writer_after_free_panics() {
        let (mut array, position, _) = position_normal_array(2, BufferUsage::empty());
        array.free_backing_store();
        let _ = array.writer::<[f32; 4]>(position);
    }

    #[test]
    #[should_panic(expected = "do not fit attribute format")]
    fn test_writer_rejects_oversized_values() {
        let mut array = VertexArray::new(BufferKind::Vertex, BufferUsage::empty());
        let uv = array.add_attribute(Format::R32G32Float);
        array.set_number_of_vertices(1);
        array.layout();
        let _ = array.writer::<[f32; 3]>(uv);
    }

    #[test]
    fn test_static_array_uploads_once() {
        let device = device();
        let mut ctx = device.create_command_context();
        let (mut array, position, _) = position_normal_array(2, BufferUsage::empty());
        array.writer::<[f32; 4]>(position).set(0, [5.0, 6.0, 7.0, 1.0]);

        array.upload(&device).unwrap();
        array.free_backing_store();
        array.upload_if_needed(&mut ctx).unwrap();
        array.upload_if_needed(&mut ctx).unwrap();

        assert_eq!(ctx.stats().buffer_uploads, 1);
        let bytes = device.read_buffer(array.buffer().unwrap()).unwrap();
        let first: [f32; 4] = bytemuck::pod_read_unaligned(&bytes[16..32]);
        assert_eq!(first, [5.0, 6.0, 7.0, 1.0]);
    }

    #[test]
    fn test_dynamic_array_waits_for_prepare() {
        let device = device();
        let mut ctx = device.create_command_context();
        let (mut array, _, _) = position_normal_array(2, BufferUsage::DYNAMIC);

        array.upload(&device).unwrap();
        array.upload_if_needed(&mut ctx).unwrap();
        assert_eq!(ctx.stats().buffer_uploads, 0);
        assert!(array.has_pending_upload());

        array.prepare_for_rendering();
        array.upload_if_needed(&mut ctx).unwrap();
        array.upload_if_needed(&mut ctx).unwrap();
        assert_eq!(ctx.stats().buffer_uploads, 1);
        assert!(!array.has_pending_upload());

        // Prepared again but nothing new was queued
        array.prepare_for_rendering();
        array.upload_if_needed(&mut ctx).unwrap();
        assert_eq!(ctx.stats().buffer_uploads, 1);
    }

    #[test]
    fn test_buffer_created_once() {
        let device = device();
        let (mut array, _, _) = position_normal_array(2, BufferUsage::DYNAMIC);
        array.upload(&device).unwrap();
        let first = Arc::clone(array.buffer().unwrap());
        array.upload(&device).unwrap();

        assert!(Arc::ptr_eq(&first, array.buffer().unwrap()));
        assert_eq!(device.buffers_created(), 1);
        assert!(first.usage().contains(BufferUsage::DYNAMIC | BufferUsage::TRANSFER_DST));
    }

    #[test]
    fn test_empty_array_upload_fails() {
        let device = device();
        let (mut array, _, _) = position_normal_array(0, BufferUsage::empty());
        assert!(array.upload(&device).is_err());
    }

    #[test]
    fn test_index_array() {
        let device = device();
        let mut ctx = device.create_command_context();
        let mut indices = VertexIndexArray::new(BufferUsage::empty()).with_label("indices");
        indices.set_number_of_indices(3);
        indices.layout();
        {
            let mut writer = indices.writer();
            writer.set(0, 2);
            writer.set(1, 0);
            writer.set(2, 1);
        }
        assert_eq!(indices.read(0), 2);

        indices.upload(&device).unwrap();
        indices.free_backing_store();
        indices.upload_if_needed(&mut ctx).unwrap();

        let buffer = indices.buffer().unwrap();
        assert_eq!(buffer.kind(), BufferKind::Index);
        assert_eq!(buffer.label(), Some("indices"));
        let bytes = device.read_buffer(buffer).unwrap();
        let values: Vec<u16> = bytes
            .chunks_exact(2)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(values, vec![2, 0, 1]);
    }
}
