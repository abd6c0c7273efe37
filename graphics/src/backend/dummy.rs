//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. Buffer contents are
//! kept in host memory so uploads can be read back and verified, and executed
//! commands are only logged.

use parking_lot::Mutex;

use crate::command::DeviceCommand;
use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

use super::{GpuBackend, GpuBuffer};

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend;

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self
    }
}

fn checked_range(
    len: usize,
    offset: u64,
    size: u64,
) -> Result<std::ops::Range<usize>, GraphicsError> {
    let start = offset as usize;
    let end = start.checked_add(size as usize);
    match end {
        Some(end) if end <= len => Ok(start..end),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "range {offset}..{} exceeds buffer size {len}",
            offset.saturating_add(size)
        ))),
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(GpuBuffer::Dummy {
            contents: Mutex::new(vec![0u8; descriptor.size as usize]),
        })
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: write_buffer offset={} len={}",
            offset,
            data.len()
        );
        match buffer {
            GpuBuffer::Dummy { contents } => {
                let mut contents = contents.lock();
                let range = checked_range(contents.len(), offset, data.len() as u64)?;
                contents[range].copy_from_slice(data);
                Ok(())
            }
        }
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        log::trace!("DummyBackend: read_buffer offset={} size={}", offset, size);
        match buffer {
            GpuBuffer::Dummy { contents } => {
                let contents = contents.lock();
                let range = checked_range(contents.len(), offset, size)?;
                Ok(contents[range].to_vec())
            }
        }
    }

    fn execute(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError> {
        log::trace!("DummyBackend: executing {} commands", commands.len());
        for (index, command) in commands.iter().enumerate() {
            log::trace!("DummyBackend: [{}] {:?}", index, command);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferKind, BufferUsage};

    fn buffer(backend: &DummyBackend, size: u64) -> GpuBuffer {
        let desc = BufferDescriptor::new(BufferKind::Vertex, size, BufferUsage::TRANSFER_DST);
        backend.create_buffer(&desc).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let backend = DummyBackend::new();
        let gpu = buffer(&backend, 8);
        backend.write_buffer(&gpu, 2, &[1, 2, 3]).unwrap();
        assert_eq!(backend.read_buffer(&gpu, 0, 8).unwrap(), vec![0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_out_of_range_write_fails() {
        let backend = DummyBackend::new();
        let gpu = buffer(&backend, 4);
        let err = backend.write_buffer(&gpu, 2, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidParameter(_)));
        assert!(backend.read_buffer(&gpu, 3, 2).is_err());
    }

    #[test]
    fn test_name() {
        assert_eq!(DummyBackend::new().name(), "Dummy");
    }
}
