//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction for GPU backends so the
//! renderer can record and submit work without knowing the GPU API.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: keeps buffer contents in host memory and logs executed
//!   commands. Used for development and tests.
//!
//! # Architecture
//!
//! Each backend implements [`GpuBackend`], which provides:
//! - Buffer creation and host-to-device writes
//! - Buffer readback
//! - Execution of recorded [`DeviceCommand`]s

pub mod dummy;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::DeviceCommand;
use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

pub use dummy::DummyBackend;

/// Which backend a device should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// No GPU; contents live in host memory.
    #[default]
    Dummy,
}

/// Backend-specific handle to a GPU buffer allocation.
pub enum GpuBuffer {
    /// Dummy backend allocation, mirrored in host memory.
    Dummy { contents: Mutex<Vec<u8>> },
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { contents } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("size", &contents.lock().len())
                .finish(),
        }
    }
}

/// Interface every GPU backend implements.
pub trait GpuBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Allocate a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Copy `data` into `buffer` starting at `offset`.
    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError>;

    /// Read `size` bytes of `buffer` starting at `offset`.
    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError>;

    /// Execute recorded commands in order.
    fn execute(&self, commands: &[DeviceCommand]) -> Result<(), GraphicsError>;
}

/// Create the backend selected by `backend_type`.
pub fn create_backend(backend_type: BackendType) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match backend_type {
        BackendType::Dummy => Ok(Arc::new(DummyBackend::new())),
    }
}

static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);
