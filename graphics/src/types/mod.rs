//! Resource descriptors and formats.

mod buffer;
mod format;

pub use buffer::{BufferDescriptor, BufferKind, BufferUsage};
pub use format::Format;
