//! GPU resources.
//!
//! Resources are created by [`GraphicsDevice`] and shared with [`Arc`]:
//! - [`Buffer`] - GPU memory buffer
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;

pub use buffer::{Buffer, BufferId};
