//! Vertex data: arrays with CPU backing store and vertex input layouts.

mod array;
mod layout;

pub use array::{
    AttributeHandle, AttributeWriter, VertexArray, VertexArrayAttribute, VertexIndexArray,
};
pub use layout::{VertexAttributeFormat, VertexAttributeStream, VertexInputLayout};
