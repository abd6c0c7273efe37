//! Graphics error types.

use std::fmt;

/// Errors that can occur in the graphics system.
///
/// These cover device and backend failures only. Broken engine invariants
/// (misaligned vertex layouts, drawing without bound buffers) panic instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A buffer descriptor or upload was rejected by the device or backend.
    InvalidParameter(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::InvalidParameter("buffer size cannot be zero".to_string());
        assert_eq!(err.to_string(), "invalid parameter: buffer size cannot be zero");
    }
}
