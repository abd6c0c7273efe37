//! Data formats for vertex attributes and indices.

/// Element format of a vertex attribute or index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Single 16-bit unsigned integer (indices).
    R16Uint,
    /// Two 32-bit floats.
    R32G32Float,
    /// Three 32-bit floats.
    R32G32B32Float,
    /// Four 32-bit floats.
    R32G32B32A32Float,
}

impl Format {
    /// Size in bytes of one element.
    pub fn size(&self) -> u32 {
        match self {
            Self::R16Uint => 2,
            Self::R32G32Float => 8,
            Self::R32G32B32Float => 12,
            Self::R32G32B32A32Float => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(Format::R16Uint.size(), 2);
        assert_eq!(Format::R32G32Float.size(), 8);
        assert_eq!(Format::R32G32B32Float.size(), 12);
        assert_eq!(Format::R32G32B32A32Float.size(), 16);
    }
}
