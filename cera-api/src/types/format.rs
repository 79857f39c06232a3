#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Pixel/element formats. This is the subset of DXGI formats the engine creates resources and
/// views with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraFormat {
    Unknown,
    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_UNORM_SRGB,
    R10G10B10A2_UNORM,
    R16G16B16A16_FLOAT,
    R32G32B32A32_FLOAT,
    R32G32B32_FLOAT,
    R32G32_FLOAT,
    R32_FLOAT,
    R32_UINT,
    R16_UINT,
    R32_TYPELESS,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl Default for CeraFormat {
    fn default() -> Self {
        CeraFormat::Unknown
    }
}

impl CeraFormat {
    pub fn is_depth(self) -> bool {
        match self {
            CeraFormat::D32_FLOAT | CeraFormat::D24_UNORM_S8_UINT => true,
            _ => false,
        }
    }

    pub fn has_stencil(self) -> bool {
        self == CeraFormat::D24_UNORM_S8_UINT
    }

    /// Size of one element/texel in bytes, None for `Unknown`
    pub fn bytes_per_element(self) -> Option<u32> {
        Some(match self {
            CeraFormat::Unknown => return None,
            CeraFormat::R8G8B8A8_UNORM
            | CeraFormat::R8G8B8A8_UNORM_SRGB
            | CeraFormat::B8G8R8A8_UNORM
            | CeraFormat::B8G8R8A8_UNORM_SRGB
            | CeraFormat::R10G10B10A2_UNORM
            | CeraFormat::R32_FLOAT
            | CeraFormat::R32_UINT
            | CeraFormat::R32_TYPELESS
            | CeraFormat::D32_FLOAT
            | CeraFormat::D24_UNORM_S8_UINT => 4,
            CeraFormat::R16_UINT => 2,
            CeraFormat::R16G16B16A16_FLOAT | CeraFormat::R32G32_FLOAT => 8,
            CeraFormat::R32G32B32_FLOAT => 12,
            CeraFormat::R32G32B32A32_FLOAT => 16,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(CeraFormat::D32_FLOAT.is_depth());
        assert!(!CeraFormat::D32_FLOAT.has_stencil());
        assert!(CeraFormat::D24_UNORM_S8_UINT.has_stencil());
        assert!(!CeraFormat::R8G8B8A8_UNORM.is_depth());
    }

    #[test]
    fn test_element_size() {
        assert_eq!(CeraFormat::R32G32B32A32_FLOAT.bytes_per_element(), Some(16));
        assert_eq!(CeraFormat::R16_UINT.bytes_per_element(), Some(2));
        assert_eq!(CeraFormat::Unknown.bytes_per_element(), None);
    }
}
