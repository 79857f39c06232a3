#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraRawResourceDx12;
use crate::null::CeraRawResourceNull;
use crate::{CeraResourceDesc, CeraResult};

/// A backend GPU resource (buffer or texture) with its own committed memory. Cloning shares the
/// underlying resource.
#[derive(Clone, Debug)]
pub enum CeraRawResource {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraRawResourceDx12),
    Null(CeraRawResourceNull),
}

impl CeraRawResource {
    pub fn resource_desc(&self) -> &CeraResourceDesc {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraRawResource::Dx12(inner) => inner.resource_desc(),
            CeraRawResource::Null(inner) => inner.resource_desc(),
        }
    }

    /// GPU address of the start of a buffer. Zero for textures.
    pub fn gpu_virtual_address(&self) -> u64 {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraRawResource::Dx12(inner) => inner.gpu_virtual_address(),
            CeraRawResource::Null(inner) => inner.gpu_virtual_address(),
        }
    }

    pub fn set_debug_name(
        &self,
        name: &str,
    ) {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraRawResource::Dx12(inner) => inner.set_debug_name(name),
            CeraRawResource::Null(inner) => inner.set_debug_name(name),
        }
    }

    /// Map a CPU-visible resource. The pointer stays valid until `unmap` or the resource is
    /// dropped.
    pub fn map(&self) -> CeraResult<*mut u8> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraRawResource::Dx12(inner) => inner.map(),
            CeraRawResource::Null(inner) => inner.map(),
        }
    }

    pub fn unmap(&self) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraRawResource::Dx12(inner) => inner.unmap(),
            CeraRawResource::Null(inner) => inner.unmap(),
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_raw_resource(&self) -> Option<&CeraRawResourceDx12> {
        match self {
            CeraRawResource::Dx12(inner) => Some(inner),
            CeraRawResource::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_raw_resource(&self) -> Option<&CeraRawResourceNull> {
        match self {
            CeraRawResource::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
