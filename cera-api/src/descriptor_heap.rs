#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraDescriptorHeapDx12;
use crate::null::CeraDescriptorHeapNull;
use crate::{CeraCpuDescriptorHandle, CeraDescriptorHeapDef, CeraGpuDescriptorHandle};

/// A fixed-size array of descriptors of one type. Heaps never grow, the framework's descriptor
/// allocator adds more heaps instead so that existing handles stay valid.
#[derive(Clone, Debug)]
pub enum CeraDescriptorHeap {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraDescriptorHeapDx12),
    Null(CeraDescriptorHeapNull),
}

impl CeraDescriptorHeap {
    pub fn heap_def(&self) -> &CeraDescriptorHeapDef {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDescriptorHeap::Dx12(inner) => inner.heap_def(),
            CeraDescriptorHeap::Null(inner) => inner.heap_def(),
        }
    }

    pub fn descriptor_count(&self) -> u32 {
        self.heap_def().descriptor_count
    }

    /// Handle of the descriptor at `index`. Only meaningful for `index < descriptor_count()`.
    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> CeraCpuDescriptorHandle {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDescriptorHeap::Dx12(inner) => inner.cpu_handle(index),
            CeraDescriptorHeap::Null(inner) => inner.cpu_handle(index),
        }
    }

    /// GPU handle of the descriptor at `index`, None if the heap is not shader visible
    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<CeraGpuDescriptorHandle> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDescriptorHeap::Dx12(inner) => inner.gpu_handle(index),
            CeraDescriptorHeap::Null(inner) => inner.gpu_handle(index),
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_descriptor_heap(&self) -> Option<&CeraDescriptorHeapDx12> {
        match self {
            CeraDescriptorHeap::Dx12(inner) => Some(inner),
            CeraDescriptorHeap::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_descriptor_heap(&self) -> Option<&CeraDescriptorHeapNull> {
        match self {
            CeraDescriptorHeap::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
