use crate::dx12::CeraDeviceContextDx12;
use crate::{
    CeraCpuDescriptorHandle, CeraDescriptorHeapDef, CeraError, CeraGpuDescriptorHandle,
    CeraResult,
};
use std::sync::Arc;

use super::d3d12;

struct CeraDescriptorHeapDx12Inner {
    heap: d3d12::ID3D12DescriptorHeap,
    heap_def: CeraDescriptorHeapDef,
    stride: u32,
    cpu_first_handle: d3d12::D3D12_CPU_DESCRIPTOR_HANDLE,
    gpu_first_handle: Option<d3d12::D3D12_GPU_DESCRIPTOR_HANDLE>,
}

// ID3D12DescriptorHeap is free-threaded, writes to descriptors are synchronized by the caller
unsafe impl Send for CeraDescriptorHeapDx12Inner {}
unsafe impl Sync for CeraDescriptorHeapDx12Inner {}

#[derive(Clone)]
pub struct CeraDescriptorHeapDx12 {
    inner: Arc<CeraDescriptorHeapDx12Inner>,
}

impl std::fmt::Debug for CeraDescriptorHeapDx12 {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraDescriptorHeapDx12")
            .field("heap_def", &self.inner.heap_def)
            .field("cpu_first_handle", &self.inner.cpu_first_handle.ptr)
            .finish()
    }
}

impl CeraDescriptorHeapDx12 {
    pub fn new(
        device_context: &CeraDeviceContextDx12,
        heap_def: &CeraDescriptorHeapDef,
    ) -> CeraResult<CeraDescriptorHeapDx12> {
        if heap_def.descriptor_count == 0 {
            return Err(CeraError::ResourceCreationFailed(
                "Descriptor heaps must have at least one descriptor".to_string(),
            ));
        }

        if heap_def.shader_visible && !heap_def.heap_type.can_be_shader_visible() {
            return Err(CeraError::ResourceCreationFailed(format!(
                "{:?} descriptor heaps can't be shader visible",
                heap_def.heap_type
            )));
        }

        let heap_type: d3d12::D3D12_DESCRIPTOR_HEAP_TYPE = heap_def.heap_type.into();
        let desc = d3d12::D3D12_DESCRIPTOR_HEAP_DESC {
            Type: heap_type,
            NumDescriptors: heap_def.descriptor_count,
            Flags: if heap_def.shader_visible {
                d3d12::D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                d3d12::D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };

        let device = device_context.d3d12_device();
        let heap: d3d12::ID3D12DescriptorHeap = unsafe { device.CreateDescriptorHeap(&desc) }
            .map_err(|e| {
                CeraError::ResourceCreationFailed(format!(
                    "CreateDescriptorHeap failed for {:?}: {:?}",
                    heap_def, e
                ))
            })?;

        let (cpu_first_handle, gpu_first_handle, stride) = unsafe {
            let cpu_first_handle = heap.GetCPUDescriptorHandleForHeapStart();
            let gpu_first_handle = if heap_def.shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart())
            } else {
                None
            };
            let stride = device.GetDescriptorHandleIncrementSize(heap_type);
            (cpu_first_handle, gpu_first_handle, stride)
        };

        log::trace!(
            "Created descriptor heap {:?} at {:x}",
            heap_def,
            cpu_first_handle.ptr
        );

        Ok(CeraDescriptorHeapDx12 {
            inner: Arc::new(CeraDescriptorHeapDx12Inner {
                heap,
                heap_def: *heap_def,
                stride,
                cpu_first_handle,
                gpu_first_handle,
            }),
        })
    }

    pub fn dx12_descriptor_heap(&self) -> &d3d12::ID3D12DescriptorHeap {
        &self.inner.heap
    }

    pub fn heap_def(&self) -> &CeraDescriptorHeapDef {
        &self.inner.heap_def
    }

    pub fn descriptor_increment(&self) -> u32 {
        self.inner.stride
    }

    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> CeraCpuDescriptorHandle {
        CeraCpuDescriptorHandle(
            self.inner.cpu_first_handle.ptr + (index as usize * self.inner.stride as usize),
        )
    }

    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<CeraGpuDescriptorHandle> {
        self.inner.gpu_first_handle.map(|first| {
            CeraGpuDescriptorHandle(first.ptr + (index as u64 * self.inner.stride as u64))
        })
    }
}
