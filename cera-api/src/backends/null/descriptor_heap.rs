use crate::null::{CeraDeviceContextNull, NULL_DESCRIPTOR_INCREMENT};
use crate::{
    CeraCpuDescriptorHandle, CeraDescriptorHeapDef, CeraError, CeraGpuDescriptorHandle,
    CeraResult,
};
use std::sync::Arc;

struct CeraDescriptorHeapNullInner {
    heap_id: u64,
    heap_def: CeraDescriptorHeapDef,
    cpu_first_handle: usize,
    gpu_first_handle: Option<u64>,
}

/// A fixed-size array of descriptors. Handles are synthetic but follow the same arithmetic as
/// D3D12 (first handle plus index times increment), and never overlap between heaps.
#[derive(Clone)]
pub struct CeraDescriptorHeapNull {
    inner: Arc<CeraDescriptorHeapNullInner>,
}

impl std::fmt::Debug for CeraDescriptorHeapNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraDescriptorHeapNull")
            .field("heap_id", &self.inner.heap_id)
            .field("heap_def", &self.inner.heap_def)
            .finish()
    }
}

impl CeraDescriptorHeapNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        heap_def: &CeraDescriptorHeapDef,
    ) -> CeraResult<CeraDescriptorHeapNull> {
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

        let heap_id = device_context.next_object_id();
        // Each heap gets its own 4GB window of the handle space
        let cpu_first_handle = (heap_id as usize) << 32;
        let gpu_first_handle = if heap_def.shader_visible {
            Some(heap_id << 32)
        } else {
            None
        };

        log::trace!(
            "Creating null descriptor heap {} {:?}",
            heap_id,
            heap_def
        );

        Ok(CeraDescriptorHeapNull {
            inner: Arc::new(CeraDescriptorHeapNullInner {
                heap_id,
                heap_def: *heap_def,
                cpu_first_handle,
                gpu_first_handle,
            }),
        })
    }

    pub fn heap_id(&self) -> u64 {
        self.inner.heap_id
    }

    pub fn heap_def(&self) -> &CeraDescriptorHeapDef {
        &self.inner.heap_def
    }

    pub fn descriptor_increment(&self) -> u32 {
        NULL_DESCRIPTOR_INCREMENT as u32
    }

    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> CeraCpuDescriptorHandle {
        debug_assert!(index < self.inner.heap_def.descriptor_count);
        CeraCpuDescriptorHandle(
            self.inner.cpu_first_handle + index as usize * NULL_DESCRIPTOR_INCREMENT,
        )
    }

    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<CeraGpuDescriptorHandle> {
        debug_assert!(index < self.inner.heap_def.descriptor_count);
        self.inner.gpu_first_handle.map(|first| {
            CeraGpuDescriptorHandle(first + index as u64 * NULL_DESCRIPTOR_INCREMENT as u64)
        })
    }
}
