#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraDeviceContextDx12;
use crate::null::CeraDeviceContextNull;
use crate::*;

/// A cloneable, thread-safe handle used to create graphics resources.
///
/// All device contexts and resources created by them must be dropped before the `CeraApi` object
/// is dropped or destroyed.
#[derive(Clone, Debug)]
pub enum CeraDeviceContext {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraDeviceContextDx12),
    Null(CeraDeviceContextNull),
}

pub(crate) const BACKEND_MISMATCH: &str = "Object was created by a different backend";

impl CeraDeviceContext {
    pub fn backend_type(&self) -> CeraBackendType {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(_) => CeraBackendType::Dx12,
            CeraDeviceContext::Null(_) => CeraBackendType::Null,
        }
    }

    /// The adapter chosen when the device was created. Never changes.
    pub fn adapter_info(&self) -> &CeraAdapterInfo {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => inner.adapter_info(),
            CeraDeviceContext::Null(inner) => inner.adapter_info(),
        }
    }

    pub fn device_info(&self) -> &CeraDeviceInfo {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => inner.device_info(),
            CeraDeviceContext::Null(inner) => inner.device_info(),
        }
    }

    /// Create a queue. Each call creates a new hardware queue of the given type.
    pub fn create_queue(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraQueue> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => CeraQueue::Dx12(inner.create_queue(queue_type)?),
            CeraDeviceContext::Null(inner) => CeraQueue::Null(inner.create_queue(queue_type)?),
        })
    }

    /// Create a fence with a completed value of zero
    pub fn create_fence(&self) -> CeraResult<CeraFence> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => CeraFence::Dx12(inner.create_fence()?),
            CeraDeviceContext::Null(inner) => CeraFence::Null(inner.create_fence()?),
        })
    }

    /// Create a command allocator and command list for recording work for the given queue type.
    /// The command buffer is created closed.
    pub fn create_command_buffer(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandBuffer> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => {
                CeraCommandBuffer::Dx12(inner.create_command_buffer(queue_type)?)
            }
            CeraDeviceContext::Null(inner) => {
                CeraCommandBuffer::Null(inner.create_command_buffer(queue_type)?)
            }
        })
    }

    pub fn create_descriptor_heap(
        &self,
        heap_def: &CeraDescriptorHeapDef,
    ) -> CeraResult<CeraDescriptorHeap> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => {
                CeraDescriptorHeap::Dx12(inner.create_descriptor_heap(heap_def)?)
            }
            CeraDeviceContext::Null(inner) => {
                CeraDescriptorHeap::Null(inner.create_descriptor_heap(heap_def)?)
            }
        })
    }

    /// Create a committed resource in the given state. CPU-visible resources must use the state
    /// returned by `CeraMemoryUsage::required_initial_state`.
    pub fn create_raw_resource(
        &self,
        resource_desc: &CeraResourceDesc,
        initial_state: CeraResourceState,
    ) -> CeraResult<CeraRawResource> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => {
                CeraRawResource::Dx12(inner.create_raw_resource(resource_desc, initial_state)?)
            }
            CeraDeviceContext::Null(inner) => {
                CeraRawResource::Null(inner.create_raw_resource(resource_desc, initial_state)?)
            }
        })
    }

    pub fn create_root_signature(
        &self,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraRootSignature> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => {
                CeraRootSignature::Dx12(inner.create_root_signature(root_signature_def)?)
            }
            CeraDeviceContext::Null(inner) => {
                CeraRootSignature::Null(inner.create_root_signature(root_signature_def)?)
            }
        })
    }

    pub fn create_compute_pipeline(
        &self,
        compute_pipeline_def: &CeraComputePipelineDef,
    ) -> CeraResult<CeraPipeline> {
        Ok(match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => {
                CeraPipeline::Dx12(inner.create_compute_pipeline(compute_pipeline_def)?)
            }
            CeraDeviceContext::Null(inner) => {
                CeraPipeline::Null(inner.create_compute_pipeline(compute_pipeline_def)?)
            }
        })
    }

    /// Write a view of `resource` into the descriptor at `dst`
    pub fn create_view(
        &self,
        resource: &CeraRawResource,
        view_def: &CeraViewDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => inner.create_view(
                resource.dx12_raw_resource().ok_or(BACKEND_MISMATCH)?,
                view_def,
                dst,
            ),
            CeraDeviceContext::Null(inner) => inner.create_view(
                resource.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                view_def,
                dst,
            ),
        }
    }

    /// Write a sampler into the descriptor at `dst`
    pub fn create_sampler(
        &self,
        sampler_def: &CeraSamplerDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => inner.create_sampler(sampler_def, dst),
            CeraDeviceContext::Null(inner) => inner.create_sampler(sampler_def, dst),
        }
    }

    /// Copy `count` consecutive descriptors, typically from a CPU-only heap into a shader-visible
    /// one
    pub fn copy_descriptors(
        &self,
        dst: CeraCpuDescriptorHandle,
        src: CeraCpuDescriptorHandle,
        count: u32,
        heap_type: CeraDescriptorHeapType,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraDeviceContext::Dx12(inner) => inner.copy_descriptors(dst, src, count, heap_type),
            CeraDeviceContext::Null(inner) => inner.copy_descriptors(dst, src, count, heap_type),
        }
    }

    /// Get the underlying dx12 device context.
    #[cfg(feature = "cera-dx12")]
    pub fn dx12_device_context(&self) -> Option<&CeraDeviceContextDx12> {
        match self {
            CeraDeviceContext::Dx12(inner) => Some(inner),
            CeraDeviceContext::Null(_) => None,
        }
    }

    /// Get the null device context, which exposes the simulated GPU controls
    #[allow(unreachable_patterns)]
    pub fn null_device_context(&self) -> Option<&CeraDeviceContextNull> {
        match self {
            CeraDeviceContext::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
