use crate::device_context::BACKEND_MISMATCH;
#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraCommandBufferDx12;
use crate::null::CeraCommandBufferNull;
use crate::{
    CeraDescriptorHeap, CeraGpuDescriptorHandle, CeraPipeline, CeraQueueType, CeraRawResource,
    CeraResourceBarrier, CeraResult, CeraRootSignature,
};

/// A command allocator paired with the command list that records into it.
///
/// Command buffers are created closed. `reset` must be called before recording, and it must not
/// be called while the GPU may still be executing previously recorded commands. `close` ends
/// recording so the command buffer can be executed by a queue of the same type.
#[derive(Debug)]
pub enum CeraCommandBuffer {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraCommandBufferDx12),
    Null(CeraCommandBufferNull),
}

impl CeraCommandBuffer {
    pub fn queue_type(&self) -> CeraQueueType {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.queue_type(),
            CeraCommandBuffer::Null(inner) => inner.queue_type(),
        }
    }

    /// Reset the allocator and reopen the list for recording
    pub fn reset(&self) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.reset(),
            CeraCommandBuffer::Null(inner) => inner.reset(),
        }
    }

    pub fn close(&self) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.close(),
            CeraCommandBuffer::Null(inner) => inner.close(),
        }
    }

    pub fn resource_barrier(
        &self,
        barriers: &[CeraResourceBarrier],
    ) -> CeraResult<()> {
        if barriers.is_empty() {
            return Ok(());
        }

        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.resource_barrier(barriers),
            CeraCommandBuffer::Null(inner) => {
                for barrier in barriers {
                    match barrier {
                        CeraResourceBarrier::Transition {
                            resource,
                            state_before,
                            state_after,
                        } => inner.transition_barrier(
                            resource.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                            *state_before,
                            *state_after,
                        )?,
                        CeraResourceBarrier::Uav { resource } => inner.uav_barrier(
                            resource.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                        )?,
                    }
                }
                Ok(())
            }
        }
    }

    pub fn copy_buffer_region(
        &self,
        dst: &CeraRawResource,
        dst_offset: u64,
        src: &CeraRawResource,
        src_offset: u64,
        size: u64,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.copy_buffer_region(
                dst.dx12_raw_resource().ok_or(BACKEND_MISMATCH)?,
                dst_offset,
                src.dx12_raw_resource().ok_or(BACKEND_MISMATCH)?,
                src_offset,
                size,
            ),
            CeraCommandBuffer::Null(inner) => inner.copy_buffer_region(
                dst.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                dst_offset,
                src.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                src_offset,
                size,
            ),
        }
    }

    pub fn copy_resource(
        &self,
        dst: &CeraRawResource,
        src: &CeraRawResource,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.copy_resource(
                dst.dx12_raw_resource().ok_or(BACKEND_MISMATCH)?,
                src.dx12_raw_resource().ok_or(BACKEND_MISMATCH)?,
            ),
            CeraCommandBuffer::Null(inner) => inner.copy_resource(
                dst.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
                src.null_raw_resource().ok_or(BACKEND_MISMATCH)?,
            ),
        }
    }

    /// Bind shader-visible heaps. At most one CBV/SRV/UAV heap and one sampler heap.
    pub fn set_descriptor_heaps(
        &self,
        heaps: &[&CeraDescriptorHeap],
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => {
                let heaps = heaps
                    .iter()
                    .map(|x| x.dx12_descriptor_heap().ok_or(BACKEND_MISMATCH))
                    .collect::<Result<Vec<_>, _>>()?;
                inner.set_descriptor_heaps(&heaps)
            }
            CeraCommandBuffer::Null(inner) => {
                let heaps = heaps
                    .iter()
                    .map(|x| x.null_descriptor_heap().ok_or(BACKEND_MISMATCH))
                    .collect::<Result<Vec<_>, _>>()?;
                inner.set_descriptor_heaps(&heaps)
            }
        }
    }

    pub fn set_compute_root_signature(
        &self,
        root_signature: &CeraRootSignature,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner.set_compute_root_signature(
                root_signature
                    .dx12_root_signature()
                    .ok_or(BACKEND_MISMATCH)?,
            ),
            CeraCommandBuffer::Null(inner) => inner.set_compute_root_signature(
                root_signature
                    .null_root_signature()
                    .ok_or(BACKEND_MISMATCH)?,
            ),
        }
    }

    pub fn set_pipeline(
        &self,
        pipeline: &CeraPipeline,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => {
                inner.set_pipeline(pipeline.dx12_pipeline().ok_or(BACKEND_MISMATCH)?)
            }
            CeraCommandBuffer::Null(inner) => {
                inner.set_pipeline(pipeline.null_pipeline().ok_or(BACKEND_MISMATCH)?)
            }
        }
    }

    pub fn set_compute_root_descriptor_table(
        &self,
        root_parameter_index: u32,
        base_descriptor: CeraGpuDescriptorHandle,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => {
                inner.set_compute_root_descriptor_table(root_parameter_index, base_descriptor)
            }
            CeraCommandBuffer::Null(inner) => {
                inner.set_compute_root_descriptor_table(root_parameter_index, base_descriptor)
            }
        }
    }

    pub fn set_compute_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        gpu_virtual_address: u64,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => inner
                .set_compute_root_constant_buffer_view(root_parameter_index, gpu_virtual_address),
            CeraCommandBuffer::Null(inner) => inner
                .set_compute_root_constant_buffer_view(root_parameter_index, gpu_virtual_address),
        }
    }

    pub fn dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraCommandBuffer::Dx12(inner) => {
                inner.dispatch(group_count_x, group_count_y, group_count_z)
            }
            CeraCommandBuffer::Null(inner) => {
                inner.dispatch(group_count_x, group_count_y, group_count_z)
            }
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_command_buffer(&self) -> Option<&CeraCommandBufferDx12> {
        match self {
            CeraCommandBuffer::Dx12(inner) => Some(inner),
            CeraCommandBuffer::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_command_buffer(&self) -> Option<&CeraCommandBufferNull> {
        match self {
            CeraCommandBuffer::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
