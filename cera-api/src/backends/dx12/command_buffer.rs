use crate::dx12::{
    CeraDescriptorHeapDx12, CeraDeviceContextDx12, CeraPipelineDx12, CeraRawResourceDx12,
    CeraRootSignatureDx12,
};
use crate::{CeraGpuDescriptorHandle, CeraQueueType, CeraResourceBarrier, CeraResult};
use std::mem::ManuallyDrop;
use std::sync::Mutex;
use windows::core::Interface;

use super::d3d12;

/// A command allocator with a single command list recording into it. Created closed.
pub struct CeraCommandBufferDx12 {
    queue_type: CeraQueueType,
    command_allocator: d3d12::ID3D12CommandAllocator,
    command_list: d3d12::ID3D12GraphicsCommandList,
    command_list_base: d3d12::ID3D12CommandList,
    // The list may only be recorded from one thread at a time
    is_recording: Mutex<bool>,
}

// Access to the command list is serialized by is_recording and the owning context
unsafe impl Send for CeraCommandBufferDx12 {}
unsafe impl Sync for CeraCommandBufferDx12 {}

impl std::fmt::Debug for CeraCommandBufferDx12 {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraCommandBufferDx12")
            .field("queue_type", &self.queue_type)
            .finish()
    }
}

impl CeraCommandBufferDx12 {
    pub fn new(
        device_context: &CeraDeviceContextDx12,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandBufferDx12> {
        let command_list_type = super::internal::queue_type_to_command_list_type(queue_type);
        let command_allocator: d3d12::ID3D12CommandAllocator = unsafe {
            device_context
                .d3d12_device()
                .CreateCommandAllocator(command_list_type)
        }?;

        let command_list = unsafe {
            let command_list: d3d12::ID3D12GraphicsCommandList = device_context
                .d3d12_device()
                .CreateCommandList(0, command_list_type, &command_allocator, None)?;
            command_list.Close()?;
            command_list
        };

        let command_list_base = command_list.cast()?;

        Ok(CeraCommandBufferDx12 {
            queue_type,
            command_allocator,
            command_list,
            command_list_base,
            is_recording: Mutex::new(false),
        })
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.queue_type
    }

    pub fn dx12_command_list(&self) -> &d3d12::ID3D12GraphicsCommandList {
        &self.command_list
    }

    pub fn dx12_command_list_base(&self) -> &d3d12::ID3D12CommandList {
        &self.command_list_base
    }

    /// Must only be called once the GPU has finished executing previously recorded work
    pub fn reset(&self) -> CeraResult<()> {
        let mut is_recording = self.is_recording.lock().unwrap();
        if *is_recording {
            // A list left open would make the allocator reset fail
            unsafe { self.command_list.Close()? };
        }

        unsafe {
            self.command_allocator.Reset()?;
            self.command_list.Reset(&self.command_allocator, None)?;
        }

        *is_recording = true;
        Ok(())
    }

    pub fn close(&self) -> CeraResult<()> {
        let mut is_recording = self.is_recording.lock().unwrap();
        if !*is_recording {
            return Err("Closed a command buffer that is not recording")?;
        }

        unsafe { self.command_list.Close()? };
        *is_recording = false;
        Ok(())
    }

    fn require_recording(&self) -> CeraResult<()> {
        if !*self.is_recording.lock().unwrap() {
            return Err("Command buffer is not recording")?;
        }

        Ok(())
    }

    fn require_compute_capable(
        &self,
        operation: &str,
    ) -> CeraResult<()> {
        if self.queue_type == CeraQueueType::Copy {
            return Err(format!("{} is not supported on copy queues", operation))?;
        }

        self.require_recording()
    }

    pub fn resource_barrier(
        &self,
        barriers: &[CeraResourceBarrier],
    ) -> CeraResult<()> {
        self.require_recording()?;

        let mut dx12_barriers = Vec::with_capacity(barriers.len());
        for barrier in barriers {
            let dx12_barrier = match barrier {
                CeraResourceBarrier::Transition {
                    resource,
                    state_before,
                    state_after,
                } => {
                    let resource = resource
                        .dx12_raw_resource()
                        .ok_or(crate::device_context::BACKEND_MISMATCH)?;

                    let mut dx12_barrier = d3d12::D3D12_RESOURCE_BARRIER::default();
                    dx12_barrier.Type = d3d12::D3D12_RESOURCE_BARRIER_TYPE_TRANSITION;
                    dx12_barrier.Flags = d3d12::D3D12_RESOURCE_BARRIER_FLAG_NONE;
                    dx12_barrier.Anonymous.Transition =
                        ManuallyDrop::new(d3d12::D3D12_RESOURCE_TRANSITION_BARRIER {
                            pResource: windows::core::ManuallyDrop::new(resource.dx12_resource()),
                            Subresource: d3d12::D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                            StateBefore: (*state_before).into(),
                            StateAfter: (*state_after).into(),
                        });
                    dx12_barrier
                }
                CeraResourceBarrier::Uav { resource } => {
                    let resource = resource
                        .dx12_raw_resource()
                        .ok_or(crate::device_context::BACKEND_MISMATCH)?;

                    let mut dx12_barrier = d3d12::D3D12_RESOURCE_BARRIER::default();
                    dx12_barrier.Type = d3d12::D3D12_RESOURCE_BARRIER_TYPE_UAV;
                    dx12_barrier.Flags = d3d12::D3D12_RESOURCE_BARRIER_FLAG_NONE;
                    dx12_barrier.Anonymous.UAV =
                        ManuallyDrop::new(d3d12::D3D12_RESOURCE_UAV_BARRIER {
                            pResource: windows::core::ManuallyDrop::new(resource.dx12_resource()),
                        });
                    dx12_barrier
                }
            };

            dx12_barriers.push(dx12_barrier);
        }

        if !dx12_barriers.is_empty() {
            unsafe {
                self.command_list.ResourceBarrier(&dx12_barriers);
            }
        }

        Ok(())
    }

    pub fn copy_buffer_region(
        &self,
        dst: &CeraRawResourceDx12,
        dst_offset: u64,
        src: &CeraRawResourceDx12,
        src_offset: u64,
        size: u64,
    ) -> CeraResult<()> {
        self.require_recording()?;
        unsafe {
            self.command_list.CopyBufferRegion(
                dst.dx12_resource(),
                dst_offset,
                src.dx12_resource(),
                src_offset,
                size,
            );
        }
        Ok(())
    }

    pub fn copy_resource(
        &self,
        dst: &CeraRawResourceDx12,
        src: &CeraRawResourceDx12,
    ) -> CeraResult<()> {
        self.require_recording()?;
        unsafe {
            self.command_list
                .CopyResource(dst.dx12_resource(), src.dx12_resource());
        }
        Ok(())
    }

    pub fn set_descriptor_heaps(
        &self,
        heaps: &[&CeraDescriptorHeapDx12],
    ) -> CeraResult<()> {
        self.require_compute_capable("SetDescriptorHeaps")?;
        for heap in heaps {
            if !heap.heap_def().shader_visible {
                return Err("Only shader-visible descriptor heaps can be bound")?;
            }
        }

        let dx12_heaps: Vec<Option<d3d12::ID3D12DescriptorHeap>> = heaps
            .iter()
            .map(|x| Some(x.dx12_descriptor_heap().clone()))
            .collect();
        unsafe {
            self.command_list.SetDescriptorHeaps(&dx12_heaps);
        }
        Ok(())
    }

    pub fn set_compute_root_signature(
        &self,
        root_signature: &CeraRootSignatureDx12,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootSignature")?;
        unsafe {
            self.command_list
                .SetComputeRootSignature(root_signature.dx12_root_signature());
        }
        Ok(())
    }

    pub fn set_pipeline(
        &self,
        pipeline: &CeraPipelineDx12,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetPipelineState")?;
        unsafe {
            self.command_list
                .SetPipelineState(pipeline.dx12_pipeline_state());
        }
        Ok(())
    }

    pub fn set_compute_root_descriptor_table(
        &self,
        root_parameter_index: u32,
        base_descriptor: CeraGpuDescriptorHandle,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootDescriptorTable")?;
        unsafe {
            self.command_list.SetComputeRootDescriptorTable(
                root_parameter_index,
                d3d12::D3D12_GPU_DESCRIPTOR_HANDLE {
                    ptr: base_descriptor.0,
                },
            );
        }
        Ok(())
    }

    pub fn set_compute_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        gpu_virtual_address: u64,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootConstantBufferView")?;
        unsafe {
            self.command_list
                .SetComputeRootConstantBufferView(root_parameter_index, gpu_virtual_address);
        }
        Ok(())
    }

    pub fn dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CeraResult<()> {
        self.require_compute_capable("Dispatch")?;
        unsafe {
            self.command_list
                .Dispatch(group_count_x, group_count_y, group_count_z);
        }
        Ok(())
    }
}
