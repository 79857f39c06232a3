use crate::null::{
    CeraDescriptorHeapNull, CeraDeviceContextNull, CeraPipelineNull, CeraRawResourceNull,
    CeraRootSignatureNull,
};
use crate::{CeraGpuDescriptorHandle, CeraQueueType, CeraResourceState, CeraResult};
use std::sync::Mutex;

/// A command as recorded into a null command buffer
#[derive(Clone, Debug)]
pub enum CeraNullCommand {
    Transition {
        resource_id: u64,
        state_before: CeraResourceState,
        state_after: CeraResourceState,
    },
    UavBarrier {
        resource_id: u64,
    },
    CopyBufferRegion {
        dst: CeraRawResourceNull,
        dst_offset: u64,
        src: CeraRawResourceNull,
        src_offset: u64,
        size: u64,
    },
    CopyResource {
        dst: CeraRawResourceNull,
        src: CeraRawResourceNull,
    },
    SetDescriptorHeaps {
        heap_ids: Vec<u64>,
    },
    SetComputeRootSignature {
        root_signature_id: u64,
    },
    SetPipeline {
        pipeline_id: u64,
    },
    SetComputeRootDescriptorTable {
        root_parameter_index: u32,
        base_descriptor: CeraGpuDescriptorHandle,
    },
    SetComputeRootConstantBufferView {
        root_parameter_index: u32,
        gpu_virtual_address: u64,
    },
    Dispatch {
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    },
}

#[derive(Default)]
struct CeraCommandBufferNullState {
    is_recording: bool,
    commands: Vec<CeraNullCommand>,
    reset_count: u64,
}

/// A command allocator and command list pair. Like D3D12, it starts closed and must be reset
/// before recording.
pub struct CeraCommandBufferNull {
    device_context: CeraDeviceContextNull,
    queue_type: CeraQueueType,
    command_buffer_id: u64,
    state: Mutex<CeraCommandBufferNullState>,
}

impl std::fmt::Debug for CeraCommandBufferNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraCommandBufferNull")
            .field("queue_type", &self.queue_type)
            .field("command_buffer_id", &self.command_buffer_id)
            .finish()
    }
}

impl CeraCommandBufferNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandBufferNull> {
        let command_buffer_id = device_context.next_object_id();
        log::trace!(
            "Creating null {:?} command buffer {}",
            queue_type,
            command_buffer_id
        );

        Ok(CeraCommandBufferNull {
            device_context: device_context.clone(),
            queue_type,
            command_buffer_id,
            state: Default::default(),
        })
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.queue_type
    }

    pub fn command_buffer_id(&self) -> u64 {
        self.command_buffer_id
    }

    /// Number of times the allocator has been reset
    pub fn reset_count(&self) -> u64 {
        self.state.lock().unwrap().reset_count
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().unwrap().is_recording
    }

    pub fn recorded_commands(&self) -> Vec<CeraNullCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn reset(&self) -> CeraResult<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.clear();
        state.is_recording = true;
        state.reset_count += 1;
        Ok(())
    }

    pub fn close(&self) -> CeraResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.is_recording {
            return Err("Closed a command buffer that is not recording")?;
        }

        state.is_recording = false;
        Ok(())
    }

    fn record(
        &self,
        command: CeraNullCommand,
    ) -> CeraResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.is_recording {
            return Err(format!(
                "Recorded {:?} into a command buffer that is not recording",
                command
            ))?;
        }

        state.commands.push(command);
        Ok(())
    }

    fn require_compute_capable(
        &self,
        operation: &str,
    ) -> CeraResult<()> {
        if self.queue_type == CeraQueueType::Copy {
            return Err(format!("{} is not supported on copy queues", operation))?;
        }

        Ok(())
    }

    pub fn transition_barrier(
        &self,
        resource: &CeraRawResourceNull,
        state_before: CeraResourceState,
        state_after: CeraResourceState,
    ) -> CeraResult<()> {
        self.record(CeraNullCommand::Transition {
            resource_id: resource.resource_id(),
            state_before,
            state_after,
        })
    }

    pub fn uav_barrier(
        &self,
        resource: &CeraRawResourceNull,
    ) -> CeraResult<()> {
        self.record(CeraNullCommand::UavBarrier {
            resource_id: resource.resource_id(),
        })
    }

    pub fn copy_buffer_region(
        &self,
        dst: &CeraRawResourceNull,
        dst_offset: u64,
        src: &CeraRawResourceNull,
        src_offset: u64,
        size: u64,
    ) -> CeraResult<()> {
        self.record(CeraNullCommand::CopyBufferRegion {
            dst: dst.clone(),
            dst_offset,
            src: src.clone(),
            src_offset,
            size,
        })
    }

    pub fn copy_resource(
        &self,
        dst: &CeraRawResourceNull,
        src: &CeraRawResourceNull,
    ) -> CeraResult<()> {
        self.record(CeraNullCommand::CopyResource {
            dst: dst.clone(),
            src: src.clone(),
        })
    }

    pub fn set_descriptor_heaps(
        &self,
        heaps: &[&CeraDescriptorHeapNull],
    ) -> CeraResult<()> {
        self.require_compute_capable("SetDescriptorHeaps")?;
        for heap in heaps {
            if !heap.heap_def().shader_visible {
                return Err("Only shader-visible descriptor heaps can be bound")?;
            }
        }

        self.record(CeraNullCommand::SetDescriptorHeaps {
            heap_ids: heaps.iter().map(|x| x.heap_id()).collect(),
        })
    }

    pub fn set_compute_root_signature(
        &self,
        root_signature: &CeraRootSignatureNull,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootSignature")?;
        self.record(CeraNullCommand::SetComputeRootSignature {
            root_signature_id: root_signature.root_signature_id(),
        })
    }

    pub fn set_pipeline(
        &self,
        pipeline: &CeraPipelineNull,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetPipelineState")?;
        self.record(CeraNullCommand::SetPipeline {
            pipeline_id: pipeline.pipeline_id(),
        })
    }

    pub fn set_compute_root_descriptor_table(
        &self,
        root_parameter_index: u32,
        base_descriptor: CeraGpuDescriptorHandle,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootDescriptorTable")?;
        self.record(CeraNullCommand::SetComputeRootDescriptorTable {
            root_parameter_index,
            base_descriptor,
        })
    }

    pub fn set_compute_root_constant_buffer_view(
        &self,
        root_parameter_index: u32,
        gpu_virtual_address: u64,
    ) -> CeraResult<()> {
        self.require_compute_capable("SetComputeRootConstantBufferView")?;
        self.record(CeraNullCommand::SetComputeRootConstantBufferView {
            root_parameter_index,
            gpu_virtual_address,
        })
    }

    pub fn dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CeraResult<()> {
        self.require_compute_capable("Dispatch")?;
        self.record(CeraNullCommand::Dispatch {
            group_count_x,
            group_count_y,
            group_count_z,
        })
    }

    // Runs the recorded commands on the simulated GPU. Called by the queue at submit time.
    pub(crate) fn execute(&self) -> CeraResult<()> {
        let state = self.state.lock().unwrap();
        if state.is_recording {
            return Err("Command buffer must be closed before it is executed")?;
        }

        let mut barriers = 0;
        let mut copies = 0;
        let mut dispatches = 0;
        for command in &state.commands {
            match command {
                CeraNullCommand::Transition { .. } | CeraNullCommand::UavBarrier { .. } => {
                    barriers += 1;
                }
                CeraNullCommand::CopyBufferRegion {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => {
                    CeraRawResourceNull::copy_buffer_region(
                        dst,
                        *dst_offset,
                        src,
                        *src_offset,
                        *size,
                    )?;
                    copies += 1;
                }
                CeraNullCommand::CopyResource { dst, src } => {
                    CeraRawResourceNull::copy_resource(dst, src)?;
                    copies += 1;
                }
                CeraNullCommand::Dispatch { .. } => {
                    dispatches += 1;
                }
                CeraNullCommand::SetDescriptorHeaps { .. }
                | CeraNullCommand::SetComputeRootSignature { .. }
                | CeraNullCommand::SetPipeline { .. }
                | CeraNullCommand::SetComputeRootDescriptorTable { .. }
                | CeraNullCommand::SetComputeRootConstantBufferView { .. } => {}
            }
        }

        self.device_context.update_gpu_stats(|stats| {
            stats.executed_command_buffers += 1;
            stats.executed_barriers += barriers;
            stats.executed_copies += copies;
            stats.executed_dispatches += dispatches;
        });

        Ok(())
    }
}
