use crate::resources::{CeraBuffer, CeraGpuResource, CeraResource};
use crate::state::{
    CeraLocalResourceStateTracker, CeraResourceStateTracker, CeraStateTransition,
    LockedResourceStates,
};
use crate::upload::{CeraUploadAllocation, CeraUploadBuffer};
use cera_api::{
    CeraCommandBuffer, CeraDescriptorHeap, CeraDeviceContext, CeraError, CeraGpuDescriptorHandle,
    CeraPipeline, CeraQueueType, CeraResourceBarrier, CeraResourceId, CeraResourceState,
    CeraResult, CeraRootSignature,
};
use fnv::FnvHashMap;
use std::sync::Arc;

// Uploads are copied with CopyBufferRegion, which has no alignment requirement. Keep them
// word-aligned anyway so the same pages can serve raw buffer reads.
const UPLOAD_COPY_ALIGNMENT: u64 = 4;

fn record_transitions(
    command_buffer: &CeraCommandBuffer,
    pinned_resources: &FnvHashMap<CeraResourceId, CeraResource>,
    transitions: &[CeraStateTransition],
) -> CeraResult<()> {
    let barriers = transitions
        .iter()
        .map(|transition| {
            let resource = pinned_resources
                .get(&transition.resource_id)
                .ok_or(CeraError::UnregisteredResource(transition.resource_id))?;
            Ok(CeraResourceBarrier::Transition {
                resource: resource.raw_resource(),
                state_before: transition.state_before,
                state_after: transition.state_after,
            })
        })
        .collect::<CeraResult<Vec<_>>>()?;

    command_buffer.resource_barrier(&barriers)
}

/// A command list and its allocator, plus everything recorded work depends on: the resources it
/// touched, its pending resource states, and its upload pages.
///
/// Obtained from `CeraDevice::acquire_context` (or a queue's recycler) already open for recording.
/// Submitting it hands ownership to the queue, which returns it to the pool once the GPU has
/// finished with it. Until then every resource it touched is kept alive.
pub struct CeraCommandContext {
    context_id: u64,
    queue_type: CeraQueueType,
    command_buffer: CeraCommandBuffer,
    global_state_tracker: CeraResourceStateTracker,
    state_tracker: CeraLocalResourceStateTracker,
    upload_buffer: CeraUploadBuffer,
    pinned_resources: FnvHashMap<CeraResourceId, CeraResource>,
    pinned_root_signatures: Vec<CeraRootSignature>,
    pinned_pipelines: Vec<Arc<CeraPipeline>>,
    pinned_descriptor_heaps: Vec<CeraDescriptorHeap>,
}

impl std::fmt::Debug for CeraCommandContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraCommandContext")
            .field("context_id", &self.context_id)
            .field("queue_type", &self.queue_type)
            .field("pinned_resources", &self.pinned_resources.len())
            .finish()
    }
}

impl CeraCommandContext {
    // Created open for recording
    pub(crate) fn new(
        device_context: &CeraDeviceContext,
        queue_type: CeraQueueType,
        context_id: u64,
        global_state_tracker: &CeraResourceStateTracker,
        upload_page_size: u64,
    ) -> CeraResult<Self> {
        let command_buffer = device_context.create_command_buffer(queue_type)?;
        command_buffer.reset()?;

        Ok(CeraCommandContext {
            context_id,
            queue_type,
            command_buffer,
            global_state_tracker: global_state_tracker.clone(),
            state_tracker: Default::default(),
            upload_buffer: CeraUploadBuffer::new(device_context, upload_page_size),
            pinned_resources: Default::default(),
            pinned_root_signatures: Default::default(),
            pinned_pipelines: Default::default(),
            pinned_descriptor_heaps: Default::default(),
        })
    }

    /// Unique per recycler. A reused context keeps its id.
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.queue_type
    }

    /// The underlying command buffer, for recording commands this type doesn't wrap. Resources
    /// used that way are not kept alive or state-tracked.
    pub fn command_buffer(&self) -> &CeraCommandBuffer {
        &self.command_buffer
    }

    pub fn state_tracker(&self) -> &CeraLocalResourceStateTracker {
        &self.state_tracker
    }

    pub fn upload_buffer(&self) -> &CeraUploadBuffer {
        &self.upload_buffer
    }

    pub fn pinned_resource_count(&self) -> usize {
        self.pinned_resources.len()
    }

    fn pin_resource(
        &mut self,
        resource: &CeraResource,
    ) {
        self.pinned_resources
            .entry(resource.resource_id())
            .or_insert_with(|| resource.clone());
    }

    /// Request that the resource be in `state` for the next command that uses it. The barrier is
    /// recorded lazily by `flush_barriers`, and is skipped entirely if the state is unchanged by
    /// then.
    ///
    /// Resources on upload and readback heaps can't change state, requesting any state they don't
    /// already satisfy is an error.
    pub fn transition_resource<T: CeraGpuResource>(
        &mut self,
        resource: &T,
        state: CeraResourceState,
    ) -> CeraResult<()> {
        let resource = resource.resource();
        let resource_id = resource.resource_id();
        if !self.global_state_tracker.is_registered(resource_id) {
            log::error!(
                "Context {} used {} which is not registered with the state tracker",
                self.context_id,
                resource_id
            );
            return Err(CeraError::UnregisteredResource(resource_id));
        }

        let memory_usage = resource.resource_desc().memory_usage();
        let state = match memory_usage.required_initial_state() {
            Some(fixed_state) if fixed_state.contains(state) => fixed_state,
            Some(fixed_state) => {
                return Err(format!(
                    "{:?} resources are always in state {:?} and can't be transitioned to {:?}",
                    memory_usage, fixed_state, state
                ))?;
            }
            None => state,
        };

        self.pin_resource(resource);
        self.state_tracker.transition_resource(resource_id, state);
        Ok(())
    }

    /// Record barriers for every pending transition whose state actually changes. Returns the
    /// number of barriers recorded. Commands that read or write tracked resources call this
    /// first.
    pub fn flush_barriers(&mut self) -> CeraResult<usize> {
        if !self.state_tracker.has_pending_transitions() {
            return Ok(0);
        }

        let transitions = self.state_tracker.flush();
        record_transitions(&self.command_buffer, &self.pinned_resources, &transitions)?;
        Ok(transitions.len())
    }

    /// Order unordered-access writes to the resource before later unordered access to it
    pub fn uav_barrier<T: CeraGpuResource>(
        &mut self,
        resource: &T,
    ) -> CeraResult<()> {
        self.flush_barriers()?;
        self.pin_resource(resource.resource());
        self.command_buffer.resource_barrier(&[CeraResourceBarrier::Uav {
            resource: resource.raw_resource(),
        }])
    }

    pub fn copy_buffer_region(
        &mut self,
        dst: &CeraBuffer,
        dst_offset: u64,
        src: &CeraBuffer,
        src_offset: u64,
        size: u64,
    ) -> CeraResult<()> {
        let fits = |offset: u64, buffer_size: u64| {
            offset
                .checked_add(size)
                .map_or(false, |end| end <= buffer_size)
        };
        if !fits(dst_offset, dst.size()) || !fits(src_offset, src.size()) {
            return Err(format!(
                "Copy of {} bytes from offset {} to offset {} is out of bounds ({} -> {} bytes)",
                size,
                src_offset,
                dst_offset,
                src.size(),
                dst.size()
            ))?;
        }

        self.transition_resource(dst, CeraResourceState::COPY_DST)?;
        self.transition_resource(src, CeraResourceState::COPY_SRC)?;
        self.flush_barriers()?;
        self.command_buffer.copy_buffer_region(
            dst.raw_resource(),
            dst_offset,
            src.raw_resource(),
            src_offset,
            size,
        )
    }

    /// Copy the whole resource. Both must have identical descriptions apart from memory usage.
    pub fn copy_resource<T: CeraGpuResource, U: CeraGpuResource>(
        &mut self,
        dst: &T,
        src: &U,
    ) -> CeraResult<()> {
        self.transition_resource(dst, CeraResourceState::COPY_DST)?;
        self.transition_resource(src, CeraResourceState::COPY_SRC)?;
        self.flush_barriers()?;
        self.command_buffer
            .copy_resource(dst.raw_resource(), src.raw_resource())
    }

    /// Scratch memory that lives until this context's submission completes. The allocation
    /// borrows the context, so it can't be written once the context has been submitted.
    pub fn allocate_upload(
        &self,
        size: u64,
        alignment: u64,
    ) -> CeraResult<CeraUploadAllocation<'_>> {
        self.upload_buffer.allocate(size, alignment)
    }

    /// Stage `data` in this context's upload pages and record a copy into `dst`
    #[profiling::function]
    pub fn upload_to_buffer(
        &mut self,
        dst: &CeraBuffer,
        dst_offset: u64,
        data: &[u8],
    ) -> CeraResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let size = data.len() as u64;
        if dst_offset
            .checked_add(size)
            .map_or(true, |end| end > dst.size())
        {
            return Err(format!(
                "Upload of {} bytes at offset {} overruns a {} byte buffer",
                size,
                dst_offset,
                dst.size()
            ))?;
        }

        self.transition_resource(dst, CeraResourceState::COPY_DST)?;
        self.flush_barriers()?;

        let allocation = self.upload_buffer.allocate(size, UPLOAD_COPY_ALIGNMENT)?;
        allocation.write(data)?;
        self.command_buffer.copy_buffer_region(
            dst.raw_resource(),
            dst_offset,
            allocation.resource(),
            allocation.offset(),
            size,
        )
    }

    pub fn set_descriptor_heaps(
        &mut self,
        heaps: &[&CeraDescriptorHeap],
    ) -> CeraResult<()> {
        self.command_buffer.set_descriptor_heaps(heaps)?;
        self.pinned_descriptor_heaps
            .extend(heaps.iter().map(|&x| x.clone()));
        Ok(())
    }

    pub fn set_compute_root_signature(
        &mut self,
        root_signature: &CeraRootSignature,
    ) -> CeraResult<()> {
        self.command_buffer
            .set_compute_root_signature(root_signature)?;
        self.pinned_root_signatures.push(root_signature.clone());
        Ok(())
    }

    pub fn set_pipeline(
        &mut self,
        pipeline: &Arc<CeraPipeline>,
    ) -> CeraResult<()> {
        self.command_buffer.set_pipeline(pipeline)?;
        if !self
            .pinned_pipelines
            .iter()
            .any(|x| Arc::ptr_eq(x, pipeline))
        {
            self.pinned_pipelines.push(pipeline.clone());
        }
        Ok(())
    }

    pub fn set_compute_root_descriptor_table(
        &mut self,
        root_parameter_index: u32,
        base_descriptor: CeraGpuDescriptorHandle,
    ) -> CeraResult<()> {
        self.command_buffer
            .set_compute_root_descriptor_table(root_parameter_index, base_descriptor)
    }

    pub fn set_compute_root_constant_buffer_view(
        &mut self,
        root_parameter_index: u32,
        gpu_virtual_address: u64,
    ) -> CeraResult<()> {
        self.command_buffer
            .set_compute_root_constant_buffer_view(root_parameter_index, gpu_virtual_address)
    }

    pub fn dispatch(
        &mut self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CeraResult<()> {
        self.flush_barriers()?;
        self.command_buffer
            .dispatch(group_count_x, group_count_y, group_count_z)
    }

    // Barriers that must run before this context, resolved against the locked global table
    pub(crate) fn resolve_initial_transitions(
        &self,
        global_states: &LockedResourceStates,
    ) -> CeraResult<Vec<CeraStateTransition>> {
        self.state_tracker.resolve_initial_states(global_states)
    }

    // Record transitions for resources this context pinned into another context's command buffer
    pub(crate) fn record_transitions_into(
        &self,
        other: &CeraCommandContext,
        transitions: &[CeraStateTransition],
    ) -> CeraResult<()> {
        record_transitions(&other.command_buffer, &self.pinned_resources, transitions)
    }

    pub(crate) fn commit_final_states(
        &self,
        global_states: &mut LockedResourceStates,
    ) -> CeraResult<()> {
        self.state_tracker.commit_final_states(global_states)
    }

    pub(crate) fn close(&self) -> CeraResult<()> {
        self.command_buffer.close()
    }

    // Only valid once the GPU is done with everything recorded since the last reset
    pub(crate) fn reset(&mut self) -> CeraResult<()> {
        self.pinned_resources.clear();
        self.pinned_root_signatures.clear();
        self.pinned_pipelines.clear();
        self.pinned_descriptor_heaps.clear();
        self.state_tracker.clear();
        self.upload_buffer.reset();
        self.command_buffer.reset()
    }
}
