use crate::commands::{CeraCommandContext, CeraCommandQueue};
use crate::descriptors::{CeraDescriptorAllocator, CeraOwnedDescriptors};
use crate::pipelines::{CeraCachedRootSignature, CeraPipelineCache};
use crate::resources::*;
use crate::state::CeraResourceStateTracker;
use cera_api::*;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct CeraFrameState {
    // The frame currently being recorded
    frame_index: u64,
    // Last signaled value of each queue at the end of every frame not yet known to be complete
    pending_frames: VecDeque<(u64, [u64; 3])>,
    // Number of frames whose GPU work has completed
    completed_frame_horizon: u64,
    is_shut_down: bool,
}

/// The object client code works through. Owns one fence-tracked queue per queue type, the global
/// resource state tracker, the descriptor allocators and the pipeline cache, and ties them
/// together with frame boundaries.
///
/// Created once from a device context and torn down (`shutdown`, or drop) before the device
/// context is destroyed.
pub struct CeraDevice {
    device_context: CeraDeviceContext,
    device_def: CeraDeviceDef,
    state_tracker: CeraResourceStateTracker,
    queues: Vec<CeraCommandQueue>,
    descriptor_allocator: CeraDescriptorAllocator,
    bindless_descriptor_allocator: Option<CeraDescriptorAllocator>,
    pipeline_cache: CeraPipelineCache,
    resource_drop_tx: Sender<CeraResourceId>,
    resource_drop_rx: Receiver<CeraResourceId>,
    frame_state: Mutex<CeraFrameState>,
}

impl CeraDevice {
    pub fn new(
        device_context: &CeraDeviceContext,
        device_def: &CeraDeviceDef,
    ) -> CeraResult<Self> {
        let adapter_info = device_context.adapter_info();
        log::info!(
            "Creating device on {} ({:?}, {:?}, vendor {:#x} device {:#x})",
            adapter_info.description,
            adapter_info.feature_level,
            adapter_info.resource_binding_tier,
            adapter_info.vendor_id,
            adapter_info.device_id
        );

        if device_def.frames_in_flight == 0 {
            return Err("frames_in_flight must be at least 1")?;
        }

        let state_tracker = CeraResourceStateTracker::new();
        let queues = CeraQueueType::ALL
            .iter()
            .map(|&queue_type| {
                CeraCommandQueue::new(device_context, queue_type, &state_tracker, device_def)
            })
            .collect::<CeraResult<Vec<_>>>()?;

        let descriptor_allocator = CeraDescriptorAllocator::new(
            device_context,
            false,
            device_def.descriptor_page_sizes,
            device_def.descriptor_release_delay_frames,
        );

        let bindless_descriptor_allocator =
            if device_def.enable_bindless && adapter_info.supports_bindless() {
                Some(CeraDescriptorAllocator::new(
                    device_context,
                    true,
                    device_def.descriptor_page_sizes,
                    device_def.descriptor_release_delay_frames,
                ))
            } else {
                log::info!(
                    "Bindless descriptors disabled (enabled in config: {}, binding tier: {:?})",
                    device_def.enable_bindless,
                    adapter_info.resource_binding_tier
                );
                None
            };

        let (resource_drop_tx, resource_drop_rx) = crossbeam_channel::unbounded();

        Ok(CeraDevice {
            device_context: device_context.clone(),
            device_def: device_def.clone(),
            state_tracker,
            queues,
            descriptor_allocator,
            bindless_descriptor_allocator,
            pipeline_cache: CeraPipelineCache::new(device_context),
            resource_drop_tx,
            resource_drop_rx,
            frame_state: Mutex::new(CeraFrameState {
                frame_index: 0,
                pending_frames: Default::default(),
                completed_frame_horizon: 0,
                is_shut_down: false,
            }),
        })
    }

    pub fn device_context(&self) -> &CeraDeviceContext {
        &self.device_context
    }

    pub fn device_def(&self) -> &CeraDeviceDef {
        &self.device_def
    }

    pub fn adapter_info(&self) -> &CeraAdapterInfo {
        self.device_context.adapter_info()
    }

    pub fn state_tracker(&self) -> &CeraResourceStateTracker {
        &self.state_tracker
    }

    pub fn queue(
        &self,
        queue_type: CeraQueueType,
    ) -> &CeraCommandQueue {
        &self.queues[queue_type.index()]
    }

    /// CPU-only allocator that views are created in
    pub fn descriptor_allocator(&self) -> &CeraDescriptorAllocator {
        &self.descriptor_allocator
    }

    /// Shader-visible allocator, if the adapter supports bindless and it is enabled
    pub fn bindless_descriptor_allocator(&self) -> Option<&CeraDescriptorAllocator> {
        self.bindless_descriptor_allocator.as_ref()
    }

    pub fn pipeline_cache(&self) -> &CeraPipelineCache {
        &self.pipeline_cache
    }

    //
    // Submission
    //

    pub fn acquire_context(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandContext> {
        self.queue(queue_type).acquire_context()
    }

    /// Submit to the queue the context was created for
    pub fn submit(
        &self,
        context: CeraCommandContext,
    ) -> CeraResult<u64> {
        self.queue(context.queue_type()).submit(context)
    }

    pub fn is_complete(
        &self,
        queue_type: CeraQueueType,
        fence_value: u64,
    ) -> bool {
        self.queue(queue_type).is_complete(fence_value)
    }

    pub fn wait_for(
        &self,
        queue_type: CeraQueueType,
        fence_value: u64,
    ) -> CeraResult<()> {
        self.queue(queue_type).wait_for(fence_value)
    }

    pub fn flush(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<u64> {
        self.queue(queue_type).flush()
    }

    /// Block until every queue has finished everything submitted so far
    pub fn flush_all(&self) -> CeraResult<()> {
        for queue in &self.queues {
            queue.flush()?;
        }

        Ok(())
    }

    /// GPU-side dependency: later work on `waiting` does not start until `signaling` reaches its
    /// most recent signal
    pub fn wait_on(
        &self,
        waiting: CeraQueueType,
        signaling: CeraQueueType,
    ) -> CeraResult<()> {
        self.queue(waiting).wait_on(self.queue(signaling))
    }

    //
    // Resources
    //

    fn create_resource(
        &self,
        resource_desc: &CeraResourceDesc,
    ) -> CeraResult<CeraResource> {
        let initial_state = resource_desc
            .memory_usage()
            .required_initial_state()
            .unwrap_or(CeraResourceState::COMMON);
        let raw_resource = self
            .device_context
            .create_raw_resource(resource_desc, initial_state)?;
        Ok(self.adopt_resource(raw_resource, initial_state))
    }

    /// Register a resource created outside the device, in its current state. The tracker record
    /// is removed once every clone of the returned resource has been dropped.
    pub fn adopt_resource(
        &self,
        raw_resource: CeraRawResource,
        current_state: CeraResourceState,
    ) -> CeraResource {
        let resource_id = self.state_tracker.register_resource(current_state);
        CeraResource::new(raw_resource, resource_id, self.resource_drop_tx.clone())
    }

    pub fn create_buffer(
        &self,
        buffer_def: &CeraBufferDef,
    ) -> CeraResult<CeraBuffer> {
        let resource = self.create_resource(&CeraResourceDesc::Buffer(buffer_def.clone()))?;
        CeraBuffer::new(resource)
    }

    pub fn create_vertex_buffer(
        &self,
        stride: u32,
        vertex_count: u32,
        memory_usage: CeraMemoryUsage,
    ) -> CeraResult<CeraVertexBuffer> {
        let buffer = self.create_buffer(&CeraBufferDef {
            size: stride as u64 * vertex_count as u64,
            memory_usage,
            allow_unordered_access: false,
        })?;
        CeraVertexBuffer::new(buffer, stride, vertex_count)
    }

    pub fn create_index_buffer(
        &self,
        index_type: CeraIndexType,
        index_count: u32,
        memory_usage: CeraMemoryUsage,
    ) -> CeraResult<CeraIndexBuffer> {
        let buffer = self.create_buffer(&CeraBufferDef {
            size: index_type.size_in_bytes() as u64 * index_count as u64,
            memory_usage,
            allow_unordered_access: false,
        })?;
        CeraIndexBuffer::new(buffer, index_type, index_count)
    }

    /// `size` is rounded up to the constant buffer alignment
    pub fn create_constant_buffer(
        &self,
        size: u64,
        memory_usage: CeraMemoryUsage,
    ) -> CeraResult<CeraConstantBuffer> {
        let alignment = self.device_context.device_info().constant_buffer_alignment;
        let buffer = self.create_buffer(&CeraBufferDef {
            size: cera_base::memory::round_size_up_to_alignment_u64(size, alignment as u64),
            memory_usage,
            allow_unordered_access: false,
        })?;
        CeraConstantBuffer::new(buffer, alignment)
    }

    pub fn create_byte_address_buffer(
        &self,
        size: u64,
        allow_unordered_access: bool,
    ) -> CeraResult<CeraByteAddressBuffer> {
        let buffer = self.create_buffer(&CeraBufferDef {
            size,
            memory_usage: CeraMemoryUsage::GpuOnly,
            allow_unordered_access,
        })?;
        CeraByteAddressBuffer::new(buffer)
    }

    pub fn create_texture(
        &self,
        texture_def: &CeraTextureDef,
    ) -> CeraResult<CeraTexture> {
        let resource = self.create_resource(&CeraResourceDesc::Texture(texture_def.clone()))?;
        CeraTexture::new(resource)
    }

    //
    // Views
    //

    pub fn create_shader_resource_view<T: CeraGpuResource>(
        &self,
        resource: &T,
        view_range: CeraViewRange,
    ) -> CeraResult<CeraShaderResourceView> {
        CeraShaderResourceView::new(
            &self.device_context,
            &self.descriptor_allocator,
            resource.resource(),
            view_range,
        )
    }

    pub fn create_unordered_access_view<T: CeraGpuResource>(
        &self,
        resource: &T,
        view_range: CeraViewRange,
    ) -> CeraResult<CeraUnorderedAccessView> {
        CeraUnorderedAccessView::new(
            &self.device_context,
            &self.descriptor_allocator,
            resource.resource(),
            view_range,
        )
    }

    pub fn create_render_target_view(
        &self,
        texture: &CeraTexture,
        mip_slice: u32,
    ) -> CeraResult<CeraRenderTargetView> {
        CeraRenderTargetView::new(
            &self.device_context,
            &self.descriptor_allocator,
            texture.resource(),
            texture.format(),
            mip_slice,
        )
    }

    pub fn create_depth_stencil_view(
        &self,
        texture: &CeraTexture,
        mip_slice: u32,
    ) -> CeraResult<CeraDepthStencilView> {
        CeraDepthStencilView::new(
            &self.device_context,
            &self.descriptor_allocator,
            texture.resource(),
            texture.format(),
            mip_slice,
        )
    }

    /// A view over the whole constant buffer
    pub fn create_constant_buffer_view(
        &self,
        constant_buffer: &CeraConstantBuffer,
    ) -> CeraResult<CeraConstantBufferView> {
        CeraConstantBufferView::new(
            &self.device_context,
            &self.descriptor_allocator,
            constant_buffer.resource(),
            0,
            constant_buffer.size() as u32,
        )
    }

    pub fn create_sampler(
        &self,
        sampler_def: &CeraSamplerDef,
    ) -> CeraResult<CeraSampler> {
        CeraSampler::new(
            &self.device_context,
            &self.descriptor_allocator,
            sampler_def,
        )
    }

    /// Copy CPU-only descriptors into the shader-visible bindless heap. The copy is independent of
    /// the source and retires separately when dropped.
    pub fn copy_to_bindless(
        &self,
        descriptors: &CeraOwnedDescriptors,
    ) -> CeraResult<CeraOwnedDescriptors> {
        let bindless_descriptor_allocator = self
            .bindless_descriptor_allocator
            .as_ref()
            .ok_or("Bindless descriptors are not available on this device")?;

        let source = descriptors.allocation();
        let copy = bindless_descriptor_allocator.allocate_owned(source.heap_type(), source.count())?;
        self.device_context.copy_descriptors(
            copy.cpu_handle(0),
            source.cpu_handle(0),
            source.count(),
            source.heap_type(),
        )?;
        Ok(copy)
    }

    //
    // Pipelines
    //

    pub fn create_root_signature(
        &self,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraCachedRootSignature> {
        self.pipeline_cache
            .get_or_create_root_signature(root_signature_def)
    }

    pub fn create_compute_pipeline(
        &self,
        root_signature: &CeraCachedRootSignature,
        compute_shader_bytecode: &[u8],
    ) -> CeraResult<Arc<CeraPipeline>> {
        self.pipeline_cache
            .get_or_create_compute_pipeline(root_signature, compute_shader_bytecode)
    }

    //
    // Frames
    //

    /// Remove the tracker records of resources whose last reference was dropped. Returns how many
    /// were removed.
    pub fn process_dropped_resources(&self) -> usize {
        let mut dropped_count = 0;
        for resource_id in self.resource_drop_rx.try_iter() {
            self.state_tracker.unregister_resource(resource_id);
            dropped_count += 1;
        }

        dropped_count
    }

    /// Start recording a frame. Blocks until the frame `frames_in_flight` frames ago has completed
    /// on every queue. Returns the index of the new frame.
    #[profiling::function]
    pub fn begin_frame(&self) -> CeraResult<u64> {
        let (frame_index, wait_fence_values) = {
            let frame_state = self.frame_state.lock().unwrap();
            if frame_state.is_shut_down {
                return Err("begin_frame called on a device that has been shut down")?;
            }

            let wait_fence_values = frame_state
                .frame_index
                .checked_sub(self.device_def.frames_in_flight)
                .and_then(|wait_frame| {
                    frame_state
                        .pending_frames
                        .iter()
                        .find(|(frame, _)| *frame == wait_frame)
                        .map(|(_, fence_values)| *fence_values)
                });
            (frame_state.frame_index, wait_fence_values)
        };

        if let Some(fence_values) = wait_fence_values {
            profiling::scope!("Wait for frames in flight");
            for (queue, &fence_value) in self.queues.iter().zip(fence_values.iter()) {
                queue.wait_for(fence_value)?;
            }
        }

        self.process_dropped_resources();
        Ok(frame_index)
    }

    /// Finish the current frame: remember how far each queue got, advance the completed-frame
    /// horizon past every frame the GPU has finished, and return stale descriptors that are old
    /// enough. Returns the new horizon.
    #[profiling::function]
    pub fn end_frame(&self) -> CeraResult<u64> {
        let (frame_index, completed_frame_horizon) = {
            let mut frame_state = self.frame_state.lock().unwrap();
            let fence_values = [
                self.queues[0].last_signaled_value(),
                self.queues[1].last_signaled_value(),
                self.queues[2].last_signaled_value(),
            ];
            let ended_frame = frame_state.frame_index;
            frame_state.pending_frames.push_back((ended_frame, fence_values));
            frame_state.frame_index += 1;

            while let Some((frame, fence_values)) = frame_state.pending_frames.front().copied() {
                let is_complete = self
                    .queues
                    .iter()
                    .zip(fence_values.iter())
                    .all(|(queue, &fence_value)| queue.is_complete(fence_value));
                if !is_complete {
                    break;
                }

                frame_state.completed_frame_horizon = frame + 1;
                frame_state.pending_frames.pop_front();
            }

            (frame_state.frame_index, frame_state.completed_frame_horizon)
        };

        let mut released_count = 0;
        for allocator in std::iter::once(&self.descriptor_allocator)
            .chain(self.bindless_descriptor_allocator.as_ref())
        {
            allocator.set_current_frame(frame_index);
            released_count += allocator.release_stale(completed_frame_horizon)?;
        }
        let dropped_count = self.process_dropped_resources();

        log::debug!(
            "Ended frame {}, {} frames complete, released {} descriptor ranges and {} resources",
            frame_index - 1,
            completed_frame_horizon,
            released_count,
            dropped_count
        );
        Ok(completed_frame_horizon)
    }

    /// Index of the frame currently being recorded
    pub fn frame_index(&self) -> u64 {
        self.frame_state.lock().unwrap().frame_index
    }

    /// Number of frames whose GPU work is known to be complete
    pub fn completed_frame_horizon(&self) -> u64 {
        self.frame_state.lock().unwrap().completed_frame_horizon
    }

    /// Flush every queue and drain its in-flight contexts, then release all stale descriptors.
    /// Queues refuse further submissions. Calling this again does nothing.
    pub fn shutdown(&self) -> CeraResult<()> {
        {
            let mut frame_state = self.frame_state.lock().unwrap();
            if frame_state.is_shut_down {
                return Ok(());
            }
            frame_state.is_shut_down = true;
        }

        log::info!("Shutting down device");
        let mut first_error = None;
        for queue in &self.queues {
            if let Err(e) = queue.shutdown() {
                log::error!("Failed to shut down {:?} queue: {}", queue.queue_type(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        for allocator in std::iter::once(&self.descriptor_allocator)
            .chain(self.bindless_descriptor_allocator.as_ref())
        {
            if let Err(e) = allocator.release_all() {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        self.process_dropped_resources();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for CeraDevice {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error shutting down device: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_api(gpu_completion: CeraNullGpuCompletion) -> CeraApi {
        let _ = env_logger::builder().is_test(true).try_init();
        let null_api_def = CeraApiDefNull {
            gpu_completion,
            ..Default::default()
        };
        CeraApi::new_null(&Default::default(), &null_api_def).unwrap()
    }

    fn create_device(
        api: &CeraApi,
        descriptor_release_delay_frames: u64,
    ) -> CeraDevice {
        let device_def = CeraDeviceDef {
            upload_page_size: 4096,
            descriptor_page_sizes: [8, 8, 8, 8],
            descriptor_release_delay_frames,
            fence_wait_timeout: Duration::from_secs(5),
            reclaim_wait_interval: Duration::from_millis(5),
            ..Default::default()
        };
        CeraDevice::new(&api.device_context(), &device_def).unwrap()
    }

    fn gpu_buffer(
        device: &CeraDevice,
        size: u64,
    ) -> CeraBuffer {
        device
            .create_buffer(&CeraBufferDef {
                size,
                memory_usage: CeraMemoryUsage::GpuOnly,
                allow_unordered_access: true,
            })
            .unwrap()
    }

    #[test]
    fn test_state_round_trip_emits_no_barriers() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let null_device_context = api.device_context().null_device_context().unwrap().clone();
        let device = create_device(&api, 1);
        let buffer = gpu_buffer(&device, 256);
        let other = gpu_buffer(&device, 256);

        let mut context = device.acquire_context(CeraQueueType::Graphics).unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::COPY_DST)
            .unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::COMMON)
            .unwrap();
        assert_eq!(context.flush_barriers().unwrap(), 0);

        // Same again once the context already knows the resource's state
        context.copy_buffer_region(&other, 0, &buffer, 0, 64).unwrap();
        let barriers_before = null_device_context.gpu_stats().executed_barriers;
        context
            .transition_resource(&other, CeraResourceState::UNORDERED_ACCESS)
            .unwrap();
        context
            .transition_resource(&other, CeraResourceState::COPY_DST)
            .unwrap();
        assert_eq!(context.flush_barriers().unwrap(), 0);

        let fence_value = device.submit(context).unwrap();
        device
            .wait_for(CeraQueueType::Graphics, fence_value)
            .unwrap();

        // COMMON -> COPY_DST for other before the context, COMMON -> COPY_SRC for buffer inside it
        assert_eq!(
            null_device_context.gpu_stats().executed_barriers - barriers_before,
            2
        );
        assert_eq!(
            device.state_tracker().resource_state(other.resource_id()).unwrap(),
            CeraResourceState::COPY_DST
        );
    }

    #[test]
    fn test_descriptors_reused_after_release_delay() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let device = create_device(&api, 2);
        let buffer = gpu_buffer(&device, 1024);
        let range = CeraViewRange::Buffer {
            first_element: 0,
            element_count: 256,
            element_stride: 0,
        };

        device.begin_frame().unwrap();
        let view = device.create_shader_resource_view(&buffer, range).unwrap();
        let first_offset = view.descriptors().allocation().offset();
        drop(view);
        assert_eq!(device.end_frame().unwrap(), 1);

        // One completed frame is not enough with a delay of two
        device.begin_frame().unwrap();
        let held = device.create_shader_resource_view(&buffer, range).unwrap();
        assert_ne!(held.descriptors().allocation().offset(), first_offset);
        assert_eq!(device.end_frame().unwrap(), 2);

        device.begin_frame().unwrap();
        let reused = device.create_shader_resource_view(&buffer, range).unwrap();
        assert_eq!(reused.descriptors().allocation().offset(), first_offset);
        assert_eq!(reused.descriptors().allocation().page_index(), 0);
        device.end_frame().unwrap();
    }

    #[test]
    fn test_begin_frame_limits_frames_in_flight() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let device = Arc::new(create_device(&api, 1));
        let graphics = device.queue(CeraQueueType::Graphics).queue().null_queue().unwrap().clone();

        for expected_frame in 0..2 {
            assert_eq!(device.begin_frame().unwrap(), expected_frame);
            let context = device.acquire_context(CeraQueueType::Graphics).unwrap();
            device.submit(context).unwrap();
            assert_eq!(device.end_frame().unwrap(), 0);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
        let frame_device = device.clone();
        let frame_thread = std::thread::spawn(move || {
            frame_tx.send(frame_device.begin_frame()).unwrap();
        });

        // Frame 2 can't start until frame 0 is done
        assert!(frame_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(graphics.complete_next());
        let frame = frame_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.unwrap(), 2);
        frame_thread.join().unwrap();

        assert_eq!(device.end_frame().unwrap(), 1);
        api.device_context()
            .null_device_context()
            .unwrap()
            .set_gpu_completion(CeraNullGpuCompletion::Immediate);
    }

    #[test]
    fn test_dropped_resources_unregister_at_frame_boundary() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let device = create_device(&api, 1);
        let buffer = gpu_buffer(&device, 256);
        let resource_id = buffer.resource_id();

        let mut context = device.acquire_context(CeraQueueType::Copy).unwrap();
        context.upload_to_buffer(&buffer, 0, &[1; 16]).unwrap();
        let fence_value = device.submit(context).unwrap();
        device.wait_for(CeraQueueType::Copy, fence_value).unwrap();

        // Contexts unpin their resources when they return to the pool
        let recycler = device.queue(CeraQueueType::Copy).recycler();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while recycler.available_count() < recycler.created_count() {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }

        drop(buffer);
        assert!(device.state_tracker().is_registered(resource_id));
        device.end_frame().unwrap();
        assert!(!device.state_tracker().is_registered(resource_id));
    }

    #[test]
    fn test_resource_creation_and_adoption() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let device = create_device(&api, 1);

        let constant_buffer = device
            .create_constant_buffer(100, CeraMemoryUsage::CpuToGpu)
            .unwrap();
        assert_eq!(constant_buffer.size(), 256);
        assert_eq!(
            device
                .state_tracker()
                .resource_state(constant_buffer.resource_id())
                .unwrap(),
            CeraResourceState::GENERIC_READ
        );
        let cbv = device.create_constant_buffer_view(&constant_buffer).unwrap();
        assert_eq!(
            cbv.gpu_virtual_address(),
            constant_buffer.gpu_virtual_address()
        );

        let texture = device
            .create_texture(&CeraTextureDef {
                extents: CeraExtents3D {
                    width: 64,
                    height: 64,
                    depth: 1,
                },
                format: CeraFormat::D32_FLOAT,
                allow_depth_stencil: true,
                ..Default::default()
            })
            .unwrap();
        let dsv = device.create_depth_stencil_view(&texture, 0).unwrap();
        assert_eq!(
            dsv.descriptors().allocation().heap_type(),
            CeraDescriptorHeapType::Dsv
        );
        assert!(device.create_render_target_view(&texture, 0).is_err());

        let raw = device
            .device_context()
            .create_raw_resource(
                &CeraResourceDesc::Buffer(CeraBufferDef {
                    size: 64,
                    ..Default::default()
                }),
                CeraResourceState::COPY_SRC,
            )
            .unwrap();
        let adopted = device.adopt_resource(raw, CeraResourceState::COPY_SRC);
        assert_eq!(
            device.state_tracker().resource_state(adopted.resource_id()).unwrap(),
            CeraResourceState::COPY_SRC
        );
    }

    #[test]
    fn test_copy_to_bindless() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let device = create_device(&api, 1);
        let buffer = gpu_buffer(&device, 1024);
        let view = device
            .create_unordered_access_view(
                &buffer,
                CeraViewRange::Buffer {
                    first_element: 0,
                    element_count: 256,
                    element_stride: 0,
                },
            )
            .unwrap();

        let bindless = device.copy_to_bindless(view.descriptors()).unwrap();
        assert!(bindless.gpu_handle(0).is_some());
        assert!(view.gpu_handle().is_none());

        let null_device_context = api.device_context().null_device_context().unwrap().clone();
        assert_eq!(
            null_device_context.descriptor_at(bindless.cpu_handle(0)),
            null_device_context.descriptor_at(view.cpu_handle())
        );
    }

    #[test]
    fn test_bindless_requires_adapter_support() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut null_api_def = CeraApiDefNull::default();
        null_api_def.adapter_info.resource_binding_tier = CeraResourceBindingTier::Tier2;
        let api = CeraApi::new_null(&Default::default(), &null_api_def).unwrap();
        let device = CeraDevice::new(&api.device_context(), &Default::default()).unwrap();
        assert!(device.bindless_descriptor_allocator().is_none());

        let sampler = device.create_sampler(&Default::default()).unwrap();
        assert!(device.copy_to_bindless(sampler.descriptors()).is_err());
    }

    #[test]
    fn test_compute_dispatch_through_cached_pipeline() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let null_device_context = api.device_context().null_device_context().unwrap().clone();
        let device = create_device(&api, 1);
        let buffer = gpu_buffer(&device, 1024);

        let root_signature = device
            .create_root_signature(&CeraRootSignatureDef {
                serialized_root_signature: vec![1, 2, 3],
            })
            .unwrap();
        let pipeline = device
            .create_compute_pipeline(&root_signature, &[0xCE; 32])
            .unwrap();
        assert!(Arc::ptr_eq(
            &pipeline,
            &device
                .create_compute_pipeline(&root_signature, &[0xCE; 32])
                .unwrap()
        ));

        let view = device
            .create_unordered_access_view(
                &buffer,
                CeraViewRange::Buffer {
                    first_element: 0,
                    element_count: 256,
                    element_stride: 0,
                },
            )
            .unwrap();
        let bindless = device.copy_to_bindless(view.descriptors()).unwrap();
        let bindless_heap = bindless.allocation().heap().clone();

        let mut context = device.acquire_context(CeraQueueType::Compute).unwrap();
        context.set_descriptor_heaps(&[&bindless_heap]).unwrap();
        context
            .set_compute_root_signature(root_signature.root_signature())
            .unwrap();
        context.set_pipeline(&pipeline).unwrap();
        context
            .set_compute_root_descriptor_table(0, bindless.gpu_handle(0).unwrap())
            .unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::UNORDERED_ACCESS)
            .unwrap();
        context.dispatch(4, 1, 1).unwrap();
        context.uav_barrier(&buffer).unwrap();
        context.dispatch(4, 1, 1).unwrap();

        let dispatches_before = null_device_context.gpu_stats().executed_dispatches;
        let fence_value = device.submit(context).unwrap();
        device.wait_for(CeraQueueType::Compute, fence_value).unwrap();
        assert_eq!(
            null_device_context.gpu_stats().executed_dispatches - dispatches_before,
            2
        );
    }

    #[test]
    fn test_shutdown_refuses_new_work() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let device = create_device(&api, 3);
        let buffer = gpu_buffer(&device, 1024);
        let view = device
            .create_shader_resource_view(
                &buffer,
                CeraViewRange::Buffer {
                    first_element: 0,
                    element_count: 256,
                    element_stride: 0,
                },
            )
            .unwrap();

        let context = device.acquire_context(CeraQueueType::Graphics).unwrap();
        device.submit(context).unwrap();
        drop(view);

        device.shutdown().unwrap();
        assert_eq!(device.descriptor_allocator().stale_allocation_count(), 0);
        assert!(device.begin_frame().is_err());

        let context = device.acquire_context(CeraQueueType::Graphics).unwrap();
        assert!(matches!(
            device.submit(context),
            Err(CeraError::QueueShutDown(CeraQueueType::Graphics))
        ));
        device.shutdown().unwrap();
    }
}
