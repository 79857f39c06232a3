mod command_context;
pub use command_context::*;

mod context_recycler;
pub use context_recycler::*;

mod command_queue;
pub use command_queue::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{CeraBuffer, CeraGpuResource, CeraResource};
    use crate::state::CeraResourceStateTracker;
    use cera_api::*;
    use fnv::FnvHashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn create_api(gpu_completion: CeraNullGpuCompletion) -> CeraApi {
        let _ = env_logger::builder().is_test(true).try_init();
        let null_api_def = CeraApiDefNull {
            gpu_completion,
            ..Default::default()
        };
        CeraApi::new_null(&Default::default(), &null_api_def).unwrap()
    }

    fn test_device_def() -> CeraDeviceDef {
        CeraDeviceDef {
            upload_page_size: 4096,
            fence_wait_timeout: Duration::from_secs(5),
            reclaim_wait_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn create_queue(
        api: &CeraApi,
        queue_type: CeraQueueType,
        state_tracker: &CeraResourceStateTracker,
    ) -> CeraCommandQueue {
        CeraCommandQueue::new(
            &api.device_context(),
            queue_type,
            state_tracker,
            &test_device_def(),
        )
        .unwrap()
    }

    fn create_buffer(
        api: &CeraApi,
        state_tracker: &CeraResourceStateTracker,
        size: u64,
    ) -> CeraBuffer {
        let (drop_tx, _drop_rx) = crossbeam_channel::unbounded();
        let raw = api
            .device_context()
            .create_raw_resource(
                &CeraResourceDesc::Buffer(CeraBufferDef {
                    size,
                    memory_usage: CeraMemoryUsage::GpuOnly,
                    allow_unordered_access: true,
                }),
                CeraResourceState::COMMON,
            )
            .unwrap();
        let id = state_tracker.register_resource(CeraResourceState::COMMON);
        CeraBuffer::new(CeraResource::new(raw, id, drop_tx)).unwrap()
    }

    fn wait_until<F: Fn() -> bool>(f: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn null_queue(queue: &CeraCommandQueue) -> &null::CeraQueueNull {
        queue.queue().null_queue().unwrap()
    }

    // Lets the flush in the queues' shutdown complete
    fn release_gpu(api: &CeraApi) {
        api.device_context()
            .null_device_context()
            .unwrap()
            .set_gpu_completion(CeraNullGpuCompletion::Immediate);
    }

    #[test]
    fn test_fence_values_strictly_increase() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = Arc::new(create_queue(
            &api,
            CeraQueueType::Graphics,
            &state_tracker,
        ));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| {
                            let context = queue.acquire_context().unwrap();
                            queue.submit(context).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all_values = Vec::new();
        for thread in threads {
            let values = thread.join().unwrap();
            assert!(values.windows(2).all(|x| x[0] < x[1]));
            all_values.extend(values);
        }

        all_values.sort_unstable();
        assert_eq!(all_values, (1..=100).collect::<Vec<u64>>());
        assert_eq!(queue.last_signaled_value(), 100);
    }

    #[test]
    fn test_no_premature_reuse() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Graphics, &state_tracker);

        // context id -> fence value of its latest submission
        let mut in_flight = FnvHashMap::default();
        for _ in 0..8 {
            let context = queue.acquire_context().unwrap();
            let context_id = context.context_id();
            assert!(!in_flight.contains_key(&context_id));
            in_flight.insert(context_id, queue.submit(context).unwrap());
        }

        // Nothing has completed, so every acquire must create a new context
        let fresh = queue.acquire_context().unwrap();
        assert!(!in_flight.contains_key(&fresh.context_id()));
        in_flight.insert(fresh.context_id(), queue.submit(fresh).unwrap());
        assert_eq!(queue.recycler().created_count(), 9);

        for step in 0..40 {
            assert!(null_queue(&queue).complete_next());
            let completed_value = queue.completed_value().unwrap();
            assert!(wait_until(|| queue.recycler().available_count() > 0));

            let context = queue.acquire_context().unwrap();
            let last_fence_value = in_flight[&context.context_id()];
            assert!(
                last_fence_value <= completed_value,
                "step {}: context {} reused at completed value {} while its fence value {} is pending",
                step,
                context.context_id(),
                completed_value,
                last_fence_value
            );
            in_flight.insert(context.context_id(), queue.submit(context).unwrap());
        }

        assert_eq!(queue.recycler().created_count(), 9);
        release_gpu(&api);
    }

    #[test]
    fn test_flush_blocks_until_completion() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = Arc::new(create_queue(
            &api,
            CeraQueueType::Graphics,
            &state_tracker,
        ));

        let context = queue.acquire_context().unwrap();
        assert_eq!(queue.submit(context).unwrap(), 1);

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let flush_queue = queue.clone();
        let flush_thread = std::thread::spawn(move || {
            result_tx.send(flush_queue.flush()).unwrap();
        });

        assert!(wait_until(|| queue.last_signaled_value() == 2));
        assert!(result_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!queue.is_complete(2));

        assert_eq!(null_queue(&queue).complete_all(), 2);
        let result = result_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.unwrap(), 2);
        assert!(queue.is_complete(1));
        flush_thread.join().unwrap();
        release_gpu(&api);
    }

    #[test]
    fn test_wait_for_unsubmitted_value_fails() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Compute, &state_tracker);

        match queue.wait_for(1) {
            Err(CeraError::FenceValueNotSubmitted {
                fence_value,
                last_signaled,
                ..
            }) => assert_eq!((fence_value, last_signaled), (1, 0)),
            other => panic!("unexpected {:?}", other),
        }

        let context = queue.acquire_context().unwrap();
        let fence_value = queue.submit(context).unwrap();
        queue.wait_for(fence_value).unwrap();
        assert!(queue.is_complete(fence_value));
    }

    #[test]
    fn test_device_lost_is_reported() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Graphics, &state_tracker);

        let context = queue.acquire_context().unwrap();
        let fence_value = queue.submit(context).unwrap();
        let context = queue.acquire_context().unwrap();

        api.device_context()
            .null_device_context()
            .unwrap()
            .simulate_device_lost();

        assert!(queue.submit(context).unwrap_err().is_device_lost());
        assert!(queue.wait_for(fence_value).unwrap_err().is_device_lost());
        assert!(!queue.is_complete(fence_value));
        assert_eq!(queue.last_signaled_value(), fence_value);
        assert!(queue.shutdown().unwrap_err().is_device_lost());
    }

    #[test]
    fn test_wait_on_orders_queues_on_the_gpu() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let state_tracker = CeraResourceStateTracker::new();
        let graphics = create_queue(&api, CeraQueueType::Graphics, &state_tracker);
        let compute = create_queue(&api, CeraQueueType::Compute, &state_tracker);

        // Nothing signaled yet, so nothing to wait for
        compute.wait_on(&graphics).unwrap();
        assert_eq!(null_queue(&compute).pending_op_count(), 0);

        let graphics_value = graphics.submit(graphics.acquire_context().unwrap()).unwrap();
        compute.wait_on(&graphics).unwrap();
        let compute_value = compute.submit(compute.acquire_context().unwrap()).unwrap();

        // The compute signal is stuck behind the wait for graphics
        assert_eq!(null_queue(&compute).complete_all(), 0);
        assert!(!compute.is_complete(compute_value));

        assert_eq!(null_queue(&graphics).complete_all(), 1);
        assert!(graphics.is_complete(graphics_value));
        assert_eq!(null_queue(&compute).complete_all(), 1);
        assert!(compute.is_complete(compute_value));
        release_gpu(&api);
    }

    #[test]
    fn test_unregistered_resource_does_not_advance_fence() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Graphics, &state_tracker);
        let buffer = create_buffer(&api, &state_tracker, 256);

        let mut context = queue.acquire_context().unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::UNORDERED_ACCESS)
            .unwrap();

        // Destroyed behind the context's back
        state_tracker.unregister_resource(buffer.resource_id());
        match queue.submit(context) {
            Err(CeraError::UnregisteredResource(id)) => assert_eq!(id, buffer.resource_id()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(queue.last_signaled_value(), 0);

        let mut context = queue.acquire_context().unwrap();
        assert!(matches!(
            context.transition_resource(&buffer, CeraResourceState::COPY_DST),
            Err(CeraError::UnregisteredResource(_))
        ));
        assert_eq!(queue.submit(context).unwrap(), 1);
    }

    #[test]
    fn test_initial_barriers_run_before_context() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let null_device_context = api.device_context().null_device_context().unwrap().clone();
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Compute, &state_tracker);
        let buffer = create_buffer(&api, &state_tracker, 256);

        let mut context = queue.acquire_context().unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::UNORDERED_ACCESS)
            .unwrap();
        // First use of a resource is resolved at submit, not recorded here
        assert_eq!(context.flush_barriers().unwrap(), 0);
        context.dispatch(1, 1, 1).unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::COPY_SRC)
            .unwrap();
        assert_eq!(context.flush_barriers().unwrap(), 1);

        let stats_before = null_device_context.gpu_stats();
        queue.submit(context).unwrap();
        let stats = null_device_context.gpu_stats();
        assert_eq!(
            stats.executed_command_buffers - stats_before.executed_command_buffers,
            2
        );
        assert_eq!(stats.executed_barriers - stats_before.executed_barriers, 2);
        assert_eq!(
            state_tracker.resource_state(buffer.resource_id()).unwrap(),
            CeraResourceState::COPY_SRC
        );

        // The global state already matches, so the next context needs no prelude
        let mut context = queue.acquire_context().unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::COPY_SRC)
            .unwrap();
        let stats_before = null_device_context.gpu_stats();
        queue.submit(context).unwrap();
        let stats = null_device_context.gpu_stats();
        assert_eq!(
            stats.executed_command_buffers - stats_before.executed_command_buffers,
            1
        );
        assert_eq!(stats.executed_barriers, stats_before.executed_barriers);
    }

    #[test]
    fn test_upload_to_buffer_copies_data() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Copy, &state_tracker);
        let buffer = create_buffer(&api, &state_tracker, 64);

        let mut context = queue.acquire_context().unwrap();
        context.upload_to_buffer(&buffer, 16, &[9, 8, 7, 6]).unwrap();
        assert!(context.upload_to_buffer(&buffer, 62, &[1, 2, 3]).is_err());
        assert_eq!(context.pinned_resource_count(), 1);
        let fence_value = queue.submit(context).unwrap();
        queue.wait_for(fence_value).unwrap();

        let bytes = buffer
            .raw_resource()
            .null_raw_resource()
            .unwrap()
            .read_memory(16, 4)
            .unwrap();
        assert_eq!(bytes, vec![9, 8, 7, 6]);
        assert_eq!(
            state_tracker.resource_state(buffer.resource_id()).unwrap(),
            CeraResourceState::COPY_DST
        );
    }

    #[test]
    fn test_overflowing_copy_offsets_are_rejected() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Copy, &state_tracker);
        let a = create_buffer(&api, &state_tracker, 64);
        let b = create_buffer(&api, &state_tracker, 64);

        let mut context = queue.acquire_context().unwrap();
        assert!(context.copy_buffer_region(&a, u64::MAX, &b, 0, 2).is_err());
        assert!(context.copy_buffer_region(&a, 0, &b, u64::MAX, 2).is_err());
        assert!(context.copy_buffer_region(&a, 1, &b, 0, u64::MAX).is_err());
        assert!(context.upload_to_buffer(&a, u64::MAX, &[1, 2]).is_err());

        // Nothing was recorded for the rejected copies
        assert_eq!(context.pinned_resource_count(), 0);
        context.copy_buffer_region(&a, 62, &b, 0, 2).unwrap();
        queue.submit(context).unwrap();
    }

    #[test]
    fn test_upload_allocations_land_in_context_pages() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Copy, &state_tracker);

        let context = queue.acquire_context().unwrap();
        {
            let first = context.allocate_upload(16, 16).unwrap();
            let second = context.allocate_upload(16, 16).unwrap();
            first.write(&[1; 16]).unwrap();
            second.write(&[2; 16]).unwrap();
            assert_eq!(second.offset(), first.offset() + 16);
        }
        assert_eq!(context.upload_buffer().in_flight_page_count(), 1);

        let fence_value = queue.submit(context).unwrap();
        queue.wait_for(fence_value).unwrap();
        assert!(wait_until(|| queue.recycler().available_count() == 1));

        // The recycled context starts over with its pages rewound
        let context = queue.acquire_context().unwrap();
        assert_eq!(context.upload_buffer().in_flight_page_count(), 0);
        assert_eq!(context.upload_buffer().available_page_count(), 1);
        assert_eq!(context.allocate_upload(4, 4).unwrap().offset(), 0);
    }

    #[test]
    fn test_context_pins_resources_until_complete() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Graphics, &state_tracker);
        let buffer = create_buffer(&api, &state_tracker, 256);

        let mut context = queue.acquire_context().unwrap();
        context
            .transition_resource(&buffer, CeraResourceState::COPY_DST)
            .unwrap();
        queue.submit(context).unwrap();
        assert_eq!(buffer.resource().reference_count(), 2);

        null_queue(&queue).complete_all();
        assert!(wait_until(|| queue.in_flight_count() == 0));
        assert_eq!(buffer.resource().reference_count(), 1);
        release_gpu(&api);
    }

    #[test]
    fn test_mismatched_queue_is_rejected() {
        let api = create_api(CeraNullGpuCompletion::Immediate);
        let state_tracker = CeraResourceStateTracker::new();
        let graphics = create_queue(&api, CeraQueueType::Graphics, &state_tracker);
        let copy = create_queue(&api, CeraQueueType::Copy, &state_tracker);

        let context = copy.acquire_context().unwrap();
        match graphics.submit(context) {
            Err(CeraError::QueueMismatch { expected, actual }) => {
                assert_eq!(expected, CeraQueueType::Graphics);
                assert_eq!(actual, CeraQueueType::Copy);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_drains_in_flight_contexts() {
        let api = create_api(CeraNullGpuCompletion::Manual);
        let state_tracker = CeraResourceStateTracker::new();
        let queue = create_queue(&api, CeraQueueType::Graphics, &state_tracker);

        for _ in 0..3 {
            queue.submit(queue.acquire_context().unwrap()).unwrap();
        }
        assert_eq!(queue.in_flight_count(), 3);

        let null_device_context = api.device_context().null_device_context().unwrap().clone();
        let release_thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            null_device_context.set_gpu_completion(CeraNullGpuCompletion::Immediate);
        });

        queue.shutdown().unwrap();
        release_thread.join().unwrap();
        assert!(queue.is_shut_down());
        assert_eq!(queue.in_flight_count(), 0);
        assert_eq!(queue.recycler().available_count(), 3);

        let context = queue.acquire_context().unwrap();
        assert!(matches!(
            queue.submit(context),
            Err(CeraError::QueueShutDown(CeraQueueType::Graphics))
        ));
        queue.shutdown().unwrap();
    }
}
