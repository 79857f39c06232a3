use crate::*;
use std::time::Duration;

fn create_null_api(gpu_completion: CeraNullGpuCompletion) -> CeraApi {
    let _ = env_logger::builder().is_test(true).try_init();
    let null_api_def = CeraApiDefNull {
        gpu_completion,
        ..Default::default()
    };
    CeraApi::new_null(&Default::default(), &null_api_def).unwrap()
}

fn buffer_desc(
    size: u64,
    memory_usage: CeraMemoryUsage,
) -> CeraResourceDesc {
    CeraResourceDesc::Buffer(CeraBufferDef {
        size,
        memory_usage,
        allow_unordered_access: false,
    })
}

#[test]
fn test_immediate_completion_reaches_signaled_value() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    let fence = device_context.create_fence().unwrap();

    assert_eq!(fence.completed_value().unwrap(), 0);
    queue.signal(&fence, 1).unwrap();
    queue.signal(&fence, 2).unwrap();
    assert_eq!(fence.completed_value().unwrap(), 2);
}

#[test]
fn test_manual_completion_holds_back_signals() {
    let api = create_null_api(CeraNullGpuCompletion::Manual);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Compute).unwrap();
    let fence = device_context.create_fence().unwrap();

    queue.signal(&fence, 1).unwrap();
    queue.signal(&fence, 2).unwrap();
    assert_eq!(fence.completed_value().unwrap(), 0);
    assert!(!fence
        .wait_for_value(1, Duration::from_millis(10))
        .unwrap());

    let null_queue = queue.null_queue().unwrap();
    assert!(null_queue.complete_next());
    assert_eq!(fence.completed_value().unwrap(), 1);
    assert_eq!(null_queue.complete_all(), 1);
    assert_eq!(fence.completed_value().unwrap(), 2);
    assert!(!null_queue.complete_next());
}

#[test]
fn test_wait_unblocks_when_completed_from_another_thread() {
    let api = create_null_api(CeraNullGpuCompletion::Manual);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    let fence = device_context.create_fence().unwrap();
    queue.signal(&fence, 1).unwrap();

    let waiting_fence = fence.clone();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let waiter = std::thread::spawn(move || {
        let reached = waiting_fence
            .wait_for_value(1, Duration::from_secs(10))
            .unwrap();
        tx.send(reached).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    queue.null_queue().unwrap().complete_next();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    waiter.join().unwrap();
}

#[test]
fn test_cross_queue_wait_orders_gpu_work() {
    let api = create_null_api(CeraNullGpuCompletion::Manual);
    let device_context = api.device_context();
    let graphics_queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    let copy_queue = device_context.create_queue(CeraQueueType::Copy).unwrap();
    let copy_fence = device_context.create_fence().unwrap();
    let graphics_fence = device_context.create_fence().unwrap();

    copy_queue.signal(&copy_fence, 1).unwrap();
    graphics_queue.wait(&copy_fence, 1).unwrap();
    graphics_queue.signal(&graphics_fence, 1).unwrap();

    // The graphics queue is blocked behind the copy queue
    assert!(!graphics_queue.null_queue().unwrap().complete_next());
    assert_eq!(graphics_fence.completed_value().unwrap(), 0);

    assert!(copy_queue.null_queue().unwrap().complete_next());
    assert!(graphics_queue.null_queue().unwrap().complete_next());
    assert_eq!(graphics_fence.completed_value().unwrap(), 1);
}

#[test]
fn test_switching_to_immediate_releases_held_work() {
    let api = create_null_api(CeraNullGpuCompletion::Manual);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    let fence = device_context.create_fence().unwrap();
    queue.signal(&fence, 5).unwrap();

    device_context
        .null_device_context()
        .unwrap()
        .set_gpu_completion(CeraNullGpuCompletion::Immediate);
    assert_eq!(fence.completed_value().unwrap(), 5);
}

#[test]
fn test_device_lost_fails_submission_and_waits() {
    let api = create_null_api(CeraNullGpuCompletion::Manual);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    let fence = device_context.create_fence().unwrap();
    let command_buffer = device_context
        .create_command_buffer(CeraQueueType::Graphics)
        .unwrap();
    command_buffer.reset().unwrap();
    command_buffer.close().unwrap();

    device_context
        .null_device_context()
        .unwrap()
        .simulate_device_lost();

    assert!(queue
        .execute_command_buffers(&[&command_buffer])
        .unwrap_err()
        .is_device_lost());
    assert!(queue.signal(&fence, 1).unwrap_err().is_device_lost());
    assert!(fence
        .wait_for_value(1, Duration::from_secs(10))
        .unwrap_err()
        .is_device_lost());
}

#[test]
fn test_executed_copy_moves_bytes() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    let queue = device_context.create_queue(CeraQueueType::Copy).unwrap();

    let staging = device_context
        .create_raw_resource(
            &buffer_desc(16, CeraMemoryUsage::CpuToGpu),
            CeraResourceState::GENERIC_READ,
        )
        .unwrap();
    let destination = device_context
        .create_raw_resource(
            &buffer_desc(16, CeraMemoryUsage::GpuOnly),
            CeraResourceState::COPY_DST,
        )
        .unwrap();

    let data: Vec<u8> = (0..8).collect();
    unsafe {
        let ptr = staging.map().unwrap();
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
    }
    staging.unmap().unwrap();

    let command_buffer = device_context
        .create_command_buffer(CeraQueueType::Copy)
        .unwrap();
    command_buffer.reset().unwrap();
    command_buffer
        .copy_buffer_region(&destination, 4, &staging, 0, 8)
        .unwrap();
    command_buffer.close().unwrap();
    queue.execute_command_buffers(&[&command_buffer]).unwrap();

    let contents = destination
        .null_raw_resource()
        .unwrap()
        .read_memory(4, 8)
        .unwrap();
    assert_eq!(contents, data);

    let stats = device_context.null_device_context().unwrap().gpu_stats();
    assert_eq!(stats.executed_command_buffers, 1);
    assert_eq!(stats.executed_copies, 1);
}

#[test]
fn test_cpu_visible_resources_require_fixed_state() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    let result = device_context.create_raw_resource(
        &buffer_desc(16, CeraMemoryUsage::CpuToGpu),
        CeraResourceState::COPY_DST,
    );
    match result {
        Err(CeraError::ResourceCreationFailed(_)) => {}
        other => panic!("unexpected result {:?}", other),
    }

    let gpu_only = device_context
        .create_raw_resource(
            &buffer_desc(16, CeraMemoryUsage::GpuOnly),
            CeraResourceState::COMMON,
        )
        .unwrap();
    assert!(gpu_only.map().is_err());
}

#[test]
fn test_command_buffer_recording_rules() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    let copy_command_buffer = device_context
        .create_command_buffer(CeraQueueType::Copy)
        .unwrap();

    // Created closed
    assert!(copy_command_buffer.dispatch(1, 1, 1).is_err());
    copy_command_buffer.reset().unwrap();
    // Copy lists can't dispatch
    assert!(copy_command_buffer.dispatch(1, 1, 1).is_err());
    copy_command_buffer.close().unwrap();
    assert!(copy_command_buffer.close().is_err());

    let graphics_queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
    assert!(graphics_queue
        .execute_command_buffers(&[&copy_command_buffer])
        .is_err());

    let compute_command_buffer = device_context
        .create_command_buffer(CeraQueueType::Compute)
        .unwrap();
    compute_command_buffer.reset().unwrap();
    compute_command_buffer.dispatch(4, 2, 1).unwrap();
    let compute_queue = device_context.create_queue(CeraQueueType::Compute).unwrap();
    // Still recording
    assert!(compute_queue
        .execute_command_buffers(&[&compute_command_buffer])
        .is_err());
    compute_command_buffer.close().unwrap();
    compute_queue
        .execute_command_buffers(&[&compute_command_buffer])
        .unwrap();
    assert_eq!(
        device_context
            .null_device_context()
            .unwrap()
            .gpu_stats()
            .executed_dispatches,
        1
    );
}

#[test]
fn test_descriptor_writes_are_visible() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    let heap = device_context
        .create_descriptor_heap(&CeraDescriptorHeapDef {
            heap_type: CeraDescriptorHeapType::CbvSrvUav,
            descriptor_count: 8,
            shader_visible: false,
        })
        .unwrap();
    assert!(heap.gpu_handle(0).is_none());

    let buffer = device_context
        .create_raw_resource(
            &buffer_desc(512, CeraMemoryUsage::GpuOnly),
            CeraResourceState::COMMON,
        )
        .unwrap();
    let view_def = CeraViewDef::ConstantBuffer {
        byte_offset: 256,
        size: 256,
    };
    device_context
        .create_view(&buffer, &view_def, heap.cpu_handle(3))
        .unwrap();

    let null_device_context = device_context.null_device_context().unwrap();
    match null_device_context.descriptor_at(heap.cpu_handle(3)) {
        Some(null::CeraNullDescriptor::View {
            heap_type,
            view_def: written,
            ..
        }) => {
            assert_eq!(heap_type, CeraDescriptorHeapType::CbvSrvUav);
            assert_eq!(written, view_def);
        }
        other => panic!("unexpected descriptor {:?}", other),
    }
    assert!(null_device_context.descriptor_at(heap.cpu_handle(2)).is_none());

    // Out of bounds constant buffer view
    let too_large = CeraViewDef::ConstantBuffer {
        byte_offset: 256,
        size: 512,
    };
    assert!(device_context
        .create_view(&buffer, &too_large, heap.cpu_handle(4))
        .is_err());

    // Copy into a shader visible heap
    let gpu_heap = device_context
        .create_descriptor_heap(&CeraDescriptorHeapDef {
            heap_type: CeraDescriptorHeapType::CbvSrvUav,
            descriptor_count: 8,
            shader_visible: true,
        })
        .unwrap();
    assert!(gpu_heap.gpu_handle(0).is_some());
    device_context
        .copy_descriptors(
            gpu_heap.cpu_handle(0),
            heap.cpu_handle(3),
            1,
            CeraDescriptorHeapType::CbvSrvUav,
        )
        .unwrap();
    assert!(null_device_context
        .descriptor_at(gpu_heap.cpu_handle(0))
        .is_some());
}

#[test]
fn test_rtv_heaps_cannot_be_shader_visible() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let result = api
        .device_context()
        .create_descriptor_heap(&CeraDescriptorHeapDef {
            heap_type: CeraDescriptorHeapType::Rtv,
            descriptor_count: 8,
            shader_visible: true,
        });
    assert!(result.is_err());
}

#[test]
fn test_pipeline_from_root_signature() {
    let api = create_null_api(CeraNullGpuCompletion::Immediate);
    let device_context = api.device_context();
    assert!(device_context
        .create_root_signature(&CeraRootSignatureDef {
            serialized_root_signature: vec![],
        })
        .is_err());

    let root_signature = device_context
        .create_root_signature(&CeraRootSignatureDef {
            serialized_root_signature: vec![1, 2, 3, 4],
        })
        .unwrap();
    let pipeline = device_context
        .create_compute_pipeline(&CeraComputePipelineDef {
            root_signature: &root_signature,
            compute_shader_bytecode: &[0xDE, 0xAD],
        })
        .unwrap();
    assert!(pipeline.root_signature().null_root_signature().is_some());
}
