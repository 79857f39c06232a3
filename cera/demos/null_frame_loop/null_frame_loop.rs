use log::LevelFilter;

use cera::api::*;
use cera::framework::*;

const FRAME_COUNT: u64 = 8;
const ELEMENT_COUNT: u32 = 64;

// The null backend accepts any non-empty blob and bytecode
const ROOT_SIGNATURE_BLOB: [u8; 4] = [0x44, 0x58, 0x42, 0x43];
const COMPUTE_SHADER_BYTECODE: [u8; 16] = [0xCE; 16];

fn main() {
    env_logger::Builder::from_default_env()
        .default_format_timestamp_nanos(true)
        .filter_level(LevelFilter::Debug)
        .init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> CeraResult<()> {
    //
    // Create the api. The null backend needs no GPU, and with immediate completion every signal
    // completes as soon as it reaches the front of its queue.
    //
    let api = CeraApi::new_null(
        &Default::default(),
        &CeraApiDefNull {
            gpu_completion: CeraNullGpuCompletion::Immediate,
            ..Default::default()
        },
    )?;

    // Wrap all of this so that it gets dropped before the api
    {
        let device_context = api.device_context();
        let device = CeraDevice::new(&device_context, &Default::default())?;

        //
        // Resources: an input buffer the copy queue fills, an output buffer the compute queue
        // writes, and a readback buffer the CPU reads results from
        //
        let buffer_size = ELEMENT_COUNT as u64 * 4;
        let input = device.create_byte_address_buffer(buffer_size, false)?;
        let output = device.create_byte_address_buffer(buffer_size, true)?;
        let readback = device.create_buffer(&CeraBufferDef {
            size: buffer_size,
            memory_usage: CeraMemoryUsage::GpuToCpu,
            allow_unordered_access: false,
        })?;
        input.set_debug_name("input");
        output.set_debug_name("output");
        readback.set_debug_name("readback");

        let raw_range = CeraViewRange::Buffer {
            first_element: 0,
            element_count: ELEMENT_COUNT,
            element_stride: 0,
        };
        let input_srv = device.create_shader_resource_view(&input, raw_range)?;
        let output_uav = device.create_unordered_access_view(&output, raw_range)?;

        //
        // Views are created in CPU-only heaps. Copy them next to each other in the bindless heap
        // so one descriptor table covers both.
        //
        let bindless = device
            .bindless_descriptor_allocator()
            .ok_or("The adapter does not support bindless descriptors")?;
        let table = bindless.allocate_owned(CeraDescriptorHeapType::CbvSrvUav, 2)?;
        for (index, view_handle) in [input_srv.cpu_handle(), output_uav.cpu_handle()]
            .iter()
            .enumerate()
        {
            device_context.copy_descriptors(
                table.cpu_handle(index as u32),
                *view_handle,
                1,
                CeraDescriptorHeapType::CbvSrvUav,
            )?;
        }
        let table_heap = table.allocation().heap().clone();
        let table_base = table
            .gpu_handle(0)
            .ok_or("Bindless descriptors are not shader visible")?;

        let root_signature = device.create_root_signature(&CeraRootSignatureDef {
            serialized_root_signature: ROOT_SIGNATURE_BLOB.to_vec(),
        })?;
        let pipeline = device.create_compute_pipeline(&root_signature, &COMPUTE_SHADER_BYTECODE)?;

        //
        // Frame loop
        //
        for _ in 0..FRAME_COUNT {
            let frame_index = device.begin_frame()?;
            profiling::scope!("Frame");

            let input_data: Vec<u8> = (0..ELEMENT_COUNT)
                .flat_map(|i| (i + frame_index as u32).to_le_bytes())
                .collect();

            // The previous frame's compute work reads the input buffer this upload overwrites
            device.wait_on(CeraQueueType::Copy, CeraQueueType::Compute)?;
            let mut copy_context = device.acquire_context(CeraQueueType::Copy)?;
            copy_context.upload_to_buffer(input.buffer(), 0, &input_data)?;
            device.submit(copy_context)?;

            // Compute work must not start until the upload has landed
            device.wait_on(CeraQueueType::Compute, CeraQueueType::Copy)?;

            let mut compute_context = device.acquire_context(CeraQueueType::Compute)?;
            compute_context.set_descriptor_heaps(&[&table_heap])?;
            compute_context.set_compute_root_signature(root_signature.root_signature())?;
            compute_context.set_pipeline(&pipeline)?;
            compute_context.set_compute_root_descriptor_table(0, table_base)?;
            compute_context
                .transition_resource(&input, CeraResourceState::NON_PIXEL_SHADER_RESOURCE)?;
            compute_context.transition_resource(&output, CeraResourceState::UNORDERED_ACCESS)?;
            compute_context.dispatch(ELEMENT_COUNT / 64, 1, 1)?;
            compute_context.copy_buffer_region(&readback, 0, input.buffer(), 0, buffer_size)?;
            let fence_value = device.submit(compute_context)?;

            let completed_frame_horizon = device.end_frame()?;
            log::info!(
                "Frame {} submitted compute work at fence value {}, {} frames complete",
                frame_index,
                fence_value,
                completed_frame_horizon
            );
        }

        device.flush_all()?;

        //
        // Read back the data uploaded in the last frame
        //
        let mapped = readback.raw_resource().map()?;
        let mut first_values = [0u32; 4];
        for (i, value) in first_values.iter_mut().enumerate() {
            let mut bytes = [0u8; 4];
            unsafe {
                std::ptr::copy_nonoverlapping(mapped.add(i * 4), bytes.as_mut_ptr(), 4);
            }
            *value = u32::from_le_bytes(bytes);
        }
        readback.raw_resource().unmap()?;
        log::info!("Readback starts with {:?}", first_values);

        log::info!(
            "{} resources tracked, {} root signatures and {} pipelines cached",
            device.state_tracker().registered_count(),
            device.pipeline_cache().root_signature_count(),
            device.pipeline_cache().compute_pipeline_count()
        );

        device.shutdown()?;
    }

    Ok(())
}
