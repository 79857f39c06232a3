mod resource;
pub use resource::*;

mod buffer;
pub use buffer::*;

mod texture;
pub use texture::*;

mod view;
pub use view::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::CeraDescriptorAllocator;
    use crate::state::CeraResourceStateTracker;
    use cera_api::*;

    fn create_resource(
        device_context: &CeraDeviceContext,
        tracker: &CeraResourceStateTracker,
        resource_desc: CeraResourceDesc,
    ) -> (CeraResource, crossbeam_channel::Receiver<CeraResourceId>) {
        let (drop_tx, drop_rx) = crossbeam_channel::unbounded();
        let raw = device_context
            .create_raw_resource(&resource_desc, CeraResourceState::COMMON)
            .unwrap();
        let id = tracker.register_resource(CeraResourceState::COMMON);
        (CeraResource::new(raw, id, drop_tx), drop_rx)
    }

    fn buffer_desc(
        size: u64,
        allow_unordered_access: bool,
    ) -> CeraResourceDesc {
        CeraResourceDesc::Buffer(CeraBufferDef {
            size,
            memory_usage: CeraMemoryUsage::GpuOnly,
            allow_unordered_access,
        })
    }

    #[test]
    fn test_last_drop_reports_id() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let tracker = CeraResourceStateTracker::new();
        let (resource, drop_rx) =
            create_resource(&api.device_context(), &tracker, buffer_desc(256, false));
        let id = resource.resource_id();

        let clone = resource.clone();
        assert_eq!(resource.reference_count(), 2);
        drop(resource);
        assert!(drop_rx.try_recv().is_err());
        drop(clone);
        assert_eq!(drop_rx.try_recv().unwrap(), id);
    }

    #[test]
    fn test_buffer_wrappers() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let tracker = CeraResourceStateTracker::new();
        let (resource, _drop_rx) =
            create_resource(&api.device_context(), &tracker, buffer_desc(1024, false));
        resource.set_debug_name("geometry");

        let buffer = CeraBuffer::new(resource.clone()).unwrap();
        assert!(CeraTexture::new(resource.clone()).is_err());
        assert_eq!(buffer.debug_name().as_deref(), Some("geometry"));

        let vertex_buffer = CeraVertexBuffer::new(buffer.clone(), 32, 32).unwrap();
        let view = vertex_buffer.vertex_buffer_view();
        assert_eq!(view.size_in_bytes, 1024);
        assert_eq!(view.stride_in_bytes, 32);
        assert_eq!(view.buffer_location, resource.gpu_virtual_address());
        assert!(CeraVertexBuffer::new(buffer.clone(), 32, 33).is_err());

        let index_buffer = CeraIndexBuffer::new(buffer.clone(), CeraIndexType::Uint16, 100).unwrap();
        assert_eq!(index_buffer.index_buffer_view().size_in_bytes, 200);

        assert!(CeraConstantBuffer::new(buffer.clone(), 256).is_ok());
        assert!(CeraConstantBuffer::new(buffer.clone(), 2048).is_err());
        assert_eq!(
            CeraByteAddressBuffer::new(buffer).unwrap().word_count(),
            256
        );
    }

    #[test]
    fn test_views_write_descriptors_and_retire_on_drop() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let device_context = api.device_context();
        let tracker = CeraResourceStateTracker::new();
        let allocator = CeraDescriptorAllocator::new(&device_context, false, [16; 4], 0);
        let (resource, _drop_rx) =
            create_resource(&device_context, &tracker, buffer_desc(1024, true));

        let uav = CeraUnorderedAccessView::new(
            &device_context,
            &allocator,
            &resource,
            CeraViewRange::Buffer {
                first_element: 0,
                element_count: 256,
                element_stride: 0,
            },
        )
        .unwrap();
        let cbv = CeraConstantBufferView::new(&device_context, &allocator, &resource, 256, 256)
            .unwrap();
        assert_eq!(cbv.gpu_virtual_address(), resource.gpu_virtual_address() + 256);
        assert!(CeraConstantBufferView::new(&device_context, &allocator, &resource, 4, 256).is_err());

        let null_device_context = device_context.null_device_context().unwrap();
        match null_device_context.descriptor_at(uav.cpu_handle()) {
            Some(null::CeraNullDescriptor::View { view_def, .. }) => {
                assert_eq!(view_def, *uav.view_def())
            }
            other => panic!("unexpected descriptor {:?}", other),
        }

        assert_eq!(
            allocator.free_descriptor_count(CeraDescriptorHeapType::CbvSrvUav),
            14
        );
        drop(uav);
        drop(cbv);
        assert_eq!(allocator.stale_allocation_count(), 2);
        assert_eq!(allocator.release_stale(0).unwrap(), 2);
        assert_eq!(
            allocator.free_descriptor_count(CeraDescriptorHeapType::CbvSrvUav),
            16
        );
    }

    #[test]
    fn test_view_requires_matching_usage() {
        let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
        let device_context = api.device_context();
        let tracker = CeraResourceStateTracker::new();
        let allocator = CeraDescriptorAllocator::new(&device_context, false, [16; 4], 0);
        let (buffer, _drop_rx) =
            create_resource(&device_context, &tracker, buffer_desc(1024, false));

        let range = CeraViewRange::Buffer {
            first_element: 0,
            element_count: 256,
            element_stride: 0,
        };
        assert!(CeraUnorderedAccessView::new(&device_context, &allocator, &buffer, range).is_err());
        assert!(CeraRenderTargetView::new(
            &device_context,
            &allocator,
            &buffer,
            CeraFormat::R8G8B8A8_UNORM,
            0
        )
        .is_err());

        let sampler = CeraSampler::new(&device_context, &allocator, &Default::default()).unwrap();
        assert_eq!(
            sampler.descriptors().allocation().heap_type(),
            CeraDescriptorHeapType::Sampler
        );
    }
}
