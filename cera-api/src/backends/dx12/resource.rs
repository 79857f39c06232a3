use crate::dx12::CeraDeviceContextDx12;
use crate::{
    CeraError, CeraMemoryUsage, CeraResourceDesc, CeraResourceState, CeraResult,
    CeraTextureDimensions,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use windows::core::Interface;
use windows::Win32::Graphics::Dxgi::Common as dxgi_common;

use super::d3d12;
use super::internal::conversions;

fn d3d12_resource_desc(resource_desc: &CeraResourceDesc) -> d3d12::D3D12_RESOURCE_DESC {
    match resource_desc {
        CeraResourceDesc::Buffer(buffer_def) => {
            let mut flags = d3d12::D3D12_RESOURCE_FLAG_NONE;
            if buffer_def.allow_unordered_access {
                flags |= d3d12::D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS;
            }

            d3d12::D3D12_RESOURCE_DESC {
                Dimension: d3d12::D3D12_RESOURCE_DIMENSION_BUFFER,
                Alignment: d3d12::D3D12_DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT as u64,
                Width: buffer_def.size,
                Height: 1,
                DepthOrArraySize: 1,
                MipLevels: 1,
                Format: dxgi_common::DXGI_FORMAT_UNKNOWN,
                SampleDesc: dxgi_common::DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Layout: d3d12::D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
                Flags: flags,
            }
        }
        CeraResourceDesc::Texture(texture_def) => {
            let mut flags = d3d12::D3D12_RESOURCE_FLAG_NONE;
            if texture_def.allow_render_target {
                flags |= d3d12::D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET;
            }
            if texture_def.allow_depth_stencil {
                flags |= d3d12::D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL;
            }
            if texture_def.allow_unordered_access {
                flags |= d3d12::D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS;
            }

            let dimension = match texture_def.dimensions {
                CeraTextureDimensions::Dim1D => d3d12::D3D12_RESOURCE_DIMENSION_TEXTURE1D,
                CeraTextureDimensions::Dim2D => d3d12::D3D12_RESOURCE_DIMENSION_TEXTURE2D,
                CeraTextureDimensions::Dim3D => d3d12::D3D12_RESOURCE_DIMENSION_TEXTURE3D,
            };

            d3d12::D3D12_RESOURCE_DESC {
                Dimension: dimension,
                // From docs: If Alignment is set to 0, the runtime will use 4MB for MSAA textures
                // and 64KB for everything else.
                Alignment: 0,
                Width: texture_def.extents.width as u64,
                Height: texture_def.extents.height,
                DepthOrArraySize: if texture_def.dimensions == CeraTextureDimensions::Dim3D {
                    texture_def.extents.depth
                } else {
                    texture_def.array_length
                } as u16,
                MipLevels: texture_def.mip_count as u16,
                Format: conversions::depth_format_to_typeless(texture_def.format),
                SampleDesc: dxgi_common::DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Layout: d3d12::D3D12_TEXTURE_LAYOUT_UNKNOWN,
                Flags: flags,
            }
        }
    }
}

#[derive(Debug)]
struct CeraRawResourceDx12Inner {
    device_context: CeraDeviceContextDx12,
    resource: d3d12::ID3D12Resource,
    resource_desc: CeraResourceDesc,
    initial_state: CeraResourceState,
    gpu_virtual_address: u64,
    mapped_ptr: Mutex<Option<*mut u8>>,
    mapped_ref_count: AtomicU32,
}

// for Mutex<Option<*mut u8>>, which is a pointer to a mapped buffer
unsafe impl Send for CeraRawResourceDx12Inner {}
unsafe impl Sync for CeraRawResourceDx12Inner {}

/// A committed resource. Cloning shares the same underlying resource.
#[derive(Clone, Debug)]
pub struct CeraRawResourceDx12 {
    inner: Arc<CeraRawResourceDx12Inner>,
}

impl CeraRawResourceDx12 {
    pub fn new(
        device_context: &CeraDeviceContextDx12,
        resource_desc: &CeraResourceDesc,
        initial_state: CeraResourceState,
    ) -> CeraResult<CeraRawResourceDx12> {
        resource_desc.verify();

        let memory_usage = resource_desc.memory_usage();
        if let Some(required_state) = memory_usage.required_initial_state() {
            if initial_state != required_state {
                return Err(CeraError::ResourceCreationFailed(format!(
                    "{:?} resources must be created in state {:?}, not {:?}",
                    memory_usage, required_state, initial_state
                )));
            }
        }

        let heap_properties = d3d12::D3D12_HEAP_PROPERTIES {
            Type: memory_usage.into(),
            CPUPageProperty: d3d12::D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: d3d12::D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 0,
            VisibleNodeMask: 0,
        };

        let desc = d3d12_resource_desc(resource_desc);
        let mut resource: Option<d3d12::ID3D12Resource> = None;
        unsafe {
            device_context.d3d12_device().CreateCommittedResource(
                &heap_properties,
                d3d12::D3D12_HEAP_FLAG_NONE,
                &desc,
                initial_state.into(),
                None,
                &mut resource,
            )
        }
        .map_err(|e| {
            CeraError::ResourceCreationFailed(format!(
                "CreateCommittedResource failed for {:?}: {:?}",
                resource_desc, e
            ))
        })?;

        let resource = resource.ok_or_else(|| {
            CeraError::ResourceCreationFailed("CreateCommittedResource returned null".to_string())
        })?;

        let gpu_virtual_address = match resource_desc {
            CeraResourceDesc::Buffer(_) => unsafe { resource.GetGPUVirtualAddress() },
            CeraResourceDesc::Texture(_) => 0,
        };

        let inner = CeraRawResourceDx12Inner {
            device_context: device_context.clone(),
            resource,
            resource_desc: resource_desc.clone(),
            initial_state,
            gpu_virtual_address,
            mapped_ptr: Mutex::new(None),
            mapped_ref_count: AtomicU32::new(0),
        };

        Ok(CeraRawResourceDx12 {
            inner: Arc::new(inner),
        })
    }

    pub fn dx12_resource(&self) -> &d3d12::ID3D12Resource {
        &self.inner.resource
    }

    pub fn resource_desc(&self) -> &CeraResourceDesc {
        &self.inner.resource_desc
    }

    pub fn initial_state(&self) -> CeraResourceState {
        self.inner.initial_state
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.inner.gpu_virtual_address
    }

    pub fn set_debug_name(
        &self,
        name: &str,
    ) {
        if self.inner.device_context.device_info().debug_names_enabled {
            if let Ok(object) = self.inner.resource.cast::<d3d12::ID3D12Object>() {
                super::internal::set_debug_name(&object, name);
            }
        }
    }

    pub fn map(&self) -> CeraResult<*mut u8> {
        if self.inner.resource_desc.memory_usage() == CeraMemoryUsage::GpuOnly {
            return Err("Only CPU-visible resources can be mapped")?;
        }

        let mut mapped_ptr = self.inner.mapped_ptr.lock().unwrap();
        if let Some(ptr) = *mapped_ptr {
            self.inner.mapped_ref_count.fetch_add(1, Ordering::Relaxed);
            return Ok(ptr);
        }

        let mut ptr = std::ptr::null_mut::<std::ffi::c_void>();
        unsafe {
            self.inner.resource.Map(0, None, Some(&mut ptr))?;
        }

        self.inner.mapped_ref_count.fetch_add(1, Ordering::Relaxed);
        *mapped_ptr = Some(ptr as *mut u8);
        Ok(ptr as *mut u8)
    }

    pub fn unmap(&self) -> CeraResult<()> {
        let mut mapped_ptr = self.inner.mapped_ptr.lock().unwrap();
        if mapped_ptr.is_none() {
            return Ok(());
        }

        let old_count = self.inner.mapped_ref_count.fetch_sub(1, Ordering::Relaxed);
        if old_count == 1 {
            unsafe {
                self.inner.resource.Unmap(0, None);
            }
            *mapped_ptr = None;
        }

        Ok(())
    }
}

impl PartialEq for CeraRawResourceDx12 {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
