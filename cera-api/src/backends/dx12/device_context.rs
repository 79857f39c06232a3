use crate::dx12::{
    CeraCommandBufferDx12, CeraDescriptorHeapDx12, CeraFenceDx12, CeraPipelineDx12, CeraQueueDx12,
    CeraRawResourceDx12, CeraRootSignatureDx12,
};
use crate::{
    CeraAdapterInfo, CeraApiDef, CeraApiDefDx12, CeraComputePipelineDef, CeraCpuDescriptorHandle,
    CeraDescriptorHeapDef, CeraDescriptorHeapType, CeraDeviceInfo, CeraError, CeraFeatureLevel,
    CeraQueueType, CeraResourceBindingTier, CeraResourceDesc, CeraResourceState, CeraResult,
    CeraRootSignatureDef, CeraSamplerDef, CeraValidationMode, CeraViewDef, CeraViewRange,
};
use std::sync::Arc;
use windows::core::Interface;
use windows::Win32::Graphics::Dxgi::Common as dxgi_common;

use super::d3d12;
use super::dxgi;
use super::internal::conversions;
use super::internal::wchar_to_string;

// Picks the first hardware adapter that can create a device at the minimum feature level
fn get_hardware_adapter(
    factory: &dxgi::IDXGIFactory4,
    dx12_api_def: &CeraApiDefDx12,
) -> CeraResult<dxgi::IDXGIAdapter1> {
    let minimum_feature_level = dx12_api_def.minimum_feature_level.into();

    for i in 0.. {
        // Returns DXGI_ERROR_NOT_FOUND if we run out of adapters to check
        let adapter = match unsafe { factory.EnumAdapters1(i) } {
            Ok(adapter) => adapter,
            Err(_) => break,
        };

        let mut desc = Default::default();
        unsafe { adapter.GetDesc1(&mut desc)? };

        log::info!("Found device {:?}", wchar_to_string(&desc.Description));
        log::info!(
            "  Vendor Id:{} Device Id: {} Dedicated VMem: {}",
            desc.VendorId,
            desc.DeviceId,
            desc.DedicatedVideoMemory,
        );

        if (dxgi::DXGI_ADAPTER_FLAG(desc.Flags) & dxgi::DXGI_ADAPTER_FLAG_SOFTWARE)
            != dxgi::DXGI_ADAPTER_FLAG_NONE
        {
            // Don't select the Basic Render Driver adapter. Set use_warp_device to get a software
            // adapter.
            continue;
        }

        // Check to see whether the adapter supports Direct3D 12, but don't create the actual
        // device yet.
        if unsafe {
            d3d12::D3D12CreateDevice(
                &adapter,
                minimum_feature_level,
                std::ptr::null_mut::<Option<d3d12::ID3D12Device>>(),
            )
        }
        .is_ok()
        {
            return Ok(adapter);
        }
    }

    Err(format!(
        "No hardware adapter supports feature level {:?}",
        dx12_api_def.minimum_feature_level
    ))?
}

fn enable_debug_layer(
    validation_mode: CeraValidationMode,
    dx12_api_def: &CeraApiDefDx12,
) -> CeraResult<()> {
    unsafe {
        let mut debug: Option<d3d12::ID3D12Debug> = None;
        if let Some(debug) = d3d12::D3D12GetDebugInterface(&mut debug).ok().and(debug) {
            debug.EnableDebugLayer();
            if dx12_api_def.enable_gpu_based_validation {
                let debug1: d3d12::ID3D12Debug1 = debug.cast()?;
                debug1.SetEnableGPUBasedValidation(true);
            }
        } else if validation_mode == CeraValidationMode::EnabledIfAvailable {
            log::warn!("Could not acquire D3D12GetDebugInterface.");
        } else {
            log::error!("Could not acquire D3D12GetDebugInterface.");
            return Err(CeraError::ValidationRequiredButUnavailable);
        }
    }

    Ok(())
}

// Tries feature levels from highest to lowest, stopping at the configured minimum
fn create_device_at_highest_feature_level(
    adapter: &dxgi::IDXGIAdapter1,
    dx12_api_def: &CeraApiDefDx12,
) -> CeraResult<(d3d12::ID3D12Device, CeraFeatureLevel)> {
    for &feature_level in CeraFeatureLevel::DESCENDING
        .iter()
        .filter(|&&x| x >= dx12_api_def.minimum_feature_level)
    {
        let mut device: Option<d3d12::ID3D12Device> = None;
        let result =
            unsafe { d3d12::D3D12CreateDevice(adapter, feature_level.into(), &mut device) };
        if let (Ok(()), Some(device)) = (result, device) {
            log::info!("Created device at {:?}", feature_level);
            return Ok((device, feature_level));
        }
    }

    Err(format!(
        "Adapter does not support feature level {:?}",
        dx12_api_def.minimum_feature_level
    ))?
}

fn query_adapter_info(
    adapter: &dxgi::IDXGIAdapter1,
    device: &d3d12::ID3D12Device,
    feature_level: CeraFeatureLevel,
) -> CeraResult<CeraAdapterInfo> {
    let mut desc = Default::default();
    unsafe { adapter.GetDesc1(&mut desc)? };

    let mut options = d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS::default();
    unsafe {
        device.CheckFeatureSupport(
            d3d12::D3D12_FEATURE_D3D12_OPTIONS,
            &mut options as *mut _ as *mut std::ffi::c_void,
            std::mem::size_of::<d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS>() as u32,
        )?;
    }

    let resource_binding_tier = match options.ResourceBindingTier {
        d3d12::D3D12_RESOURCE_BINDING_TIER_1 => CeraResourceBindingTier::Tier1,
        d3d12::D3D12_RESOURCE_BINDING_TIER_2 => CeraResourceBindingTier::Tier2,
        _ => CeraResourceBindingTier::Tier3,
    };

    let mut options1 = d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS1::default();
    let supports_wave_ops = unsafe {
        device.CheckFeatureSupport(
            d3d12::D3D12_FEATURE_D3D12_OPTIONS1,
            &mut options1 as *mut _ as *mut std::ffi::c_void,
            std::mem::size_of::<d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS1>() as u32,
        )
    }
    .is_ok()
        && options1.WaveOps.as_bool();

    // Older runtimes don't know about OPTIONS9, treat that as unsupported
    let mut options9 = d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS9::default();
    let supports_atomic64 = unsafe {
        device.CheckFeatureSupport(
            d3d12::D3D12_FEATURE_D3D12_OPTIONS9,
            &mut options9 as *mut _ as *mut std::ffi::c_void,
            std::mem::size_of::<d3d12::D3D12_FEATURE_DATA_D3D12_OPTIONS9>() as u32,
        )
    }
    .is_ok()
        && options9.AtomicInt64OnTypedResourceSupported.as_bool();

    Ok(CeraAdapterInfo {
        description: wchar_to_string(&desc.Description),
        vendor_id: desc.VendorId,
        device_id: desc.DeviceId,
        dedicated_video_memory: desc.DedicatedVideoMemory as u64,
        is_software_adapter: (dxgi::DXGI_ADAPTER_FLAG(desc.Flags)
            & dxgi::DXGI_ADAPTER_FLAG_SOFTWARE)
            != dxgi::DXGI_ADAPTER_FLAG_NONE,
        feature_level,
        resource_binding_tier,
        supports_wave_ops,
        supports_atomic64,
    })
}

pub struct CeraDeviceContextDx12Inner {
    pub(crate) device_info: CeraDeviceInfo,
    pub(crate) adapter_info: CeraAdapterInfo,

    d3d12_device: d3d12::ID3D12Device,
    _dxgi_adapter: dxgi::IDXGIAdapter1,
    _dxgi_factory: dxgi::IDXGIFactory4,
}

// COM interfaces created on a free-threaded device
unsafe impl Send for CeraDeviceContextDx12Inner {}
unsafe impl Sync for CeraDeviceContextDx12Inner {}

impl Drop for CeraDeviceContextDx12Inner {
    fn drop(&mut self) {
        log::trace!("destroying device");
    }
}

impl CeraDeviceContextDx12Inner {
    pub fn new(
        api_def: &CeraApiDef,
        dx12_api_def: &CeraApiDefDx12,
    ) -> CeraResult<Self> {
        if api_def.validation_mode != CeraValidationMode::Disabled {
            enable_debug_layer(api_def.validation_mode, dx12_api_def)?;
        }

        let dxgi_factory_flags = if api_def.validation_mode != CeraValidationMode::Disabled {
            dxgi::DXGI_CREATE_FACTORY_DEBUG
        } else {
            0
        };

        let dxgi_factory: dxgi::IDXGIFactory4 =
            unsafe { dxgi::CreateDXGIFactory2(dxgi_factory_flags) }?;

        let dxgi_adapter = if dx12_api_def.use_warp_device {
            log::info!("Creating warp adapter");
            unsafe { dxgi_factory.EnumWarpAdapter() }?
        } else {
            get_hardware_adapter(&dxgi_factory, dx12_api_def)?
        };

        let (d3d12_device, feature_level) =
            create_device_at_highest_feature_level(&dxgi_adapter, dx12_api_def)?;

        if api_def.validation_mode != CeraValidationMode::Disabled {
            if let Ok(info_queue) = d3d12_device.cast::<d3d12::ID3D12InfoQueue>() {
                unsafe {
                    info_queue.SetBreakOnSeverity(d3d12::D3D12_MESSAGE_SEVERITY_ERROR, true)?;
                    info_queue
                        .SetBreakOnSeverity(d3d12::D3D12_MESSAGE_SEVERITY_CORRUPTION, true)?;
                }
            }
        }

        let adapter_info = query_adapter_info(&dxgi_adapter, &d3d12_device, feature_level)?;
        log::info!("Using adapter {:?}", adapter_info);

        let device_info = CeraDeviceInfo {
            debug_names_enabled: dx12_api_def.enable_debug_names,
            constant_buffer_alignment: d3d12::D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT,
            upload_texture_alignment: d3d12::D3D12_TEXTURE_DATA_PLACEMENT_ALIGNMENT,
            upload_texture_row_alignment: d3d12::D3D12_TEXTURE_DATA_PITCH_ALIGNMENT,
            // Tier 1 and 2 limit, tier 3 only guarantees at least this many
            max_shader_visible_cbv_srv_uav_descriptors: 1_000_000,
            max_shader_visible_sampler_descriptors:
                d3d12::D3D12_MAX_SHADER_VISIBLE_SAMPLER_HEAP_SIZE,
        };

        Ok(CeraDeviceContextDx12Inner {
            device_info,
            adapter_info,
            d3d12_device,
            _dxgi_adapter: dxgi_adapter,
            _dxgi_factory: dxgi_factory,
        })
    }
}

#[derive(Clone)]
pub struct CeraDeviceContextDx12 {
    pub(crate) inner: Arc<CeraDeviceContextDx12Inner>,
}

impl std::fmt::Debug for CeraDeviceContextDx12 {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraDeviceContextDx12")
            .field("adapter", &self.inner.adapter_info.description)
            .finish()
    }
}

impl CeraDeviceContextDx12 {
    pub(crate) fn new(inner: Arc<CeraDeviceContextDx12Inner>) -> Self {
        CeraDeviceContextDx12 { inner }
    }

    pub fn d3d12_device(&self) -> &d3d12::ID3D12Device {
        &self.inner.d3d12_device
    }

    pub fn adapter_info(&self) -> &CeraAdapterInfo {
        &self.inner.adapter_info
    }

    pub fn device_info(&self) -> &CeraDeviceInfo {
        &self.inner.device_info
    }

    /// Returns the reason the device was removed, or None if it is still healthy
    pub fn device_removed_reason(&self) -> Option<windows::core::Error> {
        unsafe { self.inner.d3d12_device.GetDeviceRemovedReason() }.err()
    }

    pub(crate) fn device_lost_error(
        &self,
        operation: &str,
        queue_type: Option<CeraQueueType>,
        fence_value: Option<u64>,
    ) -> CeraError {
        if let Some(reason) = self.device_removed_reason() {
            log::error!("Device removed during {}: {:?}", operation, reason);
        }

        CeraError::DeviceLost {
            operation: operation.to_string(),
            queue_type,
            fence_value,
        }
    }

    pub fn create_queue(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraQueueDx12> {
        CeraQueueDx12::new(self, queue_type)
    }

    pub fn create_fence(&self) -> CeraResult<CeraFenceDx12> {
        CeraFenceDx12::new(self)
    }

    pub fn create_command_buffer(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandBufferDx12> {
        CeraCommandBufferDx12::new(self, queue_type)
    }

    pub fn create_descriptor_heap(
        &self,
        heap_def: &CeraDescriptorHeapDef,
    ) -> CeraResult<CeraDescriptorHeapDx12> {
        CeraDescriptorHeapDx12::new(self, heap_def)
    }

    pub fn create_raw_resource(
        &self,
        resource_desc: &CeraResourceDesc,
        initial_state: CeraResourceState,
    ) -> CeraResult<CeraRawResourceDx12> {
        CeraRawResourceDx12::new(self, resource_desc, initial_state)
    }

    pub fn create_root_signature(
        &self,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraRootSignatureDx12> {
        CeraRootSignatureDx12::new(self, root_signature_def)
    }

    pub fn create_compute_pipeline(
        &self,
        compute_pipeline_def: &CeraComputePipelineDef,
    ) -> CeraResult<CeraPipelineDx12> {
        CeraPipelineDx12::new(self, compute_pipeline_def)
    }

    pub fn create_view(
        &self,
        resource: &CeraRawResourceDx12,
        view_def: &CeraViewDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        let handle = d3d12::D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dst.0 };
        let device = self.d3d12_device();
        let d3d12_resource = resource.dx12_resource();

        match *view_def {
            CeraViewDef::ConstantBuffer { byte_offset, size } => {
                let buffer_size = resource
                    .resource_desc()
                    .buffer_def()
                    .map(|x| x.size)
                    .ok_or("Constant buffer views can only be created for buffers")?;
                if byte_offset + size as u64 > buffer_size {
                    return Err(format!(
                        "Constant buffer view [{}, {}) is out of bounds of a {} byte buffer",
                        byte_offset,
                        byte_offset + size as u64,
                        buffer_size
                    ))?;
                }

                let desc = d3d12::D3D12_CONSTANT_BUFFER_VIEW_DESC {
                    BufferLocation: resource.gpu_virtual_address() + byte_offset,
                    SizeInBytes: size,
                };
                unsafe { device.CreateConstantBufferView(Some(&desc), handle) };
            }
            CeraViewDef::ShaderResource(range) => {
                let mut desc = d3d12::D3D12_SHADER_RESOURCE_VIEW_DESC::default();
                desc.Shader4ComponentMapping = d3d12::D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING;
                match range {
                    CeraViewRange::Buffer {
                        first_element,
                        element_count,
                        element_stride,
                    } => {
                        desc.ViewDimension = d3d12::D3D12_SRV_DIMENSION_BUFFER;
                        desc.Anonymous.Buffer.FirstElement = first_element;
                        desc.Anonymous.Buffer.NumElements = element_count;
                        if element_stride == 0 {
                            desc.Format = dxgi_common::DXGI_FORMAT_R32_TYPELESS;
                            desc.Anonymous.Buffer.Flags = d3d12::D3D12_BUFFER_SRV_FLAG_RAW;
                        } else {
                            desc.Format = dxgi_common::DXGI_FORMAT_UNKNOWN;
                            desc.Anonymous.Buffer.StructureByteStride = element_stride;
                            desc.Anonymous.Buffer.Flags = d3d12::D3D12_BUFFER_SRV_FLAG_NONE;
                        }
                    }
                    CeraViewRange::Texture {
                        format,
                        most_detailed_mip,
                        mip_levels,
                    } => {
                        desc.Format = conversions::depth_format_to_srv_format(format);
                        desc.ViewDimension = d3d12::D3D12_SRV_DIMENSION_TEXTURE2D;
                        desc.Anonymous.Texture2D.MostDetailedMip = most_detailed_mip;
                        desc.Anonymous.Texture2D.MipLevels = mip_levels;
                        desc.Anonymous.Texture2D.PlaneSlice = 0;
                        desc.Anonymous.Texture2D.ResourceMinLODClamp = 0.0;
                    }
                }

                unsafe { device.CreateShaderResourceView(d3d12_resource, Some(&desc), handle) };
            }
            CeraViewDef::UnorderedAccess(range) => {
                let mut desc = d3d12::D3D12_UNORDERED_ACCESS_VIEW_DESC::default();
                match range {
                    CeraViewRange::Buffer {
                        first_element,
                        element_count,
                        element_stride,
                    } => {
                        desc.ViewDimension = d3d12::D3D12_UAV_DIMENSION_BUFFER;
                        desc.Anonymous.Buffer.FirstElement = first_element;
                        desc.Anonymous.Buffer.NumElements = element_count;
                        desc.Anonymous.Buffer.CounterOffsetInBytes = 0;
                        if element_stride == 0 {
                            desc.Format = dxgi_common::DXGI_FORMAT_R32_TYPELESS;
                            desc.Anonymous.Buffer.Flags = d3d12::D3D12_BUFFER_UAV_FLAG_RAW;
                        } else {
                            desc.Format = dxgi_common::DXGI_FORMAT_UNKNOWN;
                            desc.Anonymous.Buffer.StructureByteStride = element_stride;
                            desc.Anonymous.Buffer.Flags = d3d12::D3D12_BUFFER_UAV_FLAG_NONE;
                        }
                    }
                    CeraViewRange::Texture {
                        format,
                        most_detailed_mip,
                        ..
                    } => {
                        desc.Format = format.into();
                        desc.ViewDimension = d3d12::D3D12_UAV_DIMENSION_TEXTURE2D;
                        desc.Anonymous.Texture2D.MipSlice = most_detailed_mip;
                        desc.Anonymous.Texture2D.PlaneSlice = 0;
                    }
                }

                unsafe {
                    device.CreateUnorderedAccessView(d3d12_resource, None, Some(&desc), handle)
                };
            }
            CeraViewDef::RenderTarget { format, mip_slice } => {
                let mut desc = d3d12::D3D12_RENDER_TARGET_VIEW_DESC::default();
                desc.Format = format.into();
                desc.ViewDimension = d3d12::D3D12_RTV_DIMENSION_TEXTURE2D;
                desc.Anonymous.Texture2D.MipSlice = mip_slice;
                unsafe { device.CreateRenderTargetView(d3d12_resource, Some(&desc), handle) };
            }
            CeraViewDef::DepthStencil { format, mip_slice } => {
                let mut desc = d3d12::D3D12_DEPTH_STENCIL_VIEW_DESC::default();
                desc.Format = format.into();
                desc.ViewDimension = d3d12::D3D12_DSV_DIMENSION_TEXTURE2D;
                desc.Anonymous.Texture2D.MipSlice = mip_slice;
                unsafe { device.CreateDepthStencilView(d3d12_resource, Some(&desc), handle) };
            }
        }

        Ok(())
    }

    pub fn create_sampler(
        &self,
        sampler_def: &CeraSamplerDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        let sampler_desc = d3d12::D3D12_SAMPLER_DESC {
            Filter: conversions::sampler_filter(
                sampler_def.min_filter,
                sampler_def.mag_filter,
                sampler_def.mip_filter,
                sampler_def.max_anisotropy,
            ),
            AddressU: sampler_def.address_mode_u.into(),
            AddressV: sampler_def.address_mode_v.into(),
            AddressW: sampler_def.address_mode_w.into(),
            MipLODBias: sampler_def.mip_lod_bias,
            MaxAnisotropy: sampler_def.max_anisotropy.max(1),
            ComparisonFunc: d3d12::D3D12_COMPARISON_FUNC_NEVER,
            BorderColor: [0.0, 0.0, 0.0, 0.0],
            MinLOD: 0.0,
            MaxLOD: f32::MAX,
        };

        unsafe {
            self.d3d12_device().CreateSampler(
                &sampler_desc,
                d3d12::D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dst.0 },
            )
        };
        Ok(())
    }

    pub fn copy_descriptors(
        &self,
        dst: CeraCpuDescriptorHandle,
        src: CeraCpuDescriptorHandle,
        count: u32,
        heap_type: CeraDescriptorHeapType,
    ) -> CeraResult<()> {
        unsafe {
            self.d3d12_device().CopyDescriptorsSimple(
                count,
                d3d12::D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dst.0 },
                d3d12::D3D12_CPU_DESCRIPTOR_HANDLE { ptr: src.0 },
                heap_type.into(),
            );
        }
        Ok(())
    }
}
