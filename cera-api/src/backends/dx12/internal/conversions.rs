use super::super::d3d;
use super::super::d3d12;
use crate::{
    CeraAddressMode, CeraDescriptorHeapType, CeraFeatureLevel, CeraFilterType, CeraFormat,
    CeraMemoryUsage, CeraResourceState,
};
use windows::Win32::Graphics::Dxgi::Common as dxgi_common;

impl Into<d3d12::D3D12_RESOURCE_STATES> for CeraResourceState {
    fn into(self) -> d3d12::D3D12_RESOURCE_STATES {
        let mut state = d3d12::D3D12_RESOURCE_STATE_COMMON;

        if self == CeraResourceState::GENERIC_READ {
            return d3d12::D3D12_RESOURCE_STATE_GENERIC_READ;
        }
        if self == CeraResourceState::COMMON || self == CeraResourceState::UNDEFINED {
            return d3d12::D3D12_RESOURCE_STATE_COMMON;
        }
        if self == CeraResourceState::PRESENT {
            return d3d12::D3D12_RESOURCE_STATE_PRESENT;
        }

        if self.intersects(CeraResourceState::VERTEX_AND_CONSTANT_BUFFER) {
            state |= d3d12::D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER;
        }
        if self.intersects(CeraResourceState::INDEX_BUFFER) {
            state |= d3d12::D3D12_RESOURCE_STATE_INDEX_BUFFER;
        }
        if self.intersects(CeraResourceState::RENDER_TARGET) {
            state |= d3d12::D3D12_RESOURCE_STATE_RENDER_TARGET;
        }
        if self.intersects(CeraResourceState::UNORDERED_ACCESS) {
            state |= d3d12::D3D12_RESOURCE_STATE_UNORDERED_ACCESS;
        }
        if self.intersects(CeraResourceState::DEPTH_WRITE) {
            state |= d3d12::D3D12_RESOURCE_STATE_DEPTH_WRITE;
        }
        if self.intersects(CeraResourceState::DEPTH_READ) {
            state |= d3d12::D3D12_RESOURCE_STATE_DEPTH_READ;
        }
        if self.intersects(CeraResourceState::STREAM_OUT) {
            state |= d3d12::D3D12_RESOURCE_STATE_STREAM_OUT;
        }
        if self.intersects(CeraResourceState::INDIRECT_ARGUMENT) {
            state |= d3d12::D3D12_RESOURCE_STATE_INDIRECT_ARGUMENT;
        }
        if self.intersects(CeraResourceState::COPY_DST) {
            state |= d3d12::D3D12_RESOURCE_STATE_COPY_DEST;
        }
        if self.intersects(CeraResourceState::COPY_SRC) {
            state |= d3d12::D3D12_RESOURCE_STATE_COPY_SOURCE;
        }
        if self.intersects(CeraResourceState::NON_PIXEL_SHADER_RESOURCE) {
            state |= d3d12::D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE;
        }
        if self.intersects(CeraResourceState::PIXEL_SHADER_RESOURCE) {
            state |= d3d12::D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE;
        }

        state
    }
}

impl Into<dxgi_common::DXGI_FORMAT> for CeraFormat {
    fn into(self) -> dxgi_common::DXGI_FORMAT {
        match self {
            CeraFormat::Unknown => dxgi_common::DXGI_FORMAT_UNKNOWN,
            CeraFormat::R8G8B8A8_UNORM => dxgi_common::DXGI_FORMAT_R8G8B8A8_UNORM,
            CeraFormat::R8G8B8A8_UNORM_SRGB => dxgi_common::DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
            CeraFormat::B8G8R8A8_UNORM => dxgi_common::DXGI_FORMAT_B8G8R8A8_UNORM,
            CeraFormat::B8G8R8A8_UNORM_SRGB => dxgi_common::DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
            CeraFormat::R10G10B10A2_UNORM => dxgi_common::DXGI_FORMAT_R10G10B10A2_UNORM,
            CeraFormat::R16G16B16A16_FLOAT => dxgi_common::DXGI_FORMAT_R16G16B16A16_FLOAT,
            CeraFormat::R32G32B32A32_FLOAT => dxgi_common::DXGI_FORMAT_R32G32B32A32_FLOAT,
            CeraFormat::R32G32B32_FLOAT => dxgi_common::DXGI_FORMAT_R32G32B32_FLOAT,
            CeraFormat::R32G32_FLOAT => dxgi_common::DXGI_FORMAT_R32G32_FLOAT,
            CeraFormat::R32_FLOAT => dxgi_common::DXGI_FORMAT_R32_FLOAT,
            CeraFormat::R32_UINT => dxgi_common::DXGI_FORMAT_R32_UINT,
            CeraFormat::R16_UINT => dxgi_common::DXGI_FORMAT_R16_UINT,
            CeraFormat::R32_TYPELESS => dxgi_common::DXGI_FORMAT_R32_TYPELESS,
            CeraFormat::D32_FLOAT => dxgi_common::DXGI_FORMAT_D32_FLOAT,
            CeraFormat::D24_UNORM_S8_UINT => dxgi_common::DXGI_FORMAT_D24_UNORM_S8_UINT,
        }
    }
}

// Depth textures are created typeless so they can also be sampled
pub fn depth_format_to_typeless(format: CeraFormat) -> dxgi_common::DXGI_FORMAT {
    match format {
        CeraFormat::D32_FLOAT => dxgi_common::DXGI_FORMAT_R32_TYPELESS,
        CeraFormat::D24_UNORM_S8_UINT => dxgi_common::DXGI_FORMAT_R24G8_TYPELESS,
        _ => format.into(),
    }
}

pub fn depth_format_to_srv_format(format: CeraFormat) -> dxgi_common::DXGI_FORMAT {
    match format {
        CeraFormat::D32_FLOAT => dxgi_common::DXGI_FORMAT_R32_FLOAT,
        CeraFormat::D24_UNORM_S8_UINT => dxgi_common::DXGI_FORMAT_R24_UNORM_X8_TYPELESS,
        _ => format.into(),
    }
}

impl Into<d3d12::D3D12_DESCRIPTOR_HEAP_TYPE> for CeraDescriptorHeapType {
    fn into(self) -> d3d12::D3D12_DESCRIPTOR_HEAP_TYPE {
        match self {
            CeraDescriptorHeapType::CbvSrvUav => d3d12::D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            CeraDescriptorHeapType::Sampler => d3d12::D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
            CeraDescriptorHeapType::Rtv => d3d12::D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            CeraDescriptorHeapType::Dsv => d3d12::D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        }
    }
}

impl Into<d3d::D3D_FEATURE_LEVEL> for CeraFeatureLevel {
    fn into(self) -> d3d::D3D_FEATURE_LEVEL {
        match self {
            CeraFeatureLevel::FeatureLevel_11_0 => d3d::D3D_FEATURE_LEVEL_11_0,
            CeraFeatureLevel::FeatureLevel_11_1 => d3d::D3D_FEATURE_LEVEL_11_1,
            CeraFeatureLevel::FeatureLevel_12_0 => d3d::D3D_FEATURE_LEVEL_12_0,
            CeraFeatureLevel::FeatureLevel_12_1 => d3d::D3D_FEATURE_LEVEL_12_1,
            CeraFeatureLevel::FeatureLevel_12_2 => d3d::D3D_FEATURE_LEVEL_12_2,
        }
    }
}

impl Into<d3d12::D3D12_HEAP_TYPE> for CeraMemoryUsage {
    fn into(self) -> d3d12::D3D12_HEAP_TYPE {
        match self {
            CeraMemoryUsage::GpuOnly => d3d12::D3D12_HEAP_TYPE_DEFAULT,
            CeraMemoryUsage::CpuToGpu => d3d12::D3D12_HEAP_TYPE_UPLOAD,
            CeraMemoryUsage::GpuToCpu => d3d12::D3D12_HEAP_TYPE_READBACK,
        }
    }
}

impl Into<d3d12::D3D12_TEXTURE_ADDRESS_MODE> for CeraAddressMode {
    fn into(self) -> d3d12::D3D12_TEXTURE_ADDRESS_MODE {
        match self {
            CeraAddressMode::Mirror => d3d12::D3D12_TEXTURE_ADDRESS_MODE_MIRROR,
            CeraAddressMode::Wrap => d3d12::D3D12_TEXTURE_ADDRESS_MODE_WRAP,
            CeraAddressMode::ClampToEdge => d3d12::D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
            CeraAddressMode::ClampToBorder => d3d12::D3D12_TEXTURE_ADDRESS_MODE_BORDER,
        }
    }
}

pub fn sampler_filter(
    min_filter: CeraFilterType,
    mag_filter: CeraFilterType,
    mip_filter: CeraFilterType,
    max_anisotropy: u32,
) -> d3d12::D3D12_FILTER {
    // Bit layout from D3D12_ENCODE_BASIC_FILTER
    let mut filter = d3d12::D3D12_FILTER(0);
    if max_anisotropy > 1 {
        filter.0 |= d3d12::D3D12_FILTER_ANISOTROPIC.0;
    } else {
        if min_filter == CeraFilterType::Linear {
            filter.0 |= 0x1 << 4;
        }

        if mag_filter == CeraFilterType::Linear {
            filter.0 |= 0x1 << 2;
        }

        if mip_filter == CeraFilterType::Linear {
            filter.0 |= 0x1 << 0;
        }
    }

    filter
}
