use super::{CeraGpuResource, CeraResource};
use crate::descriptors::{CeraDescriptorAllocator, CeraOwnedDescriptors};
use cera_api::{
    CeraCpuDescriptorHandle, CeraDescriptorHeapType, CeraDeviceContext, CeraFormat,
    CeraGpuDescriptorHandle, CeraResourceDesc, CeraResult, CeraSamplerDef, CeraViewDef,
    CeraViewRange,
};

fn create_view_descriptor(
    device_context: &CeraDeviceContext,
    descriptor_allocator: &CeraDescriptorAllocator,
    resource: &CeraResource,
    view_def: &CeraViewDef,
) -> CeraResult<CeraOwnedDescriptors> {
    let descriptors = descriptor_allocator.allocate_owned(view_def.heap_type(), 1)?;
    // If this fails the descriptor is retired on drop like any other
    device_context.create_view(
        resource.raw_resource(),
        view_def,
        descriptors.cpu_handle(0),
    )?;
    Ok(descriptors)
}

// Every view owns one descriptor and keeps its resource alive
macro_rules! impl_view_accessors {
    ($view:ty) => {
        impl $view {
            pub fn descriptors(&self) -> &CeraOwnedDescriptors {
                &self.descriptors
            }

            pub fn cpu_handle(&self) -> CeraCpuDescriptorHandle {
                self.descriptors.cpu_handle(0)
            }

            /// None unless the descriptor lives in a shader-visible heap
            pub fn gpu_handle(&self) -> Option<CeraGpuDescriptorHandle> {
                self.descriptors.gpu_handle(0)
            }

            pub fn view_def(&self) -> &CeraViewDef {
                &self.view_def
            }
        }

        impl CeraGpuResource for $view {
            fn resource(&self) -> &CeraResource {
                &self.resource
            }
        }
    };
}

#[derive(Debug)]
pub struct CeraShaderResourceView {
    descriptors: CeraOwnedDescriptors,
    resource: CeraResource,
    view_def: CeraViewDef,
}

impl CeraShaderResourceView {
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        resource: &CeraResource,
        view_range: CeraViewRange,
    ) -> CeraResult<Self> {
        let view_def = CeraViewDef::ShaderResource(view_range);
        let descriptors =
            create_view_descriptor(device_context, descriptor_allocator, resource, &view_def)?;
        Ok(CeraShaderResourceView {
            descriptors,
            resource: resource.clone(),
            view_def,
        })
    }
}

impl_view_accessors!(CeraShaderResourceView);

#[derive(Debug)]
pub struct CeraUnorderedAccessView {
    descriptors: CeraOwnedDescriptors,
    resource: CeraResource,
    view_def: CeraViewDef,
}

impl CeraUnorderedAccessView {
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        resource: &CeraResource,
        view_range: CeraViewRange,
    ) -> CeraResult<Self> {
        let allows_uav = match resource.resource_desc() {
            CeraResourceDesc::Buffer(def) => def.allow_unordered_access,
            CeraResourceDesc::Texture(def) => def.allow_unordered_access,
        };
        if !allows_uav {
            return Err("Unordered access views require a resource created with unordered access")?;
        }

        let view_def = CeraViewDef::UnorderedAccess(view_range);
        let descriptors =
            create_view_descriptor(device_context, descriptor_allocator, resource, &view_def)?;
        Ok(CeraUnorderedAccessView {
            descriptors,
            resource: resource.clone(),
            view_def,
        })
    }
}

impl_view_accessors!(CeraUnorderedAccessView);

#[derive(Debug)]
pub struct CeraRenderTargetView {
    descriptors: CeraOwnedDescriptors,
    resource: CeraResource,
    view_def: CeraViewDef,
}

impl CeraRenderTargetView {
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        resource: &CeraResource,
        format: CeraFormat,
        mip_slice: u32,
    ) -> CeraResult<Self> {
        let allowed = resource
            .resource_desc()
            .texture_def()
            .map_or(false, |x| x.allow_render_target);
        if !allowed {
            return Err("Render target views require a texture created with allow_render_target")?;
        }

        let view_def = CeraViewDef::RenderTarget { format, mip_slice };
        let descriptors =
            create_view_descriptor(device_context, descriptor_allocator, resource, &view_def)?;
        Ok(CeraRenderTargetView {
            descriptors,
            resource: resource.clone(),
            view_def,
        })
    }
}

impl_view_accessors!(CeraRenderTargetView);

#[derive(Debug)]
pub struct CeraDepthStencilView {
    descriptors: CeraOwnedDescriptors,
    resource: CeraResource,
    view_def: CeraViewDef,
}

impl CeraDepthStencilView {
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        resource: &CeraResource,
        format: CeraFormat,
        mip_slice: u32,
    ) -> CeraResult<Self> {
        let allowed = resource
            .resource_desc()
            .texture_def()
            .map_or(false, |x| x.allow_depth_stencil);
        if !allowed || !format.is_depth() {
            return Err(
                "Depth stencil views require a depth format texture created with allow_depth_stencil",
            )?;
        }

        let view_def = CeraViewDef::DepthStencil { format, mip_slice };
        let descriptors =
            create_view_descriptor(device_context, descriptor_allocator, resource, &view_def)?;
        Ok(CeraDepthStencilView {
            descriptors,
            resource: resource.clone(),
            view_def,
        })
    }
}

impl_view_accessors!(CeraDepthStencilView);

#[derive(Debug)]
pub struct CeraConstantBufferView {
    descriptors: CeraOwnedDescriptors,
    resource: CeraResource,
    view_def: CeraViewDef,
    byte_offset: u64,
}

impl CeraConstantBufferView {
    /// `byte_offset` and `size` must be multiples of the device's constant buffer alignment
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        resource: &CeraResource,
        byte_offset: u64,
        size: u32,
    ) -> CeraResult<Self> {
        let alignment = device_context.device_info().constant_buffer_alignment;
        if byte_offset % alignment as u64 != 0 || size % alignment != 0 {
            return Err(format!(
                "Constant buffer view offset {} and size {} must be multiples of {}",
                byte_offset, size, alignment
            ))?;
        }

        let view_def = CeraViewDef::ConstantBuffer { byte_offset, size };
        let descriptors =
            create_view_descriptor(device_context, descriptor_allocator, resource, &view_def)?;
        Ok(CeraConstantBufferView {
            descriptors,
            resource: resource.clone(),
            view_def,
            byte_offset,
        })
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.resource.gpu_virtual_address() + self.byte_offset
    }
}

impl_view_accessors!(CeraConstantBufferView);

/// Samplers live in their own heap type and are not tied to a resource
#[derive(Debug)]
pub struct CeraSampler {
    descriptors: CeraOwnedDescriptors,
    sampler_def: CeraSamplerDef,
}

impl CeraSampler {
    pub fn new(
        device_context: &CeraDeviceContext,
        descriptor_allocator: &CeraDescriptorAllocator,
        sampler_def: &CeraSamplerDef,
    ) -> CeraResult<Self> {
        let descriptors = descriptor_allocator.allocate_owned(CeraDescriptorHeapType::Sampler, 1)?;
        device_context.create_sampler(sampler_def, descriptors.cpu_handle(0))?;
        Ok(CeraSampler {
            descriptors,
            sampler_def: *sampler_def,
        })
    }

    pub fn sampler_def(&self) -> &CeraSamplerDef {
        &self.sampler_def
    }

    pub fn descriptors(&self) -> &CeraOwnedDescriptors {
        &self.descriptors
    }

    pub fn cpu_handle(&self) -> CeraCpuDescriptorHandle {
        self.descriptors.cpu_handle(0)
    }
}
