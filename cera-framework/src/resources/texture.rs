use super::{CeraGpuResource, CeraResource};
use cera_api::{CeraExtents3D, CeraFormat, CeraResult, CeraTextureDef};

#[derive(Clone, Debug, PartialEq)]
pub struct CeraTexture {
    resource: CeraResource,
}

impl CeraTexture {
    pub fn new(resource: CeraResource) -> CeraResult<Self> {
        if resource.resource_desc().texture_def().is_none() {
            return Err("CeraTexture requires a texture resource")?;
        }

        Ok(CeraTexture { resource })
    }

    pub fn texture_def(&self) -> &CeraTextureDef {
        // Checked in new()
        self.resource.resource_desc().texture_def().unwrap()
    }

    pub fn extents(&self) -> CeraExtents3D {
        self.texture_def().extents
    }

    pub fn format(&self) -> CeraFormat {
        self.texture_def().format
    }

    pub fn mip_count(&self) -> u32 {
        self.texture_def().mip_count
    }
}

impl CeraGpuResource for CeraTexture {
    fn resource(&self) -> &CeraResource {
        &self.resource
    }
}
