use super::{CeraGpuResource, CeraResource};
use cera_api::{CeraBufferDef, CeraIndexType, CeraResult};

/// A buffer with no particular interpretation
#[derive(Clone, Debug, PartialEq)]
pub struct CeraBuffer {
    resource: CeraResource,
}

impl CeraBuffer {
    pub fn new(resource: CeraResource) -> CeraResult<Self> {
        if resource.resource_desc().buffer_def().is_none() {
            return Err("CeraBuffer requires a buffer resource")?;
        }

        Ok(CeraBuffer { resource })
    }

    pub fn buffer_def(&self) -> &CeraBufferDef {
        // Checked in new()
        self.resource.resource_desc().buffer_def().unwrap()
    }

    pub fn size(&self) -> u64 {
        self.buffer_def().size
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.resource.gpu_virtual_address()
    }
}

impl CeraGpuResource for CeraBuffer {
    fn resource(&self) -> &CeraResource {
        &self.resource
    }
}

fn require_size(
    buffer: &CeraBuffer,
    required_size: u64,
    kind: &str,
) -> CeraResult<()> {
    if buffer.size() < required_size {
        return Err(format!(
            "{} needs {} bytes but the buffer is only {} bytes",
            kind,
            required_size,
            buffer.size()
        ))?;
    }

    Ok(())
}

/// Matches D3D12_VERTEX_BUFFER_VIEW
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CeraVertexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CeraVertexBuffer {
    buffer: CeraBuffer,
    stride: u32,
    vertex_count: u32,
}

impl CeraVertexBuffer {
    pub fn new(
        buffer: CeraBuffer,
        stride: u32,
        vertex_count: u32,
    ) -> CeraResult<Self> {
        require_size(&buffer, stride as u64 * vertex_count as u64, "Vertex buffer")?;
        Ok(CeraVertexBuffer {
            buffer,
            stride,
            vertex_count,
        })
    }

    pub fn buffer(&self) -> &CeraBuffer {
        &self.buffer
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn vertex_buffer_view(&self) -> CeraVertexBufferView {
        CeraVertexBufferView {
            buffer_location: self.buffer.gpu_virtual_address(),
            size_in_bytes: self.stride * self.vertex_count,
            stride_in_bytes: self.stride,
        }
    }
}

impl CeraGpuResource for CeraVertexBuffer {
    fn resource(&self) -> &CeraResource {
        self.buffer.resource()
    }
}

/// Matches D3D12_INDEX_BUFFER_VIEW
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CeraIndexBufferView {
    pub buffer_location: u64,
    pub size_in_bytes: u32,
    pub index_type: CeraIndexType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CeraIndexBuffer {
    buffer: CeraBuffer,
    index_type: CeraIndexType,
    index_count: u32,
}

impl CeraIndexBuffer {
    pub fn new(
        buffer: CeraBuffer,
        index_type: CeraIndexType,
        index_count: u32,
    ) -> CeraResult<Self> {
        require_size(
            &buffer,
            index_type.size_in_bytes() as u64 * index_count as u64,
            "Index buffer",
        )?;
        Ok(CeraIndexBuffer {
            buffer,
            index_type,
            index_count,
        })
    }

    pub fn buffer(&self) -> &CeraBuffer {
        &self.buffer
    }

    pub fn index_type(&self) -> CeraIndexType {
        self.index_type
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn index_buffer_view(&self) -> CeraIndexBufferView {
        CeraIndexBufferView {
            buffer_location: self.buffer.gpu_virtual_address(),
            size_in_bytes: self.index_type.size_in_bytes() * self.index_count,
            index_type: self.index_type,
        }
    }
}

impl CeraGpuResource for CeraIndexBuffer {
    fn resource(&self) -> &CeraResource {
        self.buffer.resource()
    }
}

/// A buffer read through a constant buffer view or root CBV. The buffer size must be a multiple
/// of the device's constant buffer alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct CeraConstantBuffer {
    buffer: CeraBuffer,
}

impl CeraConstantBuffer {
    pub fn new(
        buffer: CeraBuffer,
        constant_buffer_alignment: u32,
    ) -> CeraResult<Self> {
        if buffer.size() % constant_buffer_alignment as u64 != 0 {
            return Err(format!(
                "Constant buffer size {} is not a multiple of {}",
                buffer.size(),
                constant_buffer_alignment
            ))?;
        }

        Ok(CeraConstantBuffer { buffer })
    }

    pub fn buffer(&self) -> &CeraBuffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.buffer.gpu_virtual_address()
    }
}

impl CeraGpuResource for CeraConstantBuffer {
    fn resource(&self) -> &CeraResource {
        self.buffer.resource()
    }
}

/// A buffer accessed as raw 32-bit words (ByteAddressBuffer/RWByteAddressBuffer in HLSL)
#[derive(Clone, Debug, PartialEq)]
pub struct CeraByteAddressBuffer {
    buffer: CeraBuffer,
}

impl CeraByteAddressBuffer {
    pub fn new(buffer: CeraBuffer) -> CeraResult<Self> {
        if buffer.size() % 4 != 0 {
            return Err(format!(
                "Byte address buffer size {} is not a multiple of 4",
                buffer.size()
            ))?;
        }

        Ok(CeraByteAddressBuffer { buffer })
    }

    pub fn buffer(&self) -> &CeraBuffer {
        &self.buffer
    }

    /// Number of 32-bit words, the element count of a raw view over the whole buffer
    pub fn word_count(&self) -> u32 {
        (self.buffer.size() / 4) as u32
    }
}

impl CeraGpuResource for CeraByteAddressBuffer {
    fn resource(&self) -> &CeraResource {
        self.buffer.resource()
    }
}
