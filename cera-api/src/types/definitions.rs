use crate::{
    CeraAdapterInfo, CeraAddressMode, CeraBackendType, CeraDescriptorHeapType, CeraFeatureLevel,
    CeraFilterType, CeraFormat, CeraMemoryUsage, CeraRawResource, CeraResourceState,
    CeraRootSignature, CeraValidationMode,
};
use std::time::Duration;

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// General configuration that all backends will make a best effort at respecting
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraApiDef {
    pub validation_mode: CeraValidationMode,

    /// Backends are tried in this order. Backends that are not compiled in or fail to initialize
    /// are skipped with a warning.
    pub backend_preference: Vec<CeraBackendType>,
}

impl Default for CeraApiDef {
    fn default() -> Self {
        CeraApiDef {
            validation_mode: Default::default(),
            backend_preference: vec![CeraBackendType::Dx12, CeraBackendType::Null],
        }
    }
}

/// Dx12-specific configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraApiDefDx12 {
    /// Feature levels are tried from highest to lowest, stopping at this one
    pub minimum_feature_level: CeraFeatureLevel,

    /// Use the software WARP adapter instead of a hardware adapter
    pub use_warp_device: bool,

    /// Requires validation to be enabled. Very slow, but catches mistakes that the debug layer
    /// alone can't see.
    pub enable_gpu_based_validation: bool,

    /// Pass debug names through to the API so they show up in capture tools
    pub enable_debug_names: bool,
}

impl Default for CeraApiDefDx12 {
    fn default() -> Self {
        CeraApiDefDx12 {
            minimum_feature_level: CeraFeatureLevel::FeatureLevel_11_0,
            use_warp_device: false,
            enable_gpu_based_validation: false,
            enable_debug_names: true,
        }
    }
}

/// How the null backend's simulated GPU retires signaled fence values
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraNullGpuCompletion {
    /// Work completes as soon as its signal reaches the front of the queue
    Immediate,

    /// Nothing completes until `CeraQueueNull::complete_next` or `complete_all` is called
    Manual,
}

impl Default for CeraNullGpuCompletion {
    fn default() -> Self {
        CeraNullGpuCompletion::Immediate
    }
}

/// Configuration for the null backend
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraApiDefNull {
    /// Reported by `CeraDeviceContext::adapter_info()`
    pub adapter_info: CeraAdapterInfo,
    pub gpu_completion: CeraNullGpuCompletion,
}

/// Configuration of the engine core built on top of a device context
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraDeviceDef {
    /// Size of each upload heap page. Also the largest single upload allocation.
    pub upload_page_size: u64,

    /// Descriptors per page for each heap type, indexed by `CeraDescriptorHeapType::index()`
    pub descriptor_page_sizes: [u32; 4],

    /// How many completed frames must pass before a released descriptor range is reused
    pub descriptor_release_delay_frames: u64,

    /// A fence wait longer than this is reported as a lost device
    pub fence_wait_timeout: Duration,

    /// How long the reclaim worker blocks on a fence before re-checking for shutdown
    pub reclaim_wait_interval: Duration,

    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: u64,

    /// Soft limit on pooled recording contexts per queue. Going over it is logged, not refused.
    pub max_recording_contexts: usize,

    /// Create the shader-visible bindless descriptor allocator if the adapter supports it
    pub enable_bindless: bool,
}

impl Default for CeraDeviceDef {
    fn default() -> Self {
        CeraDeviceDef {
            upload_page_size: 2 * 1024 * 1024,
            descriptor_page_sizes: [1024, 256, 256, 64],
            descriptor_release_delay_frames: 3,
            fence_wait_timeout: Duration::from_secs(10),
            reclaim_wait_interval: Duration::from_millis(100),
            frames_in_flight: 2,
            max_recording_contexts: 64,
            enable_bindless: true,
        }
    }
}

impl CeraDeviceDef {
    pub fn descriptor_page_size(
        &self,
        heap_type: CeraDescriptorHeapType,
    ) -> u32 {
        self.descriptor_page_sizes[heap_type.index()]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraExtents3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Used to create a buffer
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraBufferDef {
    pub size: u64,
    pub memory_usage: CeraMemoryUsage,
    pub allow_unordered_access: bool,
}

impl Default for CeraBufferDef {
    fn default() -> Self {
        CeraBufferDef {
            size: 0,
            memory_usage: CeraMemoryUsage::GpuOnly,
            allow_unordered_access: false,
        }
    }
}

impl CeraBufferDef {
    pub fn verify(&self) {
        assert!(self.size > 0);
        assert!(
            !(self.allow_unordered_access && self.memory_usage == CeraMemoryUsage::GpuToCpu),
            "Readback buffers can't be written by shaders"
        );
    }

    pub fn for_staging_buffer(size: u64) -> Self {
        CeraBufferDef {
            size,
            memory_usage: CeraMemoryUsage::CpuToGpu,
            allow_unordered_access: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraTextureDimensions {
    Dim1D,
    Dim2D,
    Dim3D,
}

impl Default for CeraTextureDimensions {
    fn default() -> Self {
        CeraTextureDimensions::Dim2D
    }
}

/// Used to create a texture
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraTextureDef {
    pub extents: CeraExtents3D,
    pub array_length: u32,
    pub mip_count: u32,
    pub format: CeraFormat,
    pub dimensions: CeraTextureDimensions,
    pub allow_render_target: bool,
    pub allow_depth_stencil: bool,
    pub allow_unordered_access: bool,
}

impl Default for CeraTextureDef {
    fn default() -> Self {
        CeraTextureDef {
            extents: CeraExtents3D {
                width: 0,
                height: 0,
                depth: 1,
            },
            array_length: 1,
            mip_count: 1,
            format: CeraFormat::R8G8B8A8_UNORM,
            dimensions: Default::default(),
            allow_render_target: false,
            allow_depth_stencil: false,
            allow_unordered_access: false,
        }
    }
}

impl CeraTextureDef {
    pub fn verify(&self) {
        assert!(self.extents.width > 0);
        assert!(self.extents.height > 0);
        assert!(self.extents.depth > 0);
        assert!(self.array_length > 0);
        assert!(self.mip_count > 0);
        assert!(self.format != CeraFormat::Unknown);
        assert!(
            !(self.allow_depth_stencil && self.allow_render_target),
            "A texture can't be both a render target and a depth target"
        );
        assert!(!self.allow_depth_stencil || self.format.is_depth());

        if self.dimensions == CeraTextureDimensions::Dim3D {
            assert_eq!(self.array_length, 1);
        }
    }
}

/// Description of a GPU resource. This is the data the backend needs to size and create it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraResourceDesc {
    Buffer(CeraBufferDef),
    Texture(CeraTextureDef),
}

impl CeraResourceDesc {
    pub fn memory_usage(&self) -> CeraMemoryUsage {
        match self {
            CeraResourceDesc::Buffer(def) => def.memory_usage,
            CeraResourceDesc::Texture(_) => CeraMemoryUsage::GpuOnly,
        }
    }

    pub fn buffer_def(&self) -> Option<&CeraBufferDef> {
        match self {
            CeraResourceDesc::Buffer(def) => Some(def),
            CeraResourceDesc::Texture(_) => None,
        }
    }

    pub fn texture_def(&self) -> Option<&CeraTextureDef> {
        match self {
            CeraResourceDesc::Buffer(_) => None,
            CeraResourceDesc::Texture(def) => Some(def),
        }
    }

    pub fn verify(&self) {
        match self {
            CeraResourceDesc::Buffer(def) => def.verify(),
            CeraResourceDesc::Texture(def) => def.verify(),
        }
    }
}

/// The part of a resource a shader resource or unordered access view covers
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CeraViewRange {
    /// `element_stride` of zero creates a raw (byte address) view, in which case the element
    /// count and first element are in units of 4 bytes
    Buffer {
        first_element: u64,
        element_count: u32,
        element_stride: u32,
    },
    Texture {
        format: CeraFormat,
        most_detailed_mip: u32,
        mip_levels: u32,
    },
}

/// Describes a descriptor to write for a resource
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CeraViewDef {
    ConstantBuffer { byte_offset: u64, size: u32 },
    ShaderResource(CeraViewRange),
    UnorderedAccess(CeraViewRange),
    RenderTarget { format: CeraFormat, mip_slice: u32 },
    DepthStencil { format: CeraFormat, mip_slice: u32 },
}

impl CeraViewDef {
    pub fn heap_type(&self) -> CeraDescriptorHeapType {
        match self {
            CeraViewDef::ConstantBuffer { .. }
            | CeraViewDef::ShaderResource(_)
            | CeraViewDef::UnorderedAccess(_) => CeraDescriptorHeapType::CbvSrvUav,
            CeraViewDef::RenderTarget { .. } => CeraDescriptorHeapType::Rtv,
            CeraViewDef::DepthStencil { .. } => CeraDescriptorHeapType::Dsv,
        }
    }
}

/// Used to create a sampler descriptor
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraSamplerDef {
    pub min_filter: CeraFilterType,
    pub mag_filter: CeraFilterType,
    pub mip_filter: CeraFilterType,
    pub address_mode_u: CeraAddressMode,
    pub address_mode_v: CeraAddressMode,
    pub address_mode_w: CeraAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
}

impl Default for CeraSamplerDef {
    fn default() -> Self {
        CeraSamplerDef {
            min_filter: CeraFilterType::Linear,
            mag_filter: CeraFilterType::Linear,
            mip_filter: CeraFilterType::Linear,
            address_mode_u: CeraAddressMode::Wrap,
            address_mode_v: CeraAddressMode::Wrap,
            address_mode_w: CeraAddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
        }
    }
}

/// Used to create a descriptor heap
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CeraDescriptorHeapDef {
    pub heap_type: CeraDescriptorHeapType,
    pub descriptor_count: u32,
    pub shader_visible: bool,
}

/// Root signatures are created from a blob produced offline (D3D12SerializeVersionedRootSignature
/// or embedded in compiled shader bytecode).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CeraRootSignatureDef {
    #[cfg_attr(feature = "serde-support", serde(with = "serde_bytes"))]
    pub serialized_root_signature: Vec<u8>,
}

/// Used to create a compute pipeline state object
#[derive(Debug)]
pub struct CeraComputePipelineDef<'a> {
    pub root_signature: &'a CeraRootSignature,
    pub compute_shader_bytecode: &'a [u8],
}

/// A barrier recorded into a command buffer
#[derive(Debug)]
pub enum CeraResourceBarrier<'a> {
    Transition {
        resource: &'a CeraRawResource,
        state_before: CeraResourceState,
        state_after: CeraResourceState,
    },
    /// Orders unordered access writes against later unordered access to the same resource
    Uav { resource: &'a CeraRawResource },
}
