use cera_base::ResourceSlotKey;
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Controls if validation is enabled or not. The requirements/behaviors of validation is
/// API-specific.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraValidationMode {
    /// Do not enable validation. Even if validation is turned on through external means, do not
    /// intentionally fail initialization
    Disabled,

    /// Enable validation if possible
    EnabledIfAvailable,

    /// Enable validation, and fail if we cannot enable it
    Enabled,
}

impl Default for CeraValidationMode {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        let validation_mode = CeraValidationMode::EnabledIfAvailable;
        #[cfg(not(debug_assertions))]
        let validation_mode = CeraValidationMode::Disabled;

        validation_mode
    }
}

/// The graphics backends this crate knows about. Only `Dx12` and `Null` can be created, the
/// others exist so that a stored preference list from a config file still parses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraBackendType {
    Dx12,
    Dx11,
    OpenGl,
    Null,
}

impl CeraBackendType {
    pub fn is_compiled_in(self) -> bool {
        match self {
            CeraBackendType::Dx12 => cfg!(feature = "cera-dx12"),
            CeraBackendType::Null => true,
            CeraBackendType::Dx11 | CeraBackendType::OpenGl => false,
        }
    }
}

/// Used to indicate which type of queue to use. Some operations require certain types of queues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraQueueType {
    /// Graphics queues support all operations (D3D12 "direct" queue)
    Graphics,

    /// Compute queues can be used for compute-based work and copies
    Compute,

    /// Copy queues are limited to copying data between resources
    Copy,
}

impl CeraQueueType {
    pub const ALL: [CeraQueueType; 3] = [
        CeraQueueType::Graphics,
        CeraQueueType::Compute,
        CeraQueueType::Copy,
    ];

    pub fn index(self) -> usize {
        match self {
            CeraQueueType::Graphics => 0,
            CeraQueueType::Compute => 1,
            CeraQueueType::Copy => 2,
        }
    }
}

bitflags::bitflags! {
    /// The current state of a resource. When an operation is performed that references a resource,
    /// it must be in the correct state. Resources are moved between state using barriers.
    pub struct CeraResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const SHADER_RESOURCE = 0x40 | 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DST = 0x400;
        const COPY_SRC = 0x800;
        const GENERIC_READ = (((((0x1 | 0x2) | 0x40) | 0x80) | 0x200) | 0x800);
        const PRESENT = 0x1000;
        const COMMON = 0x2000;
    }
}

/// Indicates how the memory will be accessed and affects which heap it is allocated from
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraMemoryUsage {
    /// Default heap, not CPU visible
    GpuOnly,
    /// Upload heap, CPU writable and GPU readable
    CpuToGpu,
    /// Readback heap
    GpuToCpu,
}

impl Default for CeraMemoryUsage {
    fn default() -> Self {
        CeraMemoryUsage::GpuOnly
    }
}

impl CeraMemoryUsage {
    pub fn is_cpu_visible(self) -> bool {
        self != CeraMemoryUsage::GpuOnly
    }

    /// Resources on upload/readback heaps are created in a fixed state and never transitioned
    pub fn required_initial_state(self) -> Option<CeraResourceState> {
        match self {
            CeraMemoryUsage::GpuOnly => None,
            CeraMemoryUsage::CpuToGpu => Some(CeraResourceState::GENERIC_READ),
            CeraMemoryUsage::GpuToCpu => Some(CeraResourceState::COPY_DST),
        }
    }
}

/// The kinds of descriptor heaps. Descriptors of different types can't share a heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraDescriptorHeapType {
    /// Constant buffer, shader resource and unordered access views
    CbvSrvUav,
    Sampler,
    /// Render target views
    Rtv,
    /// Depth stencil views
    Dsv,
}

impl CeraDescriptorHeapType {
    pub const ALL: [CeraDescriptorHeapType; 4] = [
        CeraDescriptorHeapType::CbvSrvUav,
        CeraDescriptorHeapType::Sampler,
        CeraDescriptorHeapType::Rtv,
        CeraDescriptorHeapType::Dsv,
    ];

    pub fn index(self) -> usize {
        match self {
            CeraDescriptorHeapType::CbvSrvUav => 0,
            CeraDescriptorHeapType::Sampler => 1,
            CeraDescriptorHeapType::Rtv => 2,
            CeraDescriptorHeapType::Dsv => 3,
        }
    }

    /// Only CBV/SRV/UAV and sampler heaps may be bound to the pipeline
    pub fn can_be_shader_visible(self) -> bool {
        match self {
            CeraDescriptorHeapType::CbvSrvUav | CeraDescriptorHeapType::Sampler => true,
            CeraDescriptorHeapType::Rtv | CeraDescriptorHeapType::Dsv => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraIndexType {
    Uint16,
    Uint32,
}

impl CeraIndexType {
    pub fn size_in_bytes(self) -> u32 {
        match self {
            CeraIndexType::Uint16 => 2,
            CeraIndexType::Uint32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraFilterType {
    Nearest,
    Linear,
}

impl Default for CeraFilterType {
    fn default() -> Self {
        CeraFilterType::Linear
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CeraAddressMode {
    Wrap,
    Mirror,
    ClampToEdge,
    ClampToBorder,
}

impl Default for CeraAddressMode {
    fn default() -> Self {
        CeraAddressMode::Wrap
    }
}

/// Opaque CPU descriptor handle (D3D12_CPU_DESCRIPTOR_HANDLE)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CeraCpuDescriptorHandle(pub usize);

/// Opaque GPU descriptor handle (D3D12_GPU_DESCRIPTOR_HANDLE), only valid for shader-visible heaps
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CeraGpuDescriptorHandle(pub u64);

/// Identity of a resource known to the state tracker. Ids are generational, an id is never
/// confused with a later resource that reuses its slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CeraResourceId(pub ResourceSlotKey);

impl std::fmt::Display for CeraResourceId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "resource {:?}", self.0)
    }
}
