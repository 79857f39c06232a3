//! The engine core built on top of `cera-api`: fence-tracked command queues that recycle recording
//! contexts once the GPU is done with them, automatic resource state tracking, paged descriptor
//! and upload allocation, and a pipeline cache. `CeraDevice` ties them together.

pub mod commands;
pub mod descriptors;
pub mod pipelines;
pub mod resources;
pub mod state;
pub mod upload;

mod device;
pub use device::*;

pub use commands::{CeraCommandContext, CeraCommandQueue};
pub use descriptors::{CeraDescriptorAllocator, CeraOwnedDescriptors};
pub use pipelines::{CeraCachedRootSignature, CeraPipelineCache};
pub use resources::*;
pub use state::CeraResourceStateTracker;
pub use upload::{CeraUploadAllocation, CeraUploadBuffer};

pub use cera_api::{CeraError, CeraResult};
