//! Cera API is a thin render hardware interface over Direct3D 12. It exposes the objects the
//! engine core needs (queues, fences, command allocator/list pairs, descriptor heaps, committed
//! resources, root signatures and compute pipelines) as enums over the compiled-in backends.
//!
//! # Backends
//!
//! * `dx12` (feature `cera-dx12`, windows only): Direct3D 12 through the `windows` crate
//! * `null` (always available): a simulated device with no GPU. Copies between buffers really
//!   move bytes, barriers and dispatches are counted, and fence completion can be held back so
//!   that tests can observe work that is still "in flight".
//!
//! # Safety
//!
//! The API does not track GPU lifetimes. A resource, command buffer or descriptor that is dropped
//! or reused while the GPU still references it is undefined behavior on a real device. The
//! `cera-framework` crate provides the fence-tracked machinery that makes this safe.
//!
//! # Usage
//!
//! ```
//! use cera_api::*;
//!
//! let api = CeraApi::new(&Default::default(), &Default::default(), &Default::default()).unwrap();
//! let device_context = api.device_context();
//! let queue = device_context.create_queue(CeraQueueType::Graphics).unwrap();
//! let fence = device_context.create_fence().unwrap();
//! queue.signal(&fence, 1).unwrap();
//! assert!(fence.wait_for_value(1, std::time::Duration::from_secs(1)).unwrap());
//! ```

#[cfg(all(feature = "cera-dx12", not(windows)))]
compile_error!("The cera-dx12 feature is only supported on windows");

pub use api::*;
pub use command_buffer::*;
pub use descriptor_heap::*;
pub use device_context::*;
pub use error::*;
pub use fence::*;
pub use pipeline::*;
pub use queue::*;
pub use raw_resource::*;
pub use root_signature::*;
pub use types::*;

#[cfg(feature = "cera-dx12")]
pub use backends::dx12;
pub use backends::null;

mod backends;
mod types;

mod api;
mod command_buffer;
mod descriptor_heap;
mod device_context;
mod error;
mod fence;
mod pipeline;
mod queue;
mod raw_resource;
mod root_signature;

#[cfg(test)]
mod tests;
