//! A backend with no GPU. Used for tests and headless runs.

mod api;
pub use api::*;

mod device_context;
pub use device_context::*;

mod queue;
pub use queue::*;

mod fence;
pub use fence::*;

mod command_buffer;
pub use command_buffer::*;

mod descriptor_heap;
pub use descriptor_heap::*;

mod resource;
pub use resource::*;

mod pipeline;
pub use pipeline::*;

pub(crate) const NULL_DESCRIPTOR_INCREMENT: usize = 32;
