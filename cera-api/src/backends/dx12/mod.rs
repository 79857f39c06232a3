//! Direct3D 12 backend, built on the `windows` crate

use windows::Win32::Graphics::Direct3D as d3d;
use windows::Win32::Graphics::Direct3D12 as d3d12;
use windows::Win32::Graphics::Dxgi as dxgi;

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

mod internal;
