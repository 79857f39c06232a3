mod descriptor_allocator;
pub use descriptor_allocator::*;
