//! Lowest level crate of `cera`. Includes alignment helpers and the small bookkeeping containers
//! used by the GPU lifetime machinery in the higher level crates.

pub mod memory;

mod resource_slots;
pub use resource_slots::ResourceSlotKey;
pub use resource_slots::ResourceSlots;

mod retire_queue;
pub use retire_queue::RetireQueue;
