mod resource_state_tracker;
pub use resource_state_tracker::*;
