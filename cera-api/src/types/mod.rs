mod misc;
pub use misc::*;

mod definitions;
pub use definitions::*;

mod adapter;
pub use adapter::*;

mod format;
pub use format::*;
