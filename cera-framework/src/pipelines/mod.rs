mod pipeline_cache;
pub use pipeline_cache::*;
