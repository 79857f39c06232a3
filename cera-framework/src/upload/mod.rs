mod upload_buffer;
pub use upload_buffer::*;
