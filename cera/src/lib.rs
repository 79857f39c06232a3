pub use cera_base as base;

pub use cera_api as api;

#[cfg(feature = "framework")]
pub use cera_framework as framework;
