#[cfg(feature = "cera-dx12")]
pub mod dx12;

pub mod null;
