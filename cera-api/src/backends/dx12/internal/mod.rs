pub mod conversions;

use super::d3d12;
use crate::CeraQueueType;

pub fn queue_type_to_command_list_type(
    queue_type: CeraQueueType
) -> d3d12::D3D12_COMMAND_LIST_TYPE {
    match queue_type {
        CeraQueueType::Graphics => d3d12::D3D12_COMMAND_LIST_TYPE_DIRECT,
        CeraQueueType::Compute => d3d12::D3D12_COMMAND_LIST_TYPE_COMPUTE,
        CeraQueueType::Copy => d3d12::D3D12_COMMAND_LIST_TYPE_COPY,
    }
}

pub fn wchar_to_string(s: &[u16]) -> String {
    let wchar = s.split(|&v| v == 0).next().unwrap_or_default();
    String::from_utf16_lossy(wchar)
}

pub fn set_debug_name(
    object: &d3d12::ID3D12Object,
    name: &str,
) {
    let utf16: Vec<_> = name.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        if let Err(e) = object.SetName(windows::core::PCWSTR::from_raw(utf16.as_ptr())) {
            log::warn!("Failed to set debug name {:?}: {:?}", name, e);
        }
    }
}
