use crate::dx12::CeraDeviceContextDx12;
use crate::CeraResult;
use std::time::Duration;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject};

use super::d3d12;

// GetCompletedValue returns this once the device has been removed
const DEVICE_REMOVED_FENCE_VALUE: u64 = u64::MAX;

// Closes the event even if the wait bails out early
struct FenceEvent(HANDLE);

impl Drop for FenceEvent {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

#[derive(Clone, Debug)]
pub struct CeraFenceDx12 {
    device_context: CeraDeviceContextDx12,
    fence: d3d12::ID3D12Fence,
}

// ID3D12Fence is free-threaded
unsafe impl Send for CeraFenceDx12 {}
unsafe impl Sync for CeraFenceDx12 {}

impl CeraFenceDx12 {
    pub fn new(device_context: &CeraDeviceContextDx12) -> CeraResult<CeraFenceDx12> {
        let fence: d3d12::ID3D12Fence = unsafe {
            device_context
                .d3d12_device()
                .CreateFence(0, d3d12::D3D12_FENCE_FLAG_NONE)
        }?;

        Ok(CeraFenceDx12 {
            device_context: device_context.clone(),
            fence,
        })
    }

    pub fn dx12_fence(&self) -> &d3d12::ID3D12Fence {
        &self.fence
    }

    pub fn completed_value(&self) -> CeraResult<u64> {
        let completed_value = unsafe { self.fence.GetCompletedValue() };
        if completed_value == DEVICE_REMOVED_FENCE_VALUE {
            return Err(self
                .device_context
                .device_lost_error("GetCompletedValue", None, None));
        }

        Ok(completed_value)
    }

    /// Blocks until the fence reaches `value`. Returns false if `timeout` elapsed first. Each call
    /// uses its own event so any number of threads may wait on the same fence.
    pub fn wait_for_value(
        &self,
        value: u64,
        timeout: Duration,
    ) -> CeraResult<bool> {
        if self.completed_value()? >= value {
            return Ok(true);
        }

        let event = FenceEvent(unsafe { CreateEventW(None, false, false, None) }?);
        unsafe {
            self.fence.SetEventOnCompletion(value, event.0)?;
        }

        // INFINITE is u32::MAX, stay below it
        let timeout_ms = timeout.as_millis().min((u32::MAX - 1) as u128) as u32;
        let signaled = unsafe { WaitForSingleObject(event.0, timeout_ms) } == WAIT_OBJECT_0;

        // Re-check rather than trusting the wait result, the device may have been removed
        let completed_value = self.completed_value()?;
        if completed_value >= value {
            Ok(true)
        } else {
            if signaled {
                log::warn!(
                    "Fence event fired for {} but completed value is {}",
                    value,
                    completed_value
                );
            }
            log::debug!(
                "Fence wait for {} timed out after {:?} at {}",
                value,
                timeout,
                completed_value
            );
            Ok(false)
        }
    }
}
