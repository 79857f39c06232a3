#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraFenceDx12;
use crate::null::CeraFenceNull;
use crate::CeraResult;
use std::time::Duration;

/// A GPU -> CPU synchronization mechanism.
///
/// A fence holds a 64-bit value that queues raise with `CeraQueue::signal`. The value never
/// decreases. A fence reports a lost device as an error rather than as a completed value.
///
/// Fences must not be dropped while a queue may still signal them.
#[derive(Clone, Debug)]
pub enum CeraFence {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraFenceDx12),
    Null(CeraFenceNull),
}

impl CeraFence {
    /// The highest value the GPU has signaled so far. Never blocks.
    pub fn completed_value(&self) -> CeraResult<u64> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraFence::Dx12(inner) => inner.completed_value(),
            CeraFence::Null(inner) => inner.completed_value(),
        }
    }

    /// Park the calling thread until the fence reaches `value`. Returns `Ok(false)` if
    /// `timeout` elapses first.
    pub fn wait_for_value(
        &self,
        value: u64,
        timeout: Duration,
    ) -> CeraResult<bool> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraFence::Dx12(inner) => inner.wait_for_value(value, timeout),
            CeraFence::Null(inner) => inner.wait_for_value(value, timeout),
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_fence(&self) -> Option<&CeraFenceDx12> {
        match self {
            CeraFence::Dx12(inner) => Some(inner),
            CeraFence::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_fence(&self) -> Option<&CeraFenceNull> {
        match self {
            CeraFence::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
