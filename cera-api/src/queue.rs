use crate::device_context::BACKEND_MISMATCH;
#[cfg(feature = "cera-dx12")]
use crate::dx12::CeraQueueDx12;
use crate::null::CeraQueueNull;
use crate::{CeraCommandBuffer, CeraFence, CeraQueueType, CeraResult};

/// A queue allows work to be submitted to the GPU
///
/// Work submitted to the same queue executes in submission order. There is no ordering between
/// queues unless one is established with `wait`.
///
/// Unlike the device context, submitting from several threads at once is not serialized here.
/// The framework's command queue owns the lock that orders submissions.
#[derive(Clone, Debug)]
pub enum CeraQueue {
    #[cfg(feature = "cera-dx12")]
    Dx12(CeraQueueDx12),
    Null(CeraQueueNull),
}

impl CeraQueue {
    /// Returns an opaque ID associated with this queue
    pub fn queue_id(&self) -> u32 {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraQueue::Dx12(inner) => inner.queue_id(),
            CeraQueue::Null(inner) => inner.queue_id(),
        }
    }

    /// Get the type of queue that this is
    pub fn queue_type(&self) -> CeraQueueType {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraQueue::Dx12(inner) => inner.queue_type(),
            CeraQueue::Null(inner) => inner.queue_type(),
        }
    }

    /// Submit closed command buffers for execution, in order
    pub fn execute_command_buffers(
        &self,
        command_buffers: &[&CeraCommandBuffer],
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraQueue::Dx12(inner) => {
                let command_buffers = command_buffers
                    .iter()
                    .map(|x| x.dx12_command_buffer().ok_or(BACKEND_MISMATCH))
                    .collect::<Result<Vec<_>, _>>()?;
                inner.execute_command_buffers(&command_buffers)
            }
            CeraQueue::Null(inner) => {
                let command_buffers = command_buffers
                    .iter()
                    .map(|x| x.null_command_buffer().ok_or(BACKEND_MISMATCH))
                    .collect::<Result<Vec<_>, _>>()?;
                inner.execute_command_buffers(&command_buffers)
            }
        }
    }

    /// GPU-side signal of `fence` to `value` once all previously submitted work completes
    pub fn signal(
        &self,
        fence: &CeraFence,
        value: u64,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraQueue::Dx12(inner) => {
                inner.signal(fence.dx12_fence().ok_or(BACKEND_MISMATCH)?, value)
            }
            CeraQueue::Null(inner) => {
                inner.signal(fence.null_fence().ok_or(BACKEND_MISMATCH)?, value)
            }
        }
    }

    /// GPU-side wait. Work submitted to this queue afterwards does not start until `fence`
    /// reaches `value`. The calling thread does not block.
    pub fn wait(
        &self,
        fence: &CeraFence,
        value: u64,
    ) -> CeraResult<()> {
        match self {
            #[cfg(feature = "cera-dx12")]
            CeraQueue::Dx12(inner) => {
                inner.wait(fence.dx12_fence().ok_or(BACKEND_MISMATCH)?, value)
            }
            CeraQueue::Null(inner) => {
                inner.wait(fence.null_fence().ok_or(BACKEND_MISMATCH)?, value)
            }
        }
    }

    #[cfg(feature = "cera-dx12")]
    pub fn dx12_queue(&self) -> Option<&CeraQueueDx12> {
        match self {
            CeraQueue::Dx12(inner) => Some(inner),
            CeraQueue::Null(_) => None,
        }
    }

    #[allow(unreachable_patterns)]
    pub fn null_queue(&self) -> Option<&CeraQueueNull> {
        match self {
            CeraQueue::Null(inner) => Some(inner),
            _ => None,
        }
    }
}
