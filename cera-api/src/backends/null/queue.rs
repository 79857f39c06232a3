use crate::null::{CeraCommandBufferNull, CeraDeviceContextNull, CeraFenceNull};
use crate::{CeraQueueType, CeraResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(0);

// GPU-timeline operations that have been submitted but not yet retired. Command lists themselves
// run at submit time, only signals and waits are ordered on the timeline.
enum NullGpuOp {
    Signal { fence: CeraFenceNull, value: u64 },
    Wait { fence: CeraFenceNull, value: u64 },
}

pub struct CeraQueueNullInner {
    device_context: CeraDeviceContextNull,
    queue_type: CeraQueueType,
    queue_id: u32,
    pending_ops: Mutex<VecDeque<NullGpuOp>>,
}

impl CeraQueueNullInner {
    // Retires ops from the front of the timeline in order. Stops at a wait whose fence hasn't
    // been reached, or after `max_signals` signals. Returns (ops retired, signals retired).
    pub(crate) fn retire_ops(
        &self,
        max_signals: Option<usize>,
    ) -> (usize, usize) {
        let mut pending_ops = self.pending_ops.lock().unwrap();
        let mut ops_retired = 0;
        let mut signals_retired = 0;

        while let Some(op) = pending_ops.front() {
            if let Some(max_signals) = max_signals {
                if signals_retired >= max_signals {
                    break;
                }
            }

            match op {
                NullGpuOp::Signal { fence, value } => {
                    fence.set_completed_value(*value);
                    signals_retired += 1;
                }
                NullGpuOp::Wait { fence, value } => {
                    let reached = fence
                        .completed_value()
                        .map(|completed| completed >= *value)
                        .unwrap_or(false);
                    if !reached {
                        break;
                    }
                }
            }

            pending_ops.pop_front();
            ops_retired += 1;
        }

        (ops_retired, signals_retired)
    }
}

#[derive(Clone)]
pub struct CeraQueueNull {
    pub(crate) inner: Arc<CeraQueueNullInner>,
}

impl std::fmt::Debug for CeraQueueNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraQueueNull")
            .field("queue_type", &self.inner.queue_type)
            .field("queue_id", &self.inner.queue_id)
            .finish()
    }
}

impl CeraQueueNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraQueueNull> {
        let queue_id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        log::trace!("Creating null {:?} queue {}", queue_type, queue_id);

        let inner = CeraQueueNullInner {
            device_context: device_context.clone(),
            queue_type,
            queue_id,
            pending_ops: Default::default(),
        };

        Ok(CeraQueueNull {
            inner: Arc::new(inner),
        })
    }

    pub fn queue_id(&self) -> u32 {
        self.inner.queue_id
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.inner.queue_type
    }

    pub fn device_context(&self) -> &CeraDeviceContextNull {
        &self.inner.device_context
    }

    pub fn execute_command_buffers(
        &self,
        command_buffers: &[&CeraCommandBufferNull],
    ) -> CeraResult<()> {
        let device_context = &self.inner.device_context;
        if device_context.is_device_lost() {
            return Err(device_context.device_lost_error(
                "ExecuteCommandLists",
                Some(self.inner.queue_type),
                None,
            ));
        }

        for command_buffer in command_buffers {
            if command_buffer.queue_type() != self.inner.queue_type {
                return Err(format!(
                    "A {:?} command buffer can't be executed on a {:?} queue",
                    command_buffer.queue_type(),
                    self.inner.queue_type
                ))?;
            }
        }

        for command_buffer in command_buffers {
            command_buffer.execute()?;
        }

        Ok(())
    }

    /// Queue a GPU-side signal. The fence reaches `value` once everything before it on this queue
    /// has completed.
    pub fn signal(
        &self,
        fence: &CeraFenceNull,
        value: u64,
    ) -> CeraResult<()> {
        let device_context = &self.inner.device_context;
        if device_context.is_device_lost() {
            return Err(device_context.device_lost_error(
                "Signal",
                Some(self.inner.queue_type),
                Some(value),
            ));
        }

        self.inner
            .pending_ops
            .lock()
            .unwrap()
            .push_back(NullGpuOp::Signal {
                fence: fence.clone(),
                value,
            });
        device_context.pump_all_queues();
        Ok(())
    }

    /// Queue a GPU-side wait. Later work on this queue does not start until `fence` reaches
    /// `value`. Does not block the calling thread.
    pub fn wait(
        &self,
        fence: &CeraFenceNull,
        value: u64,
    ) -> CeraResult<()> {
        let device_context = &self.inner.device_context;
        if device_context.is_device_lost() {
            return Err(device_context.device_lost_error(
                "Wait",
                Some(self.inner.queue_type),
                Some(value),
            ));
        }

        self.inner
            .pending_ops
            .lock()
            .unwrap()
            .push_back(NullGpuOp::Wait {
                fence: fence.clone(),
                value,
            });
        device_context.pump_all_queues();
        Ok(())
    }

    /// Number of timeline operations (signals and waits) not yet retired
    pub fn pending_op_count(&self) -> usize {
        self.inner.pending_ops.lock().unwrap().len()
    }

    /// Manual completion: retire work up to and including the next signal. Returns false if
    /// nothing could complete, either because the queue is idle or it is blocked on a wait.
    pub fn complete_next(&self) -> bool {
        let (_, signals_retired) = self.inner.retire_ops(Some(1));
        signals_retired > 0
    }

    /// Manual completion: retire everything that isn't blocked on a wait. Returns the number of
    /// signals that completed.
    pub fn complete_all(&self) -> usize {
        let (_, signals_retired) = self.inner.retire_ops(None);
        signals_retired
    }
}
