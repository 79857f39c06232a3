use crate::dx12::{CeraCommandBufferDx12, CeraDeviceContextDx12, CeraFenceDx12};
use crate::{CeraQueueType, CeraResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use windows::core::Interface;

use super::d3d12;

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(0);

pub struct CeraQueueDx12Inner {
    device_context: CeraDeviceContextDx12,
    queue_type: CeraQueueType,
    queue: d3d12::ID3D12CommandQueue,
    queue_id: u32,
}

impl std::fmt::Debug for CeraQueueDx12Inner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraQueueDx12Inner")
            .field("device_context", &self.device_context)
            .field("queue_type", &self.queue_type)
            .field("queue_id", &self.queue_id)
            .finish()
    }
}

// ID3D12CommandQueue is free-threaded
unsafe impl Send for CeraQueueDx12Inner {}
unsafe impl Sync for CeraQueueDx12Inner {}

#[derive(Clone, Debug)]
pub struct CeraQueueDx12 {
    inner: Arc<CeraQueueDx12Inner>,
}

impl CeraQueueDx12 {
    pub fn queue_id(&self) -> u32 {
        self.inner.queue_id
    }

    pub fn dx12_queue(&self) -> &d3d12::ID3D12CommandQueue {
        &self.inner.queue
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.inner.queue_type
    }

    pub fn device_context(&self) -> &CeraDeviceContextDx12 {
        &self.inner.device_context
    }

    pub fn new(
        device_context: &CeraDeviceContextDx12,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraQueueDx12> {
        let queue_desc = d3d12::D3D12_COMMAND_QUEUE_DESC {
            Type: super::internal::queue_type_to_command_list_type(queue_type),
            Priority: d3d12::D3D12_COMMAND_QUEUE_PRIORITY_NORMAL.0,
            Flags: d3d12::D3D12_COMMAND_QUEUE_FLAG_NONE,
            NodeMask: 0,
        };

        let queue: d3d12::ID3D12CommandQueue = unsafe {
            device_context
                .d3d12_device()
                .CreateCommandQueue(&queue_desc)
        }?;

        super::internal::set_debug_name(
            &queue.cast()?,
            match queue_type {
                CeraQueueType::Graphics => "Graphics",
                CeraQueueType::Compute => "Compute",
                CeraQueueType::Copy => "Copy",
            },
        );

        let queue_id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        log::trace!("Created {:?} queue {}", queue_type, queue_id);

        let inner = CeraQueueDx12Inner {
            device_context: device_context.clone(),
            queue_type,
            queue,
            queue_id,
        };

        Ok(CeraQueueDx12 {
            inner: Arc::new(inner),
        })
    }

    pub fn execute_command_buffers(
        &self,
        command_buffers: &[&CeraCommandBufferDx12],
    ) -> CeraResult<()> {
        for command_buffer in command_buffers {
            if command_buffer.queue_type() != self.inner.queue_type {
                return Err(format!(
                    "A {:?} command buffer can't be executed on a {:?} queue",
                    command_buffer.queue_type(),
                    self.inner.queue_type
                ))?;
            }
        }

        if self.inner.device_context.device_removed_reason().is_some() {
            return Err(self.inner.device_context.device_lost_error(
                "ExecuteCommandLists",
                Some(self.inner.queue_type),
                None,
            ));
        }

        //TODO: Don't allocate a vec, ideally use stack memory
        let command_lists: Vec<Option<d3d12::ID3D12CommandList>> = command_buffers
            .iter()
            .map(|x| Some(x.dx12_command_list_base().clone()))
            .collect();
        unsafe {
            self.inner.queue.ExecuteCommandLists(&command_lists);
        }

        Ok(())
    }

    pub fn signal(
        &self,
        fence: &CeraFenceDx12,
        value: u64,
    ) -> CeraResult<()> {
        unsafe { self.inner.queue.Signal(fence.dx12_fence(), value) }.map_err(|e| {
            log::error!("Signal failed: {:?}", e);
            self.inner.device_context.device_lost_error(
                "Signal",
                Some(self.inner.queue_type),
                Some(value),
            )
        })
    }

    pub fn wait(
        &self,
        fence: &CeraFenceDx12,
        value: u64,
    ) -> CeraResult<()> {
        unsafe { self.inner.queue.Wait(fence.dx12_fence(), value) }.map_err(|e| {
            log::error!("Wait failed: {:?}", e);
            self.inner.device_context.device_lost_error(
                "Wait",
                Some(self.inner.queue_type),
                Some(value),
            )
        })
    }
}
