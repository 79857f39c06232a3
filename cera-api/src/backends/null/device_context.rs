use crate::null::{
    CeraCommandBufferNull, CeraDescriptorHeapNull, CeraFenceNull, CeraFenceNullInner,
    CeraPipelineNull, CeraQueueNull, CeraQueueNullInner, CeraRawResourceNull,
    CeraRootSignatureNull,
};
use crate::{
    CeraAdapterInfo, CeraApiDefNull, CeraComputePipelineDef, CeraCpuDescriptorHandle,
    CeraDescriptorHeapDef, CeraDescriptorHeapType, CeraDeviceInfo, CeraError,
    CeraNullGpuCompletion, CeraQueueType, CeraResourceDesc, CeraResourceState, CeraResult,
    CeraRootSignatureDef, CeraSamplerDef, CeraViewDef,
};
use fnv::FnvHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// What was written into a descriptor slot, kept so tests can inspect descriptor contents
#[derive(Clone, Debug, PartialEq)]
pub enum CeraNullDescriptor {
    View {
        heap_type: CeraDescriptorHeapType,
        resource_id: u64,
        view_def: CeraViewDef,
    },
    Sampler(CeraSamplerDef),
}

/// Counters describing work the simulated GPU has executed
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CeraNullGpuStats {
    pub executed_command_buffers: u64,
    pub executed_barriers: u64,
    pub executed_copies: u64,
    pub executed_dispatches: u64,
}

pub struct CeraDeviceContextNullInner {
    adapter_info: CeraAdapterInfo,
    device_info: CeraDeviceInfo,
    gpu_completion: Mutex<CeraNullGpuCompletion>,
    device_lost: AtomicBool,
    next_object_id: AtomicU64,
    next_gpu_virtual_address: AtomicU64,
    queues: Mutex<Vec<Weak<CeraQueueNullInner>>>,
    fences: Mutex<Vec<Weak<CeraFenceNullInner>>>,
    descriptors: Mutex<FnvHashMap<usize, CeraNullDescriptor>>,
    stats: Mutex<CeraNullGpuStats>,
}

/// A device with no GPU behind it. Work submitted to its queues is "executed" on the CPU: copies
/// between buffers really move bytes, everything else is counted. Fence values complete either
/// as soon as they are signaled or when a test releases them, see `CeraNullGpuCompletion`.
#[derive(Clone)]
pub struct CeraDeviceContextNull {
    pub(crate) inner: Arc<CeraDeviceContextNullInner>,
}

impl std::fmt::Debug for CeraDeviceContextNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraDeviceContextNull")
            .field("adapter", &self.inner.adapter_info.description)
            .field("device_lost", &self.is_device_lost())
            .finish()
    }
}

// D3D12 places buffers on 64KB boundaries
const NULL_GPU_ADDRESS_ALIGNMENT: u64 = 64 * 1024;
const NULL_GPU_ADDRESS_BASE: u64 = 0x1_0000_0000;

impl CeraDeviceContextNull {
    pub fn new(null_api_def: &CeraApiDefNull) -> CeraResult<Self> {
        log::info!(
            "Creating null device ({:?} completion)",
            null_api_def.gpu_completion
        );

        let inner = CeraDeviceContextNullInner {
            adapter_info: null_api_def.adapter_info.clone(),
            device_info: CeraDeviceInfo::default(),
            gpu_completion: Mutex::new(null_api_def.gpu_completion),
            device_lost: AtomicBool::new(false),
            next_object_id: AtomicU64::new(1),
            next_gpu_virtual_address: AtomicU64::new(NULL_GPU_ADDRESS_BASE),
            queues: Default::default(),
            fences: Default::default(),
            descriptors: Default::default(),
            stats: Default::default(),
        };

        Ok(CeraDeviceContextNull {
            inner: Arc::new(inner),
        })
    }

    pub fn adapter_info(&self) -> &CeraAdapterInfo {
        &self.inner.adapter_info
    }

    pub fn device_info(&self) -> &CeraDeviceInfo {
        &self.inner.device_info
    }

    pub fn gpu_completion(&self) -> CeraNullGpuCompletion {
        *self.inner.gpu_completion.lock().unwrap()
    }

    /// Switching to `Immediate` releases everything that was being held back
    pub fn set_gpu_completion(
        &self,
        gpu_completion: CeraNullGpuCompletion,
    ) {
        *self.inner.gpu_completion.lock().unwrap() = gpu_completion;
        if gpu_completion == CeraNullGpuCompletion::Immediate {
            self.pump_all_queues();
        }
    }

    pub fn is_device_lost(&self) -> bool {
        self.inner.device_lost.load(Ordering::Acquire)
    }

    /// From now on every submission fails and every fence wait reports a lost device
    pub fn simulate_device_lost(&self) {
        log::warn!("Simulating device lost on null device");
        self.inner.device_lost.store(true, Ordering::Release);

        let fences: Vec<_> = self
            .inner
            .fences
            .lock()
            .unwrap()
            .iter()
            .filter_map(|x| x.upgrade())
            .collect();
        for fence in fences {
            fence.notify_waiters();
        }
    }

    pub fn gpu_stats(&self) -> CeraNullGpuStats {
        *self.inner.stats.lock().unwrap()
    }

    pub(crate) fn update_gpu_stats<F: FnOnce(&mut CeraNullGpuStats)>(
        &self,
        f: F,
    ) {
        f(&mut *self.inner.stats.lock().unwrap());
    }

    /// Returns what was last written at the given descriptor handle
    pub fn descriptor_at(
        &self,
        handle: CeraCpuDescriptorHandle,
    ) -> Option<CeraNullDescriptor> {
        self.inner.descriptors.lock().unwrap().get(&handle.0).cloned()
    }

    pub(crate) fn next_object_id(&self) -> u64 {
        self.inner.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_gpu_virtual_address(
        &self,
        size: u64,
    ) -> u64 {
        let size = cera_base::memory::round_size_up_to_alignment_u64(
            size.max(1),
            NULL_GPU_ADDRESS_ALIGNMENT,
        );
        self.inner
            .next_gpu_virtual_address
            .fetch_add(size, Ordering::Relaxed)
    }

    pub(crate) fn device_lost_error(
        &self,
        operation: &str,
        queue_type: Option<CeraQueueType>,
        fence_value: Option<u64>,
    ) -> CeraError {
        CeraError::DeviceLost {
            operation: operation.to_string(),
            queue_type,
            fence_value,
        }
    }

    /// Let every queue retire as much work as it can. Repeats until nothing moves since a signal
    /// on one queue may unblock a wait on another.
    pub(crate) fn pump_all_queues(&self) {
        if self.gpu_completion() != CeraNullGpuCompletion::Immediate {
            return;
        }

        let queues: Vec<_> = self
            .inner
            .queues
            .lock()
            .unwrap()
            .iter()
            .filter_map(|x| x.upgrade())
            .collect();

        loop {
            let mut made_progress = false;
            for queue in &queues {
                made_progress |= queue.retire_ops(None).0 > 0;
            }

            if !made_progress {
                break;
            }
        }
    }

    pub fn create_queue(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraQueueNull> {
        let queue = CeraQueueNull::new(self, queue_type)?;
        let mut queues = self.inner.queues.lock().unwrap();
        queues.retain(|x| x.strong_count() > 0);
        queues.push(Arc::downgrade(&queue.inner));
        Ok(queue)
    }

    pub fn create_fence(&self) -> CeraResult<CeraFenceNull> {
        let fence = CeraFenceNull::new(self)?;
        let mut fences = self.inner.fences.lock().unwrap();
        fences.retain(|x| x.strong_count() > 0);
        fences.push(Arc::downgrade(&fence.inner));
        Ok(fence)
    }

    pub fn create_command_buffer(
        &self,
        queue_type: CeraQueueType,
    ) -> CeraResult<CeraCommandBufferNull> {
        CeraCommandBufferNull::new(self, queue_type)
    }

    pub fn create_descriptor_heap(
        &self,
        heap_def: &CeraDescriptorHeapDef,
    ) -> CeraResult<CeraDescriptorHeapNull> {
        CeraDescriptorHeapNull::new(self, heap_def)
    }

    pub fn create_raw_resource(
        &self,
        resource_desc: &CeraResourceDesc,
        initial_state: CeraResourceState,
    ) -> CeraResult<CeraRawResourceNull> {
        CeraRawResourceNull::new(self, resource_desc, initial_state)
    }

    pub fn create_root_signature(
        &self,
        root_signature_def: &CeraRootSignatureDef,
    ) -> CeraResult<CeraRootSignatureNull> {
        CeraRootSignatureNull::new(self, root_signature_def)
    }

    pub fn create_compute_pipeline(
        &self,
        compute_pipeline_def: &CeraComputePipelineDef,
    ) -> CeraResult<CeraPipelineNull> {
        CeraPipelineNull::new(self, compute_pipeline_def)
    }

    pub fn create_view(
        &self,
        resource: &CeraRawResourceNull,
        view_def: &CeraViewDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        if let CeraViewDef::ConstantBuffer { byte_offset, size } = *view_def {
            let buffer_size = resource
                .resource_desc()
                .buffer_def()
                .map(|x| x.size)
                .ok_or("Constant buffer views can only be created for buffers")?;
            if byte_offset + size as u64 > buffer_size {
                return Err(format!(
                    "Constant buffer view [{}, {}) is out of bounds of a {} byte buffer",
                    byte_offset,
                    byte_offset + size as u64,
                    buffer_size
                ))?;
            }
        }

        self.inner.descriptors.lock().unwrap().insert(
            dst.0,
            CeraNullDescriptor::View {
                heap_type: view_def.heap_type(),
                resource_id: resource.resource_id(),
                view_def: *view_def,
            },
        );
        Ok(())
    }

    pub fn create_sampler(
        &self,
        sampler_def: &CeraSamplerDef,
        dst: CeraCpuDescriptorHandle,
    ) -> CeraResult<()> {
        self.inner
            .descriptors
            .lock()
            .unwrap()
            .insert(dst.0, CeraNullDescriptor::Sampler(*sampler_def));
        Ok(())
    }

    pub fn copy_descriptors(
        &self,
        dst: CeraCpuDescriptorHandle,
        src: CeraCpuDescriptorHandle,
        count: u32,
        _heap_type: CeraDescriptorHeapType,
    ) -> CeraResult<()> {
        let mut descriptors = self.inner.descriptors.lock().unwrap();
        let increment = crate::null::NULL_DESCRIPTOR_INCREMENT;
        for i in 0..count as usize {
            let value = descriptors.get(&(src.0 + i * increment)).cloned();
            match value {
                Some(value) => {
                    descriptors.insert(dst.0 + i * increment, value);
                }
                None => {
                    descriptors.remove(&(dst.0 + i * increment));
                }
            }
        }
        Ok(())
    }
}
