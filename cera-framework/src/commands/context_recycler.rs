use super::CeraCommandContext;
use crate::state::CeraResourceStateTracker;
use cera_api::{CeraDeviceContext, CeraQueueType, CeraResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Pool of recording contexts for one queue type.
///
/// `acquire` never blocks: it reuses an available context or creates a new one. Contexts only come
/// back through `release`, which the owning queue's reclaim worker calls once the context's fence
/// value has been reached.
pub struct CeraContextRecycler {
    device_context: CeraDeviceContext,
    queue_type: CeraQueueType,
    state_tracker: CeraResourceStateTracker,
    upload_page_size: u64,
    max_recording_contexts: usize,
    next_context_id: AtomicU64,
    available: Mutex<Vec<CeraCommandContext>>,
}

impl CeraContextRecycler {
    pub fn new(
        device_context: &CeraDeviceContext,
        queue_type: CeraQueueType,
        state_tracker: &CeraResourceStateTracker,
        upload_page_size: u64,
        max_recording_contexts: usize,
    ) -> Self {
        CeraContextRecycler {
            device_context: device_context.clone(),
            queue_type,
            state_tracker: state_tracker.clone(),
            upload_page_size,
            max_recording_contexts,
            next_context_id: AtomicU64::new(0),
            available: Default::default(),
        }
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.queue_type
    }

    /// A context that is open for recording and not referenced by any in-flight GPU work
    #[profiling::function]
    pub fn acquire(&self) -> CeraResult<CeraCommandContext> {
        if let Some(context) = self.available.lock().unwrap().pop() {
            log::trace!(
                "Reusing {:?} context {}",
                self.queue_type,
                context.context_id()
            );
            return Ok(context);
        }

        let context_id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        let created_count = context_id as usize + 1;
        if created_count > self.max_recording_contexts {
            log::warn!(
                "{} {:?} recording contexts created, more than the expected maximum of {}. Are contexts being acquired and never submitted?",
                created_count,
                self.queue_type,
                self.max_recording_contexts
            );
        } else {
            log::trace!("Creating {:?} context {}", self.queue_type, context_id);
        }

        CeraCommandContext::new(
            &self.device_context,
            self.queue_type,
            context_id,
            &self.state_tracker,
            self.upload_page_size,
        )
    }

    // Only called once `fence_value` is known to be reached, or for a context that was never
    // submitted. A context that fails to reset is dropped rather than pooled.
    pub(crate) fn release(
        &self,
        mut context: CeraCommandContext,
        fence_value: u64,
    ) {
        debug_assert_eq!(context.queue_type(), self.queue_type);
        log::trace!(
            "Recycling {:?} context {} (fence value {})",
            self.queue_type,
            context.context_id(),
            fence_value
        );

        match context.reset() {
            Ok(()) => self.available.lock().unwrap().push(context),
            Err(e) => log::error!(
                "Dropping {:?} context {} that failed to reset: {}",
                self.queue_type,
                context.context_id(),
                e
            ),
        }
    }

    /// Contexts ready to be handed out without creating a new one
    pub fn available_count(&self) -> usize {
        self.available.lock().unwrap().len()
    }

    /// Contexts created over the lifetime of the pool
    pub fn created_count(&self) -> usize {
        self.next_context_id.load(Ordering::Relaxed) as usize
    }
}
