use super::{CeraCommandContext, CeraContextRecycler};
use crate::state::CeraResourceStateTracker;
use cera_api::{
    CeraDeviceContext, CeraDeviceDef, CeraError, CeraFence, CeraQueue, CeraQueueType, CeraResult,
};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct InFlightSubmission {
    context: CeraCommandContext,
    fence_value: u64,
}

#[derive(Default)]
struct InFlightState {
    // Ordered by fence value
    submissions: VecDeque<InFlightSubmission>,
    stop_requested: bool,
}

struct SubmitState {
    next_fence_value: u64,
    last_signaled_value: u64,
    is_shut_down: bool,
}

struct CeraCommandQueueShared {
    queue_type: CeraQueueType,
    queue: CeraQueue,
    fence: CeraFence,
    recycler: CeraContextRecycler,
    state_tracker: CeraResourceStateTracker,
    fence_wait_timeout: Duration,
    reclaim_wait_interval: Duration,
    submit_state: Mutex<SubmitState>,
    in_flight: Mutex<InFlightState>,
    in_flight_changed: Condvar,
}

impl CeraCommandQueueShared {
    // Hand every submission the GPU has finished back to the recycler
    fn reclaim_completed(&self) -> CeraResult<usize> {
        let completed_value = self.fence.completed_value()?;
        let mut completed = Vec::new();
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            while in_flight
                .submissions
                .front()
                .map_or(false, |x| x.fence_value <= completed_value)
            {
                completed.extend(in_flight.submissions.pop_front());
            }
        }

        let reclaimed_count = completed.len();
        for submission in completed {
            self.recycler
                .release(submission.context, submission.fence_value);
        }

        Ok(reclaimed_count)
    }
}

fn reclaim_worker(shared: Arc<CeraCommandQueueShared>) {
    log::debug!("{:?} queue reclaim worker started", shared.queue_type);

    // Shutdown flushes before stopping the worker, so anything still pending after a full fence
    // timeout past that point is never going to complete
    let mut stop_deadline = None;

    loop {
        let fence_value = {
            let mut in_flight = shared.in_flight.lock().unwrap();
            loop {
                if in_flight.stop_requested && stop_deadline.is_none() {
                    stop_deadline = Some(Instant::now() + shared.fence_wait_timeout);
                }

                if let Some(front) = in_flight.submissions.front() {
                    break front.fence_value;
                }

                if in_flight.stop_requested {
                    log::debug!("{:?} queue reclaim worker stopped", shared.queue_type);
                    return;
                }

                in_flight = shared.in_flight_changed.wait(in_flight).unwrap();
            }
        };

        let result = {
            profiling::scope!("Wait for in-flight submission");
            shared
                .fence
                .wait_for_value(fence_value, shared.reclaim_wait_interval)
        };

        match result {
            Ok(true) => {
                if let Err(e) = shared.reclaim_completed() {
                    log::error!(
                        "{:?} queue reclaim worker stopping: {}",
                        shared.queue_type,
                        e
                    );
                    return;
                }
            }
            Ok(false) => {
                if stop_deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                    log::error!(
                        "{:?} queue reclaim worker stopping with fence value {} still pending",
                        shared.queue_type,
                        fence_value
                    );
                    return;
                }
            }
            Err(e) => {
                log::error!(
                    "{:?} queue reclaim worker stopping while waiting for fence value {}: {}",
                    shared.queue_type,
                    fence_value,
                    e
                );
                return;
            }
        }
    }
}

/// Submits recording contexts to one GPU queue and tracks their completion with a fence.
///
/// Every submission signals the fence with the next value, so values returned by `submit` are
/// strictly increasing and a value is reached only once everything submitted before it has
/// finished. A background worker waits on the fence and returns finished contexts to the
/// recycler. Submissions from several threads are serialized.
pub struct CeraCommandQueue {
    shared: Arc<CeraCommandQueueShared>,
    reclaim_thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CeraCommandQueue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraCommandQueue")
            .field("queue_type", &self.shared.queue_type)
            .field("last_signaled_value", &self.last_signaled_value())
            .finish()
    }
}

impl CeraCommandQueue {
    pub fn new(
        device_context: &CeraDeviceContext,
        queue_type: CeraQueueType,
        state_tracker: &CeraResourceStateTracker,
        device_def: &CeraDeviceDef,
    ) -> CeraResult<Self> {
        let queue = device_context.create_queue(queue_type)?;
        let fence = device_context.create_fence()?;
        let recycler = CeraContextRecycler::new(
            device_context,
            queue_type,
            state_tracker,
            device_def.upload_page_size,
            device_def.max_recording_contexts,
        );

        let shared = Arc::new(CeraCommandQueueShared {
            queue_type,
            queue,
            fence,
            recycler,
            state_tracker: state_tracker.clone(),
            fence_wait_timeout: device_def.fence_wait_timeout,
            reclaim_wait_interval: device_def.reclaim_wait_interval,
            submit_state: Mutex::new(SubmitState {
                next_fence_value: 1,
                last_signaled_value: 0,
                is_shut_down: false,
            }),
            in_flight: Default::default(),
            in_flight_changed: Condvar::new(),
        });

        let worker_shared = shared.clone();
        let reclaim_thread = std::thread::Builder::new()
            .name(format!("{:?} queue reclaim", queue_type).to_lowercase())
            .spawn(move || reclaim_worker(worker_shared))
            .map_err(|e| format!("Failed to spawn reclaim worker: {}", e))?;

        Ok(CeraCommandQueue {
            shared,
            reclaim_thread: Mutex::new(Some(reclaim_thread)),
        })
    }

    pub fn queue_type(&self) -> CeraQueueType {
        self.shared.queue_type
    }

    pub fn queue(&self) -> &CeraQueue {
        &self.shared.queue
    }

    pub fn fence(&self) -> &CeraFence {
        &self.shared.fence
    }

    pub fn recycler(&self) -> &CeraContextRecycler {
        &self.shared.recycler
    }

    /// A recording context for this queue, open for recording
    pub fn acquire_context(&self) -> CeraResult<CeraCommandContext> {
        self.shared.recycler.acquire()
    }

    // A context that was never executed can go straight back to the pool
    fn recycle_unsubmitted(
        &self,
        context: CeraCommandContext,
    ) {
        self.shared.recycler.release(context, 0);
    }

    /// Execute the context and return the fence value that is reached once it has finished.
    ///
    /// Pending transitions are flushed, then the context's resource states are reconciled with
    /// the global state tracker: any barriers needed to bring resources from their last known
    /// state into the state the context expects are recorded into a separate context that
    /// executes first. If that fails (for example because a resource is not registered) nothing
    /// is executed and the fence does not advance.
    ///
    /// Failing to execute or signal means the device is lost and is not retried.
    #[profiling::function]
    pub fn submit(
        &self,
        mut context: CeraCommandContext,
    ) -> CeraResult<u64> {
        let queue_type = self.shared.queue_type;
        if context.queue_type() != queue_type {
            // This queue can't reach the context's own pool, so the context is destroyed
            log::error!(
                "Dropping {:?} context {} submitted to the {:?} queue",
                context.queue_type(),
                context.context_id(),
                queue_type
            );
            return Err(CeraError::QueueMismatch {
                expected: queue_type,
                actual: context.queue_type(),
            });
        }

        if let Err(e) = context.flush_barriers() {
            self.recycle_unsubmitted(context);
            return Err(e);
        }

        // Lock order is state tracker, then submit state, then in-flight list
        let mut global_states = self.shared.state_tracker.lock();
        let initial_transitions = match context.resolve_initial_transitions(&global_states) {
            Ok(transitions) => transitions,
            Err(e) => {
                drop(global_states);
                log::error!(
                    "Context {} not submitted to {:?} queue: {}",
                    context.context_id(),
                    queue_type,
                    e
                );
                self.recycle_unsubmitted(context);
                return Err(e);
            }
        };

        let mut submit_state = self.shared.submit_state.lock().unwrap();
        if submit_state.is_shut_down {
            drop(submit_state);
            drop(global_states);
            self.recycle_unsubmitted(context);
            return Err(CeraError::QueueShutDown(queue_type));
        }

        let prelude = if initial_transitions.is_empty() {
            None
        } else {
            let prelude = self.shared.recycler.acquire()?;
            context.record_transitions_into(&prelude, &initial_transitions)?;
            prelude.close()?;
            Some(prelude)
        };
        context.close()?;

        let fence_value = submit_state.next_fence_value;
        {
            let mut command_buffers = Vec::with_capacity(2);
            command_buffers.extend(prelude.as_ref().map(|x| x.command_buffer()));
            command_buffers.push(context.command_buffer());

            let result = self
                .shared
                .queue
                .execute_command_buffers(&command_buffers)
                .and_then(|_| self.shared.queue.signal(&self.shared.fence, fence_value));
            if let Err(e) = result {
                log::error!(
                    "Submitting context {} to {:?} queue as fence value {} failed: {}",
                    context.context_id(),
                    queue_type,
                    fence_value,
                    e
                );
                return Err(e);
            }
        }

        submit_state.next_fence_value += 1;
        submit_state.last_signaled_value = fence_value;
        context.commit_final_states(&mut global_states)?;
        drop(global_states);

        log::trace!(
            "Submitted context {} to {:?} queue as fence value {} ({} initial barriers)",
            context.context_id(),
            queue_type,
            fence_value,
            initial_transitions.len()
        );

        {
            let mut in_flight = self.shared.in_flight.lock().unwrap();
            if let Some(prelude) = prelude {
                in_flight.submissions.push_back(InFlightSubmission {
                    context: prelude,
                    fence_value,
                });
            }
            in_flight.submissions.push_back(InFlightSubmission {
                context,
                fence_value,
            });
        }
        drop(submit_state);
        self.shared.in_flight_changed.notify_all();

        Ok(fence_value)
    }

    /// The highest fence value the GPU has reached. Errors if the device is lost.
    pub fn completed_value(&self) -> CeraResult<u64> {
        self.shared.fence.completed_value()
    }

    /// The value of the most recent signal on this queue, zero if nothing was signaled yet
    pub fn last_signaled_value(&self) -> u64 {
        self.shared.submit_state.lock().unwrap().last_signaled_value
    }

    /// Never blocks. A lost device reports nothing as complete.
    pub fn is_complete(
        &self,
        fence_value: u64,
    ) -> bool {
        match self.shared.fence.completed_value() {
            Ok(completed_value) => fence_value <= completed_value,
            Err(_) => false,
        }
    }

    /// Park the calling thread until the fence reaches `fence_value`. Waiting longer than the
    /// configured timeout is reported as a hung device.
    pub fn wait_for(
        &self,
        fence_value: u64,
    ) -> CeraResult<()> {
        let last_signaled_value = self.last_signaled_value();
        if fence_value > last_signaled_value {
            return Err(CeraError::FenceValueNotSubmitted {
                queue_type: self.shared.queue_type,
                fence_value,
                last_signaled: last_signaled_value,
            });
        }

        profiling::scope!("wait_for");
        let timeout = self.shared.fence_wait_timeout;
        if self.shared.fence.wait_for_value(fence_value, timeout)? {
            return Ok(());
        }

        let completed_value = self.shared.fence.completed_value()?;
        log::error!(
            "{:?} queue did not reach fence value {} within {:?} (completed: {})",
            self.shared.queue_type,
            fence_value,
            timeout,
            completed_value
        );
        Err(CeraError::FenceWaitTimeout {
            queue_type: self.shared.queue_type,
            fence_value,
            completed_value,
            timeout,
        })
    }

    /// Signal a new fence value covering everything submitted so far and wait for it
    #[profiling::function]
    pub fn flush(&self) -> CeraResult<u64> {
        let fence_value = {
            let mut submit_state = self.shared.submit_state.lock().unwrap();
            let fence_value = submit_state.next_fence_value;
            self.shared.queue.signal(&self.shared.fence, fence_value)?;
            submit_state.next_fence_value += 1;
            submit_state.last_signaled_value = fence_value;
            fence_value
        };

        self.wait_for(fence_value)?;
        Ok(fence_value)
    }

    /// Work submitted to this queue from now on does not start on the GPU until `other` reaches
    /// its most recent signal. Does not block the calling thread.
    pub fn wait_on(
        &self,
        other: &CeraCommandQueue,
    ) -> CeraResult<()> {
        let other_value = other.last_signaled_value();
        if other_value == 0 {
            return Ok(());
        }

        let _submit_state = self.shared.submit_state.lock().unwrap();
        log::trace!(
            "{:?} queue waits on {:?} queue fence value {}",
            self.shared.queue_type,
            other.shared.queue_type,
            other_value
        );
        self.shared.queue.wait(&other.shared.fence, other_value)
    }

    /// Submissions whose contexts have not been reclaimed yet
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.lock().unwrap().submissions.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.submit_state.lock().unwrap().is_shut_down
    }

    /// Flush, then stop the reclaim worker once it has drained every in-flight context. Further
    /// submissions fail. Calling this again does nothing.
    pub fn shutdown(&self) -> CeraResult<()> {
        let reclaim_thread = match self.reclaim_thread.lock().unwrap().take() {
            Some(reclaim_thread) => reclaim_thread,
            None => return Ok(()),
        };

        log::debug!("Shutting down {:?} queue", self.shared.queue_type);
        let flush_result = self.flush();
        self.shared.submit_state.lock().unwrap().is_shut_down = true;

        self.shared.in_flight.lock().unwrap().stop_requested = true;
        self.shared.in_flight_changed.notify_all();
        if reclaim_thread.join().is_err() {
            log::error!("{:?} queue reclaim worker panicked", self.shared.queue_type);
        }

        // Only left behind if the device was lost or hung
        let abandoned: Vec<_> = self
            .shared
            .in_flight
            .lock()
            .unwrap()
            .submissions
            .drain(..)
            .collect();
        if !abandoned.is_empty() {
            log::error!(
                "{:?} queue shut down with {} submissions that never completed",
                self.shared.queue_type,
                abandoned.len()
            );
        }

        flush_result.map(|_| ())
    }
}

impl Drop for CeraCommandQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Error shutting down {:?} queue: {}", self.shared.queue_type, e);
        }
    }
}
