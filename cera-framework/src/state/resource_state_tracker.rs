use cera_api::{CeraError, CeraResourceId, CeraResourceState, CeraResult};
use cera_base::ResourceSlots;
use fnv::FnvHashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A state change that must be recorded as a transition barrier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CeraStateTransition {
    pub resource_id: CeraResourceId,
    pub state_before: CeraResourceState,
    pub state_after: CeraResourceState,
}

/// Process-wide table of the last known state of every resource. Registering a resource allocates
/// its id, so an id can only be known to the tracker if it was produced by it.
///
/// The table is shared by every recording context and queue. Submission holds the lock while it
/// reconciles a context's states so that transitions from different queues never interleave.
#[derive(Clone, Default)]
pub struct CeraResourceStateTracker {
    states: Arc<Mutex<ResourceSlots<CeraResourceState>>>,
}

impl std::fmt::Debug for CeraResourceStateTracker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraResourceStateTracker")
            .field("registered_count", &self.registered_count())
            .finish()
    }
}

impl CeraResourceStateTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Insert a record for a newly created or adopted resource
    pub fn register_resource(
        &self,
        initial_state: CeraResourceState,
    ) -> CeraResourceId {
        let resource_id = CeraResourceId(self.states.lock().unwrap().alloc_slot(initial_state));
        log::trace!("Registered {} in state {:?}", resource_id, initial_state);
        resource_id
    }

    /// Remove the record of a destroyed resource. Returns the last known state.
    pub fn unregister_resource(
        &self,
        resource_id: CeraResourceId,
    ) -> Option<CeraResourceState> {
        let state = self.states.lock().unwrap().free_slot(resource_id.0);
        if state.is_some() {
            log::trace!("Unregistered {}", resource_id);
        }
        state
    }

    pub fn is_registered(
        &self,
        resource_id: CeraResourceId,
    ) -> bool {
        self.states.lock().unwrap().contains(resource_id.0)
    }

    pub fn resource_state(
        &self,
        resource_id: CeraResourceId,
    ) -> CeraResult<CeraResourceState> {
        self.lock().state(resource_id)
    }

    pub fn registered_count(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    pub(crate) fn lock(&self) -> LockedResourceStates<'_> {
        LockedResourceStates {
            states: self.states.lock().unwrap(),
        }
    }
}

/// Exclusive access to the global table for the duration of a submit
pub(crate) struct LockedResourceStates<'a> {
    states: MutexGuard<'a, ResourceSlots<CeraResourceState>>,
}

impl<'a> LockedResourceStates<'a> {
    pub(crate) fn state(
        &self,
        resource_id: CeraResourceId,
    ) -> CeraResult<CeraResourceState> {
        self.states
            .get(resource_id.0)
            .copied()
            .ok_or(CeraError::UnregisteredResource(resource_id))
    }

    pub(crate) fn set_state(
        &mut self,
        resource_id: CeraResourceId,
        state: CeraResourceState,
    ) -> CeraResult<()> {
        let record = self
            .states
            .get_mut(resource_id.0)
            .ok_or(CeraError::UnregisteredResource(resource_id))?;
        *record = state;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
struct LocalResourceState {
    // The state the resource must be in when the context starts executing
    initial_state: CeraResourceState,
    // The state as of the last flushed barrier in this context
    current_state: CeraResourceState,
}

/// Per-recording-context view of resource states.
///
/// Requested transitions stay pending until `flush` so that a resource that changes state and
/// changes back before it is used costs nothing. The first state a resource is flushed to becomes
/// its required initial state, which is reconciled against the global table at submit time
/// instead of being recorded in this context.
#[derive(Default)]
pub struct CeraLocalResourceStateTracker {
    states: FnvHashMap<CeraResourceId, LocalResourceState>,
    pending: Vec<(CeraResourceId, CeraResourceState)>,
}

impl CeraLocalResourceStateTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Request that `resource_id` be in `desired_state` for the next command that uses it.
    /// Repeated requests before a flush replace each other.
    pub fn transition_resource(
        &mut self,
        resource_id: CeraResourceId,
        desired_state: CeraResourceState,
    ) {
        if let Some(pending) = self.pending.iter_mut().find(|(id, _)| *id == resource_id) {
            pending.1 = desired_state;
        } else {
            self.pending.push((resource_id, desired_state));
        }
    }

    pub fn has_pending_transitions(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Resolve pending requests into the barriers this context must record now. Resources seen
    /// for the first time produce no barrier here.
    pub fn flush(&mut self) -> Vec<CeraStateTransition> {
        let mut transitions = Vec::new();
        for (resource_id, desired_state) in self.pending.drain(..) {
            match self.states.get_mut(&resource_id) {
                Some(local_state) => {
                    if local_state.current_state != desired_state {
                        transitions.push(CeraStateTransition {
                            resource_id,
                            state_before: local_state.current_state,
                            state_after: desired_state,
                        });
                        local_state.current_state = desired_state;
                    }
                }
                None => {
                    self.states.insert(
                        resource_id,
                        LocalResourceState {
                            initial_state: desired_state,
                            current_state: desired_state,
                        },
                    );
                }
            }
        }

        transitions
    }

    /// The state the resource will be in after everything flushed so far, if this context has
    /// touched it
    pub fn current_state(
        &self,
        resource_id: CeraResourceId,
    ) -> Option<CeraResourceState> {
        self.states.get(&resource_id).map(|x| x.current_state)
    }

    /// Number of resources this context has flushed a state for
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Barriers that must run before this context so that every resource starts in the state the
    /// context expects. Fails if any resource is unknown to the global table.
    pub(crate) fn resolve_initial_states(
        &self,
        global_states: &LockedResourceStates,
    ) -> CeraResult<Vec<CeraStateTransition>> {
        debug_assert!(self.pending.is_empty());

        let mut transitions = Vec::new();
        for (&resource_id, local_state) in &self.states {
            let global_state = global_states.state(resource_id)?;
            if global_state != local_state.initial_state {
                transitions.push(CeraStateTransition {
                    resource_id,
                    state_before: global_state,
                    state_after: local_state.initial_state,
                });
            }
        }

        Ok(transitions)
    }

    /// Publish the final states of this context to the global table
    pub(crate) fn commit_final_states(
        &self,
        global_states: &mut LockedResourceStates,
    ) -> CeraResult<()> {
        for (&resource_id, local_state) in &self.states {
            global_states.set_state(resource_id, local_state.current_state)?;
        }

        Ok(())
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let tracker = CeraResourceStateTracker::new();
        let id = tracker.register_resource(CeraResourceState::COPY_DST);
        assert!(tracker.is_registered(id));
        assert_eq!(
            tracker.resource_state(id).unwrap(),
            CeraResourceState::COPY_DST
        );

        assert_eq!(
            tracker.unregister_resource(id),
            Some(CeraResourceState::COPY_DST)
        );
        assert!(!tracker.is_registered(id));
        match tracker.resource_state(id) {
            Err(CeraError::UnregisteredResource(unknown)) => assert_eq!(unknown, id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_state_change_and_revert_collapses() {
        let tracker = CeraResourceStateTracker::new();
        let id = tracker.register_resource(CeraResourceState::COMMON);

        let mut local = CeraLocalResourceStateTracker::new();
        local.transition_resource(id, CeraResourceState::COPY_DST);
        local.transition_resource(id, CeraResourceState::COMMON);
        assert!(local.flush().is_empty());

        let global = tracker.lock();
        assert!(local.resolve_initial_states(&global).unwrap().is_empty());
    }

    #[test]
    fn test_first_use_is_resolved_against_global_state() {
        let tracker = CeraResourceStateTracker::new();
        let id = tracker.register_resource(CeraResourceState::COMMON);

        let mut local = CeraLocalResourceStateTracker::new();
        local.transition_resource(id, CeraResourceState::COPY_DST);
        assert!(local.flush().is_empty());

        // Used as copy dest, then as a shader resource: one barrier inside the context
        local.transition_resource(id, CeraResourceState::SHADER_RESOURCE);
        let transitions = local.flush();
        assert_eq!(
            transitions,
            vec![CeraStateTransition {
                resource_id: id,
                state_before: CeraResourceState::COPY_DST,
                state_after: CeraResourceState::SHADER_RESOURCE,
            }]
        );

        let mut global = tracker.lock();
        let initial = local.resolve_initial_states(&global).unwrap();
        assert_eq!(
            initial,
            vec![CeraStateTransition {
                resource_id: id,
                state_before: CeraResourceState::COMMON,
                state_after: CeraResourceState::COPY_DST,
            }]
        );

        local.commit_final_states(&mut global).unwrap();
        assert_eq!(
            global.state(id).unwrap(),
            CeraResourceState::SHADER_RESOURCE
        );
    }

    #[test]
    fn test_repeated_requests_keep_latest() {
        let tracker = CeraResourceStateTracker::new();
        let id = tracker.register_resource(CeraResourceState::COMMON);

        let mut local = CeraLocalResourceStateTracker::new();
        local.transition_resource(id, CeraResourceState::COPY_SRC);
        local.transition_resource(id, CeraResourceState::COPY_DST);
        local.transition_resource(id, CeraResourceState::UNORDERED_ACCESS);
        assert!(local.has_pending_transitions());
        local.flush();
        assert_eq!(
            local.current_state(id),
            Some(CeraResourceState::UNORDERED_ACCESS)
        );
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_unregistered_resource_is_reported() {
        let tracker = CeraResourceStateTracker::new();
        let id = tracker.register_resource(CeraResourceState::COMMON);
        tracker.unregister_resource(id);

        let mut local = CeraLocalResourceStateTracker::new();
        local.transition_resource(id, CeraResourceState::COPY_DST);
        local.flush();

        let global = tracker.lock();
        match local.resolve_initial_states(&global) {
            Err(CeraError::UnregisteredResource(unknown)) => assert_eq!(unknown, id),
            other => panic!("unexpected {:?}", other),
        }
    }
}
