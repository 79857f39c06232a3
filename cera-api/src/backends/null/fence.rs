use crate::null::CeraDeviceContextNull;
use crate::CeraResult;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct CeraFenceNullInner {
    fence_id: u64,
    completed_value: Mutex<u64>,
    completed_changed: Condvar,
}

impl CeraFenceNullInner {
    pub(crate) fn notify_waiters(&self) {
        // Take the lock so a waiter can't miss the notification between checking and sleeping
        let _guard = self.completed_value.lock().unwrap();
        self.completed_changed.notify_all();
    }
}

/// A fence is a 64-bit counter the simulated GPU raises. Values only move forward.
#[derive(Clone)]
pub struct CeraFenceNull {
    device_context: CeraDeviceContextNull,
    pub(crate) inner: Arc<CeraFenceNullInner>,
}

impl std::fmt::Debug for CeraFenceNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraFenceNull")
            .field("fence_id", &self.inner.fence_id)
            .field("completed_value", &*self.inner.completed_value.lock().unwrap())
            .finish()
    }
}

impl PartialEq for CeraFenceNull {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl CeraFenceNull {
    pub fn new(device_context: &CeraDeviceContextNull) -> CeraResult<CeraFenceNull> {
        let inner = CeraFenceNullInner {
            fence_id: device_context.next_object_id(),
            completed_value: Mutex::new(0),
            completed_changed: Condvar::new(),
        };

        Ok(CeraFenceNull {
            device_context: device_context.clone(),
            inner: Arc::new(inner),
        })
    }

    pub fn fence_id(&self) -> u64 {
        self.inner.fence_id
    }

    pub fn completed_value(&self) -> CeraResult<u64> {
        if self.device_context.is_device_lost() {
            return Err(self
                .device_context
                .device_lost_error("GetCompletedValue", None, None));
        }

        Ok(*self.inner.completed_value.lock().unwrap())
    }

    /// Raise the completed value. Lower values are ignored.
    pub(crate) fn set_completed_value(
        &self,
        value: u64,
    ) {
        let mut completed_value = self.inner.completed_value.lock().unwrap();
        if value > *completed_value {
            *completed_value = value;
            self.inner.completed_changed.notify_all();
        }
    }

    /// Blocks until the fence reaches `value`. Returns false if `timeout` elapsed first.
    pub fn wait_for_value(
        &self,
        value: u64,
        timeout: Duration,
    ) -> CeraResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut completed_value = self.inner.completed_value.lock().unwrap();
        loop {
            if self.device_context.is_device_lost() {
                return Err(self.device_context.device_lost_error(
                    "fence wait",
                    None,
                    Some(value),
                ));
            }

            if *completed_value >= value {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            completed_value = self
                .inner
                .completed_changed
                .wait_timeout(completed_value, deadline - now)
                .unwrap()
                .0;
        }
    }
}
