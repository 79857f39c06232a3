use cera_api::{CeraRawResource, CeraResourceDesc, CeraResourceId};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

struct CeraResourceInner {
    raw_resource: CeraRawResource,
    resource_id: CeraResourceId,
    debug_name: Mutex<Option<String>>,
    drop_tx: Sender<CeraResourceId>,
}

impl Drop for CeraResourceInner {
    fn drop(&mut self) {
        log::trace!("Dropping {}", self.resource_id);
        // The device may already be gone, in which case nobody needs the id back
        let _ = self.drop_tx.send(self.resource_id);
    }
}

/// A GPU resource known to the state tracker. Cloning shares the resource. When the last clone
/// is dropped the id is sent back to the device, which removes the tracker record at the next
/// frame boundary.
///
/// Recording contexts hold a clone of every resource they touch until the GPU has finished with
/// them, so dropping the last user-held clone never destroys a resource the GPU still reads.
#[derive(Clone)]
pub struct CeraResource {
    inner: Arc<CeraResourceInner>,
}

impl std::fmt::Debug for CeraResource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraResource")
            .field("resource_id", &self.inner.resource_id)
            .field("debug_name", &*self.inner.debug_name.lock().unwrap())
            .finish()
    }
}

impl PartialEq for CeraResource {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.inner.resource_id == other.inner.resource_id
    }
}

impl Eq for CeraResource {}

impl CeraResource {
    pub(crate) fn new(
        raw_resource: CeraRawResource,
        resource_id: CeraResourceId,
        drop_tx: Sender<CeraResourceId>,
    ) -> Self {
        let inner = CeraResourceInner {
            raw_resource,
            resource_id,
            debug_name: Default::default(),
            drop_tx,
        };

        CeraResource {
            inner: Arc::new(inner),
        }
    }

    pub fn resource_id(&self) -> CeraResourceId {
        self.inner.resource_id
    }

    pub fn raw_resource(&self) -> &CeraRawResource {
        &self.inner.raw_resource
    }

    pub fn resource_desc(&self) -> &CeraResourceDesc {
        self.inner.raw_resource.resource_desc()
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.inner.raw_resource.gpu_virtual_address()
    }

    pub fn debug_name(&self) -> Option<String> {
        self.inner.debug_name.lock().unwrap().clone()
    }

    /// Also passed to the backend so the name shows up in capture tools
    pub fn set_debug_name(
        &self,
        name: &str,
    ) {
        self.inner.raw_resource.set_debug_name(name);
        *self.inner.debug_name.lock().unwrap() = Some(name.to_string());
    }

    /// Number of live clones, including those pinned by in-flight recording contexts
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

/// Implemented by every typed wrapper around a `CeraResource`
pub trait CeraGpuResource {
    fn resource(&self) -> &CeraResource;

    fn resource_id(&self) -> CeraResourceId {
        self.resource().resource_id()
    }

    fn raw_resource(&self) -> &CeraRawResource {
        self.resource().raw_resource()
    }

    fn resource_desc(&self) -> &CeraResourceDesc {
        self.resource().resource_desc()
    }

    fn debug_name(&self) -> Option<String> {
        self.resource().debug_name()
    }

    fn set_debug_name(
        &self,
        name: &str,
    ) {
        self.resource().set_debug_name(name)
    }
}

impl CeraGpuResource for CeraResource {
    fn resource(&self) -> &CeraResource {
        self
    }
}
