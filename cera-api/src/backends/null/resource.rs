use crate::null::CeraDeviceContextNull;
use crate::{CeraError, CeraResourceDesc, CeraResourceState, CeraResult};
use std::sync::{Arc, Mutex};

// Backing storage for a simulated buffer. Reads and writes happen through raw pointers because
// mapped pointers are handed out to callers the same way the real API does.
struct NullMemory {
    ptr: *mut u8,
    len: usize,
}

impl NullMemory {
    fn new(len: usize) -> Self {
        let memory = vec![0u8; len].into_boxed_slice();
        NullMemory {
            ptr: Box::into_raw(memory) as *mut u8,
            len,
        }
    }
}

impl Drop for NullMemory {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.ptr, self.len,
            )));
        }
    }
}

pub struct CeraRawResourceNullInner {
    device_context: CeraDeviceContextNull,
    resource_id: u64,
    resource_desc: CeraResourceDesc,
    initial_state: CeraResourceState,
    gpu_virtual_address: u64,
    memory: Option<NullMemory>,
    debug_name: Mutex<Option<String>>,
}

// For the raw memory pointer
unsafe impl Send for CeraRawResourceNullInner {}
unsafe impl Sync for CeraRawResourceNullInner {}

#[derive(Clone)]
pub struct CeraRawResourceNull {
    inner: Arc<CeraRawResourceNullInner>,
}

impl std::fmt::Debug for CeraRawResourceNull {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraRawResourceNull")
            .field("resource_id", &self.inner.resource_id)
            .field("debug_name", &*self.inner.debug_name.lock().unwrap())
            .finish()
    }
}

impl PartialEq for CeraRawResourceNull {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl CeraRawResourceNull {
    pub fn new(
        device_context: &CeraDeviceContextNull,
        resource_desc: &CeraResourceDesc,
        initial_state: CeraResourceState,
    ) -> CeraResult<CeraRawResourceNull> {
        resource_desc.verify();

        if let Some(required_state) = resource_desc.memory_usage().required_initial_state() {
            if initial_state != required_state {
                return Err(CeraError::ResourceCreationFailed(format!(
                    "{:?} resources must be created in state {:?}, not {:?}",
                    resource_desc.memory_usage(),
                    required_state,
                    initial_state
                )));
            }
        }

        let (memory, gpu_virtual_address) = match resource_desc {
            CeraResourceDesc::Buffer(buffer_def) => (
                Some(NullMemory::new(buffer_def.size as usize)),
                device_context.allocate_gpu_virtual_address(buffer_def.size),
            ),
            CeraResourceDesc::Texture(_) => (None, 0),
        };

        let resource_id = device_context.next_object_id();
        log::trace!("Creating null resource {} {:?}", resource_id, resource_desc);

        let inner = CeraRawResourceNullInner {
            device_context: device_context.clone(),
            resource_id,
            resource_desc: resource_desc.clone(),
            initial_state,
            gpu_virtual_address,
            memory,
            debug_name: Default::default(),
        };

        Ok(CeraRawResourceNull {
            inner: Arc::new(inner),
        })
    }

    pub fn device_context(&self) -> &CeraDeviceContextNull {
        &self.inner.device_context
    }

    pub fn resource_id(&self) -> u64 {
        self.inner.resource_id
    }

    pub fn resource_desc(&self) -> &CeraResourceDesc {
        &self.inner.resource_desc
    }

    pub fn initial_state(&self) -> CeraResourceState {
        self.inner.initial_state
    }

    pub fn gpu_virtual_address(&self) -> u64 {
        self.inner.gpu_virtual_address
    }

    pub fn set_debug_name(
        &self,
        name: &str,
    ) {
        *self.inner.debug_name.lock().unwrap() = Some(name.to_string());
    }

    pub fn debug_name(&self) -> Option<String> {
        self.inner.debug_name.lock().unwrap().clone()
    }

    pub fn map(&self) -> CeraResult<*mut u8> {
        if !self.inner.resource_desc.memory_usage().is_cpu_visible() {
            return Err("Only CPU-visible resources can be mapped")?;
        }

        self.inner
            .memory
            .as_ref()
            .map(|x| x.ptr)
            .ok_or_else(|| "Resource has no memory to map".into())
    }

    pub fn unmap(&self) -> CeraResult<()> {
        Ok(())
    }

    /// Copy of the simulated GPU memory, for inspecting the results of GPU copies in tests
    pub fn read_memory(
        &self,
        offset: u64,
        size: u64,
    ) -> CeraResult<Vec<u8>> {
        let memory = self.memory_range(offset, size)?;
        let mut data = vec![0u8; size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(memory, data.as_mut_ptr(), size as usize);
        }
        Ok(data)
    }

    fn memory_range(
        &self,
        offset: u64,
        size: u64,
    ) -> CeraResult<*mut u8> {
        let memory = self
            .inner
            .memory
            .as_ref()
            .ok_or("Resource has no buffer memory")?;

        if offset.checked_add(size).map_or(true, |end| end > memory.len as u64) {
            return Err(format!(
                "Range [{}, {}+{}) is out of bounds of a {} byte resource",
                offset, offset, size, memory.len
            ))?;
        }

        Ok(unsafe { memory.ptr.add(offset as usize) })
    }

    pub(crate) fn copy_buffer_region(
        dst: &CeraRawResourceNull,
        dst_offset: u64,
        src: &CeraRawResourceNull,
        src_offset: u64,
        size: u64,
    ) -> CeraResult<()> {
        let dst_ptr = dst.memory_range(dst_offset, size)?;
        let src_ptr = src.memory_range(src_offset, size)?;
        unsafe {
            // Same resource is allowed if the ranges don't overlap, copy handles both cases
            std::ptr::copy(src_ptr, dst_ptr, size as usize);
        }
        Ok(())
    }

    pub(crate) fn copy_resource(
        dst: &CeraRawResourceNull,
        src: &CeraRawResourceNull,
    ) -> CeraResult<()> {
        if dst.inner.resource_desc != src.inner.resource_desc {
            // CopyResource requires identical dimensions and format
            let same_shape = match (&dst.inner.resource_desc, &src.inner.resource_desc) {
                (CeraResourceDesc::Buffer(a), CeraResourceDesc::Buffer(b)) => a.size == b.size,
                (CeraResourceDesc::Texture(a), CeraResourceDesc::Texture(b)) => {
                    a.extents == b.extents && a.format == b.format && a.mip_count == b.mip_count
                }
                _ => false,
            };

            if !same_shape {
                return Err("CopyResource requires resources of the same size and format")?;
            }
        }

        if let Some(buffer_def) = src.inner.resource_desc.buffer_def() {
            Self::copy_buffer_region(dst, 0, src, 0, buffer_def.size)?;
        }

        Ok(())
    }
}
