use cera_api::{
    CeraBufferDef, CeraDeviceContext, CeraError, CeraRawResource, CeraResourceDesc,
    CeraResourceState, CeraResult,
};
use std::marker::PhantomData;
use std::sync::Mutex;

// Based on the linear allocator pattern: bump a cursor through a mapped page and hand the whole
// page back at once when the GPU is done with it

struct UploadPage {
    resource: CeraRawResource,
    cpu_begin: *mut u8,
    gpu_begin: u64,
    cursor: u64,
}

impl UploadPage {
    fn new(
        device_context: &CeraDeviceContext,
        page_size: u64,
    ) -> CeraResult<Self> {
        let resource = device_context.create_raw_resource(
            &CeraResourceDesc::Buffer(CeraBufferDef::for_staging_buffer(page_size)),
            CeraResourceState::GENERIC_READ,
        )?;
        resource.set_debug_name("Upload Page");

        // Upload heap pages stay mapped for their whole lifetime
        let cpu_begin = resource.map()?;
        let gpu_begin = resource.gpu_virtual_address();

        Ok(UploadPage {
            resource,
            cpu_begin,
            gpu_begin,
            cursor: 0,
        })
    }

    fn try_allocate(
        &mut self,
        size: u64,
        alignment: u64,
        page_size: u64,
    ) -> Option<u64> {
        let offset = cera_base::memory::checked_round_size_up_to_alignment_u64(
            self.cursor,
            alignment,
        )?;
        let end = offset.checked_add(size)?;
        if end > page_size {
            return None;
        }

        self.cursor = end;
        Some(offset)
    }
}

impl Drop for UploadPage {
    fn drop(&mut self) {
        if let Err(e) = self.resource.unmap() {
            log::warn!("Failed to unmap upload page: {}", e);
        }
    }
}

/// Memory handed out by `CeraUploadBuffer::allocate`. Borrows the pager, so the page can't be
/// reset or unmapped while the allocation is still around.
///
/// ```compile_fail
/// # use cera_api::CeraApi;
/// # use cera_framework::CeraUploadBuffer;
/// # let api = CeraApi::new_null(&Default::default(), &Default::default()).unwrap();
/// let mut upload_buffer = CeraUploadBuffer::new(&api.device_context(), 256);
/// let allocation = upload_buffer.allocate(4, 4).unwrap();
/// upload_buffer.reset();
/// allocation.write(&[1, 2, 3, 4]).unwrap();
/// ```
#[derive(Debug)]
pub struct CeraUploadAllocation<'a> {
    cpu_pointer: *mut u8,
    gpu_address: u64,
    resource: CeraRawResource,
    offset: u64,
    size: u64,
    phantom_data: PhantomData<&'a CeraUploadBuffer>,
}

// Ranges never overlap, so only one allocation writes a given byte. Not Sync, two threads can't
// write the same range through a shared reference.
unsafe impl<'a> Send for CeraUploadAllocation<'a> {}

impl<'a> CeraUploadAllocation<'a> {
    pub fn cpu_pointer(&self) -> *mut u8 {
        self.cpu_pointer
    }

    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    /// The upload page the allocation lives in
    pub fn resource(&self) -> &CeraRawResource {
        &self.resource
    }

    /// Offset of the allocation within its page
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy `data` to the start of the allocation
    pub fn write(
        &self,
        data: &[u8],
    ) -> CeraResult<()> {
        if data.len() as u64 > self.size {
            return Err(format!(
                "Tried to write {} bytes into a {} byte upload allocation",
                data.len(),
                self.size
            ))?;
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.cpu_pointer, data.len());
        }

        Ok(())
    }
}

#[derive(Default)]
struct UploadBufferPages {
    current_page: Option<UploadPage>,
    available_pages: Vec<UploadPage>,
    in_flight_pages: Vec<UploadPage>,
}

impl UploadBufferPages {
    fn page_count(&self) -> usize {
        self.available_pages.len() + self.in_flight_page_count()
    }

    fn in_flight_page_count(&self) -> usize {
        self.in_flight_pages.len() + self.current_page.is_some() as usize
    }
}

/// Linear allocator over fixed-size pages of CPU-writable, GPU-readable memory for data that only
/// lives for one submission.
///
/// Pages move from "available" to the current page to "in flight", and only `reset` moves them
/// back. `reset` needs exclusive access, so it can't run while any allocation is alive. The owner
/// must still not call it until the GPU has finished every submission that read from the pages.
pub struct CeraUploadBuffer {
    device_context: CeraDeviceContext,
    page_size: u64,
    pages: Mutex<UploadBufferPages>,
}

// Mapped pointers are only written through allocations, which borrow the pager
unsafe impl Send for UploadPage {}

impl CeraUploadBuffer {
    pub fn new(
        device_context: &CeraDeviceContext,
        page_size: u64,
    ) -> Self {
        assert!(page_size > 0);
        CeraUploadBuffer {
            device_context: device_context.clone(),
            page_size,
            pages: Default::default(),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Bump-allocate `size` bytes aligned to `alignment` (a power of two). Moves on to a fresh page
    /// when the current one is full. Requests larger than a page are misuse and always fail.
    #[profiling::function]
    pub fn allocate(
        &self,
        size: u64,
        alignment: u64,
    ) -> CeraResult<CeraUploadAllocation<'_>> {
        if !cera_base::memory::is_power_of_two_u64(alignment) {
            return Err(CeraError::InvalidAlignment(alignment));
        }

        if size > self.page_size {
            log::error!(
                "Upload allocation of {} bytes exceeds the page size of {}",
                size,
                self.page_size
            );
            return Err(CeraError::AllocationExceedsPageSize {
                requested: size,
                page_size: self.page_size,
            });
        }

        let mut pages = self.pages.lock().unwrap();
        if let Some(current_page) = &mut pages.current_page {
            if let Some(offset) = current_page.try_allocate(size, alignment, self.page_size) {
                return Ok(Self::allocation_in(current_page, offset, size));
            }
        }

        let mut page = match pages.available_pages.pop() {
            Some(page) => page,
            None => {
                log::trace!(
                    "Creating upload page {} ({} bytes)",
                    pages.page_count(),
                    self.page_size
                );
                UploadPage::new(&self.device_context, self.page_size)?
            }
        };

        // An empty page always fits a request no larger than a page
        let offset = page
            .try_allocate(size, alignment, self.page_size)
            .ok_or("Upload allocation does not fit in an empty page")?;
        let allocation = Self::allocation_in(&page, offset, size);

        if let Some(full_page) = pages.current_page.replace(page) {
            pages.in_flight_pages.push(full_page);
        }

        Ok(allocation)
    }

    fn allocation_in<'a>(
        page: &UploadPage,
        offset: u64,
        size: u64,
    ) -> CeraUploadAllocation<'a> {
        CeraUploadAllocation {
            cpu_pointer: unsafe { page.cpu_begin.add(offset as usize) },
            gpu_address: page.gpu_begin + offset,
            resource: page.resource.clone(),
            offset,
            size,
            phantom_data: PhantomData,
        }
    }

    /// Return every page to the available pool with its cursor rewound. Calling this while pages
    /// are already all available changes nothing.
    pub fn reset(&mut self) {
        let pages = self.pages.get_mut().unwrap();
        let in_flight_count = pages.in_flight_page_count();
        if in_flight_count > 0 {
            log::trace!("Resetting {} upload pages", in_flight_count);
        }

        let current_page = pages.current_page.take();
        for mut page in pages.in_flight_pages.drain(..).chain(current_page) {
            page.cursor = 0;
            pages.available_pages.push(page);
        }
    }

    /// Total pages owned by the pager
    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap().page_count()
    }

    pub fn available_page_count(&self) -> usize {
        self.pages.lock().unwrap().available_pages.len()
    }

    /// Pages written since the last reset, including the one being filled
    pub fn in_flight_page_count(&self) -> usize {
        self.pages.lock().unwrap().in_flight_page_count()
    }

    /// Bytes used in the page currently being filled
    pub fn current_page_cursor(&self) -> u64 {
        self.pages
            .lock()
            .unwrap()
            .current_page
            .as_ref()
            .map_or(0, |x| x.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cera_api::CeraApi;

    fn create_api() -> CeraApi {
        let _ = env_logger::builder().is_test(true).try_init();
        CeraApi::new_null(&Default::default(), &Default::default()).unwrap()
    }

    #[test]
    fn test_allocations_bump_and_align() {
        let api = create_api();
        let upload_buffer = CeraUploadBuffer::new(&api.device_context(), 1024);

        let a = upload_buffer.allocate(10, 4).unwrap();
        let b = upload_buffer.allocate(16, 256).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 256);
        assert_eq!(b.gpu_address(), a.gpu_address() + 256);
        assert_eq!(b.cpu_pointer() as usize, a.cpu_pointer() as usize + 256);
        assert_eq!(upload_buffer.current_page_cursor(), 272);
        assert_eq!(upload_buffer.page_count(), 1);
    }

    #[test]
    fn test_full_page_moves_to_in_flight() {
        let api = create_api();
        let mut upload_buffer = CeraUploadBuffer::new(&api.device_context(), 256);

        upload_buffer.allocate(200, 1).unwrap();
        let second = upload_buffer.allocate(100, 1).unwrap();
        assert_eq!(second.offset(), 0);
        assert_eq!(upload_buffer.page_count(), 2);
        assert_eq!(upload_buffer.in_flight_page_count(), 2);
        assert_eq!(upload_buffer.available_page_count(), 0);

        upload_buffer.reset();
        assert_eq!(upload_buffer.available_page_count(), 2);
        assert_eq!(upload_buffer.in_flight_page_count(), 0);

        // Pages are reused rather than created
        upload_buffer.allocate(256, 1).unwrap();
        upload_buffer.allocate(256, 1).unwrap();
        assert_eq!(upload_buffer.page_count(), 2);
    }

    #[test]
    fn test_reset_when_idle_changes_nothing() {
        let api = create_api();
        let mut upload_buffer = CeraUploadBuffer::new(&api.device_context(), 128);
        upload_buffer.allocate(64, 1).unwrap();
        upload_buffer.allocate(128, 1).unwrap();
        upload_buffer.reset();

        let page_count = upload_buffer.page_count();
        let available = upload_buffer.available_page_count();
        upload_buffer.reset();
        upload_buffer.reset();
        assert_eq!(upload_buffer.page_count(), page_count);
        assert_eq!(upload_buffer.available_page_count(), available);
        assert_eq!(upload_buffer.current_page_cursor(), 0);
        assert!(upload_buffer
            .pages
            .lock()
            .unwrap()
            .available_pages
            .iter()
            .all(|x| x.cursor == 0));
    }

    #[test]
    fn test_oversized_and_misaligned_requests_fail() {
        let api = create_api();
        let upload_buffer = CeraUploadBuffer::new(&api.device_context(), 64);

        match upload_buffer.allocate(65, 1) {
            Err(CeraError::AllocationExceedsPageSize {
                requested,
                page_size,
            }) => assert_eq!((requested, page_size), (65, 64)),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            upload_buffer.allocate(4, 3),
            Err(CeraError::InvalidAlignment(3))
        ));
        assert!(matches!(
            upload_buffer.allocate(4, 0),
            Err(CeraError::InvalidAlignment(0))
        ));
        assert_eq!(upload_buffer.page_count(), 0);
    }

    #[test]
    fn test_write_lands_in_page_memory() {
        let api = create_api();
        let upload_buffer = CeraUploadBuffer::new(&api.device_context(), 256);
        upload_buffer.allocate(8, 1).unwrap();
        let allocation = upload_buffer.allocate(4, 4).unwrap();
        allocation.write(&[1, 2, 3, 4]).unwrap();
        assert!(allocation.write(&[0; 5]).is_err());

        let bytes = allocation
            .resource()
            .null_raw_resource()
            .unwrap()
            .read_memory(allocation.offset(), 4)
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_live_allocations_never_share_memory() {
        let api = create_api();
        let mut upload_buffer = CeraUploadBuffer::new(&api.device_context(), 256);

        {
            let old = upload_buffer.allocate(4, 4).unwrap();
            let fresh = upload_buffer.allocate(4, 4).unwrap();
            assert_ne!(old.cpu_pointer(), fresh.cpu_pointer());
            fresh.write(&[1; 4]).unwrap();
            old.write(&[9; 4]).unwrap();

            let bytes = fresh
                .resource()
                .null_raw_resource()
                .unwrap()
                .read_memory(fresh.offset(), 4)
                .unwrap();
            assert_eq!(bytes, vec![1; 4]);
        }

        // Only reachable once every allocation is gone, the memory is then handed out again
        upload_buffer.reset();
        let reused = upload_buffer.allocate(4, 4).unwrap();
        assert_eq!(reused.offset(), 0);
        assert_eq!(upload_buffer.page_count(), 1);
    }
}
