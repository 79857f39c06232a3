use cera_api::{
    CeraCpuDescriptorHandle, CeraDescriptorHeap, CeraDescriptorHeapDef, CeraDescriptorHeapType,
    CeraDeviceContext, CeraError, CeraGpuDescriptorHandle, CeraResult,
};
use cera_base::RetireQueue;
use crossbeam_channel::{Receiver, Sender};
use fnv::FnvHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// Shared by every allocator so an allocation can never match another allocator's records
static NEXT_DESCRIPTOR_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_DESCRIPTOR_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(1);

/// A contiguous range of descriptors in one heap page. Handles inside the range stay valid until
/// the range is released, pages are never moved or compacted.
#[derive(Clone, Debug)]
pub struct CeraDescriptorAllocation {
    allocator_id: u64,
    allocation_id: u64,
    heap_type: CeraDescriptorHeapType,
    page_index: usize,
    offset: u32,
    count: u32,
    heap: CeraDescriptorHeap,
}

impl CeraDescriptorAllocation {
    pub fn heap_type(&self) -> CeraDescriptorHeapType {
        self.heap_type
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn heap(&self) -> &CeraDescriptorHeap {
        &self.heap
    }

    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> CeraCpuDescriptorHandle {
        assert!(index < self.count);
        self.heap.cpu_handle(self.offset + index)
    }

    /// None unless the allocation came from a shader-visible allocator
    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<CeraGpuDescriptorHandle> {
        assert!(index < self.count);
        self.heap.gpu_handle(self.offset + index)
    }
}

/// An allocation that retires itself to its allocator when dropped. Views own one of these.
pub struct CeraOwnedDescriptors {
    // Only None after drop
    allocation: Option<CeraDescriptorAllocation>,
    drop_tx: Sender<CeraDescriptorAllocation>,
}

impl CeraOwnedDescriptors {
    pub fn allocation(&self) -> &CeraDescriptorAllocation {
        self.allocation.as_ref().unwrap()
    }

    pub fn cpu_handle(
        &self,
        index: u32,
    ) -> CeraCpuDescriptorHandle {
        self.allocation().cpu_handle(index)
    }

    pub fn gpu_handle(
        &self,
        index: u32,
    ) -> Option<CeraGpuDescriptorHandle> {
        self.allocation().gpu_handle(index)
    }
}

impl std::fmt::Debug for CeraOwnedDescriptors {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CeraOwnedDescriptors")
            .field("allocation", &self.allocation)
            .finish()
    }
}

impl Drop for CeraOwnedDescriptors {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            // The allocator may already be gone during shutdown, nothing left to return to
            let _ = self.drop_tx.send(allocation);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FreeRange {
    offset: u32,
    count: u32,
}

struct DescriptorPage {
    heap: CeraDescriptorHeap,
    // Sorted by offset, adjacent ranges are always merged
    free_ranges: Vec<FreeRange>,
    // Offset of each handed out range to the id of the allocation that owns it. Removed when the
    // range is freed, before it is retired.
    outstanding: FnvHashMap<u32, u64>,
}

impl DescriptorPage {
    fn new(heap: CeraDescriptorHeap) -> Self {
        let descriptor_count = heap.descriptor_count();
        DescriptorPage {
            heap,
            free_ranges: vec![FreeRange {
                offset: 0,
                count: descriptor_count,
            }],
            outstanding: Default::default(),
        }
    }

    fn capacity(&self) -> u32 {
        self.heap.descriptor_count()
    }

    fn free_count(&self) -> u32 {
        self.free_ranges.iter().map(|x| x.count).sum()
    }

    // First fit
    fn allocate(
        &mut self,
        count: u32,
    ) -> Option<u32> {
        let index = self.free_ranges.iter().position(|x| x.count >= count)?;
        let range = &mut self.free_ranges[index];
        let offset = range.offset;
        if range.count == count {
            self.free_ranges.remove(index);
        } else {
            range.offset += count;
            range.count -= count;
        }

        Some(offset)
    }

    // Returns false if any part of the range is already free or outside the page
    fn free(
        &mut self,
        offset: u32,
        count: u32,
    ) -> bool {
        let end = match offset.checked_add(count) {
            Some(end) if end <= self.capacity() => end,
            _ => return false,
        };

        let index = self.free_ranges.partition_point(|x| x.offset < offset);
        if index > 0 {
            let previous = self.free_ranges[index - 1];
            if previous.offset + previous.count > offset {
                return false;
            }
        }
        if let Some(next) = self.free_ranges.get(index) {
            if end > next.offset {
                return false;
            }
        }

        let merges_previous = index > 0 && {
            let previous = self.free_ranges[index - 1];
            previous.offset + previous.count == offset
        };
        let merges_next = self
            .free_ranges
            .get(index)
            .map_or(false, |next| next.offset == end);

        match (merges_previous, merges_next) {
            (true, true) => {
                let next = self.free_ranges.remove(index);
                self.free_ranges[index - 1].count += count + next.count;
            }
            (true, false) => {
                self.free_ranges[index - 1].count += count;
            }
            (false, true) => {
                let next = &mut self.free_ranges[index];
                next.offset = offset;
                next.count += count;
            }
            (false, false) => {
                self.free_ranges.insert(index, FreeRange { offset, count });
            }
        }

        true
    }
}

struct CeraDescriptorAllocatorInner {
    allocator_id: u64,
    device_context: CeraDeviceContext,
    shader_visible: bool,
    page_sizes: [u32; 4],
    pages: [Vec<DescriptorPage>; 4],
    retired: RetireQueue<CeraDescriptorAllocation>,
    current_frame: u64,
    drop_rx: Receiver<CeraDescriptorAllocation>,
}

impl CeraDescriptorAllocatorInner {
    fn allocation_in(
        &self,
        heap_type: CeraDescriptorHeapType,
        page_index: usize,
        offset: u32,
        count: u32,
        heap: CeraDescriptorHeap,
    ) -> CeraDescriptorAllocation {
        CeraDescriptorAllocation {
            allocator_id: self.allocator_id,
            allocation_id: NEXT_DESCRIPTOR_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed),
            heap_type,
            page_index,
            offset,
            count,
            heap,
        }
    }

    fn page_mut(
        &mut self,
        allocation: &CeraDescriptorAllocation,
    ) -> CeraResult<&mut DescriptorPage> {
        if allocation.allocator_id != self.allocator_id {
            return Err(format!(
                "Descriptor range {:?} page {} offset {} was not allocated by this allocator",
                allocation.heap_type, allocation.page_index, allocation.offset
            ))?;
        }

        self.pages[allocation.heap_type.index()]
            .get_mut(allocation.page_index)
            .ok_or_else(|| {
                format!(
                    "Descriptor page {} of {:?} does not exist",
                    allocation.page_index, allocation.heap_type
                )
                .into()
            })
    }

    // Stops tracking the range as handed out and queues it for release. Fails if the range is not
    // currently owned by this allocation, which covers freeing twice and freeing a stale copy of
    // a range that has since been handed out again.
    fn retire(
        &mut self,
        allocation: CeraDescriptorAllocation,
    ) -> CeraResult<()> {
        let page = self.page_mut(&allocation)?;
        if page.outstanding.get(&allocation.offset) != Some(&allocation.allocation_id) {
            log::error!(
                "Descriptor range freed while not allocated: {:?} page {} offset {} count {}",
                allocation.heap_type,
                allocation.page_index,
                allocation.offset,
                allocation.count
            );
            return Err(CeraError::DescriptorDoubleFree {
                heap_type: allocation.heap_type,
                page: allocation.page_index,
                offset: allocation.offset,
                count: allocation.count,
            });
        }

        page.outstanding.remove(&allocation.offset);
        let current_frame = self.current_frame;
        self.retired.retire(allocation, current_frame);
        Ok(())
    }

    // Allocations dropped since the last call are retired in the current frame. That is never
    // earlier than the frame they were actually dropped in.
    fn retire_dropped(&mut self) {
        let dropped: Vec<_> = self.drop_rx.try_iter().collect();
        for allocation in dropped {
            if let Err(e) = self.retire(allocation) {
                log::error!("Dropped descriptors could not be retired: {}", e);
            }
        }
    }

    fn release(
        &mut self,
        allocations: Vec<CeraDescriptorAllocation>,
    ) -> CeraResult<usize> {
        let mut first_error = None;
        let released_count = allocations.len();
        for allocation in allocations {
            let page = match self.page_mut(&allocation) {
                Ok(page) => page,
                Err(e) => {
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            if !page.free(allocation.offset, allocation.count) {
                log::error!(
                    "Descriptor range released twice: {:?} page {} offset {} count {}",
                    allocation.heap_type,
                    allocation.page_index,
                    allocation.offset,
                    allocation.count
                );
                if first_error.is_none() {
                    first_error = Some(CeraError::DescriptorDoubleFree {
                        heap_type: allocation.heap_type,
                        page: allocation.page_index,
                        offset: allocation.offset,
                        count: allocation.count,
                    });
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(released_count),
        }
    }
}

/// Hands out descriptor ranges from a growable set of fixed-size heap pages, one set per heap
/// type. Released ranges are held back for `release_delay_frames` completed frames because
/// command lists recorded before the release may still reference them.
///
/// Fragmentation is tolerated. Compacting would move descriptors that live handles point at.
#[derive(Clone)]
pub struct CeraDescriptorAllocator {
    inner: Arc<Mutex<CeraDescriptorAllocatorInner>>,
    drop_tx: Sender<CeraDescriptorAllocation>,
}

impl CeraDescriptorAllocator {
    /// `page_sizes` is indexed by `CeraDescriptorHeapType::index()`. Shader-visible allocators
    /// only serve CBV/SRV/UAV and sampler descriptors.
    pub fn new(
        device_context: &CeraDeviceContext,
        shader_visible: bool,
        page_sizes: [u32; 4],
        release_delay_frames: u64,
    ) -> Self {
        let (drop_tx, drop_rx) = crossbeam_channel::unbounded();
        let inner = CeraDescriptorAllocatorInner {
            allocator_id: NEXT_DESCRIPTOR_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            device_context: device_context.clone(),
            shader_visible,
            page_sizes,
            pages: Default::default(),
            retired: RetireQueue::new(release_delay_frames),
            current_frame: 0,
            drop_rx,
        };

        CeraDescriptorAllocator {
            inner: Arc::new(Mutex::new(inner)),
            drop_tx,
        }
    }

    pub fn is_shader_visible(&self) -> bool {
        self.inner.lock().unwrap().shader_visible
    }

    /// Find `count` contiguous free descriptors of `heap_type`, creating a new page if no existing
    /// page has room. A new page holds at least `count` descriptors.
    #[profiling::function]
    pub fn allocate(
        &self,
        heap_type: CeraDescriptorHeapType,
        count: u32,
    ) -> CeraResult<CeraDescriptorAllocation> {
        if count == 0 {
            return Err("Descriptor allocations must contain at least one descriptor")?;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.shader_visible && !heap_type.can_be_shader_visible() {
            return Err(format!(
                "{:?} descriptors can't be allocated from a shader-visible allocator",
                heap_type
            ))?;
        }

        let existing = inner.pages[heap_type.index()]
            .iter_mut()
            .enumerate()
            .find_map(|(page_index, page)| {
                page.allocate(count)
                    .map(|offset| (page_index, offset, page.heap.clone()))
            });
        if let Some((page_index, offset, heap)) = existing {
            let allocation = inner.allocation_in(heap_type, page_index, offset, count, heap);
            inner.pages[heap_type.index()][page_index]
                .outstanding
                .insert(offset, allocation.allocation_id);
            return Ok(allocation);
        }

        let descriptor_count = inner.page_sizes[heap_type.index()].max(count);
        let heap = inner
            .device_context
            .create_descriptor_heap(&CeraDescriptorHeapDef {
                heap_type,
                descriptor_count,
                shader_visible: inner.shader_visible,
            })?;

        let page_index = inner.pages[heap_type.index()].len();
        log::trace!(
            "Adding {:?} descriptor page {} with {} descriptors (shader visible: {})",
            heap_type,
            page_index,
            descriptor_count,
            heap.heap_def().shader_visible
        );

        let mut page = DescriptorPage::new(heap);
        let offset = page
            .allocate(count)
            .ok_or("New descriptor page could not hold the allocation")?;
        let allocation =
            inner.allocation_in(heap_type, page_index, offset, count, page.heap.clone());
        page.outstanding.insert(offset, allocation.allocation_id);
        inner.pages[heap_type.index()].push(page);

        Ok(allocation)
    }

    /// Same as `allocate`, but the range retires itself when dropped
    pub fn allocate_owned(
        &self,
        heap_type: CeraDescriptorHeapType,
        count: u32,
    ) -> CeraResult<CeraOwnedDescriptors> {
        let allocation = self.allocate(heap_type, count)?;
        Ok(CeraOwnedDescriptors {
            allocation: Some(allocation),
            drop_tx: self.drop_tx.clone(),
        })
    }

    /// Schedule the range to return to its page once enough frames have completed. Freeing a
    /// range that is not currently allocated to `allocation` (a second free, or a copy kept after
    /// the range was reused) is `DescriptorDoubleFree`, and nothing is changed.
    pub fn free(
        &self,
        allocation: CeraDescriptorAllocation,
    ) -> CeraResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.retire_dropped();
        inner.retire(allocation)
    }

    /// Ranges freed from now on are tagged with this frame
    pub fn set_current_frame(
        &self,
        frame_index: u64,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.retire_dropped();
        debug_assert!(frame_index >= inner.current_frame);
        inner.current_frame = frame_index;
    }

    /// Return every range retired at least `release_delay_frames` before
    /// `completed_frame_horizon` (the number of frames whose GPU work is complete) to its page.
    /// Returns the number of ranges released.
    #[profiling::function]
    pub fn release_stale(
        &self,
        completed_frame_horizon: u64,
    ) -> CeraResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.retire_dropped();
        let released = inner.retired.drain_released(completed_frame_horizon);
        inner.release(released)
    }

    /// Release everything regardless of frame. Only valid once the device is idle.
    pub fn release_all(&self) -> CeraResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.retire_dropped();
        let released = inner.retired.drain_all();
        inner.release(released)
    }

    pub fn page_count(
        &self,
        heap_type: CeraDescriptorHeapType,
    ) -> usize {
        self.inner.lock().unwrap().pages[heap_type.index()].len()
    }

    pub fn free_descriptor_count(
        &self,
        heap_type: CeraDescriptorHeapType,
    ) -> u32 {
        self.inner.lock().unwrap().pages[heap_type.index()]
            .iter()
            .map(|x| x.free_count())
            .sum()
    }

    /// Ranges that have been released but are still waiting for frames to complete
    pub fn stale_allocation_count(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.retire_dropped();
        inner.retired.len()
    }

    /// The heap pages of `heap_type`, in page order
    pub fn heaps(
        &self,
        heap_type: CeraDescriptorHeapType,
    ) -> Vec<CeraDescriptorHeap> {
        self.inner.lock().unwrap().pages[heap_type.index()]
            .iter()
            .map(|x| x.heap.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cera_api::CeraApi;

    fn create_allocator(
        api: &CeraApi,
        page_size: u32,
        release_delay_frames: u64,
    ) -> CeraDescriptorAllocator {
        CeraDescriptorAllocator::new(
            &api.device_context(),
            false,
            [page_size; 4],
            release_delay_frames,
        )
    }

    fn create_api() -> CeraApi {
        let _ = env_logger::builder().is_test(true).try_init();
        CeraApi::new_null(&Default::default(), &Default::default()).unwrap()
    }

    #[test]
    fn test_page_growth_keeps_existing_allocations() {
        let api = create_api();
        let allocator = create_allocator(&api, 8, 1);
        let heap_type = CeraDescriptorHeapType::CbvSrvUav;

        let first = allocator.allocate(heap_type, 6).unwrap();
        assert_eq!(allocator.page_count(heap_type), 1);
        let first_handle = first.cpu_handle(0);

        // Doesn't fit in the 2 remaining slots, exactly one new page
        let second = allocator.allocate(heap_type, 4).unwrap();
        assert_eq!(allocator.page_count(heap_type), 2);
        assert_eq!(second.page_index(), 1);
        assert_eq!(second.offset(), 0);

        // Fills the second page, then overflows into a third
        let _third = allocator.allocate(heap_type, 4).unwrap();
        assert_eq!(allocator.page_count(heap_type), 2);
        let fourth = allocator.allocate(heap_type, 5).unwrap();
        assert_eq!(allocator.page_count(heap_type), 3);
        assert_eq!(fourth.page_index(), 2);

        assert_eq!(first.page_index(), 0);
        assert_eq!(first.offset(), 0);
        assert_eq!(first.cpu_handle(0), first_handle);

        // The first page still has room for two
        let small = allocator.allocate(heap_type, 2).unwrap();
        assert_eq!(small.page_index(), 0);
        assert_eq!(small.offset(), 6);
    }

    #[test]
    fn test_oversized_allocation_gets_its_own_page() {
        let api = create_api();
        let allocator = create_allocator(&api, 4, 1);
        let allocation = allocator
            .allocate(CeraDescriptorHeapType::Sampler, 10)
            .unwrap();
        assert_eq!(allocation.heap().descriptor_count(), 10);
        assert_eq!(allocator.page_count(CeraDescriptorHeapType::Sampler), 1);
        assert_eq!(
            allocator.free_descriptor_count(CeraDescriptorHeapType::Sampler),
            0
        );
    }

    #[test]
    fn test_release_waits_for_frame_horizon() {
        let api = create_api();
        let allocator = create_allocator(&api, 16, 2);
        let heap_type = CeraDescriptorHeapType::Rtv;

        allocator.set_current_frame(5);
        let allocation = allocator.allocate(heap_type, 3).unwrap();
        allocator.free(allocation).unwrap();
        assert_eq!(allocator.free_descriptor_count(heap_type), 13);

        assert_eq!(allocator.release_stale(6).unwrap(), 0);
        assert_eq!(allocator.stale_allocation_count(), 1);
        assert_eq!(allocator.release_stale(7).unwrap(), 1);
        assert_eq!(allocator.free_descriptor_count(heap_type), 16);

        // Coalesced back into one range
        let whole_page = allocator.allocate(heap_type, 16).unwrap();
        assert_eq!(whole_page.page_index(), 0);
    }

    #[test]
    fn test_owned_descriptors_retire_on_drop() {
        let api = create_api();
        let allocator = create_allocator(&api, 16, 1);
        let heap_type = CeraDescriptorHeapType::CbvSrvUav;

        let owned = allocator.allocate_owned(heap_type, 4).unwrap();
        assert_eq!(owned.allocation().offset(), 0);
        drop(owned);

        assert_eq!(allocator.stale_allocation_count(), 1);
        assert_eq!(allocator.release_stale(1).unwrap(), 1);
        assert_eq!(allocator.allocate(heap_type, 1).unwrap().offset(), 0);
    }

    #[test]
    fn test_double_free_is_reported() {
        let api = create_api();
        let allocator = create_allocator(&api, 16, 1);
        let allocation = allocator
            .allocate(CeraDescriptorHeapType::Dsv, 2)
            .unwrap();

        allocator.free(allocation.clone()).unwrap();
        match allocator.free(allocation) {
            Err(CeraError::DescriptorDoubleFree {
                heap_type,
                page,
                offset,
                count,
            }) => {
                assert_eq!(heap_type, CeraDescriptorHeapType::Dsv);
                assert_eq!((page, offset, count), (0, 0, 2));
            }
            other => panic!("unexpected {:?}", other),
        }

        // Only the first free was queued
        assert_eq!(allocator.stale_allocation_count(), 1);
        assert_eq!(allocator.release_stale(1).unwrap(), 1);
        assert_eq!(
            allocator.free_descriptor_count(CeraDescriptorHeapType::Dsv),
            16
        );
    }

    #[test]
    fn test_stale_copy_cannot_free_reused_range() {
        let api = create_api();
        let allocator = create_allocator(&api, 16, 1);
        let heap_type = CeraDescriptorHeapType::CbvSrvUav;

        let a = allocator.allocate(heap_type, 1).unwrap();
        allocator.free(a.clone()).unwrap();
        assert_eq!(allocator.release_stale(1).unwrap(), 1);

        // The range is handed out again, the old copy no longer owns it
        let b = allocator.allocate(heap_type, 1).unwrap();
        assert_eq!((b.page_index(), b.offset()), (0, 0));
        assert!(matches!(
            allocator.free(a),
            Err(CeraError::DescriptorDoubleFree { offset: 0, .. })
        ));
        assert_eq!(allocator.release_stale(2).unwrap(), 0);

        let c = allocator.allocate(heap_type, 1).unwrap();
        assert_eq!(c.offset(), 1);

        // The real owner can still free it
        allocator.free(b).unwrap();
    }

    #[test]
    fn test_allocation_from_other_allocator_is_rejected() {
        let api = create_api();
        let heap_type = CeraDescriptorHeapType::Sampler;
        let first = create_allocator(&api, 4, 1);
        let second = create_allocator(&api, 4, 1);

        let _filler = first.allocate(heap_type, 4).unwrap();
        let foreign = first.allocate(heap_type, 1).unwrap();
        assert_eq!(foreign.page_index(), 1);

        assert!(second.free(foreign.clone()).is_err());
        assert_eq!(second.stale_allocation_count(), 0);
        assert_eq!(second.release_stale(1).unwrap(), 0);

        // Neither allocator was disturbed
        assert_eq!(second.allocate(heap_type, 1).unwrap().offset(), 0);
        first.free(foreign).unwrap();
        assert_eq!(first.release_stale(1).unwrap(), 1);
    }

    #[test]
    fn test_dropped_copy_after_manual_free_is_ignored() {
        let api = create_api();
        let allocator = create_allocator(&api, 16, 1);
        let heap_type = CeraDescriptorHeapType::Rtv;

        let owned = allocator.allocate_owned(heap_type, 2).unwrap();
        allocator.free(owned.allocation().clone()).unwrap();
        drop(owned);

        assert_eq!(allocator.stale_allocation_count(), 1);
        assert_eq!(allocator.release_stale(1).unwrap(), 1);
        assert_eq!(allocator.free_descriptor_count(heap_type), 16);
    }

    #[test]
    fn test_shader_visible_allocator() {
        let api = create_api();
        let allocator =
            CeraDescriptorAllocator::new(&api.device_context(), true, [64, 16, 16, 16], 1);
        let allocation = allocator
            .allocate(CeraDescriptorHeapType::CbvSrvUav, 2)
            .unwrap();
        assert!(allocation.gpu_handle(1).is_some());
        assert!(allocator
            .allocate(CeraDescriptorHeapType::Rtv, 1)
            .is_err());
        assert!(allocator
            .allocate(CeraDescriptorHeapType::CbvSrvUav, 0)
            .is_err());
    }

    #[test]
    fn test_page_free_list_coalesces() {
        let api = create_api();
        let heap = api
            .device_context()
            .create_descriptor_heap(&CeraDescriptorHeapDef {
                heap_type: CeraDescriptorHeapType::CbvSrvUav,
                descriptor_count: 10,
                shader_visible: false,
            })
            .unwrap();

        let mut page = DescriptorPage::new(heap);
        let a = page.allocate(3).unwrap();
        let b = page.allocate(3).unwrap();
        let c = page.allocate(3).unwrap();
        assert_eq!((a, b, c), (0, 3, 6));

        assert!(page.free(a, 3));
        assert!(page.free(c, 3));
        assert_eq!(page.free_ranges.len(), 2);
        assert!(page.free(b, 3));
        assert_eq!(
            page.free_ranges,
            vec![FreeRange {
                offset: 0,
                count: 10
            }]
        );

        // Out of range and overlapping frees are rejected
        assert!(!page.free(8, 4));
        assert!(!page.free(2, 1));
    }
}
