use std::fmt;

const MIN_SLOT_CAPACITY: usize = 16;

/// Identifies a value stored in `ResourceSlots`. The generation is bumped each time a slot is
/// freed, so a stale key never aliases a value that later reuses the same index.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceSlotKey {
    index: u32,
    generation: u32,
}

impl ResourceSlotKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ResourceSlotKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Growable table of values addressed by generational keys. Free slots are tracked with a flag per
/// slot and searched starting from the most recently freed/allocated position.
pub struct ResourceSlots<T> {
    values: Vec<Option<T>>,
    generations: Vec<u32>,
    free_flags: Vec<bool>,
    search_start: usize,
    allocated_count: usize,
}

impl<T> Default for ResourceSlots<T> {
    fn default() -> Self {
        Self::with_capacity(MIN_SLOT_CAPACITY)
    }
}

impl<T> ResourceSlots<T> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = ResourceSlots {
            values: Vec::new(),
            generations: Vec::new(),
            free_flags: Vec::new(),
            search_start: 0,
            allocated_count: 0,
        };
        slots.resize(capacity.max(1));
        slots
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.allocated_count
    }

    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Store a value in a free slot, growing the table if every slot is occupied. After a resize
    /// the search is repeated, the new tail is guaranteed to contain free slots.
    pub fn alloc_slot(
        &mut self,
        value: T,
    ) -> ResourceSlotKey {
        let index = loop {
            if let Some(index) = self.find_free_slot() {
                break index;
            }

            let new_capacity = (self.capacity() * 2).max(MIN_SLOT_CAPACITY);
            log::trace!(
                "ResourceSlots full, growing {} -> {}",
                self.capacity(),
                new_capacity
            );
            self.resize(new_capacity);
        };

        self.free_flags[index] = false;
        self.values[index] = Some(value);
        self.allocated_count += 1;
        self.search_start = (index + 1) % self.capacity();

        ResourceSlotKey {
            index: index as u32,
            generation: self.generations[index],
        }
    }

    /// Release the slot, returning the value. Returns None if the key is stale or was never
    /// allocated.
    pub fn free_slot(
        &mut self,
        key: ResourceSlotKey,
    ) -> Option<T> {
        if !self.is_live(key) {
            return None;
        }

        let index = key.index as usize;
        let value = self.values[index].take();
        self.free_flags[index] = true;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.allocated_count -= 1;
        self.search_start = index;
        value
    }

    pub fn get(
        &self,
        key: ResourceSlotKey,
    ) -> Option<&T> {
        if self.is_live(key) {
            self.values[key.index as usize].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(
        &mut self,
        key: ResourceSlotKey,
    ) -> Option<&mut T> {
        if self.is_live(key) {
            self.values[key.index as usize].as_mut()
        } else {
            None
        }
    }

    pub fn contains(
        &self,
        key: ResourceSlotKey,
    ) -> bool {
        self.is_live(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceSlotKey, &T)> {
        let generations = &self.generations;
        self.values
            .iter()
            .enumerate()
            .filter_map(move |(index, value)| {
                value.as_ref().map(|value| {
                    (
                        ResourceSlotKey {
                            index: index as u32,
                            generation: generations[index],
                        },
                        value,
                    )
                })
            })
    }

    fn is_live(
        &self,
        key: ResourceSlotKey,
    ) -> bool {
        let index = key.index as usize;
        index < self.capacity()
            && !self.free_flags[index]
            && self.generations[index] == key.generation
    }

    fn find_free_slot(&self) -> Option<usize> {
        let capacity = self.capacity();
        (0..capacity)
            .map(|offset| (self.search_start + offset) % capacity)
            .find(|&index| self.free_flags[index])
    }

    fn resize(
        &mut self,
        new_capacity: usize,
    ) {
        debug_assert!(new_capacity >= self.capacity());
        self.values.resize_with(new_capacity, || None);
        self.generations.resize(new_capacity, 0);
        self.free_flags.resize(new_capacity, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut slots = ResourceSlots::with_capacity(4);
        let a = slots.alloc_slot("a");
        let b = slots.alloc_slot("b");
        assert_ne!(a, b);
        assert_eq!(slots.get(a), Some(&"a"));
        assert_eq!(slots.get(b), Some(&"b"));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn test_full_table_grows_and_retries() {
        let mut slots = ResourceSlots::with_capacity(2);
        let keys: Vec<_> = (0..5).map(|i| slots.alloc_slot(i)).collect();
        assert!(slots.capacity() >= 5);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(slots.get(*key), Some(&i));
        }

        // Every key points at a distinct slot
        let mut indices: Vec<_> = keys.iter().map(|k| k.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 5);
    }

    #[test]
    fn test_stale_key_rejected_after_reuse() {
        let mut slots = ResourceSlots::with_capacity(1);
        let first = slots.alloc_slot(1);
        assert_eq!(slots.free_slot(first), Some(1));
        assert_eq!(slots.free_slot(first), None);

        let second = slots.alloc_slot(2);
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(slots.get(first), None);
        assert_eq!(slots.get(second), Some(&2));
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut slots = ResourceSlots::with_capacity(4);
        let a = slots.alloc_slot('a');
        let _b = slots.alloc_slot('b');
        slots.free_slot(a);
        let values: Vec<_> = slots.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!['b']);
    }
}
