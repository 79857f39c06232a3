use std::collections::VecDeque;

struct RetiredValue<T> {
    value: T,
    retired_in_frame: u64,
}

/// Holds values that may still be referenced by in-flight GPU work until enough frames have
/// completed. Values are retired in non-decreasing frame order, so the ones that can be released
/// first are always at the front.
pub struct RetireQueue<T> {
    retired: VecDeque<RetiredValue<T>>,
    release_delay_frames: u64,
}

impl<T> RetireQueue<T> {
    /// `release_delay_frames` is how many frames past the retiring frame must complete before the
    /// value is handed back. A delay of 1 releases a value as soon as the frame it was retired in
    /// has completed.
    pub fn new(release_delay_frames: u64) -> Self {
        RetireQueue {
            retired: Default::default(),
            release_delay_frames,
        }
    }

    pub fn release_delay_frames(&self) -> u64 {
        self.release_delay_frames
    }

    pub fn len(&self) -> usize {
        self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retired.is_empty()
    }

    pub fn retire(
        &mut self,
        value: T,
        retired_in_frame: u64,
    ) {
        if let Some(last) = self.retired.back() {
            // Retiring out of order would let a later value block an earlier one
            debug_assert!(last.retired_in_frame <= retired_in_frame);
        }

        self.retired.push_back(RetiredValue {
            value,
            retired_in_frame,
        });
    }

    /// Remove every value whose retiring frame is at least `release_delay_frames` behind
    /// `completed_frame_horizon`, the count of frames whose GPU work is known complete.
    pub fn drain_released(
        &mut self,
        completed_frame_horizon: u64,
    ) -> Vec<T> {
        let mut released_count = 0;
        for retired in &self.retired {
            if retired.retired_in_frame + self.release_delay_frames <= completed_frame_horizon {
                released_count += 1;
            } else {
                break;
            }
        }

        self.retired
            .drain(0..released_count)
            .map(|retired| retired.value)
            .collect()
    }

    /// Remove everything regardless of frame. Only valid when the device is idle.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.retired.drain(..).map(|retired| retired.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_after_delay() {
        let mut queue = RetireQueue::new(2);
        queue.retire('a', 0);
        queue.retire('b', 1);
        queue.retire('c', 1);

        assert!(queue.drain_released(1).is_empty());
        assert_eq!(queue.drain_released(2), vec!['a']);
        assert_eq!(queue.drain_released(3), vec!['b', 'c']);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_all() {
        let mut queue = RetireQueue::new(100);
        queue.retire(1, 5);
        queue.retire(2, 6);
        assert_eq!(queue.drain_all(), vec![1, 2]);
        assert!(queue.is_empty());
    }
}
