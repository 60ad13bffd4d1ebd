//! Expiration Heap Module
//!
//! Binary min-heap of arena slots ordered by entry deadline.

use tokio::time::Instant;

// == Heap Slots ==
/// Storage the heap orders and reports positions back to.
///
/// The heap only holds slot numbers. Deadlines live in the storage, and every
/// move inside the heap is written back through `set_heap_index` so that an
/// entry always knows where it sits.
pub(crate) trait HeapSlots {
    /// Deadline of the entry in `slot`, None for a vacant slot.
    fn deadline(&self, slot: usize) -> Option<Instant>;

    /// Records the heap position of the entry in `slot`.
    fn set_heap_index(&mut self, slot: usize, index: Option<usize>);
}

// == Expiration Heap ==
/// Min-heap answering "which entry expires soonest".
///
/// Every operation taking a position treats an index at or past the current
/// size as a no-op. A racing expiration task can hand in a position that a
/// purge already invalidated, and that must not fault.
#[derive(Debug, Default)]
pub(crate) struct ExpirationHeap {
    nodes: Vec<usize>,
}

impl ExpirationHeap {
    // == Constructor ==
    /// Creates an empty heap with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    // == Length ==
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Heap contents in array order.
    #[cfg(test)]
    pub fn as_slice(&self) -> &[usize] {
        &self.nodes
    }

    // == Peek Min ==
    /// Returns the slot with the earliest deadline without removing it.
    #[cfg(test)]
    pub fn peek_min(&self) -> Option<usize> {
        self.nodes.first().copied()
    }

    // == Push ==
    /// Inserts `slot` and records its position.
    pub fn push<S: HeapSlots>(&mut self, slots: &mut S, slot: usize) {
        let index = self.nodes.len();
        self.nodes.push(slot);
        slots.set_heap_index(slot, Some(index));
        self.sift_up(slots, index);
    }

    // == Pop Min ==
    /// Removes and returns the slot with the earliest deadline.
    pub fn pop_min<S: HeapSlots>(&mut self, slots: &mut S) -> Option<usize> {
        self.remove_at(slots, 0)
    }

    // == Fix ==
    /// Restores heap order after the deadline at `index` changed in place.
    pub fn fix<S: HeapSlots>(&mut self, slots: &mut S, index: usize) {
        if index >= self.nodes.len() {
            return;
        }
        if !self.sift_down(slots, index) {
            self.sift_up(slots, index);
        }
    }

    // == Remove At ==
    /// Removes the element at `index`, not necessarily the root.
    ///
    /// The last element takes its place and is re-heapified. The removed
    /// slot's position is reset to None.
    pub fn remove_at<S: HeapSlots>(&mut self, slots: &mut S, index: usize) -> Option<usize> {
        let last = self.nodes.len().checked_sub(1)?;
        if index > last {
            return None;
        }
        if index != last {
            self.swap(slots, index, last);
        }
        let removed = self.nodes.pop()?;
        slots.set_heap_index(removed, None);
        self.fix(slots, index);
        Some(removed)
    }

    // == Clear ==
    /// Empties the heap, invalidating the position of every member first.
    pub fn clear<S: HeapSlots>(&mut self, slots: &mut S) {
        for slot in self.nodes.drain(..) {
            slots.set_heap_index(slot, None);
        }
    }

    fn less<S: HeapSlots>(&self, slots: &S, i: usize, j: usize) -> bool {
        slots.deadline(self.nodes[i]) < slots.deadline(self.nodes[j])
    }

    fn swap<S: HeapSlots>(&mut self, slots: &mut S, i: usize, j: usize) {
        self.nodes.swap(i, j);
        slots.set_heap_index(self.nodes[i], Some(i));
        slots.set_heap_index(self.nodes[j], Some(j));
    }

    fn sift_up<S: HeapSlots>(&mut self, slots: &mut S, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.less(slots, index, parent) {
                break;
            }
            self.swap(slots, index, parent);
            index = parent;
        }
    }

    /// Returns true if the element moved.
    fn sift_down<S: HeapSlots>(&mut self, slots: &mut S, start: usize) -> bool {
        let len = self.nodes.len();
        let mut index = start;
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(slots, right, left) {
                right
            } else {
                left
            };
            if !self.less(slots, child, index) {
                break;
            }
            self.swap(slots, index, child);
            index = child;
        }
        index > start
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Deadlines indexed by slot, plus the positions the heap reported.
    struct Slots {
        deadlines: Vec<Instant>,
        positions: Vec<Option<usize>>,
    }

    impl Slots {
        fn new(offsets_ms: &[u64]) -> Self {
            let base = Instant::now();
            Self {
                deadlines: offsets_ms
                    .iter()
                    .map(|ms| base + Duration::from_millis(*ms))
                    .collect(),
                positions: vec![None; offsets_ms.len()],
            }
        }
    }

    impl HeapSlots for Slots {
        fn deadline(&self, slot: usize) -> Option<Instant> {
            self.deadlines.get(slot).copied()
        }

        fn set_heap_index(&mut self, slot: usize, index: Option<usize>) {
            self.positions[slot] = index;
        }
    }

    fn assert_consistent(heap: &ExpirationHeap, slots: &Slots) {
        for (index, &slot) in heap.as_slice().iter().enumerate() {
            assert_eq!(slots.positions[slot], Some(index), "slot {slot} misplaced");
            if index > 0 {
                let parent = heap.as_slice()[(index - 1) / 2];
                assert!(slots.deadlines[parent] <= slots.deadlines[slot]);
            }
        }
    }

    fn filled(offsets_ms: &[u64]) -> (ExpirationHeap, Slots) {
        let mut slots = Slots::new(offsets_ms);
        let mut heap = ExpirationHeap::with_capacity(offsets_ms.len());
        for slot in 0..offsets_ms.len() {
            heap.push(&mut slots, slot);
        }
        (heap, slots)
    }

    #[test]
    fn test_heap_new() {
        let heap = ExpirationHeap::with_capacity(4);
        assert!(heap.is_empty());
        assert_eq!(heap.peek_min(), None);
    }

    #[test]
    fn test_push_tracks_minimum() {
        let (heap, slots) = filled(&[50, 10, 40, 30, 20]);

        assert_eq!(heap.len(), 5);
        assert_eq!(heap.peek_min(), Some(1));
        assert_consistent(&heap, &slots);
    }

    #[test]
    fn test_pop_min_in_deadline_order() {
        let (mut heap, mut slots) = filled(&[50, 10, 40, 30, 20]);

        let mut order = Vec::new();
        while let Some(slot) = heap.pop_min(&mut slots) {
            assert_eq!(slots.positions[slot], None);
            assert_consistent(&heap, &slots);
            order.push(slot);
        }
        assert_eq!(order, vec![1, 4, 3, 2, 0]);
    }

    #[test]
    fn test_pop_empty_heap() {
        let mut slots = Slots::new(&[1]);
        let mut heap = ExpirationHeap::default();
        heap.push(&mut slots, 0);

        assert_eq!(heap.pop_min(&mut slots), Some(0));
        assert_eq!(heap.pop_min(&mut slots), None);
    }

    #[test]
    fn test_fix_after_deadline_moves_later() {
        let (mut heap, mut slots) = filled(&[10, 20, 30, 40]);

        slots.deadlines[0] += Duration::from_millis(100);
        let index = slots.positions[0].unwrap();
        heap.fix(&mut slots, index);

        assert_eq!(heap.peek_min(), Some(1));
        assert_consistent(&heap, &slots);
    }

    #[test]
    fn test_fix_after_deadline_moves_earlier() {
        let (mut heap, mut slots) = filled(&[10, 20, 30, 40]);

        slots.deadlines[3] -= Duration::from_millis(35);
        let index = slots.positions[3].unwrap();
        heap.fix(&mut slots, index);

        assert_eq!(heap.peek_min(), Some(3));
        assert_consistent(&heap, &slots);
    }

    #[test]
    fn test_remove_at_middle() {
        let (mut heap, mut slots) = filled(&[10, 20, 30, 40, 50, 60]);

        let index = slots.positions[2].unwrap();
        assert_eq!(heap.remove_at(&mut slots, index), Some(2));

        assert_eq!(heap.len(), 5);
        assert_eq!(slots.positions[2], None);
        assert!(!heap.as_slice().contains(&2));
        assert_consistent(&heap, &slots);
    }

    #[test]
    fn test_remove_at_last() {
        let (mut heap, mut slots) = filled(&[10, 20, 30]);

        let last = heap.len() - 1;
        let slot = heap.as_slice()[last];
        assert_eq!(heap.remove_at(&mut slots, last), Some(slot));
        assert_consistent(&heap, &slots);
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let (mut heap, mut slots) = filled(&[10, 20]);

        assert_eq!(heap.remove_at(&mut slots, 2), None);
        assert_eq!(heap.remove_at(&mut slots, usize::MAX), None);
        heap.fix(&mut slots, 5);

        assert_eq!(heap.len(), 2);
        assert_consistent(&heap, &slots);

        let mut empty = ExpirationHeap::default();
        assert_eq!(empty.remove_at(&mut slots, 0), None);
    }

    #[test]
    fn test_clear_invalidates_positions() {
        let (mut heap, mut slots) = filled(&[10, 20, 30]);

        heap.clear(&mut slots);

        assert!(heap.is_empty());
        assert!(slots.positions.iter().all(Option::is_none));
    }

    #[test]
    fn test_equal_deadlines() {
        let (mut heap, mut slots) = filled(&[10, 10, 10]);

        let mut popped = Vec::new();
        while let Some(slot) = heap.pop_min(&mut slots) {
            popped.push(slot);
        }
        popped.sort_unstable();
        assert_eq!(popped, vec![0, 1, 2]);
    }
}
