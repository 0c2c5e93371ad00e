//! Fixed-capacity collection keeping the smallest items seen.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K: Ord, V> PartialEq for Entry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Ord, V> Eq for Entry<K, V> {}

impl<K: Ord, V> PartialOrd for Entry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> Ord for Entry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Keeps the `capacity` entries with the smallest keys. The heap is a max-heap, so
/// the current worst entry is on top and is evicted in O(log n).
pub struct BoundedQueue<K: Ord, V> {
    capacity: usize,
    heap: BinaryHeap<Entry<K, V>>,
}

impl<K: Ord, V> BoundedQueue<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1024)),
        }
    }

    pub fn push(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Entry { key, value });
            return;
        }
        if let Some(mut worst) = self.heap.peek_mut() {
            if key < worst.key {
                *worst = Entry { key, value };
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Values in ascending key order.
    pub fn into_sorted_vec(self) -> Vec<V> {
        self.heap.into_sorted_vec().into_iter().map(|e| e.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_smallest() {
        let mut queue = BoundedQueue::new(3);
        for (key, value) in [(5, "e"), (1, "a"), (4, "d"), (2, "b"), (3, "c")] {
            queue.push(key, value);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.into_sorted_vec(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut queue = BoundedQueue::new(0);
        queue.push(1, ());
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn matches_sort_and_truncate(keys in proptest::collection::vec(0u32..1000, 0..100), n in 0usize..20) {
            let mut queue = BoundedQueue::new(n);
            for k in &keys {
                queue.push(*k, *k);
            }
            let mut expected = keys.clone();
            expected.sort_unstable();
            expected.truncate(n);
            prop_assert_eq!(queue.into_sorted_vec(), expected);
        }
    }
}
