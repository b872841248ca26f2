use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// Append-only log that keeps at most `capacity` items, evicting the oldest.
///
/// Iteration order is always chronological (oldest first).
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an item. Returns the evicted item when the log was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The most recent `n` items, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    /// Items from position `since` onward; empty when out of range.
    pub fn since(&self, since: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(since)
    }
}

impl<T: Serialize> Serialize for BoundedLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut log = BoundedLog::new(3);
        assert!(log.push(1).is_none());
        assert!(log.push(2).is_none());
        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut log = BoundedLog::new(3);
        for i in 1..=5 {
            log.push(i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut log = BoundedLog::new(2);
        log.push("a");
        log.push("b");
        assert_eq!(log.push("c"), Some("a"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = BoundedLog::new(0);
        assert_eq!(log.push(7), Some(7));
        assert!(log.is_empty());
    }

    #[test]
    fn test_last_n() {
        let mut log = BoundedLog::new(10);
        for i in 0..6 {
            log.push(i);
        }
        assert_eq!(log.last_n(2).copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(log.last_n(50).count(), 6);
    }

    #[test]
    fn test_since_out_of_range_is_empty() {
        let mut log = BoundedLog::new(10);
        log.push(1);
        log.push(2);
        assert_eq!(log.since(0).copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(log.since(1).copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(log.since(2).count(), 0);
        assert_eq!(log.since(99).count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut log = BoundedLog::new(4);
        log.push(1);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 4);
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut log = BoundedLog::new(2);
        log.push(1);
        log.push(2);
        log.push(3);
        assert_eq!(serde_json::to_string(&log).unwrap(), "[2,3]");
    }
}
