//! Fixed-capacity set of recent timestamps.

use std::collections::{HashSet, VecDeque};

/// Remembers the most recent `capacity` timestamps; inserting beyond that
/// forgets the oldest one.
#[derive(Debug, Clone)]
pub struct RecentTimestamps {
    capacity: usize,
    order: VecDeque<u64>,
    members: HashSet<u64>,
}

impl RecentTimestamps {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `false` if `timestamp` was already present.
    pub fn insert(&mut self, timestamp: u64) -> bool {
        if !self.members.insert(timestamp) {
            return false;
        }
        self.order.push_back(timestamp);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.members.contains(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentTimestamps {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
