//! Bounded read-through cache of recent headers.

use std::collections::BTreeMap;
use std::ops::RangeBounds;

use crate::header::BlockHeader;

/// Keeps at most `capacity` headers keyed by height. When full, the lowest
/// height is evicted first.
#[derive(Debug, Clone)]
pub struct HeaderCache {
    capacity: usize,
    entries: BTreeMap<u32, BlockHeader>,
}

impl HeaderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, height: u32) -> Option<BlockHeader> {
        self.entries.get(&height).copied()
    }

    pub fn insert(&mut self, height: u32, header: BlockHeader) {
        if self.capacity == 0 {
            return;
        }
        self.entries.insert(height, header);
        while self.entries.len() > self.capacity {
            self.entries.pop_first();
        }
    }

    /// Drops every cached height in `range`.
    pub fn invalidate(&mut self, range: impl RangeBounds<u32>) {
        self.entries.retain(|height, _| !range.contains(height));
    }

    /// Drops every cached height at or above `height`.
    pub fn invalidate_from(&mut self, height: u32) {
        self.entries.split_off(&height);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
