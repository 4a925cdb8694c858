//! Bounded status log
//!
//! Holds the most recent human-readable status lines for the polling page.
//! Once the buffer is full, each push drops the oldest entry.

use parking_lot::Mutex;
use std::collections::VecDeque;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl LogBuffer {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, entry: impl Into<String>) {
        let mut entries = self.entries.lock();
        entries.push_back(entry.into());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Point-in-time copy in insertion order
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
