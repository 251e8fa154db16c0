//! Fixed-capacity FIFO of pending sync-callback ids.

use wlfuzz_core::error::{Result, WlFuzzError};

pub const SYNC_RING_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct SyncRing {
    slots: [u32; SYNC_RING_CAPACITY],
    head: usize,
    len: usize,
}

impl Default for SyncRing {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncRing {
    pub fn new() -> Self {
        Self {
            slots: [0; SYNC_RING_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Append at the tail. A full ring is left untouched and reported.
    pub fn push(&mut self, id: u32) -> Result<()> {
        if self.len == SYNC_RING_CAPACITY {
            return Err(WlFuzzError::CorrelationOverflow {
                capacity: SYNC_RING_CAPACITY,
            });
        }
        let tail = (self.head + self.len) % SYNC_RING_CAPACITY;
        self.slots[tail] = id;
        self.len += 1;
        Ok(())
    }

    pub fn head(&self) -> Option<u32> {
        (self.len > 0).then(|| self.slots[self.head])
    }

    pub fn pop(&mut self) -> Option<u32> {
        let id = self.head()?;
        self.head = (self.head + 1) % SYNC_RING_CAPACITY;
        self.len -= 1;
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == SYNC_RING_CAPACITY
    }
}
