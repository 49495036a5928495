// src/recovery_buffer.rs

use std::collections::VecDeque;

use bytes::Bytes;

// Contiguous suffix [low, high] of the transmitted history, capped at `capacity`.
pub struct RecoveryBuffer {
    entries: VecDeque<(u64, Bytes)>,
    capacity: usize,
}

impl RecoveryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity.min(1 << 20)), capacity: capacity.max(1) }
    }

    pub fn low(&self) -> Option<u64> {
        self.entries.front().map(|(s, _)| *s)
    }

    pub fn high(&self) -> Option<u64> {
        self.entries.back().map(|(s, _)| *s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Callers insert in strictly increasing seq order.
    pub fn insert(&mut self, seq: u64, encoded: Bytes) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((seq, encoded));
    }

    pub fn lookup(&self, seq: u64) -> Option<Bytes> {
        let low = self.low()?;
        let high = self.high()?;
        if seq < low || seq > high {
            return None;
        }
        let idx = (seq - low) as usize;
        self.entries.get(idx).map(|(_, b)| b.clone())
    }

    // Partial hit returns only the in-buffer portion; caller fills the rest from the log.
    pub fn lookup_range(&self, seq: u64, count: u16) -> Vec<Bytes> {
        let (Some(low), Some(high)) = (self.low(), self.high()) else {
            return Vec::new();
        };
        if seq > high {
            return Vec::new();
        }
        let start = seq.max(low);
        let end = seq.saturating_add(count as u64).min(high + 1);
        if start >= end {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((end - start) as usize);
        for s in start..end {
            let idx = (s - low) as usize;
            out.push(self.entries[idx].1.clone());
        }
        out
    }
}
