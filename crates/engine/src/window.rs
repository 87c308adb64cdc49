//! Fixed-capacity circular window of per-minute aggregates.
//!
//! Slots live in a fixed arena and are addressed relative to the tail (the
//! most recently advanced minute): offset `0` is the tail, `-1` the minute
//! before it, down to `-(capacity - 1)`.

use tickagg_core::{Error, MinuteSlot, Result};

/// Circular buffer of minute slots with tail-relative addressing.
#[derive(Debug, Clone)]
pub struct CircularWindow {
    /// Slot arena. Its length never changes.
    slots: Vec<MinuteSlot>,
    /// Index of the tail slot.
    tail: usize,
}

impl CircularWindow {
    /// Create a window of `capacity` empty slots.
    ///
    /// The tail starts on the last slot so the first append lands on index 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be positive");
        Self {
            slots: vec![None; capacity],
            tail: capacity - 1,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Resolve a tail-relative offset to an arena index.
    fn index(&self, delta: i64) -> Result<usize> {
        let capacity = self.slots.len();
        if delta > 0 || delta.unsigned_abs() >= capacity as u64 {
            return Err(Error::out_of_range(delta, capacity));
        }
        Ok((self.tail as i64 + delta).rem_euclid(capacity as i64) as usize)
    }

    /// Advance the tail one minute and store `slot` there.
    ///
    /// Returns the slot that fell out of the window.
    pub fn append(&mut self, slot: MinuteSlot) -> MinuteSlot {
        self.tail = (self.tail + 1) % self.slots.len();
        std::mem::replace(&mut self.slots[self.tail], slot)
    }

    /// Slot at `tail + delta`.
    pub fn get(&self, delta: i64) -> Result<MinuteSlot> {
        Ok(self.slots[self.index(delta)?])
    }

    /// Overwrite the slot at `tail + delta` without moving the tail.
    ///
    /// Returns the previous value.
    pub fn update(&mut self, delta: i64, slot: MinuteSlot) -> Result<MinuteSlot> {
        let i = self.index(delta)?;
        Ok(std::mem::replace(&mut self.slots[i], slot))
    }

    /// Volume-weighted average price over the `window_minutes` slots ending
    /// at `tail_delta` (inclusive).
    ///
    /// Empty slots are skipped. Returns `None` when every slot in range is
    /// empty, or when the range reaches past the oldest slot.
    pub fn vwap(&self, window_minutes: usize, tail_delta: i64) -> Option<f64> {
        if window_minutes == 0 {
            return None;
        }
        let oldest = tail_delta - (window_minutes as i64 - 1);
        self.index(oldest).ok()?;
        self.index(tail_delta).ok()?;

        let mut notional = 0.0;
        let mut quantity = 0.0;
        for delta in oldest..=tail_delta {
            if let Some(slot) = self.slots[self.index(delta).ok()?] {
                notional += slot.notional();
                quantity += slot.quantity;
            }
        }

        if quantity > 0.0 {
            Some(notional / quantity)
        } else {
            None
        }
    }

    /// Reset every slot to empty.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.tail = self.slots.len() - 1;
    }
}
