//! Dispatch schedules.
//!
//! A dispatch schedule is a repeating timetable of departure slots attached
//! to an order list. Slot offsets are ticks from the start of a period;
//! the schedule repeats every `duration` ticks from `start_tick`.

use serde::{Deserialize, Serialize};

/// One departure slot inside a schedule period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DispatchSlot {
    /// Offset from the start of the period (ticks).
    pub offset: u32,
    /// Bitset of tags `0..16`.
    pub tags: u16,
}

impl DispatchSlot {
    pub fn has_tag(&self, tag: u8) -> bool {
        tag < 16 && self.tags & (1 << tag) != 0
    }
}

/// A named repeating dispatch schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSchedule {
    pub name: String,
    /// Absolute tick the first period starts at.
    pub start_tick: i64,
    /// Period length in ticks. Always positive.
    pub duration: u32,
    /// Slots sorted by offset, offsets unique and `< duration`.
    slots: Vec<DispatchSlot>,
    /// Tick (relative to `start_tick`) of the last dispatch from this schedule.
    pub last_dispatch: Option<i64>,
}

impl DispatchSchedule {
    /// Creates an empty schedule.
    ///
    /// # Panics
    /// If `duration` is zero.
    pub fn new(start_tick: i64, duration: u32) -> Self {
        assert!(duration > 0, "dispatch schedule duration must be positive");
        Self {
            name: String::new(),
            start_tick,
            duration,
            slots: Vec::new(),
            last_dispatch: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a slot. Offsets wrap into the period; an existing slot at the
    /// same offset is replaced.
    pub fn with_slot(mut self, offset: u32, tags: u16) -> Self {
        self.add_slot(offset, tags);
        self
    }

    pub fn add_slot(&mut self, offset: u32, tags: u16) {
        let slot = DispatchSlot {
            offset: offset % self.duration,
            tags,
        };
        match self.slots.binary_search_by_key(&slot.offset, |s| s.offset) {
            Ok(pos) => self.slots[pos] = slot,
            Err(pos) => self.slots.insert(pos, slot),
        }
    }

    pub fn remove_slot(&mut self, offset: u32) -> Option<DispatchSlot> {
        let pos = self.slot_position(offset)?;
        Some(self.slots.remove(pos))
    }

    pub fn slots(&self) -> &[DispatchSlot] {
        &self.slots
    }

    /// Position of the slot at `offset` within the period.
    pub fn slot_position(&self, offset: u32) -> Option<usize> {
        self.slots.binary_search_by_key(&offset, |s| s.offset).ok()
    }

    /// Slot position of a relative tick, if a slot sits exactly there.
    pub fn slot_at_tick(&self, relative_tick: i64) -> Option<usize> {
        let offset = relative_tick.rem_euclid(i64::from(self.duration));
        self.slot_position(offset as u32)
    }

    /// First slot strictly after `relative_tick`.
    ///
    /// Returns the relative tick of that departure and the slot position.
    pub fn next_dispatch_after(&self, relative_tick: i64) -> Option<(i64, usize)> {
        let first = self.slots.first()?;
        let duration = i64::from(self.duration);
        let period_start = relative_tick - relative_tick.rem_euclid(duration);
        self.slots
            .iter()
            .enumerate()
            .map(|(pos, s)| (period_start + i64::from(s.offset), pos))
            .find(|&(tick, _)| tick > relative_tick)
            .or(Some((period_start + duration + i64::from(first.offset), 0)))
    }

    pub fn is_first_slot(&self, position: usize) -> bool {
        position == 0 && !self.slots.is_empty()
    }

    pub fn is_last_slot(&self, position: usize) -> bool {
        !self.slots.is_empty() && position == self.slots.len() - 1
    }
}

/// A vehicle's record of its last dispatch from one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Absolute tick of the dispatch.
    pub dispatched_at: i64,
    /// Offset of the slot used.
    pub slot_offset: u32,
}
