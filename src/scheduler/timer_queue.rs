// Timer storage shared by the scheduler implementations
//
// Pending callbacks live in a slab; a TimerHandle is (slab key, sequence
// number). The sequence number is unique per timer, so a stale handle whose
// slot was reused by a later timer is detected and ignored on cancel.
//
// Firing order comes from a BTreeSet keyed by (deadline, seq): earliest
// deadline first, and scheduling order among equal deadlines.

use slab::Slab;
use std::collections::BTreeSet;

use super::{TimerCallback, TimerHandle, Timestamp};

struct TimerSlot {
    seq: u64,
    deadline: Timestamp,
    callback: TimerCallback,
}

#[derive(Default)]
pub(crate) struct TimerQueue {
    slots: Slab<TimerSlot>,
    order: BTreeSet<(Timestamp, u64, usize)>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, deadline: Timestamp, callback: TimerCallback) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = self.slots.insert(TimerSlot {
            seq,
            deadline,
            callback,
        });
        self.order.insert((deadline, seq, key));
        TimerHandle { key, seq }
    }

    /// Returns false if the handle was stale (already fired or cancelled).
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        let live = self
            .slots
            .get(handle.key)
            .is_some_and(|slot| slot.seq == handle.seq);
        if !live {
            return false;
        }
        let slot = self.slots.remove(handle.key);
        self.order.remove(&(slot.deadline, slot.seq, handle.key));
        true
    }

    pub(crate) fn next_deadline(&self) -> Option<Timestamp> {
        self.order.first().map(|&(deadline, _, _)| deadline)
    }

    /// Remove and return the earliest timer whose deadline is at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, TimerCallback)> {
        let &(deadline, _, key) = self.order.first()?;
        if deadline > now {
            return None;
        }
        self.order.pop_first();
        let slot = self.slots.remove(key);
        Some((slot.deadline, slot.callback))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
