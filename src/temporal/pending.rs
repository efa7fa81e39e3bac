// FIFO of entries waiting on a timer, shared by delay and time_window
//
// Every entry gets the same age limit applied at any given moment, so the
// front of the queue is always the first to become due. Expiry scans stop at
// the first entry that is still young enough.

use std::collections::VecDeque;
use std::time::Duration;

use crate::scheduler::{Scheduler, TimerCallback, TimerHandle, Timestamp};

/// When an entry whose age equals the limit counts as overdue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Overdue once `age >= limit`.
    AtLimit,
    /// Overdue once `age > limit`.
    PastLimit,
}

impl Expiry {
    fn is_overdue(self, age: Duration, limit: Duration) -> bool {
        match self {
            Expiry::AtLimit => age >= limit,
            Expiry::PastLimit => age > limit,
        }
    }
}

pub(crate) struct Pending<E> {
    pub(crate) inserted_at: Timestamp,
    pub(crate) payload: E,
    pub(crate) timer: TimerHandle,
}

pub(crate) struct PendingQueue<E> {
    entries: VecDeque<Pending<E>>,
}

impl<E> PendingQueue<E> {
    pub(crate) fn new() -> Self {
        PendingQueue {
            entries: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, inserted_at: Timestamp, payload: E, timer: TimerHandle) {
        debug_assert!(
            self.entries
                .back()
                .is_none_or(|last| last.inserted_at <= inserted_at),
            "pending entries must be pushed in time order"
        );
        self.entries.push_back(Pending {
            inserted_at,
            payload,
            timer,
        });
    }

    /// Take the oldest entry; its timer is assumed to have fired.
    pub(crate) fn pop_front(&mut self) -> Option<Pending<E>> {
        self.entries.pop_front()
    }

    /// Take the oldest entry if it is already overdue under `limit`,
    /// cancelling its timer.
    pub(crate) fn pop_overdue(
        &mut self,
        scheduler: &dyn Scheduler,
        now: Timestamp,
        limit: Duration,
        expiry: Expiry,
    ) -> Option<Pending<E>> {
        let front = self.entries.front()?;
        let age = now.saturating_duration_since(front.inserted_at);
        if !expiry.is_overdue(age, limit) {
            return None;
        }
        let entry = self.entries.pop_front()?;
        scheduler.cancel(entry.timer);
        Some(entry)
    }

    /// Replace every entry's timer with one due at `inserted_at + limit`.
    ///
    /// Timers are rescheduled front to back so equal deadlines keep queue
    /// order.
    pub(crate) fn reschedule<F>(
        &mut self,
        scheduler: &dyn Scheduler,
        limit: Duration,
        mut on_due: F,
    ) where
        F: FnMut() -> TimerCallback,
    {
        for entry in &mut self.entries {
            scheduler.cancel(entry.timer);
            entry.timer = scheduler.schedule_at(entry.inserted_at + limit, on_due());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
