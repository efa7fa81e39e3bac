use std::cell::{Cell, RefCell};
use std::time::Duration;

use super::{Scheduler, TimerCallback, TimerHandle, TimerQueue, Timestamp};

/// Scheduler driven by a manually advanced clock
///
/// Nothing happens until [`advance`](VirtualScheduler::advance) (or one of
/// its siblings) is called. While advancing, each due timer runs with
/// [`now`](Scheduler::now) equal to its own deadline, so callbacks observe
/// exactly the time they were scheduled for.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use yarpl::{Value, VirtualScheduler, delay};
///
/// let clock = Rc::new(VirtualScheduler::new());
/// let source = Value::new(1);
/// let delayed = delay(&source, Duration::from_millis(100), clock.clone()).unwrap();
///
/// source.set(2);
/// assert_eq!(delayed.read(), Some(1));
///
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(delayed.read(), Some(2));
/// ```
pub struct VirtualScheduler {
    now: Cell<Timestamp>,
    timers: RefCell<TimerQueue>,
}

impl VirtualScheduler {
    /// Create a scheduler whose clock starts at the epoch
    pub fn new() -> Self {
        Self::starting_at(Timestamp::ZERO)
    }

    /// Create a scheduler whose clock starts at `start`
    pub fn starting_at(start: Timestamp) -> Self {
        VirtualScheduler {
            now: Cell::new(start),
            timers: RefCell::new(TimerQueue::new()),
        }
    }

    /// Move the clock forward by `by`, running every timer that falls due
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        self.advance_to(self.now.get() + by)
    }

    /// Move the clock forward to `target`, running every timer that falls due
    ///
    /// Timers scheduled by callbacks are picked up too, as long as they are
    /// due no later than `target`. A `target` in the past only runs timers
    /// that are already due.
    pub fn advance_to(&self, target: Timestamp) -> usize {
        let target = target.max(self.now.get());
        let mut fired = 0;
        loop {
            // Borrow released before the callback runs; callbacks reschedule.
            let next = self.timers.borrow_mut().pop_due(target);
            let Some((deadline, callback)) = next else {
                break;
            };
            self.now.set(deadline.max(self.now.get()));
            callback();
            fired += 1;
        }
        self.now.set(target);
        fired
    }

    /// Run timers until none are left, moving the clock to each deadline
    ///
    /// Does not terminate if callbacks keep rescheduling themselves.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = self.timers.borrow().next_deadline();
            match next {
                Some(deadline) => fired += self.advance_to(deadline),
                None => return fired,
            }
        }
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.borrow().next_deadline()
    }

    /// Number of timers waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Timestamp {
        self.now.get()
    }

    fn schedule_at(&self, at: Timestamp, callback: TimerCallback) -> TimerHandle {
        let now = self.now.get();
        assert!(at >= now, "timer scheduled in the past: {at:?} < now {now:?}");
        let handle = self.timers.borrow_mut().insert(at, callback);
        tracing::trace!(?at, ?handle, "virtual timer scheduled");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if self.timers.borrow_mut().cancel(handle) {
            tracing::trace!(?handle, "virtual timer cancelled");
        }
    }
}
