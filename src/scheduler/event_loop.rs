//! Wall-clock scheduler
//!
//! [`EventLoop`] maps [`Timestamp`]s onto [`std::time::Instant`] and runs due
//! callbacks on the thread that calls [`run`](EventLoop::run) or
//! [`run_for`](EventLoop::run_for), sleeping in between.
//!
//! ## Usage
//!
//! ```
//! use std::rc::Rc;
//! use std::time::Duration;
//! use yarpl::{EventLoop, Value, rate_limit};
//!
//! let event_loop = Rc::new(EventLoop::new());
//! let source = Value::new(0);
//! let limited = rate_limit(&source, Duration::from_millis(5), event_loop.clone()).unwrap();
//!
//! source.set(1);
//! source.set(2);
//! assert_eq!(limited.read(), Some(0));
//!
//! event_loop.run();
//! assert_eq!(limited.read(), Some(2));
//! ```

use std::cell::{Cell, RefCell};
use std::thread;
use std::time::{Duration, Instant};

use super::{Scheduler, TimerCallback, TimerHandle, TimerQueue, Timestamp};

/// Default lateness above which a fired timer is reported with `warn!`.
pub const DEFAULT_LATENESS_WARNING: Duration = Duration::from_millis(10);

/// Builder for configuring an [`EventLoop`].
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use yarpl::EventLoop;
///
/// let event_loop = EventLoop::builder()
///     .epoch(Instant::now())
///     .lateness_warning(Duration::from_millis(2))
///     .build();
/// ```
pub struct EventLoopBuilder {
    epoch: Option<Instant>,
    lateness_warning: Duration,
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoopBuilder {
    /// Create a builder with default settings.
    ///
    /// Defaults:
    /// - `epoch`: the moment [`build`](EventLoopBuilder::build) is called
    /// - `lateness_warning`: 10ms
    pub fn new() -> Self {
        Self {
            epoch: None,
            lateness_warning: DEFAULT_LATENESS_WARNING,
        }
    }

    /// Set the instant that maps to [`Timestamp::ZERO`].
    ///
    /// Must not be in the future.
    pub fn epoch(mut self, epoch: Instant) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Set how late a timer may fire before it is logged as a warning.
    ///
    /// Default: 10ms
    pub fn lateness_warning(mut self, lateness: Duration) -> Self {
        self.lateness_warning = lateness;
        self
    }

    /// Build the event loop.
    pub fn build(self) -> EventLoop {
        EventLoop {
            epoch: self.epoch.unwrap_or_else(Instant::now),
            lateness_warning: self.lateness_warning,
            last_now: Cell::new(Timestamp::ZERO),
            timers: RefCell::new(TimerQueue::new()),
        }
    }
}

/// Single-threaded wall-clock scheduler
///
/// Unlike [`VirtualScheduler`](super::VirtualScheduler), the clock keeps
/// moving between reading [`now`](Scheduler::now) and scheduling, so a
/// deadline that is already behind the clock is accepted and treated as due
/// immediately. Ordering is still by deadline.
pub struct EventLoop {
    epoch: Instant,
    lateness_warning: Duration,
    /// Keeps `now()` monotonic even if the OS clock misbehaves.
    last_now: Cell<Timestamp>,
    timers: RefCell<TimerQueue>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create an event loop whose epoch is now.
    pub fn new() -> Self {
        EventLoopBuilder::new().build()
    }

    /// Start configuring an event loop.
    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::new()
    }

    /// Run callbacks until no timers remain.
    ///
    /// Returns the number of callbacks run. Does not return while callbacks
    /// keep scheduling new timers.
    pub fn run(&self) -> usize {
        let mut fired = 0;
        loop {
            fired += self.run_due();
            let next = self.timers.borrow().next_deadline();
            let Some(deadline) = next else {
                return fired;
            };
            self.sleep_until(deadline);
        }
    }

    /// Run callbacks for `duration`, then return.
    ///
    /// Timers that are due by the end of the period run before returning.
    pub fn run_for(&self, duration: Duration) -> usize {
        let end = self.now() + duration;
        let mut fired = 0;
        loop {
            fired += self.run_due();
            let next = self.timers.borrow().next_deadline();
            let wake = next.map_or(end, |deadline| deadline.min(end));
            if self.now() >= end {
                return fired;
            }
            self.sleep_until(wake);
        }
    }

    /// Run every callback that is due right now, without sleeping.
    pub fn run_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.now();
            // Borrow released before the callback runs; callbacks reschedule.
            let next = self.timers.borrow_mut().pop_due(now);
            let Some((deadline, callback)) = next else {
                return fired;
            };
            let lateness = now.saturating_duration_since(deadline);
            if lateness > self.lateness_warning {
                tracing::warn!(?deadline, ?lateness, "timer fired late");
            }
            callback();
            fired += 1;
        }
    }

    /// Number of timers waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn sleep_until(&self, deadline: Timestamp) {
        let remaining = deadline.saturating_duration_since(self.now());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }
}

impl Scheduler for EventLoop {
    fn now(&self) -> Timestamp {
        let elapsed = Timestamp::from_epoch(self.epoch.elapsed());
        let now = elapsed.max(self.last_now.get());
        self.last_now.set(now);
        now
    }

    fn schedule_at(&self, at: Timestamp, callback: TimerCallback) -> TimerHandle {
        let handle = self.timers.borrow_mut().insert(at, callback);
        tracing::trace!(?at, ?handle, "timer scheduled");
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if self.timers.borrow_mut().cancel(handle) {
            tracing::trace!(?handle, "timer cancelled");
        }
    }
}
