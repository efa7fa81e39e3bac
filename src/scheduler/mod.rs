//! Timer services consumed by the temporal operators.
//!
//! The operators only depend on the [`Scheduler`] trait: a monotonic clock
//! plus "call this at time T" and "never mind". Two implementations ship with
//! the crate:
//!
//! - [`VirtualScheduler`]: time only moves when told to. Deterministic, used
//!   for tests and simulations.
//! - [`EventLoop`]: wall-clock time, sleeps the current thread until the
//!   next deadline.
//!
//! Both deliver due callbacks on the calling thread, in deadline order, with
//! ties broken by scheduling order.

mod event_loop;
mod timer_queue;
mod virtual_clock;

pub use event_loop::{DEFAULT_LATENESS_WARNING, EventLoop, EventLoopBuilder};
pub use virtual_clock::VirtualScheduler;

pub(crate) use timer_queue::TimerQueue;

use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Point on a scheduler's monotonic logical clock
///
/// Stored as the time elapsed since the scheduler's epoch, so it is totally
/// ordered and cannot go negative. Adding a [`Duration`] saturates at the end
/// of time, so `Duration::MAX` works as "never".
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The scheduler epoch
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    /// Timestamp `offset` after the epoch
    pub const fn from_epoch(offset: Duration) -> Self {
        Timestamp(offset)
    }

    /// Time elapsed since the epoch
    pub const fn since_epoch(self) -> Duration {
        self.0
    }

    /// Time elapsed between `earlier` and `self`, zero if `earlier` is later
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{:?}", self.0)
    }
}

/// Handle to a scheduled callback
///
/// Handles stay valid forever: cancelling one whose callback already ran (or
/// was already cancelled) does nothing, even if its slot has been reused.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TimerHandle {
    key: usize,
    seq: u64,
}

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

/// Single-threaded timer service
///
/// Implementations must deliver due callbacks in deadline order, never run a
/// callback synchronously from inside `schedule_at`, and let callbacks call
/// back into the scheduler (schedule and cancel) while they run.
pub trait Scheduler {
    /// Current logical time. Never decreases.
    fn now(&self) -> Timestamp;

    /// Run `callback` once the clock reaches `at`
    ///
    /// # Panics
    /// Schedulers that own their clock ([`VirtualScheduler`]) panic if `at`
    /// is earlier than [`now`](Scheduler::now), since that would silently
    /// break deadline ordering. Wall-clock schedulers ([`EventLoop`]) accept
    /// late deadlines and treat them as due.
    fn schedule_at(&self, at: Timestamp, callback: TimerCallback) -> TimerHandle;

    /// Cancel a pending callback. No-op if it already ran or was cancelled.
    fn cancel(&self, handle: TimerHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic() {
        let t = Timestamp::ZERO + Duration::from_millis(150);
        assert_eq!(t.since_epoch(), Duration::from_millis(150));
        assert_eq!(
            t.saturating_duration_since(Timestamp::from_epoch(Duration::from_millis(100))),
            Duration::from_millis(50)
        );
        assert_eq!(Timestamp::ZERO.saturating_duration_since(t), Duration::ZERO);
    }

    #[test]
    fn adding_past_the_end_of_time_saturates() {
        let t = Timestamp::from_epoch(Duration::from_millis(1));
        assert_eq!((t + Duration::MAX).since_epoch(), Duration::MAX);

        let mut u = t;
        u += Duration::MAX;
        u += Duration::from_secs(1);
        assert_eq!(u.since_epoch(), Duration::MAX);
    }

    #[test]
    fn timestamp_debug_is_compact() {
        let t = Timestamp::from_epoch(Duration::from_millis(5));
        assert_eq!(format!("{t:?}"), "T+5ms");
    }
}
