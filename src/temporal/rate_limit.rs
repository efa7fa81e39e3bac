use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::parameter::DurationParam;
use crate::error::Result;
use crate::scheduler::{Scheduler, TimerHandle, Timestamp};
use crate::value::Value;

/// Default minimum spacing between changes passed through [`rate_limit`].
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// A change held back while blocked. Only the most recent one is kept.
struct Deferred<T> {
    stored: Option<T>,
    instantaneous: T,
}

#[derive(Copy, Clone, Debug)]
struct Block {
    started_at: Timestamp,
    timer: TimerHandle,
}

struct Blockage<T> {
    /// `Some` while blocked.
    block: Option<Block>,
    pending: Option<Deferred<T>>,
}

struct RateLimitState<T> {
    output: Value<T>,
    scheduler: Rc<dyn Scheduler>,
    min_interval: DurationParam,
    blockage: RefCell<Blockage<T>>,
}

/// Pass changes through no more often than once per `min_interval`
///
/// A change arriving while unblocked is emitted immediately and starts a
/// block lasting `min_interval`. Changes arriving while blocked are held
/// back; only the latest one survives and is emitted when the block ends,
/// which starts a new block. A block that ends with nothing held back simply
/// unblocks.
///
/// A continuous source counts as having just changed when the rate limiter
/// is created, so the first block starts right away. An instantaneous source
/// (holding NoValue) starts unblocked.
///
/// `min_interval` may be a constant or a reactive [`Value`]. Changing it
/// while blocked retimes the current block from when it started; if the new
/// interval has already elapsed the block ends immediately.
///
/// # Errors
/// [`Error::MissingParameter`](crate::Error::MissingParameter) if `min_interval` holds no value.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use yarpl::{DEFAULT_MIN_INTERVAL, Value, VirtualScheduler, rate_limit};
///
/// let clock = Rc::new(VirtualScheduler::new());
/// let source = Value::new(1);
/// let limited = rate_limit(&source, DEFAULT_MIN_INTERVAL, clock.clone()).unwrap();
///
/// source.set(4);
/// source.set(5);
/// source.set(6);
/// assert_eq!(limited.read(), Some(1));
///
/// clock.advance(DEFAULT_MIN_INTERVAL);
/// assert_eq!(limited.read(), Some(6));
/// ```
pub fn rate_limit<T>(
    source: &Value<T>,
    min_interval: impl Into<Value<Duration>>,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Value<T>>
where
    T: Clone + 'static,
{
    let min_interval = DurationParam::new(min_interval.into(), "rate_limit", "min_interval")?;

    let output = Value::with_stored(source.read());
    let state = Rc::new(RateLimitState {
        output: output.clone(),
        scheduler,
        min_interval,
        blockage: RefCell::new(Blockage {
            block: None,
            pending: None,
        }),
    });

    if source.is_set() {
        state.start_block();
    }

    let weak_source = source.downgrade();
    let on_change = Rc::clone(&state);
    source.subscribe(move |value: &T| {
        let stored = weak_source.upgrade().and_then(|source| source.read());
        on_change.source_changed(Deferred {
            stored,
            instantaneous: value.clone(),
        });
    });

    let on_interval = Rc::downgrade(&state);
    state.min_interval.on_change(move || {
        if let Some(state) = on_interval.upgrade() {
            state.min_interval_changed();
        }
    });

    Ok(output)
}

impl<T: Clone + 'static> RateLimitState<T> {
    fn is_blocked(&self) -> bool {
        self.blockage.borrow().block.is_some()
    }

    fn source_changed(self: &Rc<Self>, change: Deferred<T>) {
        if self.is_blocked() {
            let previous = self.blockage.borrow_mut().pending.replace(change);
            if previous.is_some() {
                cov_mark::hit!(rate_limit_discards_older_pending);
                tracing::trace!("rate_limit: superseded a held-back change");
            }
            return;
        }
        // Block first so changes raised by downstream subscribers are held.
        self.start_block();
        self.emit(change);
    }

    fn start_block(self: &Rc<Self>) {
        let started_at = self.scheduler.now();
        let timer = self.schedule_unblock(started_at + self.min_interval.read());
        self.blockage.borrow_mut().block = Some(Block { started_at, timer });
        tracing::trace!(?started_at, "rate_limit: blocked");
    }

    fn schedule_unblock(self: &Rc<Self>, at: Timestamp) -> TimerHandle {
        let state = Rc::downgrade(self);
        self.scheduler.schedule_at(
            at,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    state.block_expired();
                }
            }),
        )
    }

    fn block_expired(self: &Rc<Self>) {
        let pending = self.blockage.borrow_mut().pending.take();
        match pending {
            Some(change) => {
                self.start_block();
                self.emit(change);
            }
            None => {
                self.blockage.borrow_mut().block = None;
                tracing::trace!("rate_limit: unblocked");
            }
        }
    }

    fn emit(&self, change: Deferred<T>) {
        tracing::trace!("rate_limit: emitting");
        self.output.update(change.stored, change.instantaneous);
    }

    fn min_interval_changed(self: &Rc<Self>) {
        let new_interval = self.min_interval.read();
        tracing::debug!(?new_interval, "rate_limit: min interval changed");

        let Some(block) = self.blockage.borrow().block else {
            return;
        };
        self.scheduler.cancel(block.timer);

        let elapsed = self
            .scheduler
            .now()
            .saturating_duration_since(block.started_at);
        if elapsed >= new_interval {
            cov_mark::hit!(rate_limit_unblocks_early);
            self.block_expired();
        } else {
            let timer = self.schedule_unblock(block.started_at + new_interval);
            self.blockage.borrow_mut().block = Some(Block { timer, ..block });
        }
    }
}
