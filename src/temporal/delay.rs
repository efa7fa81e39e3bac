use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::parameter::DurationParam;
use super::pending::{Expiry, PendingQueue};
use crate::error::Result;
use crate::scheduler::{Scheduler, TimerCallback};
use crate::value::Value;

/// What a delayed change re-emits: the source's stored value at the time of
/// the change, and the payload it fired with.
struct Delayed<T> {
    stored: Option<T>,
    instantaneous: T,
}

struct DelayState<T> {
    output: Value<T>,
    scheduler: Rc<dyn Scheduler>,
    delay: DurationParam,
    queue: RefCell<PendingQueue<Delayed<T>>>,
}

/// Time-delayed copy of a value
///
/// Every change of `source` is re-emitted on the returned value `delay`
/// later, in the order the changes happened. Works for both continuous and
/// instantaneous sources: the output stores whatever the source stored at the
/// moment of the change and notifies with the payload the source fired with.
/// The source's current value is copied across immediately; only changes are
/// delayed.
///
/// `delay` may be a constant or a reactive [`Value`]. When it changes, every
/// pending change is retimed relative to when it originally happened:
/// increasing it pushes pending changes further out, decreasing it brings them
/// forward, and changes that should already have been emitted under the new
/// delay are emitted immediately, oldest first.
///
/// # Errors
/// [`Error::MissingParameter`](crate::Error::MissingParameter) if `delay` holds no value.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use yarpl::{Value, VirtualScheduler, delay};
///
/// let clock = Rc::new(VirtualScheduler::new());
/// let source = Value::new(1);
/// let delay_time = Value::new(Duration::from_millis(100));
/// let delayed = delay(&source, delay_time.clone(), clock.clone()).unwrap();
///
/// source.set(2);
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(delayed.read(), Some(1));
///
/// // The change is now 50ms old, so a 20ms delay releases it at once
/// delay_time.set(Duration::from_millis(20));
/// assert_eq!(delayed.read(), Some(2));
/// ```
pub fn delay<T>(
    source: &Value<T>,
    delay: impl Into<Value<Duration>>,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Value<T>>
where
    T: Clone + 'static,
{
    let delay = DurationParam::new(delay.into(), "delay", "delay")?;

    let output = Value::with_stored(source.read());
    let state = Rc::new(DelayState {
        output: output.clone(),
        scheduler,
        delay,
        queue: RefCell::new(PendingQueue::new()),
    });

    let weak_source = source.downgrade();
    let on_change = Rc::clone(&state);
    source.subscribe(move |value: &T| {
        let stored = weak_source.upgrade().and_then(|source| source.read());
        on_change.enqueue(stored, value.clone());
    });

    let on_delay = Rc::downgrade(&state);
    state.delay.on_change(move || {
        if let Some(state) = on_delay.upgrade() {
            state.delay_changed();
        }
    });

    Ok(output)
}

impl<T: Clone + 'static> DelayState<T> {
    fn enqueue(self: &Rc<Self>, stored: Option<T>, instantaneous: T) {
        let now = self.scheduler.now();
        let timer = self
            .scheduler
            .schedule_at(now + self.delay.read(), self.on_due());
        let mut queue = self.queue.borrow_mut();
        queue.push(
            now,
            Delayed {
                stored,
                instantaneous,
            },
            timer,
        );
        tracing::trace!(?now, pending = queue.len(), "delay: change queued");
    }

    fn on_due(self: &Rc<Self>) -> TimerCallback {
        let state = Rc::downgrade(self);
        Box::new(move || {
            if let Some(state) = state.upgrade() {
                state.emit_oldest();
            }
        })
    }

    fn emit_oldest(&self) {
        let oldest = self.queue.borrow_mut().pop_front();
        match oldest {
            Some(entry) => self.emit(entry.payload),
            None => tracing::warn!("delay: timer fired with nothing queued"),
        }
    }

    fn emit(&self, delayed: Delayed<T>) {
        tracing::trace!("delay: emitting");
        self.output.update(delayed.stored, delayed.instantaneous);
    }

    fn delay_changed(self: &Rc<Self>) {
        let new_delay = self.delay.read();
        tracing::debug!(?new_delay, "delay: delay changed");
        let now = self.scheduler.now();

        // Emitting can cascade into this operator again, so the queue is only
        // borrowed while popping.
        loop {
            let overdue = self.queue.borrow_mut().pop_overdue(
                &*self.scheduler,
                now,
                new_delay,
                Expiry::AtLimit,
            );
            let Some(entry) = overdue else { break };
            cov_mark::hit!(delay_emits_overdue_on_shrink);
            self.emit(entry.payload);
        }

        let mut queue = self.queue.borrow_mut();
        if queue.is_empty() {
            return;
        }
        queue.reschedule(&*self.scheduler, new_delay, || self.on_due());
    }
}
