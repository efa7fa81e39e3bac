use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::parameter::DurationParam;
use super::pending::{Expiry, PendingQueue};
use crate::error::Result;
use crate::scheduler::{Scheduler, TimerCallback};
use crate::value::Value;

struct TimeWindowState<T> {
    output: Value<Vec<Option<T>>>,
    scheduler: Rc<dyn Scheduler>,
    duration: DurationParam,
    /// One entry per window element, same order.
    expirations: RefCell<PendingQueue<()>>,
}

/// Moving window over the values a source held during the last `duration`
///
/// The returned value is the list of the source's stored values, oldest
/// first, one element per change that happened within the window. Each
/// element is what [`Value::read`] returned right after the change (`None`
/// for NoValue), so the source is always treated as continuous. The window
/// starts out holding the source's current value, which ages like any other.
///
/// Every change produces a fresh list; subscribers are free to keep old
/// lists around.
///
/// `duration` may be a constant or a reactive [`Value`]. Shrinking it drops
/// elements that are already older than the new duration immediately, growing
/// it keeps elements around for longer. Either way elements expire relative to
/// when they were inserted. An element exactly as old as the window is still
/// inside it.
///
/// # Errors
/// [`Error::MissingParameter`](crate::Error::MissingParameter) if `duration` holds no value.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::time::Duration;
/// use yarpl::{Value, VirtualScheduler, time_window};
///
/// let clock = Rc::new(VirtualScheduler::new());
/// let source = Value::new(1);
/// let window = time_window(&source, Duration::from_millis(100), clock.clone()).unwrap();
///
/// clock.advance(Duration::from_millis(60));
/// source.set(2);
/// assert_eq!(window.read(), Some(vec![Some(1), Some(2)]));
///
/// clock.advance(Duration::from_millis(40));
/// assert_eq!(window.read(), Some(vec![Some(2)]));
/// ```
pub fn time_window<T>(
    source: &Value<T>,
    duration: impl Into<Value<Duration>>,
    scheduler: Rc<dyn Scheduler>,
) -> Result<Value<Vec<Option<T>>>>
where
    T: Clone + 'static,
{
    let duration = DurationParam::new(duration.into(), "time_window", "duration")?;

    let output = Value::new(vec![source.read()]);
    let state = Rc::new(TimeWindowState {
        output: output.clone(),
        scheduler,
        duration,
        expirations: RefCell::new(PendingQueue::new()),
    });
    state.schedule_expiration();

    let weak_source = source.downgrade();
    let on_change = Rc::clone(&state);
    source.subscribe(move |_: &T| {
        let stored = weak_source.upgrade().and_then(|source| source.read());
        on_change.insert(stored);
    });

    let on_duration = Rc::downgrade(&state);
    state.duration.on_change(move || {
        if let Some(state) = on_duration.upgrade() {
            state.duration_changed();
        }
    });

    Ok(output)
}

impl<T: Clone + 'static> TimeWindowState<T> {
    fn insert(self: &Rc<Self>, item: Option<T>) {
        // Expiration is queued before the list grows so the two stay aligned
        // even if a subscriber inserts again while being notified.
        self.schedule_expiration();
        let mut window = self.output.read().unwrap_or_default();
        window.push(item);
        tracing::trace!(len = window.len(), "time_window: inserted");
        self.output.set(window);
    }

    fn schedule_expiration(self: &Rc<Self>) {
        let now = self.scheduler.now();
        let timer = self
            .scheduler
            .schedule_at(now + self.duration.read(), self.on_due());
        self.expirations.borrow_mut().push(now, (), timer);
    }

    fn on_due(self: &Rc<Self>) -> TimerCallback {
        let state = Rc::downgrade(self);
        Box::new(move || {
            if let Some(state) = state.upgrade() {
                state.expire_oldest();
            }
        })
    }

    fn expire_oldest(&self) {
        if self.expirations.borrow_mut().pop_front().is_none() {
            tracing::warn!("time_window: expiry fired with an empty window");
            return;
        }
        self.drop_front();
    }

    fn drop_front(&self) {
        let window = self.output.read().unwrap_or_default();
        let remaining = window.get(1..).map(<[_]>::to_vec).unwrap_or_default();
        tracing::trace!(len = remaining.len(), "time_window: expired");
        self.output.set(remaining);
    }

    fn duration_changed(self: &Rc<Self>) {
        let new_duration = self.duration.read();
        tracing::debug!(?new_duration, "time_window: duration changed");
        let now = self.scheduler.now();

        loop {
            let overdue = self.expirations.borrow_mut().pop_overdue(
                &*self.scheduler,
                now,
                new_duration,
                Expiry::PastLimit,
            );
            if overdue.is_none() {
                break;
            }
            cov_mark::hit!(time_window_expires_overdue_on_shrink);
            self.drop_front();
        }

        let mut expirations = self.expirations.borrow_mut();
        if expirations.is_empty() {
            return;
        }
        expirations.reschedule(&*self.scheduler, new_duration, || self.on_due());
    }
}
