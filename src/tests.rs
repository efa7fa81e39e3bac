//! End-to-end scenarios across values, schedulers and temporal operators

use crate::{
    EventLoop, Scheduler, Timestamp, Value, VirtualScheduler, delay, make_instantaneous,
    rate_limit, seconds, time_window,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// Records (time since epoch, payload) for every notification of a value
struct Probe<T> {
    log: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T: Clone + 'static> Probe<T> {
    fn attach(value: &Value<T>, clock: Rc<dyn Scheduler>) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        value.subscribe(move |v: &T| {
            sink.borrow_mut()
                .push((clock.now().since_epoch(), v.clone()))
        });
        Probe { log }
    }

    fn payloads(&self) -> Vec<T> {
        self.log.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    fn times(&self) -> Vec<Duration> {
        self.log.borrow().iter().map(|&(t, _)| t).collect()
    }
}

#[test]
fn delayed_value_catches_up_after_delay() {
    let clock = Rc::new(VirtualScheduler::new());
    let v = Value::new(1);
    let d = delay(&v, seconds(0.1).unwrap(), clock.clone()).unwrap();
    assert_eq!(d.read(), Some(1));

    v.set(2);
    assert_eq!(d.read(), Some(1));

    clock.advance(ms(100));
    assert_eq!(d.read(), Some(2));
}

#[test]
fn rate_limit_emits_only_the_last_of_a_burst() {
    let clock = Rc::new(VirtualScheduler::new());
    let v = Value::new(1);
    let limited = rate_limit(&v, seconds(0.1).unwrap(), clock.clone()).unwrap();
    let probe = Probe::attach(&limited, clock.clone());

    v.set(4);
    v.set(5);
    v.set(6);
    clock.run_until_idle();

    assert_eq!(probe.payloads(), vec![6]);
    assert!(probe.times().iter().all(|&t| t >= ms(100)));
}

#[test]
fn delay_then_window_sees_shifted_history() {
    let clock = Rc::new(VirtualScheduler::new());
    let source = Value::new(0);
    let delayed = delay(&source, ms(50), clock.clone()).unwrap();
    let window = time_window(&delayed, ms(100), clock.clone()).unwrap();

    source.set(1);
    clock.advance(ms(20));
    source.set(2);
    assert_eq!(window.read(), Some(vec![Some(0)]));

    clock.advance(ms(30));
    assert_eq!(window.read(), Some(vec![Some(0), Some(1)]));
    clock.advance(ms(20));
    assert_eq!(window.read(), Some(vec![Some(0), Some(1), Some(2)]));

    // 0 entered at 0ms, 1 at 50ms, 2 at 70ms
    clock.advance(ms(30));
    assert_eq!(window.read(), Some(vec![Some(1), Some(2)]));
    clock.advance(ms(50));
    assert_eq!(window.read(), Some(vec![Some(2)]));
    clock.advance(ms(20));
    assert_eq!(window.read(), Some(vec![]));
}

#[test]
fn rate_limited_instantaneous_events_through_delay() {
    let clock = Rc::new(VirtualScheduler::new());
    let clicks: Value<&str> = Value::empty();
    let limited = rate_limit(&clicks, ms(100), clock.clone()).unwrap();
    let delayed = delay(&limited, ms(10), clock.clone()).unwrap();
    let probe = Probe::attach(&delayed, clock.clone());

    clicks.notify("a");
    clicks.notify("b");
    clicks.notify("c");
    clock.advance(ms(150));
    clicks.notify("d");
    clock.run_until_idle();

    assert_eq!(probe.payloads(), vec!["a", "c", "d"]);
    assert_eq!(probe.times(), vec![ms(10), ms(110), ms(210)]);
    assert_eq!(delayed.read(), None);
}

#[test]
fn one_parameter_drives_several_operators() {
    let clock = Rc::new(VirtualScheduler::new());
    let period = Value::new(ms(100));
    let source = Value::new(0);
    let delayed = delay(&source, period.clone(), clock.clone()).unwrap();
    let window = time_window(&source, period.clone(), clock.clone()).unwrap();

    clock.advance(ms(10));
    source.set(1);
    clock.advance(ms(60));

    period.set(ms(50));

    assert_eq!(delayed.read(), Some(1));
    assert_eq!(window.read(), Some(vec![]));
}

#[test]
fn parameter_value_can_itself_be_delayed() {
    let clock = Rc::new(VirtualScheduler::new());
    let requested = Value::new(ms(100));
    let effective = delay(&requested, ms(20), clock.clone()).unwrap();
    let source = Value::new(0);
    let delayed = delay(&source, effective, clock.clone()).unwrap();

    source.set(1);
    requested.set(ms(30));
    clock.advance(ms(19));
    assert_eq!(delayed.read(), Some(0));

    // At 20ms the shorter delay lands; entry is 20ms old, due at 30ms
    clock.advance(ms(1));
    assert_eq!(delayed.read(), Some(0));
    clock.advance(ms(10));
    assert_eq!(delayed.read(), Some(1));
}

#[test]
fn cancelled_handles_stay_inert() {
    let clock = VirtualScheduler::new();
    let fired = Rc::new(RefCell::new(0));

    let count = fired.clone();
    let handle = clock.schedule_at(
        Timestamp::ZERO + ms(1),
        Box::new(move || *count.borrow_mut() += 1),
    );
    clock.advance(ms(1));
    clock.cancel(handle);
    clock.cancel(handle);

    let count = fired.clone();
    clock.schedule_at(
        Timestamp::ZERO + ms(2),
        Box::new(move || *count.borrow_mut() += 1),
    );
    clock.cancel(handle);
    clock.advance(ms(1));

    assert_eq!(*fired.borrow(), 2);
}

#[test]
fn dropping_the_source_silences_pending_work() {
    let clock = Rc::new(VirtualScheduler::new());
    let source = Value::new(0);
    let delayed = delay(&source, ms(10), clock.clone()).unwrap();

    source.set(1);
    drop(source);
    clock.run_until_idle();

    assert_eq!(delayed.read(), Some(0));
}

#[test]
fn instantaneous_pulses_feed_a_window() {
    let clock = Rc::new(VirtualScheduler::new());
    let level = Value::new(5);
    let pulses = make_instantaneous(&level);
    let window = time_window(&level, ms(100), clock.clone()).unwrap();
    let pulse_count = Rc::new(RefCell::new(0));
    let counter = pulse_count.clone();
    pulses.subscribe(move |_: &i32| *counter.borrow_mut() += 1);

    level.set(6);
    level.set(7);

    assert_eq!(*pulse_count.borrow(), 2);
    assert_eq!(window.read(), Some(vec![Some(5), Some(6), Some(7)]));
    assert_eq!(pulses.read(), None);
}

#[test]
fn event_loop_drives_operators_in_real_time() {
    let event_loop = Rc::new(EventLoop::new());
    let source = Value::new(1);
    let delayed = delay(&source, ms(20), event_loop.clone()).unwrap();
    let window = time_window(&source, ms(40), event_loop.clone()).unwrap();

    let before = event_loop.now();
    source.set(2);
    assert_eq!(delayed.read(), Some(1));

    event_loop.run();

    assert_eq!(delayed.read(), Some(2));
    assert_eq!(window.read(), Some(vec![]));
    assert!(event_loop.now().saturating_duration_since(before) >= ms(40));
}
