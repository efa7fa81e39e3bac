#![deny(missing_docs)]

//! Reactive values with time-aware combinators.
//!
//! A [`Value`] is a cell that notifies its subscribers synchronously whenever
//! it is set. Values form a dataflow graph: a subscriber of one value usually
//! sets another. On top of that, this crate provides operators that introduce
//! time into the graph, driven by a [`Scheduler`].
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use std::time::Duration;
//! use yarpl::{Value, VirtualScheduler, delay};
//!
//! let clock = Rc::new(VirtualScheduler::new());
//!
//! let v = Value::new(1);
//! let d = delay(&v, Duration::from_millis(100), clock.clone())?;
//! assert_eq!(d.read(), Some(1));   // current value passes through
//!
//! v.set(2);
//! assert_eq!(d.read(), Some(1));   // change is on its way
//!
//! clock.advance(Duration::from_millis(100));
//! assert_eq!(d.read(), Some(2));
//! # Ok::<(), yarpl::Error>(())
//! ```
//!
//! # Core Types
//!
//! - [`Value<T>`] - Reactive cell. [`set`](Value::set) for continuous updates,
//!   [`notify`](Value::notify) for instantaneous ones.
//! - [`Scheduler`] - Timer service the temporal operators run on.
//!   [`VirtualScheduler`] for deterministic time, [`EventLoop`] for wall-clock
//!   time.
//!
//! # Continuous and instantaneous values
//!
//! ```
//! use yarpl::Value;
//!
//! let temperature = Value::new(20.5);   // continuous: read() returns the latest
//! temperature.set(21.0);
//! assert_eq!(temperature.read(), Some(21.0));
//!
//! let button: Value<&str> = Value::empty();   // instantaneous: nothing is retained
//! button.subscribe(|pressed| println!("{pressed}"));
//! button.notify("pressed");
//! assert_eq!(button.read(), None);
//! ```
//!
//! # Temporal operators
//!
//! - [`delay`] - Re-emit every change after a delay.
//! - [`rate_limit`] - At most one change per interval; bursts collapse to
//!   the latest change.
//! - [`time_window`] - List of the values seen during the last period.
//!
//! Each takes its duration either as a constant or as a `Value<Duration>`;
//! changing that value retimes everything already in flight.
//!
//! # Helpers
//!
//! ```ignore
//! ensure_value(3);                          // plain data -> Value
//! make_instantaneous(&continuous);          // fire on change, store nothing
//! make_persistent(&instantaneous, None);    // keep the last payload
//! seconds(0.25)?;                           // f64 seconds -> Duration
//! ```

mod error;
mod scheduler;
mod temporal;
mod value;

// Core types
pub use error::{Error, Result, seconds};
pub use value::{Value, WeakValue, ensure_value, make_instantaneous, make_persistent};

// Scheduling
pub use scheduler::{
    DEFAULT_LATENESS_WARNING, EventLoop, EventLoopBuilder, Scheduler, TimerCallback, TimerHandle,
    Timestamp, VirtualScheduler,
};

// Temporal operators
pub use temporal::{DEFAULT_MIN_INTERVAL, delay, rate_limit, time_window};

#[cfg(test)]
mod tests;
