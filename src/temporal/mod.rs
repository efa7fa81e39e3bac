//! Operators that bring time into the dataflow graph.
//!
//! Each operator subscribes to its source and to a duration parameter, and
//! owns a set of timers on a [`Scheduler`](crate::Scheduler). Changes are
//! always emitted in the order they arrived, however the parameter moves
//! the deadlines around.

mod delay;
mod parameter;
mod pending;
mod rate_limit;
mod time_window;

pub use delay::delay;
pub use rate_limit::{DEFAULT_MIN_INTERVAL, rate_limit};
pub use time_window::time_window;
