// Reactive duration parameter of a temporal operator.
//
// Every timing decision reads the parameter's stored value at the moment it
// is made. A notification only signals that the stored value may have moved;
// its payload is never used.

use std::cell::Cell;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::value::Value;

pub(super) struct DurationParam {
    value: Value<Duration>,
    /// Last stored value seen, used while the parameter holds NoValue.
    last_read: Cell<Duration>,
}

impl DurationParam {
    /// Fails with [`Error::MissingParameter`] if `value` holds NoValue.
    pub(super) fn new(
        value: Value<Duration>,
        operator: &'static str,
        parameter: &'static str,
    ) -> Result<Self> {
        let initial = value
            .read()
            .ok_or(Error::MissingParameter { operator, parameter })?;
        Ok(DurationParam {
            value,
            last_read: Cell::new(initial),
        })
    }

    pub(super) fn read(&self) -> Duration {
        match self.value.read() {
            Some(current) => {
                self.last_read.set(current);
                current
            }
            None => {
                tracing::debug!(
                    last = ?self.last_read.get(),
                    "duration parameter holds no value, keeping the last one"
                );
                self.last_read.get()
            }
        }
    }

    /// Run `on_change` after every notification of the parameter.
    pub(super) fn on_change(&self, on_change: impl Fn() + 'static) {
        self.value.subscribe(move |_: &Duration| on_change());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_stored_value_not_the_payload() {
        let value = Value::new(Duration::from_millis(100));
        let param = DurationParam::new(value.clone(), "op", "param").unwrap();

        value.notify(Duration::from_millis(10));
        assert_eq!(param.read(), Duration::from_millis(100));

        value.set(Duration::from_millis(20));
        assert_eq!(param.read(), Duration::from_millis(20));
    }

    #[test]
    fn cleared_parameter_keeps_last_read() {
        let value = Value::new(Duration::from_millis(100));
        let param = DurationParam::new(value.clone(), "op", "param").unwrap();

        value.update(None, Duration::from_millis(5));
        assert_eq!(param.read(), Duration::from_millis(100));
    }

    #[test]
    fn missing_value_names_the_parameter() {
        let err = DurationParam::new(Value::empty(), "delay", "delay").err();
        assert_eq!(
            err,
            Some(Error::MissingParameter {
                operator: "delay",
                parameter: "delay",
            })
        );
    }
}
