//! Error type shared by the value helpers and the temporal operators.

use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that can be reported to the caller instead of panicking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A temporal operator was built with a parameter that holds no value.
    #[error("{operator}: parameter `{parameter}` holds no value")]
    MissingParameter {
        /// Operator being constructed (`delay`, `rate_limit`, ...).
        operator: &'static str,
        /// Name of the offending parameter.
        parameter: &'static str,
    },

    /// A float number of seconds could not be turned into a [`Duration`].
    #[error("{0} is not a valid number of seconds")]
    InvalidSeconds(f64),
}

/// Convert a float number of seconds into a [`Duration`].
///
/// Negative, non-finite and overflowing inputs are rejected.
///
/// ```
/// # use std::time::Duration;
/// assert_eq!(yarpl::seconds(0.25), Ok(Duration::from_millis(250)));
/// assert!(yarpl::seconds(-1.0).is_err());
/// ```
pub fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| Error::InvalidSeconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_rejects_negative_and_nan() {
        assert_eq!(seconds(-0.5), Err(Error::InvalidSeconds(-0.5)));
        assert!(matches!(seconds(f64::NAN), Err(Error::InvalidSeconds(_))));
        assert!(seconds(f64::INFINITY).is_err());
    }

    #[test]
    fn seconds_accepts_zero_and_fractions() {
        assert_eq!(seconds(0.0), Ok(Duration::ZERO));
        assert_eq!(seconds(1.5), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn missing_parameter_message_names_operator() {
        let err = Error::MissingParameter {
            operator: "delay",
            parameter: "delay",
        };
        assert_eq!(err.to_string(), "delay: parameter `delay` holds no value");
    }
}
