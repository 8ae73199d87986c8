//! Delay strategies between attempts and the retry policy that carries them.
//!
//! # Design
//! A `Backoff` maps a 1-based retry index to a wait duration and does nothing
//! else. In-code constructors take `Duration`, so a negative delay cannot be
//! expressed there; the only value still checked at construction is the
//! exponential growth factor. Policies read from configuration files go
//! through `BackoffConfig`, whose millisecond fields are signed so that a
//! negative value can be rejected with a `ConfigError` instead of clamped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::ConfigError;

/// Delay used by `RetryPolicy::new` when no strategy is given.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Base delay of `BackoffConfig::Exponential` when the field is omitted.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Growth factor of `BackoffConfig::Exponential` when the field is omitted.
pub const DEFAULT_FACTOR: f64 = 2.0;

type DelayFn = dyn Fn(u32) -> Duration + Send + Sync;

/// Attempt index to delay mapping.
#[derive(Clone)]
pub enum Backoff {
    Fixed(Duration),
    Linear {
        increment: Duration,
        max_delay: Option<Duration>,
    },
    Exponential {
        base_delay: Duration,
        max_delay: Option<Duration>,
        factor: f64,
    },
    Jitter {
        max_delay: Duration,
    },
    Custom(Arc<DelayFn>),
}

impl Backoff {
    /// The same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed(delay)
    }

    /// `min(increment * attempt, max_delay)`. `None` leaves it uncapped.
    pub fn linear(increment: Duration, max_delay: Option<Duration>) -> Self {
        Backoff::Linear { increment, max_delay }
    }

    /// `min(base_delay * factor^attempt, max_delay)`.
    ///
    /// Fails when `factor` is below 1.0, NaN or infinite.
    pub fn exponential(
        base_delay: Duration,
        max_delay: Option<Duration>,
        factor: f64,
    ) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::InvalidFactor(factor));
        }
        Ok(Backoff::Exponential {
            base_delay,
            max_delay,
            factor,
        })
    }

    /// A uniformly random delay in `[0, max_delay]`, sampled on every call.
    pub fn jitter(max_delay: Duration) -> Self {
        Backoff::Jitter { max_delay }
    }

    /// Any caller-supplied pure function of the attempt index.
    pub fn custom<F>(delay_fn: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Backoff::Custom(Arc::new(delay_fn))
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear { increment, max_delay } => {
                cap(increment.saturating_mul(attempt), *max_delay)
            }
            Backoff::Exponential {
                base_delay,
                max_delay,
                factor,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let nanos = base_delay.as_nanos() as f64 * factor.powi(exponent);
                cap(nanos_to_duration(nanos), *max_delay)
            }
            Backoff::Jitter { max_delay } => {
                let upper = u64::try_from(max_delay.as_nanos()).unwrap_or(u64::MAX);
                Duration::from_nanos(rand::rng().random_range(0..=upper))
            }
            Backoff::Custom(delay_fn) => delay_fn(attempt),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(DEFAULT_RETRY_DELAY)
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Backoff::Linear { increment, max_delay } => f
                .debug_struct("Linear")
                .field("increment", increment)
                .field("max_delay", max_delay)
                .finish(),
            Backoff::Exponential {
                base_delay,
                max_delay,
                factor,
            } => f
                .debug_struct("Exponential")
                .field("base_delay", base_delay)
                .field("max_delay", max_delay)
                .field("factor", factor)
                .finish(),
            Backoff::Jitter { max_delay } => f
                .debug_struct("Jitter")
                .field("max_delay", max_delay)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn cap(delay: Duration, max_delay: Option<Duration>) -> Duration {
    match max_delay {
        Some(max) => delay.min(max),
        None => delay,
    }
}

fn nanos_to_duration(nanos: f64) -> Duration {
    if nanos.is_finite() && nanos < u64::MAX as f64 {
        Duration::from_nanos(nanos.round() as u64)
    } else {
        Duration::MAX
    }
}

/// How many extra attempts to make, and how long to wait before each.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// `max_attempts` retries spaced by the default fixed one-second delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Backoff strategy as it appears in a configuration file.
///
/// ```json
/// { "strategy": "exponential", "base_delay_ms": 500, "max_delay_ms": 8000, "factor": 2.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    Fixed {
        delay_ms: i64,
    },
    Linear {
        increment_ms: i64,
        #[serde(default)]
        max_delay_ms: Option<i64>,
    },
    Exponential {
        #[serde(default = "default_base_delay_ms")]
        base_delay_ms: i64,
        #[serde(default)]
        max_delay_ms: Option<i64>,
        #[serde(default = "default_factor")]
        factor: f64,
    },
    Jitter {
        max_delay_ms: i64,
    },
}

fn default_base_delay_ms() -> i64 {
    DEFAULT_BASE_DELAY.as_millis() as i64
}

fn default_factor() -> f64 {
    DEFAULT_FACTOR
}

fn millis(field: &'static str, value_ms: i64) -> Result<Duration, ConfigError> {
    u64::try_from(value_ms)
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::NegativeDuration { field, value_ms })
}

fn optional_millis(field: &'static str, value_ms: Option<i64>) -> Result<Option<Duration>, ConfigError> {
    value_ms.map(|ms| millis(field, ms)).transpose()
}

impl TryFrom<BackoffConfig> for Backoff {
    type Error = ConfigError;

    fn try_from(config: BackoffConfig) -> Result<Self, Self::Error> {
        match config {
            BackoffConfig::Fixed { delay_ms } => Ok(Backoff::fixed(millis("delay_ms", delay_ms)?)),
            BackoffConfig::Linear {
                increment_ms,
                max_delay_ms,
            } => Ok(Backoff::linear(
                millis("increment_ms", increment_ms)?,
                optional_millis("max_delay_ms", max_delay_ms)?,
            )),
            BackoffConfig::Exponential {
                base_delay_ms,
                max_delay_ms,
                factor,
            } => Backoff::exponential(
                millis("base_delay_ms", base_delay_ms)?,
                optional_millis("max_delay_ms", max_delay_ms)?,
                factor,
            ),
            BackoffConfig::Jitter { max_delay_ms } => {
                Ok(Backoff::jitter(millis("max_delay_ms", max_delay_ms)?))
            }
        }
    }
}

/// Retry policy as it appears in a configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(config: RetryConfig) -> Result<Self, Self::Error> {
        let backoff = match config.backoff {
            Some(backoff) => Backoff::try_from(backoff)?,
            None => Backoff::default(),
        };
        Ok(RetryPolicy::with_backoff(config.max_attempts, backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn fixed_is_constant() {
        let backoff = Backoff::fixed(secs(1));
        for attempt in 1..=10 {
            assert_eq!(backoff.delay(attempt), secs(1));
        }
    }

    #[test]
    fn linear_grows_then_caps() {
        let backoff = Backoff::linear(secs(1), Some(secs(3)));
        assert_eq!(backoff.delay(1), secs(1));
        assert_eq!(backoff.delay(2), secs(2));
        assert_eq!(backoff.delay(3), secs(3));
        assert_eq!(backoff.delay(7), secs(3));
    }

    #[test]
    fn linear_uncapped_saturates() {
        let backoff = Backoff::linear(Duration::MAX, None);
        assert_eq!(backoff.delay(2), Duration::MAX);
    }

    #[test]
    fn exponential_grows_then_caps() {
        let backoff = Backoff::exponential(secs(1), Some(secs(5)), 2.0).unwrap();
        assert_eq!(backoff.delay(1), secs(2));
        assert_eq!(backoff.delay(2), secs(4));
        assert_eq!(backoff.delay(3), secs(5));
        assert_eq!(backoff.delay(u32::MAX), secs(5));
    }

    #[test]
    fn exponential_sub_second_base() {
        let backoff = Backoff::exponential(Duration::from_millis(100), None, 3.0).unwrap();
        assert_eq!(backoff.delay(1), Duration::from_millis(300));
        assert_eq!(backoff.delay(2), Duration::from_millis(900));
    }

    #[test]
    fn exponential_uncapped_overflow_saturates() {
        let backoff = Backoff::exponential(secs(1), None, 10.0).unwrap();
        assert_eq!(backoff.delay(400), Duration::MAX);
    }

    #[test]
    fn exponential_rejects_bad_factor() {
        for factor in [0.5, -2.0, f64::NAN, f64::INFINITY] {
            let err = Backoff::exponential(secs(1), None, factor).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidFactor(_)));
        }
        assert!(Backoff::exponential(secs(1), None, 1.0).is_ok());
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let backoff = Backoff::jitter(secs(2));
        for attempt in 1..=200 {
            assert!(backoff.delay(attempt) <= secs(2));
        }
        assert_eq!(Backoff::jitter(Duration::ZERO).delay(1), Duration::ZERO);
    }

    #[test]
    fn custom_function_is_used() {
        let backoff = Backoff::custom(|attempt| Duration::from_millis(u64::from(attempt) * 10));
        assert_eq!(backoff.delay(4), Duration::from_millis(40));
    }

    #[test]
    fn default_policy_waits_one_second() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay(1), secs(1));
        assert_eq!(policy.delay(3), secs(1));
    }

    #[test]
    fn config_rejects_negative_fixed_delay() {
        let config: BackoffConfig =
            serde_json::from_str(r#"{"strategy":"fixed","delay_ms":-1000}"#).unwrap();
        let err = Backoff::try_from(config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativeDuration {
                field: "delay_ms",
                value_ms: -1000
            }
        ));
    }

    #[test]
    fn config_rejects_negative_linear_increment() {
        let config: BackoffConfig =
            serde_json::from_str(r#"{"strategy":"linear","increment_ms":-5}"#).unwrap();
        assert!(Backoff::try_from(config).is_err());
    }

    #[test]
    fn config_rejects_small_factor() {
        let config: BackoffConfig =
            serde_json::from_str(r#"{"strategy":"exponential","factor":0.9}"#).unwrap();
        assert!(matches!(
            Backoff::try_from(config),
            Err(ConfigError::InvalidFactor(_))
        ));
    }

    #[test]
    fn config_exponential_defaults() {
        let config: BackoffConfig = serde_json::from_str(r#"{"strategy":"exponential"}"#).unwrap();
        let backoff = Backoff::try_from(config).unwrap();
        assert_eq!(backoff.delay(1), secs(2));
        assert_eq!(backoff.delay(3), secs(8));
    }

    #[test]
    fn retry_config_without_backoff_uses_default() {
        let config: RetryConfig = serde_json::from_str(r#"{"max_attempts":2}"#).unwrap();
        let policy = RetryPolicy::try_from(config).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay(1), secs(1));
    }

    #[test]
    fn retry_config_with_linear_backoff() {
        let config: RetryConfig = serde_json::from_str(
            r#"{"max_attempts":4,"backoff":{"strategy":"linear","increment_ms":250,"max_delay_ms":500}}"#,
        )
        .unwrap();
        let policy = RetryPolicy::try_from(config).unwrap();
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(4), Duration::from_millis(500));
    }
}
