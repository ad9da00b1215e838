//! Bounded exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry policy: `max_attempts` total tries, sleeping `initial_delay`,
/// then `initial_delay * multiplier`, and so on between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .mul_f64(self.multiplier.max(1.0).powi(retry as i32))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    ///
    /// No sleep happens after the final attempt.
    pub fn retry<T, E, F, P>(&self, sleeper: &dyn Sleeper, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && is_retryable(&err) => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(attempt, max_attempts = attempts, delay_ms = delay.as_millis() as u64, error = %err, "retrying after backoff");
                    sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn delays_double() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn stops_on_non_retryable() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), String> = BackoffPolicy::default().retry(
            &sleeper,
            |e: &String| e == "busy",
            |_| {
                calls += 1;
                Err("bad".to_string())
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[test]
    fn no_sleep_after_last_attempt() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), String> = BackoffPolicy::default().retry(
            &sleeper,
            |_| true,
            |_| {
                calls += 1;
                Err("busy".to_string())
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn policy_none_runs_once() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let _: Result<(), String> = BackoffPolicy::none().retry(&sleeper, |_| true, |_| {
            calls += 1;
            Err("busy".into())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn deserializes_millis() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"max_attempts": 5, "initial_delay": 250}"#).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.multiplier, 2.0);
    }
}
