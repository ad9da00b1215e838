//! Travel-time client with bounded retry and a degraded path for unresolved
//! locations.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backoff::{BackoffPolicy, Sleeper, ThreadSleeper};
use crate::error::OracleError;
use crate::model::Location;
use crate::traits::RoutingOracle;

/// Drive-time estimate used when either endpoint has no coordinates.
pub const DEFAULT_UNRESOLVED_MINUTES: f64 = 35.0;

/// Synchronous travel-time client over a [`RoutingOracle`].
///
/// Calls block the current thread, including backoff sleeps. Exhausted
/// retries surface as `Err`, never as a panic.
pub struct RoutingClient<O> {
    oracle: O,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    unresolved_minutes: f64,
}

impl<O: RoutingOracle> RoutingClient<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            policy: BackoffPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            unresolved_minutes: DEFAULT_UNRESOLVED_MINUTES,
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_unresolved_minutes(mut self, minutes: f64) -> Self {
        self.unresolved_minutes = minutes;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Drive minutes from `origin` to `destination`.
    ///
    /// Unresolved endpoints yield the fixed fallback estimate instead of an
    /// error. Rate-limit and network failures are retried per the backoff
    /// policy; other oracle errors return immediately.
    pub fn estimate_minutes(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> Result<f64, OracleError> {
        let (Some(from), Some(to)) = (origin.coordinates, destination.coordinates) else {
            warn!(
                origin = %origin.name,
                destination = %destination.name,
                fallback_minutes = self.unresolved_minutes,
                "missing coordinates, using fallback estimate"
            );
            return Ok(self.unresolved_minutes);
        };

        let minutes = self.policy.retry(
            self.sleeper.as_ref(),
            OracleError::is_retryable,
            |attempt| {
                debug!(origin = %origin.name, destination = %destination.name, attempt, "routing query");
                self.oracle.minutes(from, to)
            },
        )?;

        debug!(origin = %origin.name, destination = %destination.name, minutes, "routing result");
        Ok(minutes)
    }
}
