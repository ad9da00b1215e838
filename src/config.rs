//! Planner configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;

/// Weights of the composite score
/// `alpha*attract + beta*feas - gamma*total + delta*buffer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub alpha: f64,
    pub beta: f64,
    /// Penalty per minute of total drive time.
    pub gamma: f64,
    /// Reward per minute of slack left in the window.
    pub delta: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.3,
            gamma: 0.1,
            delta: 0.05,
        }
    }
}

/// Algorithmic constants for one planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub weights: ScoreWeights,

    /// Fixed length of every waypoint visit.
    pub visit_duration_minutes: f64,

    /// Slack required at the venue before the meeting starts.
    pub post_arrival_buffer_minutes: f64,

    /// Slack used when deriving the latest acceptable hub arrival.
    pub pre_meeting_buffer_minutes: f64,

    /// Time to be at the origin hub before departure.
    pub pre_departure_buffer_minutes: f64,

    /// Per-leg estimate when a reference commute cannot be routed.
    pub reference_commute_fallback_minutes: f64,

    /// Estimate returned when either routing endpoint has no coordinates.
    pub unresolved_fallback_minutes: f64,

    /// Filter radius as a multiple of the hub to venue commute.
    pub search_radius_factor: f64,

    pub check_in_minutes: f64,
    pub hotel_commute_fallback_minutes: f64,

    pub retry: BackoffPolicy,

    /// Fan candidate filtering lookups out over a thread pool.
    pub parallel_filter: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            visit_duration_minutes: 45.0,
            post_arrival_buffer_minutes: 30.0,
            pre_meeting_buffer_minutes: 90.0,
            pre_departure_buffer_minutes: 90.0,
            reference_commute_fallback_minutes: 60.0,
            unresolved_fallback_minutes: 35.0,
            search_radius_factor: 2.0,
            check_in_minutes: 30.0,
            hotel_commute_fallback_minutes: 30.0,
            retry: BackoffPolicy::default(),
            parallel_filter: false,
        }
    }
}

impl PlannerConfig {
    /// Load a config file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, crate::error::LoadError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_config() {
        let config = PlannerConfig::default();

        assert_eq!(config.weights.alpha, 0.5);
        assert_eq!(config.weights.beta, 0.3);
        assert_eq!(config.weights.gamma, 0.1);
        assert_eq!(config.weights.delta, 0.05);
        assert_eq!(config.visit_duration_minutes, 45.0);
        assert_eq!(config.post_arrival_buffer_minutes, 30.0);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PlannerConfig = serde_json::from_str(
            r#"{"visit_duration_minutes": 60, "weights": {"gamma": 0.2}}"#,
        )
        .unwrap();

        assert_eq!(config.visit_duration_minutes, 60.0);
        assert_eq!(config.weights.gamma, 0.2);
        assert_eq!(config.weights.alpha, 0.5);
        assert_eq!(config.search_radius_factor, 2.0);
    }
}
