//! Error types shared across the planner.

/// Failures reported by an external oracle (routing, geocoding, reasoning).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// The oracle throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network, timeout, or HTTP-level failure.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// The oracle rejected the request (malformed parameters, unknown route, bad payload).
    #[error("oracle error: {0}")]
    Permanent(String),

    /// An endpoint has no resolved coordinates, or an address could not be resolved.
    #[error("location unresolved: {0}")]
    ResolutionUnavailable(String),
}

impl OracleError {
    /// Rate-limit and transport failures share the backoff schedule; everything
    /// else fails immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OracleError::RateLimited(_) | OracleError::TransientNetwork(_)
        )
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(429) {
            OracleError::RateLimited(err.to_string())
        } else if err.is_decode() {
            OracleError::Permanent(err.to_string())
        } else if err.is_status() {
            match err.status() {
                Some(status) if status.is_server_error() => {
                    OracleError::TransientNetwork(err.to_string())
                }
                _ => OracleError::Permanent(err.to_string()),
            }
        } else {
            OracleError::TransientNetwork(err.to_string())
        }
    }
}

/// Failures that abort a planning run.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no transit offers to choose from")]
    NoOffers,

    /// The choice oracle named an offer that is not in the offer set.
    #[error("transit choice {kind} {id} does not match any offer")]
    OracleMismatch { kind: String, id: String },

    #[error("transit choice failed: {0}")]
    Selection(#[source] OracleError),

    /// A leg the trip cannot do without (hub commute, hub resolution).
    #[error("mandatory leg '{leg}' unavailable: {source}")]
    MandatoryLeg {
        leg: &'static str,
        #[source]
        source: OracleError,
    },

    #[error("planning cancelled")]
    Cancelled,
}

/// Failures loading JSON inputs (directory snapshot, config, offers).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
