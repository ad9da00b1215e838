//! Drive-time radius filter over the directory snapshot.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::PlanError;
use crate::model::{Candidate, FilteredCandidate, Location};
use crate::routing::RoutingClient;
use crate::traits::RoutingOracle;

/// Keeps directory entries within `max_minutes` of drive time from a center.
pub struct CandidateFilter<'a, O> {
    routing: &'a RoutingClient<O>,
    parallel: bool,
    cancel: CancelToken,
}

impl<'a, O: RoutingOracle> CandidateFilter<'a, O> {
    pub fn new(routing: &'a RoutingClient<O>) -> Self {
        Self {
            routing,
            parallel: false,
            cancel: CancelToken::default(),
        }
    }

    /// Run the per-entry lookups on the rayon pool. Output order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Entries of `center.city` reachable within `max_minutes`, annotated
    /// with their drive time from `center`, in directory order.
    ///
    /// An unresolved center yields nothing. Entries whose lookup fails are
    /// skipped.
    pub fn filter(
        &self,
        center: &Location,
        max_minutes: f64,
        directory: &[Candidate],
    ) -> Result<Vec<FilteredCandidate>, PlanError> {
        if !center.is_resolved() {
            warn!(center = %center.name, "filter center has no coordinates");
            return Ok(Vec::new());
        }

        let in_city: Vec<&Candidate> = directory
            .iter()
            .filter(|entry| entry.location.city == center.city)
            .collect();

        info!(
            city = %center.city,
            entries = in_city.len(),
            max_minutes,
            "filtering candidates by drive time"
        );

        let results: Vec<Result<Option<FilteredCandidate>, PlanError>> = if self.parallel {
            in_city
                .par_iter()
                .map(|entry| self.check(center, max_minutes, entry))
                .collect()
        } else {
            in_city
                .iter()
                .map(|entry| self.check(center, max_minutes, entry))
                .collect()
        };

        let mut kept = Vec::new();
        for result in results {
            if let Some(filtered) = result? {
                kept.push(filtered);
            }
        }

        info!(kept = kept.len(), "candidate filter finished");
        Ok(kept)
    }

    fn check(
        &self,
        center: &Location,
        max_minutes: f64,
        entry: &Candidate,
    ) -> Result<Option<FilteredCandidate>, PlanError> {
        self.cancel.check()?;

        match self.routing.estimate_minutes(center, &entry.location) {
            Ok(minutes) if minutes <= max_minutes => {
                debug!(candidate = %entry.name, minutes, "within range");
                Ok(Some(FilteredCandidate {
                    candidate: entry.clone(),
                    minutes_from_center: minutes,
                }))
            }
            Ok(minutes) => {
                debug!(candidate = %entry.name, minutes, "out of range");
                Ok(None)
            }
            Err(err) => {
                warn!(candidate = %entry.name, error = %err, "skipping candidate, route unavailable");
                Ok(None)
            }
        }
    }
}
