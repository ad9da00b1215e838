//! Timed forward walk with truncate-and-retry repair.
//!
//! The tentative route is re-walked against the routing oracle from the hub
//! on every iteration; nothing carries over between walks. When a hop fails
//! or the venue arrival misses the deadline, the lowest-priority stop is
//! dropped and the walk restarts. Each iteration shrinks the list, so at
//! most `n + 1` walks happen for `n` candidates.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{OracleError, PlanError};
use crate::model::{minutes, Itinerary, Location, RouteSegment, ScoredCandidate, TimeWindow};
use crate::routing::RoutingClient;
use crate::traits::RoutingOracle;

/// Result of the repair loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub itinerary: Itinerary,
    /// Stops kept, in route order.
    pub accepted: Vec<ScoredCandidate>,
    /// Stops removed, in the order they were dropped.
    pub dropped: Vec<ScoredCandidate>,
    pub walks: usize,
    /// Final arrival is no later than the deadline. Always true for a
    /// non-empty route.
    pub on_time: bool,
}

struct HopFailure {
    from: String,
    to: String,
    error: OracleError,
}

pub struct FeasibilityRepair<'a, O> {
    routing: &'a RoutingClient<O>,
    visit_minutes: f64,
    cancel: CancelToken,
}

impl<'a, O: RoutingOracle> FeasibilityRepair<'a, O> {
    pub fn new(routing: &'a RoutingClient<O>, visit_minutes: f64) -> Self {
        Self {
            routing,
            visit_minutes,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Turn `tentative` (priority order) into a timed itinerary that reaches
    /// `venue` by `window.deadline`, dropping stops from the tail as needed.
    ///
    /// When every stop has been dropped the result is the direct hub to venue
    /// hop of `direct_minutes`. That is a valid outcome, not an error.
    pub fn repair(
        &self,
        tentative: Vec<ScoredCandidate>,
        hub: &Location,
        venue: &Location,
        window: &TimeWindow,
        direct_minutes: f64,
    ) -> Result<RepairOutcome, PlanError> {
        let mut remaining = tentative;
        let mut dropped = Vec::new();
        let mut walks = 0;

        info!(stops = remaining.len(), deadline = %window.deadline, "starting feasibility repair");

        while !remaining.is_empty() {
            self.cancel.check()?;
            walks += 1;

            match self.walk(&remaining, hub, venue, window.hub_arrival) {
                Ok(itinerary) if itinerary.final_arrival <= window.deadline => {
                    info!(
                        stops = remaining.len(),
                        walks,
                        final_arrival = %itinerary.final_arrival,
                        "route accepted"
                    );
                    return Ok(RepairOutcome {
                        itinerary,
                        accepted: remaining,
                        dropped,
                        walks,
                        on_time: true,
                    });
                }
                Ok(itinerary) => {
                    info!(
                        final_arrival = %itinerary.final_arrival,
                        deadline = %window.deadline,
                        "route misses deadline"
                    );
                }
                Err(failure) => {
                    warn!(
                        from = %failure.from,
                        to = %failure.to,
                        error = %failure.error,
                        "hop unavailable"
                    );
                }
            }

            if let Some(removed) = remaining.pop() {
                info!(candidate = %removed.name(), left = remaining.len(), "dropping lowest-priority stop");
                dropped.push(removed);
            }
        }

        self.cancel.check()?;
        walks += 1;
        let itinerary = direct_route(hub, venue, window.hub_arrival, direct_minutes);
        let on_time = itinerary.final_arrival <= window.deadline;
        info!(final_arrival = %itinerary.final_arrival, on_time, "no optional visits scheduled");

        Ok(RepairOutcome {
            itinerary,
            accepted: Vec::new(),
            dropped,
            walks,
            on_time,
        })
    }

    /// One full hub to venue walk, querying every hop.
    fn walk(
        &self,
        stops: &[ScoredCandidate],
        hub: &Location,
        venue: &Location,
        hub_arrival: NaiveDateTime,
    ) -> Result<Itinerary, HopFailure> {
        let mut segments = Vec::with_capacity(stops.len() * 2 + 1);
        let mut current = hub;
        let mut clock = hub_arrival;

        for stop in stops {
            let target = &stop.candidate.location;
            let hop = self.hop(current, target)?;
            let arrival = clock + minutes(hop);
            segments.push(RouteSegment::Transit {
                from: current.clone(),
                to: target.clone(),
                start: clock,
                end: arrival,
                minutes: hop,
            });

            let leave = arrival + minutes(self.visit_minutes);
            segments.push(RouteSegment::Visit {
                candidate: stop.candidate.clone(),
                start: arrival,
                end: leave,
                minutes: self.visit_minutes,
            });

            debug!(candidate = %stop.name(), arrive = %arrival, leave = %leave, "walk stop");
            clock = leave;
            current = target;
        }

        let hop = self.hop(current, venue)?;
        let final_arrival = clock + minutes(hop);
        segments.push(RouteSegment::Transit {
            from: current.clone(),
            to: venue.clone(),
            start: clock,
            end: final_arrival,
            minutes: hop,
        });

        Ok(Itinerary {
            segments,
            final_arrival,
        })
    }

    fn hop(&self, from: &Location, to: &Location) -> Result<f64, HopFailure> {
        self.routing
            .estimate_minutes(from, to)
            .map_err(|error| HopFailure {
                from: from.name.clone(),
                to: to.name.clone(),
                error,
            })
    }
}

/// Hub straight to the venue.
pub fn direct_route(
    hub: &Location,
    venue: &Location,
    hub_arrival: NaiveDateTime,
    direct_minutes: f64,
) -> Itinerary {
    let final_arrival = hub_arrival + minutes(direct_minutes);
    Itinerary {
        segments: vec![RouteSegment::Transit {
            from: hub.clone(),
            to: venue.clone(),
            start: hub_arrival,
            end: final_arrival,
            minutes: direct_minutes,
        }],
        final_arrival,
    }
}
