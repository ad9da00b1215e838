//! Greedy priority sequencing of scored candidates.

use tracing::{debug, info, warn};

use crate::model::{Location, ScoredCandidate};
use crate::routing::RoutingClient;
use crate::traits::RoutingOracle;

/// A candidate accepted into the tentative route.
#[derive(Debug, Clone, PartialEq)]
pub struct TentativeStop {
    pub candidate: ScoredCandidate,
    /// Estimated hop from the previous stop (or the hub for the first one).
    pub hop_minutes: f64,
    /// The hop is the candidate's hub leg standing in for a failed pairwise query.
    pub hop_is_fallback: bool,
}

/// Accepted prefix of the priority order, without timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct TentativeRoute {
    pub stops: Vec<TentativeStop>,
    pub remaining_minutes: f64,
}

impl TentativeRoute {
    /// Candidates in priority order.
    pub fn candidates(&self) -> Vec<ScoredCandidate> {
        self.stops.iter().map(|stop| stop.candidate.clone()).collect()
    }
}

/// Highest score first; ties broken by name, then id.
pub fn priority_order(candidates: &[ScoredCandidate]) -> Vec<ScoredCandidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.candidate.name.cmp(&b.candidate.name))
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
    sorted
}

/// Walks the priority order from the hub and keeps the prefix that fits the
/// budget. Single greedy pass: the first candidate that does not fit ends
/// the walk.
pub struct Sequencer<'a, O> {
    routing: &'a RoutingClient<O>,
    visit_minutes: f64,
}

impl<'a, O: RoutingOracle> Sequencer<'a, O> {
    pub fn new(routing: &'a RoutingClient<O>, visit_minutes: f64) -> Self {
        Self {
            routing,
            visit_minutes,
        }
    }

    pub fn sequence(&self, candidates: &[ScoredCandidate], available_minutes: f64) -> TentativeRoute {
        let ordered = priority_order(candidates);
        let mut remaining = available_minutes;
        let mut stops: Vec<TentativeStop> = Vec::new();

        info!(candidates = ordered.len(), available_minutes, "sequencing by score");

        for candidate in ordered {
            let (hop_minutes, hop_is_fallback) = match stops.last() {
                None => (candidate.hub_minutes, false),
                Some(previous) => self.pairwise(&previous.candidate.candidate.location, &candidate),
            };

            let needed = hop_minutes + self.visit_minutes;
            if needed > remaining {
                info!(
                    candidate = %candidate.name(),
                    needed,
                    remaining,
                    "budget exhausted, stopping"
                );
                break;
            }

            remaining -= needed;
            debug!(candidate = %candidate.name(), score = candidate.score, hop_minutes, remaining, "accepted");
            stops.push(TentativeStop {
                candidate,
                hop_minutes,
                hop_is_fallback,
            });
        }

        TentativeRoute {
            stops,
            remaining_minutes: remaining,
        }
    }

    /// True previous-to-candidate drive time. The candidate's hub leg is used
    /// only when the oracle itself fails.
    fn pairwise(&self, previous: &Location, candidate: &ScoredCandidate) -> (f64, bool) {
        match self.routing.estimate_minutes(previous, &candidate.candidate.location) {
            Ok(minutes) => (minutes, false),
            Err(err) => {
                warn!(
                    candidate = %candidate.name(),
                    error = %err,
                    fallback_minutes = candidate.hub_minutes,
                    "pairwise hop unavailable, using hub leg"
                );
                (candidate.hub_minutes, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::error::OracleError;
    use crate::model::{Candidate, Coordinates};

    /// Pairwise minutes keyed by (from lat, to lat) in thousandths.
    struct Pairs(HashMap<(i64, i64), f64>);

    impl RoutingOracle for Pairs {
        fn minutes(&self, from: Coordinates, to: Coordinates) -> Result<f64, OracleError> {
            let key = ((from.lat * 1000.0).round() as i64, (to.lat * 1000.0).round() as i64);
            self.0
                .get(&key)
                .copied()
                .ok_or_else(|| OracleError::TransientNetwork("timeout".into()))
        }
    }

    fn scored(name: &str, lat_milli: i64, hub_minutes: f64, score: f64) -> ScoredCandidate {
        let lat = lat_milli as f64 / 1000.0;
        ScoredCandidate {
            candidate: Candidate {
                id: name.to_string(),
                name: name.to_string(),
                location: Location::new("Shenzhen", name, name, Some(Coordinates::new(lat, 114.0))),
                industry: String::new(),
                description: String::new(),
            },
            hub_minutes,
            venue_minutes: 0.0,
            total_minutes: hub_minutes,
            buffer_minutes: 0.0,
            attractiveness: 0.0,
            feasibility: 0.0,
            score,
            rationale: String::new(),
        }
    }

    fn routing(pairs: &[((i64, i64), f64)]) -> RoutingClient<Pairs> {
        RoutingClient::new(Pairs(pairs.iter().copied().collect())).with_policy(BackoffPolicy::none())
    }

    #[test]
    fn ties_break_on_name() {
        let ordered = priority_order(&[
            scored("zeta", 1, 10.0, 5.0),
            scored("alpha", 2, 10.0, 5.0),
            scored("best", 3, 10.0, 7.0),
        ]);
        let names: Vec<_> = ordered.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["best", "alpha", "zeta"]);
    }

    #[test]
    fn later_hops_use_true_pairwise_distance() {
        // Hub leg of "b" is 50, but a -> b is only 5.
        let routing = routing(&[((1, 2), 5.0)]);
        let route = Sequencer::new(&routing, 45.0).sequence(
            &[scored("a", 1, 10.0, 9.0), scored("b", 2, 50.0, 8.0)],
            105.0,
        );

        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[1].hop_minutes, 5.0);
        assert!(!route.stops[1].hop_is_fallback);
        assert_eq!(route.remaining_minutes, 0.0);
    }

    #[test]
    fn failed_pairwise_query_falls_back_to_hub_leg_and_is_flagged() {
        let routing = routing(&[]);
        let route = Sequencer::new(&routing, 45.0).sequence(
            &[scored("a", 1, 10.0, 9.0), scored("b", 2, 20.0, 8.0)],
            180.0,
        );

        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[1].hop_minutes, 20.0);
        assert!(route.stops[1].hop_is_fallback);
    }

    #[test]
    fn stops_at_first_misfit_even_if_later_fits() {
        // "big" does not fit after "a"; "small" would, but the pass has ended.
        let routing = routing(&[((1, 2), 80.0), ((1, 3), 5.0)]);
        let route = Sequencer::new(&routing, 45.0).sequence(
            &[
                scored("a", 1, 10.0, 9.0),
                scored("big", 2, 80.0, 8.0),
                scored("small", 3, 5.0, 1.0),
            ],
            120.0,
        );

        let names: Vec<_> = route.stops.iter().map(|s| s.candidate.name()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(route.remaining_minutes, 65.0);
    }

    #[test]
    fn empty_input_gives_empty_route() {
        let routing = routing(&[]);
        let route = Sequencer::new(&routing, 45.0).sequence(&[], 60.0);
        assert!(route.stops.is_empty());
        assert_eq!(route.remaining_minutes, 60.0);
    }
}
