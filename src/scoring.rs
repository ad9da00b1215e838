//! Eligibility check and composite scoring of filtered candidates.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::ScoreWeights;
use crate::error::PlanError;
use crate::model::{FilteredCandidate, Location, ScoredCandidate};
use crate::routing::RoutingClient;
use crate::traits::{CandidateSummary, Judgment, RoutingOracle, ValueJudge};

/// `alpha*attract + beta*feas - gamma*total + delta*buffer`.
pub fn composite_score(
    weights: &ScoreWeights,
    attractiveness: f64,
    feasibility: f64,
    total_minutes: f64,
    buffer_minutes: f64,
) -> f64 {
    weights.alpha * attractiveness + weights.beta * feasibility - weights.gamma * total_minutes
        + weights.delta * buffer_minutes
}

/// A candidate that passed the time-budget test, before judgment.
struct Eligible<'c> {
    filtered: &'c FilteredCandidate,
    venue_minutes: f64,
}

impl Eligible<'_> {
    fn total_minutes(&self) -> f64 {
        self.filtered.minutes_from_center + self.venue_minutes
    }
}

/// Resolves the venue leg, drops ineligible candidates, and merges external
/// judgments into a single comparable score.
pub struct ScoringEngine<'a, O> {
    routing: &'a RoutingClient<O>,
    weights: ScoreWeights,
    visit_minutes: f64,
    cancel: CancelToken,
}

impl<'a, O: RoutingOracle> ScoringEngine<'a, O> {
    pub fn new(routing: &'a RoutingClient<O>, weights: ScoreWeights, visit_minutes: f64) -> Self {
        Self {
            routing,
            weights,
            visit_minutes,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether a visit fits the budget on its own: hub leg, visit, venue leg.
    pub fn is_eligible(&self, hub_minutes: f64, venue_minutes: f64, available_minutes: f64) -> bool {
        hub_minutes + self.visit_minutes + venue_minutes <= available_minutes
    }

    /// Score every eligible candidate. `filtered` carries the hub leg
    /// (the filter center is the arrival hub).
    ///
    /// Candidates with an unresolved venue leg, that fail eligibility, or
    /// that the judge does not return are dropped. A failing judge yields
    /// no scored candidates.
    pub fn score(
        &self,
        filtered: &[FilteredCandidate],
        venue: &Location,
        available_minutes: f64,
        judge: &dyn ValueJudge,
    ) -> Result<Vec<ScoredCandidate>, PlanError> {
        let mut eligible = Vec::new();
        for entry in filtered {
            self.cancel.check()?;

            let name = &entry.candidate.name;
            let venue_minutes = match self.routing.estimate_minutes(&entry.candidate.location, venue) {
                Ok(minutes) => minutes,
                Err(err) => {
                    warn!(candidate = %name, error = %err, "dropping candidate, venue leg unavailable");
                    continue;
                }
            };

            if !self.is_eligible(entry.minutes_from_center, venue_minutes, available_minutes) {
                debug!(
                    candidate = %name,
                    hub_minutes = entry.minutes_from_center,
                    venue_minutes,
                    available_minutes,
                    "ineligible, does not fit the window"
                );
                continue;
            }

            eligible.push(Eligible {
                filtered: entry,
                venue_minutes,
            });
        }

        if eligible.is_empty() {
            info!("no eligible candidates, skipping value judgment");
            return Ok(Vec::new());
        }

        let summaries: Vec<CandidateSummary> = eligible
            .iter()
            .map(|e| CandidateSummary {
                name: e.filtered.candidate.name.clone(),
                industry: e.filtered.candidate.industry.clone(),
                description: e.filtered.candidate.description.clone(),
                hub_minutes: e.filtered.minutes_from_center,
                venue_minutes: e.venue_minutes,
                total_minutes: e.total_minutes(),
            })
            .collect();

        info!(candidates = summaries.len(), available_minutes, "requesting value judgments");
        let judgments = match judge.score(&summaries, available_minutes) {
            Ok(judgments) => judgments,
            Err(err) => {
                warn!(error = %err, "value judgment failed, no optional visits");
                return Ok(Vec::new());
            }
        };

        let mut by_name: HashMap<&str, &Judgment> = HashMap::new();
        for judgment in &judgments {
            by_name.entry(judgment.name.as_str()).or_insert(judgment);
        }

        let scored: Vec<ScoredCandidate> = eligible
            .iter()
            .filter_map(|e| self.merge(e, by_name.get(e.filtered.candidate.name.as_str()).copied(), available_minutes))
            .collect();

        info!(scored = scored.len(), "scoring finished");
        Ok(scored)
    }

    fn merge(
        &self,
        eligible: &Eligible<'_>,
        judgment: Option<&Judgment>,
        available_minutes: f64,
    ) -> Option<ScoredCandidate> {
        let candidate = &eligible.filtered.candidate;
        let Some(judgment) = judgment else {
            warn!(candidate = %candidate.name, "no judgment returned, dropping");
            return None;
        };
        if !judgment.attractiveness.is_finite() || !judgment.feasibility.is_finite() {
            warn!(candidate = %candidate.name, "non-numeric judgment, dropping");
            return None;
        }

        let total_minutes = eligible.total_minutes();
        let buffer_minutes = available_minutes - total_minutes - self.visit_minutes;
        let score = composite_score(
            &self.weights,
            judgment.attractiveness,
            judgment.feasibility,
            total_minutes,
            buffer_minutes,
        );

        debug!(candidate = %candidate.name, score, total_minutes, buffer_minutes, "scored");
        Some(ScoredCandidate {
            candidate: candidate.clone(),
            hub_minutes: eligible.filtered.minutes_from_center,
            venue_minutes: eligible.venue_minutes,
            total_minutes,
            buffer_minutes,
            attractiveness: judgment.attractiveness,
            feasibility: judgment.feasibility,
            score,
            rationale: judgment.reasoning.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::error::OracleError;
    use crate::model::{Candidate, Coordinates};

    /// Venue leg = destination latitude offset in minutes (lat 22.0 is 0).
    struct Offset;

    impl RoutingOracle for Offset {
        fn minutes(&self, from: Coordinates, _: Coordinates) -> Result<f64, OracleError> {
            if from.lat < 0.0 {
                return Err(OracleError::Permanent("no route".into()));
            }
            Ok(((from.lat - 22.0) * 1000.0).round())
        }
    }

    struct Table {
        judgments: Vec<Judgment>,
        seen: Mutex<Vec<String>>,
    }

    impl ValueJudge for Table {
        fn score(&self, candidates: &[CandidateSummary], _: f64) -> Result<Vec<Judgment>, OracleError> {
            self.seen
                .lock()
                .unwrap()
                .extend(candidates.iter().map(|c| c.name.clone()));
            Ok(self.judgments.clone())
        }
    }

    struct Failing;

    impl ValueJudge for Failing {
        fn score(&self, _: &[CandidateSummary], _: f64) -> Result<Vec<Judgment>, OracleError> {
            Err(OracleError::Permanent("malformed JSON".into()))
        }
    }

    fn filtered(name: &str, hub_minutes: f64, venue_minutes: f64) -> FilteredCandidate {
        let lat = 22.0 + venue_minutes / 1000.0;
        FilteredCandidate {
            candidate: Candidate {
                id: name.to_string(),
                name: name.to_string(),
                location: Location::new("Shenzhen", name, name, Some(Coordinates::new(lat, 114.0))),
                industry: String::new(),
                description: String::new(),
            },
            minutes_from_center: hub_minutes,
        }
    }

    fn judgment(name: &str, attract: f64, feas: f64) -> Judgment {
        Judgment {
            name: name.to_string(),
            attractiveness: attract,
            feasibility: feas,
            reasoning: format!("{name} looks fine"),
        }
    }

    fn venue() -> Location {
        Location::new("Shenzhen", "Convention Center", "Venue", Some(Coordinates::new(22.0, 114.0)))
    }

    #[test]
    fn composite_score_matches_worked_example() {
        let weights = ScoreWeights::default();
        assert!((composite_score(&weights, 9.0, 8.0, 45.0, 90.0) - 6.9).abs() < 1e-9);
        assert!((composite_score(&weights, 7.0, 9.0, 25.0, 110.0) - 9.2).abs() < 1e-9);
        assert!((composite_score(&weights, 5.0, 5.0, 110.0, 25.0) + 5.75).abs() < 1e-9);
    }

    #[test]
    fn composite_score_is_pure() {
        let weights = ScoreWeights::default();
        let first = composite_score(&weights, 6.5, 7.25, 38.0, 61.5);
        for _ in 0..10 {
            assert_eq!(composite_score(&weights, 6.5, 7.25, 38.0, 61.5), first);
        }
    }

    #[test]
    fn ineligible_candidates_never_reach_the_judge() {
        let routing = RoutingClient::new(Offset).with_policy(BackoffPolicy::none());
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);
        let judge = Table {
            judgments: vec![judgment("fits", 8.0, 8.0), judgment("too-far", 10.0, 10.0)],
            seen: Mutex::new(Vec::new()),
        };

        let scored = engine
            .score(
                &[filtered("fits", 20.0, 25.0), filtered("too-far", 60.0, 90.0)],
                &venue(),
                180.0,
                &judge,
            )
            .unwrap();

        assert_eq!(*judge.seen.lock().unwrap(), vec!["fits".to_string()]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].total_minutes, 45.0);
        assert_eq!(scored[0].buffer_minutes, 90.0);
        assert_eq!(scored[0].rationale, "fits looks fine");
    }

    #[test]
    fn eligibility_boundary_is_inclusive() {
        let routing = RoutingClient::new(Offset);
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);
        assert!(engine.is_eligible(50.0, 60.0, 155.0));
        assert!(!engine.is_eligible(50.0, 60.0, 154.9));
    }

    #[test]
    fn unmatched_judgments_are_dropped_not_defaulted() {
        let routing = RoutingClient::new(Offset).with_policy(BackoffPolicy::none());
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);
        let judge = Table {
            judgments: vec![judgment("a", 9.0, 8.0), judgment("ghost", 10.0, 10.0)],
            seen: Mutex::new(Vec::new()),
        };

        let scored = engine
            .score(
                &[filtered("a", 20.0, 25.0), filtered("b", 10.0, 15.0)],
                &venue(),
                180.0,
                &judge,
            )
            .unwrap();

        let names: Vec<_> = scored.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn unresolved_venue_leg_drops_candidate() {
        let routing = RoutingClient::new(Offset).with_policy(BackoffPolicy::none());
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);
        let mut broken = filtered("broken", 10.0, 10.0);
        broken.candidate.location.coordinates = Some(Coordinates::new(-1.0, 114.0));
        let judge = Table {
            judgments: vec![judgment("broken", 9.0, 9.0)],
            seen: Mutex::new(Vec::new()),
        };

        let scored = engine.score(&[broken], &venue(), 180.0, &judge).unwrap();

        assert!(scored.is_empty());
        assert!(judge.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_judge_yields_no_candidates() {
        let routing = RoutingClient::new(Offset).with_policy(BackoffPolicy::none());
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);

        let scored = engine
            .score(&[filtered("a", 20.0, 25.0)], &venue(), 180.0, &Failing)
            .unwrap();

        assert!(scored.is_empty());
    }

    #[test]
    fn negative_window_admits_nothing() {
        let routing = RoutingClient::new(Offset).with_policy(BackoffPolicy::none());
        let engine = ScoringEngine::new(&routing, ScoreWeights::default(), 45.0);
        let judge = Table {
            judgments: vec![judgment("a", 9.0, 8.0)],
            seen: Mutex::new(Vec::new()),
        };

        let scored = engine
            .score(&[filtered("a", 1.0, 1.0)], &venue(), -20.0, &judge)
            .unwrap();

        assert!(scored.is_empty());
    }
}
