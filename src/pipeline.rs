//! End-to-end trip planning: transport choice, the pre-meeting route, and
//! the surrounding departure and post-meeting legs.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::backoff::Sleeper;
use crate::cancel::CancelToken;
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::filter::CandidateFilter;
use crate::model::{minutes, Coordinates, Itinerary, Location, RouteSegment, ScoredCandidate, TimeWindow, TransitOffer};
use crate::repair::FeasibilityRepair;
use crate::routing::RoutingClient;
use crate::scoring::ScoringEngine;
use crate::sequencer::Sequencer;
use crate::traits::{Directory, Geocoder, RoutingOracle, TransitChooser, ValueJudge};
use crate::transport::{SelectedTransport, TransportSelector};

/// An address in the request, optionally with known coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Place {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            lat: None,
            lon: None,
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    fn to_location(&self, city: &str, default_name: &str) -> Location {
        let coordinates = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        let name = self.name.clone().unwrap_or_else(|| default_name.to_string());
        Location::new(city, self.address.clone(), name, coordinates)
    }
}

/// What the traveller asks for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TripRequest {
    pub origin_city: String,
    pub destination_city: String,
    pub meeting_start: NaiveDateTime,
    pub meeting_duration_hours: f64,
    pub home: Place,
    pub meeting: Place,
    pub hotel: Place,
}

impl TripRequest {
    pub fn home(&self) -> Location {
        self.home.to_location(&self.origin_city, "Home")
    }

    pub fn venue(&self) -> Location {
        self.meeting.to_location(&self.destination_city, "Meeting venue")
    }

    pub fn hotel(&self) -> Location {
        self.hotel.to_location(&self.destination_city, "Hotel")
    }

    pub fn meeting_end(&self) -> NaiveDateTime {
        self.meeting_start + minutes(self.meeting_duration_hours * 60.0)
    }
}

/// The finished plan, serialized for report rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TripPlan {
    pub transport: SelectedTransport,
    pub window: TimeWindow,
    pub available_minutes: f64,
    /// Accepted visits in route order, with their scores and rationale.
    pub visits: Vec<ScoredCandidate>,
    pub dropped: Vec<String>,
    /// Hub to venue, before the meeting.
    pub itinerary: Itinerary,
    /// Whether the pre-meeting route reaches the venue by the deadline.
    pub on_time: bool,
    /// Every segment of the trip, ordered by start time.
    pub timeline: Vec<RouteSegment>,
}

/// External collaborators a planning run consults.
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub geocoder: &'a dyn Geocoder,
    pub directory: &'a dyn Directory,
    pub judge: &'a dyn ValueJudge,
    pub chooser: &'a dyn TransitChooser,
}

pub struct TripPlanner<'a, O> {
    config: PlannerConfig,
    routing: RoutingClient<O>,
    oracles: Oracles<'a>,
    cancel: CancelToken,
}

impl<'a, O: RoutingOracle> TripPlanner<'a, O> {
    pub fn new(config: PlannerConfig, oracle: O, oracles: Oracles<'a>) -> Self {
        let routing = RoutingClient::new(oracle)
            .with_policy(config.retry.clone())
            .with_unresolved_minutes(config.unresolved_fallback_minutes);

        Self {
            config,
            routing,
            oracles,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.routing = self.routing.with_sleeper(sleeper);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn routing(&self) -> &RoutingClient<O> {
        &self.routing
    }

    pub fn plan(&self, request: &TripRequest, offers: &[TransitOffer]) -> Result<TripPlan, PlanError> {
        let span = info_span!(
            "plan",
            from = %request.origin_city,
            to = %request.destination_city,
            meeting = %request.meeting_start
        );
        let _guard = span.enter();
        let config = &self.config;

        self.cancel.check()?;
        let home = self.resolve(request.home());
        let venue = self.resolve(request.venue());
        let hotel = self.resolve(request.hotel());

        self.cancel.check()?;
        let selector = TransportSelector::new(
            &self.routing,
            self.oracles.geocoder,
            config.pre_meeting_buffer_minutes,
            config.reference_commute_fallback_minutes,
        );
        let transport = selector.choose(offers, request.meeting_start, &home, &venue, self.oracles.chooser)?;

        let window = TimeWindow::before_meeting(
            transport.offer.arrival,
            request.meeting_start,
            config.post_arrival_buffer_minutes,
        );
        let available_minutes = window.available_minutes();
        info!(
            hub_arrival = %window.hub_arrival,
            deadline = %window.deadline,
            available_minutes,
            "pre-meeting window"
        );

        let hub = &transport.destination_hub;
        let radius = config.search_radius_factor * transport.arrival_commute_minutes;

        self.cancel.check()?;
        let directory = self.oracles.directory.lookup(&request.destination_city);
        let filtered = CandidateFilter::new(&self.routing)
            .parallel(config.parallel_filter)
            .with_cancel(self.cancel.clone())
            .filter(hub, radius, &directory)?;

        let scored = ScoringEngine::new(&self.routing, config.weights, config.visit_duration_minutes)
            .with_cancel(self.cancel.clone())
            .score(&filtered, &venue, available_minutes, self.oracles.judge)?;

        self.cancel.check()?;
        let tentative = Sequencer::new(&self.routing, config.visit_duration_minutes)
            .sequence(&scored, available_minutes)
            .candidates();

        let outcome = FeasibilityRepair::new(&self.routing, config.visit_duration_minutes)
            .with_cancel(self.cancel.clone())
            .repair(tentative, hub, &venue, &window, transport.arrival_commute_minutes)?;

        if !outcome.on_time {
            warn!(
                final_arrival = %outcome.itinerary.final_arrival,
                deadline = %window.deadline,
                "even the direct route misses the deadline"
            );
        }

        self.cancel.check()?;
        let mut timeline = self.departure_leg(&transport, &home);
        timeline.extend(outcome.itinerary.segments.iter().cloned());
        timeline.extend(self.post_meeting(request, &venue, &hotel));
        timeline.sort_by_key(RouteSegment::start);

        info!(
            visits = outcome.accepted.len(),
            dropped = outcome.dropped.len(),
            segments = timeline.len(),
            "trip planned"
        );

        Ok(TripPlan {
            transport,
            window,
            available_minutes,
            visits: outcome.accepted,
            dropped: outcome.dropped.iter().map(|c| c.candidate.name.clone()).collect(),
            itinerary: outcome.itinerary,
            on_time: outcome.on_time,
            timeline,
        })
    }

    /// Fill in missing coordinates. Failures leave the location unresolved.
    fn resolve(&self, location: Location) -> Location {
        if location.is_resolved() {
            return location;
        }
        match self.oracles.geocoder.resolve(&location.address, &location.city) {
            Ok(coordinates) => location.resolved(coordinates),
            Err(err) => {
                warn!(place = %location.name, address = %location.address, error = %err, "address unresolved");
                location
            }
        }
    }

    /// Home to the origin hub, arriving the pre-departure buffer ahead, then
    /// the inter-city segment itself.
    fn departure_leg(&self, transport: &SelectedTransport, home: &Location) -> Vec<RouteSegment> {
        let offer = &transport.offer;
        let at_hub = offer.departure - minutes(self.config.pre_departure_buffer_minutes);
        let leave_home = at_hub - minutes(transport.home_commute_minutes);

        vec![
            RouteSegment::Transit {
                from: home.clone(),
                to: transport.origin_hub.clone(),
                start: leave_home,
                end: at_hub,
                minutes: transport.home_commute_minutes,
            },
            RouteSegment::InterCity {
                offer: offer.clone(),
                start: offer.departure,
                end: offer.arrival,
            },
        ]
    }

    fn post_meeting(&self, request: &TripRequest, venue: &Location, hotel: &Location) -> Vec<RouteSegment> {
        let meeting_end = request.meeting_end();
        let fallback = self.config.hotel_commute_fallback_minutes;
        let to_hotel = self.routing.estimate_minutes(venue, hotel).unwrap_or_else(|err| {
            warn!(error = %err, fallback, "hotel commute unavailable");
            fallback
        });
        let at_hotel = meeting_end + minutes(to_hotel);

        vec![
            RouteSegment::Meeting {
                venue: venue.clone(),
                start: request.meeting_start,
                end: meeting_end,
            },
            RouteSegment::Transit {
                from: venue.clone(),
                to: hotel.clone(),
                start: meeting_end,
                end: at_hotel,
                minutes: to_hotel,
            },
            RouteSegment::CheckIn {
                hotel: hotel.clone(),
                start: at_hotel,
                end: at_hotel + minutes(self.config.check_in_minutes),
            },
        ]
    }
}
