//! Planning data model.
//!
//! Everything here is created fresh for a single planning run. Stages never
//! mutate each other's output; each one produces a new value.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Resolved geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A named place. Coordinates may be missing when resolution is pending or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub address: String,
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn new(
        city: impl Into<String>,
        address: impl Into<String>,
        name: impl Into<String>,
        coordinates: Option<Coordinates>,
    ) -> Self {
        Self {
            city: city.into(),
            address: address.into(),
            name: name.into(),
            coordinates,
        }
    }

    /// Returns a copy of this location with the given coordinates.
    pub fn resolved(&self, coordinates: Coordinates) -> Self {
        Self {
            coordinates: Some(coordinates),
            ..self.clone()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// An optional waypoint from the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub industry: String,
    pub description: String,
}

/// A candidate within drive range of the filter center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredCandidate {
    pub candidate: Candidate,
    pub minutes_from_center: f64,
}

/// A candidate with both travel legs resolved and external value scores merged.
///
/// Only constructed once every input of the composite score is known, so a
/// missing judgment can never turn into a silent zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub hub_minutes: f64,
    pub venue_minutes: f64,
    pub total_minutes: f64,
    pub buffer_minutes: f64,
    pub attractiveness: f64,
    pub feasibility: f64,
    pub score: f64,
    pub rationale: String,
}

impl ScoredCandidate {
    pub fn name(&self) -> &str {
        &self.candidate.name
    }
}

/// The optional-visit window between hub arrival and the venue deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub hub_arrival: NaiveDateTime,
    pub deadline: NaiveDateTime,
}

impl TimeWindow {
    /// Build the window from the meeting start and the post-arrival buffer.
    pub fn before_meeting(
        hub_arrival: NaiveDateTime,
        meeting_start: NaiveDateTime,
        post_arrival_buffer_minutes: f64,
    ) -> Self {
        Self {
            hub_arrival,
            deadline: meeting_start - minutes(post_arrival_buffer_minutes),
        }
    }

    /// Minutes between hub arrival and deadline. Negative when the deadline
    /// has already passed at arrival.
    pub fn available_minutes(&self) -> f64 {
        (self.deadline - self.hub_arrival).num_seconds() as f64 / 60.0
    }
}

/// One piece of the timed itinerary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteSegment {
    /// Ground travel between two points.
    Transit {
        from: Location,
        to: Location,
        start: NaiveDateTime,
        end: NaiveDateTime,
        minutes: f64,
    },
    /// A fixed-duration waypoint visit.
    Visit {
        candidate: Candidate,
        start: NaiveDateTime,
        end: NaiveDateTime,
        minutes: f64,
    },
    /// The inter-city departure.
    InterCity {
        offer: TransitOffer,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    Meeting {
        venue: Location,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    CheckIn {
        hotel: Location,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl RouteSegment {
    pub fn start(&self) -> NaiveDateTime {
        match self {
            RouteSegment::Transit { start, .. }
            | RouteSegment::Visit { start, .. }
            | RouteSegment::InterCity { start, .. }
            | RouteSegment::Meeting { start, .. }
            | RouteSegment::CheckIn { start, .. } => *start,
        }
    }

    pub fn end(&self) -> NaiveDateTime {
        match self {
            RouteSegment::Transit { end, .. }
            | RouteSegment::Visit { end, .. }
            | RouteSegment::InterCity { end, .. }
            | RouteSegment::Meeting { end, .. }
            | RouteSegment::CheckIn { end, .. } => *end,
        }
    }

    pub fn is_visit(&self) -> bool {
        matches!(self, RouteSegment::Visit { .. })
    }
}

/// The timed pre-meeting route, from the arrival hub to the meeting venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Itinerary {
    pub segments: Vec<RouteSegment>,
    pub final_arrival: NaiveDateTime,
}

impl Itinerary {
    /// Names of the visited candidates in route order.
    pub fn visit_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                RouteSegment::Visit { candidate, .. } => Some(candidate.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Inter-city transport mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferKind {
    Flight,
    Train,
}

impl OfferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferKind::Flight => "Flight",
            OfferKind::Train => "Train",
        }
    }

    /// Case-insensitive match against an oracle-supplied type label.
    pub fn matches_label(&self, label: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(label.trim())
    }
}

/// One inter-city departure option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitOffer {
    pub kind: OfferKind,
    pub id: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub price: f64,
    pub origin_hub: String,
    pub destination_hub: String,
}

impl TransitOffer {
    /// Build an offer from a service date and clock times.
    ///
    /// An arrival clock time earlier than the departure means the service
    /// arrives the following day.
    #[allow(clippy::too_many_arguments)]
    pub fn scheduled(
        kind: OfferKind,
        id: impl Into<String>,
        date: NaiveDate,
        departure_time: NaiveTime,
        arrival_time: NaiveTime,
        price: f64,
        origin_hub: impl Into<String>,
        destination_hub: impl Into<String>,
    ) -> Self {
        let departure = date.and_time(departure_time);
        let mut arrival = date.and_time(arrival_time);
        if arrival < departure {
            arrival += Duration::days(1);
        }

        Self {
            kind,
            id: id.into(),
            departure,
            arrival,
            price,
            origin_hub: origin_hub.into(),
            destination_hub: destination_hub.into(),
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.arrival - self.departure).num_seconds() as f64 / 60.0
    }
}

/// Convert fractional minutes into a chrono duration (millisecond precision).
pub fn minutes(value: f64) -> Duration {
    Duration::milliseconds((value * 60_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn available_minutes_subtracts_buffer() {
        let window = TimeWindow::before_meeting(at(10, 0), at(14, 0), 30.0);
        assert_eq!(window.deadline, at(13, 30));
        assert_eq!(window.available_minutes(), 210.0);
    }

    #[test]
    fn available_minutes_may_be_negative() {
        let window = TimeWindow::before_meeting(at(13, 50), at(14, 0), 30.0);
        assert_eq!(window.available_minutes(), -20.0);
    }

    #[test]
    fn overnight_offer_rolls_arrival() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let offer = TransitOffer::scheduled(
            OfferKind::Train,
            "Z99",
            date,
            NaiveTime::from_hms_opt(22, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(6, 15, 0).unwrap(),
            480.0,
            "Shanghai",
            "Shenzhen North",
        );
        assert_eq!(offer.arrival.date(), date.succ_opt().unwrap());
        assert_eq!(offer.duration_minutes(), 465.0);
    }

    #[test]
    fn offer_kind_label_match_is_case_insensitive() {
        assert!(OfferKind::Flight.matches_label("flight"));
        assert!(OfferKind::Train.matches_label(" TRAIN "));
        assert!(!OfferKind::Train.matches_label("Flight"));
    }

    #[test]
    fn fractional_minutes_convert_exactly() {
        assert_eq!(minutes(1.5), Duration::seconds(90));
        assert_eq!(minutes(0.1), Duration::seconds(6));
    }

    #[test]
    fn resolved_keeps_named_fields() {
        let loc = Location::new("Shenzhen", "1 Keyuan Rd", "Lab", None);
        let resolved = loc.resolved(Coordinates::new(22.5, 113.9));
        assert_eq!(resolved.name, "Lab");
        assert!(resolved.is_resolved());
        assert!(!loc.is_resolved());
    }
}
