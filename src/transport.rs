//! Inter-city transit selection.
//!
//! The choice itself is delegated to a [`TransitChooser`]. Its answer is
//! treated as untrusted: only the `(type, id)` pair is read back, and it is
//! re-resolved against the original offer set.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{OracleError, PlanError};
use crate::model::{minutes, Location, TransitOffer};
use crate::routing::RoutingClient;
use crate::traits::{Geocoder, RoutingOracle, TransitChooser, TransitRequest};

/// Representative commute figures used only to derive the transit deadline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceCommute {
    pub home_to_hub_minutes: f64,
    pub hub_to_venue_minutes: f64,
}

/// An offer picked by the chooser and matched back to the offer set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitSelection {
    pub offer: TransitOffer,
    pub reasoning: String,
    pub latest_hub_arrival: NaiveDateTime,
}

/// The chosen offer with precise commutes for its own hubs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedTransport {
    pub offer: TransitOffer,
    pub reasoning: String,
    pub latest_hub_arrival: NaiveDateTime,
    pub origin_hub: Location,
    pub destination_hub: Location,
    pub home_commute_minutes: f64,
    pub arrival_commute_minutes: f64,
}

impl SelectedTransport {
    /// Venue arrival when going straight from the destination hub.
    pub fn direct_venue_arrival(&self) -> NaiveDateTime {
        self.offer.arrival + minutes(self.arrival_commute_minutes)
    }
}

/// `meeting_start - (buffer + reference commute)`.
pub fn latest_hub_arrival(
    meeting_start: NaiveDateTime,
    buffer_minutes: f64,
    reference_commute_minutes: f64,
) -> NaiveDateTime {
    meeting_start - minutes(buffer_minutes + reference_commute_minutes)
}

pub struct TransportSelector<'a, O> {
    routing: &'a RoutingClient<O>,
    geocoder: &'a dyn Geocoder,
    pre_meeting_buffer_minutes: f64,
    reference_fallback_minutes: f64,
}

impl<'a, O: RoutingOracle> TransportSelector<'a, O> {
    pub fn new(
        routing: &'a RoutingClient<O>,
        geocoder: &'a dyn Geocoder,
        pre_meeting_buffer_minutes: f64,
        reference_fallback_minutes: f64,
    ) -> Self {
        Self {
            routing,
            geocoder,
            pre_meeting_buffer_minutes,
            reference_fallback_minutes,
        }
    }

    /// Reference commutes through the first offer's hubs. Any leg that
    /// cannot be resolved or routed takes the fallback estimate.
    pub fn reference_commute(
        &self,
        offers: &[TransitOffer],
        home: &Location,
        venue: &Location,
    ) -> ReferenceCommute {
        let fallback = self.reference_fallback_minutes;
        let Some(reference) = offers.first() else {
            return ReferenceCommute {
                home_to_hub_minutes: fallback,
                hub_to_venue_minutes: fallback,
            };
        };

        let home_to_hub_minutes = self
            .hub_location(&reference.origin_hub, &home.city)
            .and_then(|hub| self.routing.estimate_minutes(home, &hub))
            .unwrap_or_else(|err| {
                warn!(hub = %reference.origin_hub, error = %err, fallback, "reference home commute unavailable");
                fallback
            });

        let hub_to_venue_minutes = self
            .hub_location(&reference.destination_hub, &venue.city)
            .and_then(|hub| self.routing.estimate_minutes(&hub, venue))
            .unwrap_or_else(|err| {
                warn!(hub = %reference.destination_hub, error = %err, fallback, "reference arrival commute unavailable");
                fallback
            });

        info!(home_to_hub_minutes, hub_to_venue_minutes, "reference commute");
        ReferenceCommute {
            home_to_hub_minutes,
            hub_to_venue_minutes,
        }
    }

    /// Ask the chooser for an offer and re-resolve its identifier against
    /// `offers`.
    pub fn select(
        &self,
        offers: &[TransitOffer],
        meeting_start: NaiveDateTime,
        reference: ReferenceCommute,
        chooser: &dyn TransitChooser,
    ) -> Result<TransitSelection, PlanError> {
        if offers.is_empty() {
            return Err(PlanError::NoOffers);
        }

        let latest = latest_hub_arrival(
            meeting_start,
            self.pre_meeting_buffer_minutes,
            reference.hub_to_venue_minutes,
        );

        let request = TransitRequest {
            offers,
            home_commute_minutes: reference.home_to_hub_minutes,
            arrival_commute_minutes: reference.hub_to_venue_minutes,
            latest_hub_arrival: latest,
            meeting_start,
        };

        let choice = chooser.choose(&request).map_err(PlanError::Selection)?;

        let offer = offers
            .iter()
            .find(|offer| offer.kind.matches_label(&choice.kind) && offer.id == choice.id)
            .cloned()
            .ok_or_else(|| PlanError::OracleMismatch {
                kind: choice.kind.clone(),
                id: choice.id.clone(),
            })?;

        info!(
            kind = offer.kind.as_str(),
            id = %offer.id,
            departure = %offer.departure,
            arrival = %offer.arrival,
            latest_hub_arrival = %latest,
            "transit offer selected"
        );
        if offer.arrival > latest {
            warn!(id = %offer.id, "selected offer arrives after the latest hub arrival");
        }

        Ok(TransitSelection {
            offer,
            reasoning: choice.reasoning,
            latest_hub_arrival: latest,
        })
    }

    /// Precise commutes for the selected offer's own hubs. Both legs are
    /// mandatory.
    pub fn resolve_commutes(
        &self,
        selection: TransitSelection,
        home: &Location,
        venue: &Location,
    ) -> Result<SelectedTransport, PlanError> {
        let origin_hub = self
            .hub_location(&selection.offer.origin_hub, &home.city)
            .map_err(|source| PlanError::MandatoryLeg {
                leg: "origin hub",
                source,
            })?;
        let destination_hub = self
            .hub_location(&selection.offer.destination_hub, &venue.city)
            .map_err(|source| PlanError::MandatoryLeg {
                leg: "destination hub",
                source,
            })?;

        let home_commute_minutes = self
            .routing
            .estimate_minutes(home, &origin_hub)
            .map_err(|source| PlanError::MandatoryLeg {
                leg: "home to origin hub",
                source,
            })?;
        let arrival_commute_minutes = self
            .routing
            .estimate_minutes(&destination_hub, venue)
            .map_err(|source| PlanError::MandatoryLeg {
                leg: "destination hub to venue",
                source,
            })?;

        info!(home_commute_minutes, arrival_commute_minutes, "precise commute");
        Ok(SelectedTransport {
            offer: selection.offer,
            reasoning: selection.reasoning,
            latest_hub_arrival: selection.latest_hub_arrival,
            origin_hub,
            destination_hub,
            home_commute_minutes,
            arrival_commute_minutes,
        })
    }

    /// Reference commute, selection, and precise commutes in one step.
    pub fn choose(
        &self,
        offers: &[TransitOffer],
        meeting_start: NaiveDateTime,
        home: &Location,
        venue: &Location,
        chooser: &dyn TransitChooser,
    ) -> Result<SelectedTransport, PlanError> {
        let reference = self.reference_commute(offers, home, venue);
        let selection = self.select(offers, meeting_start, reference, chooser)?;
        self.resolve_commutes(selection, home, venue)
    }

    fn hub_location(&self, hub: &str, city: &str) -> Result<Location, OracleError> {
        let coordinates = self.geocoder.resolve(hub, city)?;
        Ok(Location::new(city, hub, hub, Some(coordinates)))
    }
}
