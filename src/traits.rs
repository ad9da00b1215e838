//! Seams to the external collaborators of the planner.
//!
//! The scheduling core only sees these traits, so any backend (HTTP service,
//! offline estimate, static table) can be plugged in. All of them are
//! `Send + Sync` so routing lookups may fan out across threads.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::model::{Candidate, Coordinates, TransitOffer};

/// Travel-time oracle between two resolved coordinates.
pub trait RoutingOracle: Send + Sync {
    /// Drive time in minutes.
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError>;
}

/// Address to coordinate resolution.
pub trait Geocoder: Send + Sync {
    fn resolve(&self, address: &str, city: &str) -> Result<Coordinates, OracleError>;
}

/// Read-only waypoint directory snapshot.
pub trait Directory: Send + Sync {
    /// All entries for a city, in directory order.
    fn lookup(&self, city: &str) -> Vec<Candidate>;
}

/// What the value-judgment oracle sees about one eligible candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub name: String,
    pub industry: String,
    pub description: String,
    pub hub_minutes: f64,
    pub venue_minutes: f64,
    pub total_minutes: f64,
}

/// One judgment returned by the value-judgment oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub name: String,
    #[serde(rename = "S_attract", alias = "attractiveness")]
    pub attractiveness: f64,
    #[serde(rename = "S_feas", alias = "feasibility")]
    pub feasibility: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Scores candidates on attractiveness and feasibility.
pub trait ValueJudge: Send + Sync {
    fn score(
        &self,
        candidates: &[CandidateSummary],
        available_minutes: f64,
    ) -> Result<Vec<Judgment>, OracleError>;
}

/// Everything the transit-choice oracle is told.
#[derive(Debug, Clone, Serialize)]
pub struct TransitRequest<'a> {
    pub offers: &'a [TransitOffer],
    pub home_commute_minutes: f64,
    pub arrival_commute_minutes: f64,
    pub latest_hub_arrival: NaiveDateTime,
    pub meeting_start: NaiveDateTime,
}

/// The transit-choice oracle's answer. Only the identifier is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitChoice {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Picks one inter-city offer.
pub trait TransitChooser: Send + Sync {
    fn choose(&self, request: &TransitRequest<'_>) -> Result<TransitChoice, OracleError>;
}
