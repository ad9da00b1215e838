//! Test fixtures for trip-planner.
//!
//! Provides deterministic oracles:
//! - A table-driven routing oracle keyed by coordinates
//! - Counting and scripted wrappers for retry checks
//! - Named places around a Shenzhen meeting used across scenarios

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use trip_planner::backoff::Sleeper;
use trip_planner::error::OracleError;
use trip_planner::model::{Candidate, Coordinates, Location};
use trip_planner::traits::RoutingOracle;

// ============================================================================
// Places
// ============================================================================

pub const CITY: &str = "Shenzhen";
pub const HOME_CITY: &str = "Shanghai";

pub const HUB: Coordinates = Coordinates { lat: 22.600, lon: 114.000 };
pub const VENUE: Coordinates = Coordinates { lat: 22.540, lon: 114.060 };
pub const HOTEL: Coordinates = Coordinates { lat: 22.530, lon: 114.050 };
pub const A: Coordinates = Coordinates { lat: 22.610, lon: 114.010 };
pub const B: Coordinates = Coordinates { lat: 22.620, lon: 114.020 };
pub const C: Coordinates = Coordinates { lat: 22.700, lon: 114.100 };
pub const HOME: Coordinates = Coordinates { lat: 31.200, lon: 121.700 };
pub const ORIGIN_HUB: Coordinates = Coordinates { lat: 31.190, lon: 121.320 };

pub fn hub() -> Location {
    Location::new(CITY, "Shenzhen North", "Shenzhen North", Some(HUB))
}

pub fn venue() -> Location {
    Location::new(CITY, "Futian Convention Center", "Venue", Some(VENUE))
}

pub fn candidate(id: &str, name: &str, at: Coordinates) -> Candidate {
    Candidate {
        id: id.to_string(),
        name: name.to_string(),
        location: Location::new(CITY, format!("{name} HQ"), name, Some(at)),
        industry: "UAV".to_string(),
        description: format!("{name} makes flight controllers"),
    }
}

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Routing oracles
// ============================================================================

type Key = (u64, u64, u64, u64);

fn key(from: Coordinates, to: Coordinates) -> Key {
    (from.lat.to_bits(), from.lon.to_bits(), to.lat.to_bits(), to.lon.to_bits())
}

/// Directed drive times between exact coordinates. Unknown pairs are a
/// permanent oracle error.
#[derive(Debug, Clone, Default)]
pub struct TableRouter {
    legs: HashMap<Key, f64>,
}

impl TableRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leg(mut self, from: Coordinates, to: Coordinates, minutes: f64) -> Self {
        self.legs.insert(key(from, to), minutes);
        self
    }

    /// Same time in both directions.
    pub fn both(self, a: Coordinates, b: Coordinates, minutes: f64) -> Self {
        self.leg(a, b, minutes).leg(b, a, minutes)
    }
}

impl RoutingOracle for TableRouter {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        self.legs
            .get(&key(origin, destination))
            .copied()
            .ok_or_else(|| {
                OracleError::Permanent(format!(
                    "no leg {},{} -> {},{}",
                    origin.lat, origin.lon, destination.lat, destination.lon
                ))
            })
    }
}

/// Counts calls to the wrapped oracle.
#[derive(Debug, Default)]
pub struct Counting<R> {
    pub inner: R,
    calls: AtomicUsize,
}

impl<R> Counting<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<R: RoutingOracle> RoutingOracle for Counting<R> {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.minutes(origin, destination)
    }
}

/// Replays a fixed sequence of responses, then fails permanently.
#[derive(Debug, Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<Result<f64, OracleError>>>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(responses: impl IntoIterator<Item = Result<f64, OracleError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RoutingOracle for Scripted {
    fn minutes(&self, _: Coordinates, _: Coordinates) -> Result<f64, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Permanent("script exhausted".to_string())))
    }
}

pub fn rate_limited() -> Result<f64, OracleError> {
    Err(OracleError::RateLimited("429".to_string()))
}

// ============================================================================
// Sleepers
// ============================================================================

/// Records requested sleeps instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
