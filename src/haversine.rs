//! Haversine travel-time estimate (offline fallback when no routing service
//! is available).
//!
//! Uses great-circle distance at an assumed speed, so it ignores roads
//! entirely. Always available.

use crate::error::OracleError;
use crate::model::Coordinates;
use crate::traits::RoutingOracle;

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance in kilometers.
    pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
        let lat1 = from.lat.to_radians();
        let lat2 = to.lat.to_radians();
        let delta_lat = (to.lat - from.lat).to_radians();
        let delta_lon = (to.lon - from.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_minutes(&self, km: f64) -> f64 {
        (km / self.speed_kmh * 600.0).round() / 10.0
    }
}

impl RoutingOracle for HaversineRouter {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        if self.speed_kmh <= 0.0 {
            return Err(OracleError::Permanent(format!(
                "invalid speed {} km/h",
                self.speed_kmh
            )));
        }
        Ok(self.km_to_minutes(Self::distance_km(origin, destination)))
    }
}
