//! AMap REST adapter: driving durations and geocoding.

use serde::Deserialize;

use crate::error::OracleError;
use crate::model::Coordinates;
use crate::traits::{Geocoder, RoutingOracle};

const DEFAULT_ROUTE_URL: &str = "https://restapi.amap.com/v3/direction/driving";
const DEFAULT_GEOCODE_URL: &str = "https://restapi.amap.com/v3/geocode/geo";

#[derive(Debug, Clone)]
pub struct AmapConfig {
    pub api_key: String,
    pub route_url: String,
    pub geocode_url: String,
    pub timeout_secs: u64,
}

impl AmapConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            route_url: DEFAULT_ROUTE_URL.to_string(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            timeout_secs: 5,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AmapClient {
    config: AmapConfig,
    client: reqwest::blocking::Client,
}

impl AmapClient {
    pub fn new(config: AmapConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl RoutingOracle for AmapClient {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        let origin = format!("{},{}", origin.lon, origin.lat);
        let destination = format!("{},{}", destination.lon, destination.lat);
        let body: DrivingResponse = self
            .client
            .get(&self.config.route_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("output", "json"),
                ("extensions", "base"),
                ("strategy", "0"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        driving_minutes(body)
    }
}

impl Geocoder for AmapClient {
    fn resolve(&self, address: &str, city: &str) -> Result<Coordinates, OracleError> {
        let body: GeocodeResponse = self
            .client
            .get(&self.config.geocode_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("address", address),
                ("city", city),
                ("output", "json"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        geocode_coordinates(address, body)
    }
}

/// `status == "0"` with a quota-style `info` is throttling; anything else is permanent.
fn status_error(status: &str, info: &str) -> OracleError {
    let upper = info.to_uppercase();
    if status == "0" && (upper.contains("LIMIT") || upper.contains("QUOTA")) {
        OracleError::RateLimited(info.to_string())
    } else {
        OracleError::Permanent(format!("status {status}: {info}"))
    }
}

fn count(value: &Option<String>) -> u32 {
    value.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0)
}

fn driving_minutes(body: DrivingResponse) -> Result<f64, OracleError> {
    if body.status != "1" || count(&body.count) == 0 {
        return Err(status_error(&body.status, &body.info));
    }

    let path = body
        .route
        .and_then(|route| route.paths.into_iter().next())
        .ok_or_else(|| OracleError::Permanent("no driving paths in response".to_string()))?;
    let seconds: f64 = path
        .duration
        .parse()
        .map_err(|_| OracleError::Permanent(format!("bad duration '{}'", path.duration)))?;

    Ok((seconds / 60.0 * 10.0).round() / 10.0)
}

fn geocode_coordinates(address: &str, body: GeocodeResponse) -> Result<Coordinates, OracleError> {
    if body.status != "1" || count(&body.count) == 0 {
        return match status_error(&body.status, &body.info) {
            OracleError::Permanent(_) => Err(OracleError::ResolutionUnavailable(format!(
                "{address} ({})",
                body.info
            ))),
            other => Err(other),
        };
    }

    let location = body
        .geocodes
        .into_iter()
        .next()
        .and_then(|g| g.location)
        .ok_or_else(|| OracleError::ResolutionUnavailable(address.to_string()))?;

    let mut parts = location.split(',').map(|p| p.trim().parse::<f64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(lon)), Some(Ok(lat))) => Ok(Coordinates::new(lat, lon)),
        _ => Err(OracleError::Permanent(format!("bad location '{location}'"))),
    }
}

#[derive(Debug, Deserialize)]
struct DrivingResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    route: Option<DrivingRoute>,
}

#[derive(Debug, Deserialize)]
struct DrivingRoute {
    #[serde(default)]
    paths: Vec<DrivingPath>,
}

#[derive(Debug, Deserialize)]
struct DrivingPath {
    /// Seconds, as a string.
    duration: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    geocodes: Vec<GeocodeHit>,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    /// "lon,lat"
    #[serde(default)]
    location: Option<String>,
}
