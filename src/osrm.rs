//! OSRM HTTP adapter for point-to-point drive times.

use serde::Deserialize;

use crate::error::OracleError;
use crate::model::Coordinates;
use crate::traits::RoutingOracle;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 5,
        }
    }
}

impl OsrmConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, origin: Coordinates, destination: Coordinates) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=false",
            self.config.base_url,
            self.config.profile,
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }
}

impl RoutingOracle for OsrmClient {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        let response = self.client.get(self.route_url(origin, destination)).send()?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited("OSRM returned 429".to_string()));
        }
        if status.is_server_error() {
            return Err(OracleError::TransientNetwork(format!("OSRM returned {status}")));
        }

        // OSRM reports routing failures (NoRoute, InvalidQuery) with a 400 and a JSON body.
        let body: OsrmRouteResponse = response.json()?;
        route_minutes(body)
    }
}

fn route_minutes(body: OsrmRouteResponse) -> Result<f64, OracleError> {
    if body.code != "Ok" {
        return Err(OracleError::Permanent(format!(
            "{}: {}",
            body.code,
            body.message.unwrap_or_default()
        )));
    }

    body.routes
        .first()
        .map(|route| (route.duration / 60.0 * 10.0).round() / 10.0)
        .ok_or_else(|| OracleError::Permanent("no routes in response".to_string()))
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Seconds.
    duration: f64,
}
