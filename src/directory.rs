//! JSON-backed waypoint directory snapshot.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;
use crate::model::{Candidate, Coordinates, Location};
use crate::traits::Directory;

#[derive(Debug, Clone, Deserialize)]
struct DirectoryEntry {
    id: String,
    name: String,
    address: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    industry: String,
    #[serde(default)]
    description: String,
}

impl DirectoryEntry {
    fn into_candidate(self, city: &str) -> Candidate {
        let coordinates = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        Candidate {
            location: Location::new(city, self.address, self.name.clone(), coordinates),
            id: self.id,
            name: self.name,
            industry: self.industry,
            description: self.description,
        }
    }
}

/// Immutable snapshot of `{ "<city>": [entry, ...] }`, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct JsonDirectory {
    by_city: HashMap<String, Vec<Candidate>>,
}

impl JsonDirectory {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let raw: HashMap<String, Vec<DirectoryEntry>> = serde_json::from_reader(reader)?;
        let by_city = raw
            .into_iter()
            .map(|(city, entries)| {
                let candidates = entries
                    .into_iter()
                    .map(|entry| entry.into_candidate(&city))
                    .collect();
                (city, candidates)
            })
            .collect();
        Ok(Self { by_city })
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.by_city.keys().map(String::as_str)
    }
}

impl Directory for JsonDirectory {
    fn lookup(&self, city: &str) -> Vec<Candidate> {
        self.by_city.get(city).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{
        "Shenzhen": [
            {"id": "Shenzhen001", "name": "Drone Works", "address": "9 Keji Rd", "lat": 22.54, "lon": 113.95,
             "industry": "UAV", "description": "flight controllers"},
            {"id": "Shenzhen002", "name": "Chip Lab", "address": "12 Gaoxin Ave"}
        ],
        "Hangzhou": []
    }"#;

    #[test]
    fn loads_entries_per_city_in_order() {
        let directory = JsonDirectory::from_reader(SAMPLE.as_bytes()).unwrap();

        let entries = directory.lookup("Shenzhen");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Drone Works");
        assert_eq!(entries[0].location.city, "Shenzhen");
        assert_eq!(entries[0].location.coordinates, Some(Coordinates::new(22.54, 113.95)));
        assert_eq!(entries[1].location.coordinates, None);
        assert!(directory.lookup("Hangzhou").is_empty());
    }

    #[test]
    fn unknown_city_is_empty() {
        let directory = JsonDirectory::from_reader(SAMPLE.as_bytes()).unwrap();
        assert!(directory.lookup("Beijing").is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let directory = JsonDirectory::from_path(file.path()).unwrap();
        let mut cities: Vec<_> = directory.cities().collect();
        cities.sort();
        assert_eq!(cities, vec!["Hangzhou", "Shenzhen"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = JsonDirectory::from_reader("{\"Shenzhen\": [".as_bytes());
        assert!(matches!(result, Err(LoadError::Json(_))));
    }
}
