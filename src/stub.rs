//! Table-backed oracles for offline runs and tests.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{LoadError, OracleError};
use crate::model::Coordinates;
use crate::traits::{
    CandidateSummary, Geocoder, Judgment, TransitChoice, TransitChooser, TransitRequest, ValueJudge,
};

/// Resolves addresses from a fixed `address -> {lat, lon}` table.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new(places: impl IntoIterator<Item = (String, Coordinates)>) -> Self {
        Self {
            places: places.into_iter().collect(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let places: HashMap<String, Coordinates> = serde_json::from_reader(reader)?;
        Ok(Self { places })
    }
}

impl Geocoder for StaticGeocoder {
    fn resolve(&self, address: &str, city: &str) -> Result<Coordinates, OracleError> {
        self.places
            .get(address)
            .copied()
            .ok_or_else(|| OracleError::ResolutionUnavailable(format!("{address}, {city}")))
    }
}

/// Answers with pre-recorded judgments keyed by candidate name.
#[derive(Debug, Clone, Default)]
pub struct StaticJudge {
    by_name: HashMap<String, Judgment>,
}

impl StaticJudge {
    pub fn new(judgments: impl IntoIterator<Item = Judgment>) -> Self {
        let mut by_name = HashMap::new();
        for judgment in judgments {
            by_name.entry(judgment.name.clone()).or_insert(judgment);
        }
        Self { by_name }
    }

    /// Reads a JSON array of `{name, S_attract, S_feas, reasoning}`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let judgments: Vec<Judgment> = serde_json::from_reader(reader)?;
        Ok(Self::new(judgments))
    }
}

impl ValueJudge for StaticJudge {
    fn score(
        &self,
        candidates: &[CandidateSummary],
        _available_minutes: f64,
    ) -> Result<Vec<Judgment>, OracleError> {
        let judgments: Vec<Judgment> = candidates
            .iter()
            .filter_map(|c| self.by_name.get(&c.name).cloned())
            .collect();
        debug!(asked = candidates.len(), answered = judgments.len(), "static judgments");
        Ok(judgments)
    }
}

/// Always answers with the same choice.
#[derive(Debug, Clone)]
pub struct StaticChooser {
    choice: TransitChoice,
}

impl StaticChooser {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            choice: TransitChoice {
                kind: kind.into(),
                id: id.into(),
                reasoning: String::new(),
            },
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.choice.reasoning = reasoning.into();
        self
    }

    /// Reads a JSON object `{type, id, reasoning}`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let choice: TransitChoice = serde_json::from_reader(reader)?;
        Ok(Self { choice })
    }
}

impl TransitChooser for StaticChooser {
    fn choose(&self, _request: &TransitRequest<'_>) -> Result<TransitChoice, OracleError> {
        Ok(self.choice.clone())
    }
}
