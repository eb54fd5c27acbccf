use std::{collections::BTreeMap, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use shared::domain::RawCountRow;

use crate::{CountFilter, DataProvider, Dimension, ProviderError};

/// In-memory provider over per-species rows, loadable from a JSON file:
///
/// ```json
/// { "species": ["American elm", null],
///   "stewards": ["None", "1or2"],
///   "rows": { "American elm": [
///     { "borough": "Bronx", "steward": "1or2", "health": "Good", "count": 10 } ] } }
/// ```
///
/// `species` defaults to the keys of `rows`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureProvider {
    #[serde(default)]
    species: Vec<Option<String>>,
    #[serde(default)]
    stewards: Vec<Option<String>>,
    #[serde(default)]
    rows: BTreeMap<String, Vec<RawCountRow>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let fixture_error = |reason: String| ProviderError::Fixture {
            path: path.display().to_string(),
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fixture_error(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| fixture_error(e.to_string()))
    }

    pub fn with_rows(mut self, species: impl Into<String>, rows: Vec<RawCountRow>) -> Self {
        self.rows.entry(species.into()).or_default().extend(rows);
        self
    }

    pub fn with_species_listing(mut self, species: Vec<Option<String>>) -> Self {
        self.species = species;
        self
    }

    pub fn with_steward_listing(mut self, stewards: Vec<Option<String>>) -> Self {
        self.stewards = stewards;
        self
    }

    fn matching_rows<'a>(
        &'a self,
        filter: &'a CountFilter,
    ) -> Box<dyn Iterator<Item = &'a RawCountRow> + 'a> {
        match &filter.species {
            Some(species) => Box::new(self.rows.get(species).into_iter().flatten()),
            None => Box::new(self.rows.values().flatten()),
        }
    }
}

#[async_trait]
impl DataProvider for FixtureProvider {
    async fn fetch_grouped_counts(
        &self,
        filter: &CountFilter,
        group_by: &[Dimension],
    ) -> Result<Vec<RawCountRow>, ProviderError> {
        if let Some(dimension) = group_by.iter().find(|d| **d == Dimension::Species) {
            return Err(ProviderError::UnsupportedDimension(*dimension));
        }
        let keep = |dimension: Dimension, value: &Option<String>| {
            if group_by.contains(&dimension) {
                value.clone()
            } else {
                None
            }
        };

        let mut grouped: Vec<RawCountRow> = Vec::new();
        for row in self.matching_rows(filter) {
            let projected = RawCountRow {
                borough: keep(Dimension::Borough, &row.borough),
                steward: keep(Dimension::Steward, &row.steward),
                health: keep(Dimension::Health, &row.health),
                count: row.count,
            };
            match grouped.iter_mut().find(|existing| {
                existing.borough == projected.borough
                    && existing.steward == projected.steward
                    && existing.health == projected.health
            }) {
                Some(existing) => {
                    existing.count = existing.count.saturating_add(projected.count);
                }
                None => grouped.push(projected),
            }
        }
        Ok(grouped)
    }

    async fn fetch_distinct_values(
        &self,
        dimension: Dimension,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        let values = match dimension {
            Dimension::Species if self.species.is_empty() => {
                self.rows.keys().cloned().map(Some).collect()
            }
            Dimension::Species => self.species.clone(),
            Dimension::Steward if !self.stewards.is_empty() => self.stewards.clone(),
            _ => {
                let mut seen: Vec<Option<String>> = Vec::new();
                for row in self.rows.values().flatten() {
                    let value = match dimension {
                        Dimension::Borough => &row.borough,
                        Dimension::Steward => &row.steward,
                        _ => &row.health,
                    };
                    if !seen.contains(value) {
                        seen.push(value.clone());
                    }
                }
                seen
            }
        };
        Ok(values)
    }
}
