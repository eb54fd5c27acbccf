use provider::{DataProvider, Dimension};
use shared::{
    domain::{Borough, ColorMap, HealthLevel, StewardBucket},
    protocol::CatalogSummary,
};
use tracing::{info, warn};

use crate::error::CatalogError;

pub const UNLISTED_SPECIES: &str = "Unlisted";
pub const UNKNOWN_STEWARD: &str = "Unknown";

/// Category sets and colors, built once at startup and shared read-only.
///
/// Boroughs, health levels and steward buckets are closed enumerations; the
/// species and steward listings come from the provider.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    species: Vec<String>,
    stewards: Vec<String>,
    colors: ColorMap,
}

impl CategoryCatalog {
    pub async fn bootstrap(provider: &dyn DataProvider) -> Result<Self, CatalogError> {
        let species = provider
            .fetch_distinct_values(Dimension::Species)
            .await
            .map_err(|source| CatalogError::Provider {
                dimension: "species",
                source,
            })?;
        let stewards = provider
            .fetch_distinct_values(Dimension::Steward)
            .await
            .map_err(|source| CatalogError::Provider {
                dimension: "steward",
                source,
            })?;

        let catalog = Self::from_listings(species, stewards)?;
        info!(
            species = catalog.species.len(),
            stewards = catalog.stewards.len(),
            "category catalog ready"
        );
        Ok(catalog)
    }

    pub fn from_listings(
        species: Vec<Option<String>>,
        stewards: Vec<Option<String>>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            species: normalize_listing("species", species, UNLISTED_SPECIES)?,
            stewards: normalize_listing("steward", stewards, UNKNOWN_STEWARD)?,
            colors: ColorMap::default(),
        })
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn stewards(&self) -> &[String] {
        &self.stewards
    }

    pub fn boroughs(&self) -> &'static [Borough] {
        Borough::ALL
    }

    pub fn health_levels(&self) -> &'static [HealthLevel] {
        HealthLevel::ALL
    }

    pub fn steward_buckets(&self) -> &'static [StewardBucket] {
        StewardBucket::ALL
    }

    pub fn colors(&self) -> &ColorMap {
        &self.colors
    }

    pub fn contains_species(&self, species: &str) -> bool {
        self.species.iter().any(|entry| entry == species)
    }

    pub fn default_species(&self) -> &str {
        self.species
            .first()
            .map(String::as_str)
            .unwrap_or(UNLISTED_SPECIES)
    }

    /// The configured species when the catalog knows it, else the first entry.
    pub fn initial_species<'a>(&'a self, preferred: Option<&'a str>) -> &'a str {
        match preferred {
            Some(species) if self.contains_species(species) => species,
            Some(species) => {
                warn!(species, "configured initial species is not in the catalog");
                self.default_species()
            }
            None => self.default_species(),
        }
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            species: self.species.clone(),
            stewards: self.stewards.clone(),
            boroughs: labels(Borough::labels()),
            health_levels: labels(HealthLevel::labels()),
            steward_buckets: labels(StewardBucket::labels()),
            colors: self.colors.clone(),
            default_species: self.default_species().to_string(),
        }
    }
}

fn labels(values: Vec<&'static str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

/// Dedupes in first-seen order and appends `fallback` once if the provider
/// reported any null or blank value.
fn normalize_listing(
    dimension: &'static str,
    values: Vec<Option<String>>,
    fallback: &str,
) -> Result<Vec<String>, CatalogError> {
    let mut labels: Vec<String> = Vec::with_capacity(values.len() + 1);
    let mut saw_missing = false;
    for value in values {
        match value.filter(|label| !label.trim().is_empty()) {
            Some(label) => {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            None => saw_missing = true,
        }
    }

    if labels.is_empty() {
        return Err(CatalogError::Empty { dimension });
    }
    if saw_missing && !labels.iter().any(|label| label == fallback) {
        labels.push(fallback.to_string());
    }
    Ok(labels)
}
