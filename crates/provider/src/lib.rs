//! Data provider seam: grouped tree counts and distinct category listings.

use async_trait::async_trait;
use shared::domain::RawCountRow;
use thiserror::Error;

mod fixture;
mod socrata;

pub use fixture::FixtureProvider;
pub use socrata::{SocrataConfig, SocrataProvider, DEFAULT_DATASET_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Species,
    Borough,
    Steward,
    Health,
}

impl Dimension {
    pub fn column(self) -> &'static str {
        match self {
            Dimension::Species => "spc_common",
            Dimension::Borough => "boroname",
            Dimension::Steward => "steward",
            Dimension::Health => "health",
        }
    }
}

pub const CHART_GROUPING: [Dimension; 3] =
    [Dimension::Borough, Dimension::Steward, Dimension::Health];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountFilter {
    pub species: Option<String>,
}

impl CountFilter {
    pub fn species(species: impl Into<String>) -> Self {
        Self {
            species: Some(species.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("dataset request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("dataset returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed dataset response: {0}")]
    Format(String),
    #[error("invalid dataset url: {0}")]
    Url(#[from] url::ParseError),
    #[error("cannot group counts by {0:?}")]
    UnsupportedDimension(Dimension),
    #[error("failed to read fixture '{path}': {reason}")]
    Fixture { path: String, reason: String },
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Grouped counts matching `filter`, one row per distinct combination of
    /// the `group_by` dimensions. Dimensions not grouped on come back `None`.
    async fn fetch_grouped_counts(
        &self,
        filter: &CountFilter,
        group_by: &[Dimension],
    ) -> Result<Vec<RawCountRow>, ProviderError>;

    /// Distinct values of one dimension, `None` standing for null.
    async fn fetch_distinct_values(
        &self,
        dimension: Dimension,
    ) -> Result<Vec<Option<String>>, ProviderError>;
}
