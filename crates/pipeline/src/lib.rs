//! Fetch, aggregate and chart pipeline for one species selection.

use provider::{CountFilter, DataProvider, CHART_GROUPING};
use shared::protocol::ChartTriple;
use tracing::info;

pub mod aggregate;
pub mod catalog;
pub mod charts;
pub mod error;

pub use aggregate::{aggregate, AggregatedRow};
pub use catalog::{CategoryCatalog, UNKNOWN_STEWARD, UNLISTED_SPECIES};
pub use charts::ChartBuilder;
pub use error::{CatalogError, PipelineError, UnknownCategoryError};

/// Runs one full pass. Only the provider call suspends; aggregation and the
/// three builds run synchronously over the same ordered rows.
pub async fn compute_charts(
    provider: &dyn DataProvider,
    catalog: &CategoryCatalog,
    species: &str,
) -> Result<ChartTriple, PipelineError> {
    let raw = provider
        .fetch_grouped_counts(&CountFilter::species(species), &CHART_GROUPING)
        .await?;
    let received = raw.len();
    let rows = aggregate(raw, species)?;
    let charts = ChartBuilder::new(catalog.colors()).build(&rows, species);
    info!(
        species,
        received,
        rows = rows.len(),
        total = charts.city.total,
        "built chart triple"
    );
    Ok(charts)
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
