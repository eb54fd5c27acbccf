use shared::domain::{Borough, HealthLevel, RawCountRow};
use tracing::debug;

use crate::error::UnknownCategoryError;

/// A complete count row with borough and health bound to their canonical
/// enumerations, so ordering follows category order rather than label text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    pub borough: Borough,
    pub steward: String,
    pub health: HealthLevel,
    pub count: u64,
}

/// Drops incomplete rows, binds categories and orders the result by
/// borough, then health. `rows` are already filtered to `species`.
pub fn aggregate(
    rows: Vec<RawCountRow>,
    species: &str,
) -> Result<Vec<AggregatedRow>, UnknownCategoryError> {
    let received = rows.len();
    let mut aggregated = Vec::with_capacity(received);
    for row in rows {
        let RawCountRow {
            borough: Some(borough),
            steward: Some(steward),
            health: Some(health),
            count,
        } = row
        else {
            continue;
        };
        let health = health.parse::<HealthLevel>()?;
        let borough = borough.parse::<Borough>()?;
        aggregated.push(AggregatedRow {
            borough,
            steward,
            health,
            count,
        });
    }

    // Both passes are stable: rows sharing (borough, health) keep provider order.
    aggregated.sort_by_key(|row| row.health);
    aggregated.sort_by_key(|row| row.borough);

    let dropped = received - aggregated.len();
    if dropped > 0 {
        debug!(species, dropped, "dropped rows with missing dimension values");
    }
    Ok(aggregated)
}
