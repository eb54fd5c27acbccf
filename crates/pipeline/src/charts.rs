use shared::{
    domain::{Borough, ColorMap, HealthLevel, StewardBucket},
    protocol::{
        BarMode, BarNorm, BarSegment, BoroughPie, BoroughPieArray, ChartTriple, CityPie, PieSlice,
        StewardBar, StewardBarFacet, StewardFacet,
    },
};

use crate::aggregate::AggregatedRow;

pub const PIE_SCALE_GROUP: &str = "one";
pub const PIE_TITLE_POSITION: &str = "bottom center";
pub const FACET_COLUMN: &str = "boroname";
const CITY_TITLE_X: f64 = 0.5;

pub struct ChartBuilder<'a> {
    colors: &'a ColorMap,
}

impl<'a> ChartBuilder<'a> {
    pub fn new(colors: &'a ColorMap) -> Self {
        Self { colors }
    }

    pub fn build(&self, rows: &[AggregatedRow], species: &str) -> ChartTriple {
        ChartTriple {
            city: self.city_pie(rows, species),
            boroughs: self.borough_pie_array(rows),
            steward: self.steward_bar_facet(rows),
        }
    }

    pub fn city_pie(&self, rows: &[AggregatedRow], species: &str) -> CityPie {
        let totals = health_totals(rows.iter());
        let total = saturating_total(&totals);
        let slices = HealthLevel::ALL
            .iter()
            .zip(totals)
            .filter(|(_, value)| *value > 0)
            .map(|(health, value)| PieSlice {
                label: *health,
                value,
                color: self.colors.for_health(*health).to_string(),
            })
            .collect();

        CityPie {
            species: species.to_string(),
            title: format!("Health breakdown of {total} {species} trees in NYC"),
            title_x: CITY_TITLE_X,
            total,
            slices,
        }
    }

    /// One pie per borough in canonical order; boroughs without rows keep
    /// their slot as an empty pie.
    pub fn borough_pie_array(&self, rows: &[AggregatedRow]) -> BoroughPieArray {
        let pies = Borough::ALL
            .iter()
            .map(|borough| {
                let totals = health_totals(rows.iter().filter(|row| row.borough == *borough));
                let total = saturating_total(&totals);
                let slices = HealthLevel::ALL
                    .iter()
                    .zip(totals)
                    .filter(|(_, value)| *value > 0)
                    .map(|(health, value)| PieSlice {
                        label: *health,
                        value,
                        color: self.colors.for_health(*health).to_string(),
                    })
                    .collect();
                BoroughPie {
                    borough: *borough,
                    column: borough.position() + 1,
                    title: format!("{total} Trees"),
                    title_position: PIE_TITLE_POSITION.to_string(),
                    scale_group: PIE_SCALE_GROUP.to_string(),
                    total,
                    slices,
                }
            })
            .collect();

        BoroughPieArray {
            rows: 1,
            cols: Borough::ALL.len(),
            subplot_titles: Borough::labels().into_iter().map(str::to_string).collect(),
            pies,
        }
    }

    /// Percent-stacked bars: each (borough, steward) bar's segments sum to 100.
    pub fn steward_bar_facet(&self, rows: &[AggregatedRow]) -> StewardBarFacet {
        let axis = steward_axis(rows);
        let facets = Borough::ALL
            .iter()
            .map(|borough| {
                let bars = axis
                    .iter()
                    .filter_map(|steward| {
                        let totals = health_totals(
                            rows.iter()
                                .filter(|row| row.borough == *borough && row.steward == *steward),
                        );
                        self.stacked_bar(steward, &totals)
                    })
                    .collect();
                StewardFacet {
                    borough: *borough,
                    title: borough.label().to_string(),
                    bars,
                }
            })
            .collect();

        StewardBarFacet {
            facet_col: FACET_COLUMN.to_string(),
            category_order: axis,
            stack_order: HealthLevel::ALL.to_vec(),
            bar_mode: BarMode::Relative,
            bar_norm: BarNorm::Percent,
            facets,
        }
    }

    fn stacked_bar(&self, steward: &str, totals: &[u64]) -> Option<StewardBar> {
        let total = saturating_total(&totals);
        if total == 0 {
            return None;
        }
        let segments = HealthLevel::ALL
            .iter()
            .zip(totals.iter().copied())
            .filter(|(_, count)| *count > 0)
            .map(|(health, count)| BarSegment {
                health: *health,
                count,
                percent: count as f64 * 100.0 / total as f64,
                color: self.colors.for_health(*health).to_string(),
            })
            .collect();
        Some(StewardBar {
            steward: steward.to_string(),
            total,
            segments,
        })
    }
}

/// Sums counts per health level, indexed by canonical position.
fn health_totals<'r>(rows: impl Iterator<Item = &'r AggregatedRow>) -> Vec<u64> {
    let mut totals = vec![0u64; HealthLevel::ALL.len()];
    for row in rows {
        let slot = &mut totals[row.health.position()];
        *slot = slot.saturating_add(row.count);
    }
    totals
}

fn saturating_total(counts: &[u64]) -> u64 {
    counts.iter().fold(0, |sum, count| sum.saturating_add(*count))
}

/// Canonical steward buckets, then any other observed label in first-seen order.
fn steward_axis(rows: &[AggregatedRow]) -> Vec<String> {
    let mut axis: Vec<String> = StewardBucket::labels()
        .into_iter()
        .map(str::to_string)
        .collect();
    for row in rows {
        if !axis.contains(&row.steward) {
            axis.push(row.steward.clone());
        }
    }
    axis
}
