use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Borough, ColorMap, HealthLevel},
    error::ApiError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: HealthLevel,
    pub value: u64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityPie {
    pub species: String,
    pub title: String,
    pub title_x: f64,
    pub total: u64,
    pub slices: Vec<PieSlice>,
}

impl CityPie {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoroughPie {
    pub borough: Borough,
    pub column: usize,
    pub title: String,
    pub title_position: String,
    pub scale_group: String,
    pub total: u64,
    pub slices: Vec<PieSlice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoroughPieArray {
    pub rows: usize,
    pub cols: usize,
    pub subplot_titles: Vec<String>,
    pub pies: Vec<BoroughPie>,
}

impl BoroughPieArray {
    pub fn is_empty(&self) -> bool {
        self.pies.iter().all(|pie| pie.slices.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarMode {
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarNorm {
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSegment {
    pub health: HealthLevel,
    pub count: u64,
    pub percent: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StewardBar {
    pub steward: String,
    pub total: u64,
    pub segments: Vec<BarSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StewardFacet {
    pub borough: Borough,
    pub title: String,
    pub bars: Vec<StewardBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StewardBarFacet {
    pub facet_col: String,
    pub category_order: Vec<String>,
    pub stack_order: Vec<HealthLevel>,
    pub bar_mode: BarMode,
    pub bar_norm: BarNorm,
    pub facets: Vec<StewardFacet>,
}

impl StewardBarFacet {
    pub fn is_empty(&self) -> bool {
        self.facets.iter().all(|facet| facet.bars.is_empty())
    }

    pub fn facet(&self, borough: Borough) -> Option<&StewardFacet> {
        self.facets.iter().find(|facet| facet.borough == borough)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    City,
    Boroughs,
    Steward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    CityPie(CityPie),
    BoroughPieArray(BoroughPieArray),
    StewardBarFacet(StewardBarFacet),
}

/// The three charts derived from one aggregate. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartTriple {
    pub city: CityPie,
    pub boroughs: BoroughPieArray,
    pub steward: StewardBarFacet,
}

impl ChartTriple {
    pub fn spec(&self, kind: ChartKind) -> ChartSpec {
        match kind {
            ChartKind::City => ChartSpec::CityPie(self.city.clone()),
            ChartKind::Boroughs => ChartSpec::BoroughPieArray(self.boroughs.clone()),
            ChartKind::Steward => ChartSpec::StewardBarFacet(self.steward.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub generation: u64,
    pub species: String,
    pub published_at: DateTime<Utc>,
    pub charts: ChartTriple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DashboardEvent {
    Published { publication: Publication },
    Failed { species: String, error: ApiError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub species: Vec<String>,
    pub stewards: Vec<String>,
    pub boroughs: Vec<String>,
    pub health_levels: Vec<String>,
    pub steward_buckets: Vec<String>,
    pub colors: ColorMap,
    pub default_species: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub species: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// A new computation was started, superseding any in flight.
    Started,
    /// Same as the latest request; nothing to do.
    Unchanged,
    /// The in-flight request was cancelled and the held charts already match.
    Restored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Idle,
    Computing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub phase: ControllerPhase,
    pub generation: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ApiError>,
}
