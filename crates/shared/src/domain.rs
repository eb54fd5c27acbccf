use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownCategoryError;

/// Declares a closed, ordered category set. Declaration order is the canonical
/// order: `Ord` compares variant positions, never label text.
macro_rules! category_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn position(self) -> usize {
                self as usize
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|value| value.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategoryError;

            fn from_str(label: &str) -> Result<Self, Self::Err> {
                match label {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownCategoryError::new($kind, other)),
                }
            }
        }
    };
}

category_enum!(
    /// The five boroughs, in the fixed subplot and facet order.
    Borough, "borough" {
        Bronx => "Bronx",
        Queens => "Queens",
        Brooklyn => "Brooklyn",
        Manhattan => "Manhattan",
        StatenIsland => "Staten Island",
    }
);

category_enum!(
    /// Tree condition. Order drives both sorting and stacking/legend order.
    HealthLevel, "health" {
        Good => "Good",
        Fair => "Fair",
        Poor => "Poor",
    }
);

category_enum!(
    /// Stewardship activity buckets; the steward x-axis follows this order.
    StewardBucket, "steward" {
        Unstewarded => "None",
        OneOrTwo => "1or2",
        ThreeOrFour => "3or4",
        FourOrMore => "4orMore",
    }
);

pub const UNKNOWN_COLOR_KEY: &str = "Unknown";

/// Health label to color token. Total over `HealthLevel`; any other label
/// resolves to the `Unknown` sentinel color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMap {
    #[serde(rename = "Good")]
    pub good: String,
    #[serde(rename = "Fair")]
    pub fair: String,
    #[serde(rename = "Poor")]
    pub poor: String,
    #[serde(rename = "Unknown")]
    pub unknown: String,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            good: "#14C968".into(),
            fair: "#C99914".into(),
            poor: "#A31A21".into(),
            unknown: "#696463".into(),
        }
    }
}

impl ColorMap {
    pub fn for_health(&self, health: HealthLevel) -> &str {
        match health {
            HealthLevel::Good => &self.good,
            HealthLevel::Fair => &self.fair,
            HealthLevel::Poor => &self.poor,
        }
    }

    pub fn for_label(&self, label: &str) -> &str {
        label
            .parse::<HealthLevel>()
            .map(|health| self.for_health(health))
            .unwrap_or(self.unknown.as_str())
    }

    pub fn entries(&self) -> Vec<(&str, &str)> {
        HealthLevel::ALL
            .iter()
            .map(|health| (health.label(), self.for_health(*health)))
            .chain(std::iter::once((UNKNOWN_COLOR_KEY, self.unknown.as_str())))
            .collect()
    }
}

/// One grouped count as reported by the data provider. Dimension values the
/// provider did not report (null, or not grouped on) are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCountRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borough: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steward: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    pub count: u64,
}

impl RawCountRow {
    pub fn new(borough: &str, steward: &str, health: &str, count: u64) -> Self {
        Self {
            borough: Some(borough.to_string()),
            steward: Some(steward.to_string()),
            health: Some(health.to_string()),
            count,
        }
    }
}
