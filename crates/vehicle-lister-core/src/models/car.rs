use serde::{Deserialize, Serialize};

use super::{string_or_number, YearRange};

/// A specific engine variant of a chassis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    #[serde(rename = "carIndex")]
    pub car_index: u32,
    #[serde(rename = "chassisIndex")]
    pub chassis_index: u32,
    pub brand: String,
    /// Name of the parent chassis
    pub chassis: String,
    pub engine: String,
    /// Comma-separated alternate engine codes, e.g. "M54B30, M54B25"
    #[serde(rename = "engineCode", default)]
    pub engine_code: String,
    #[serde(default)]
    pub year: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub kw: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub hp: String,
    #[serde(default)]
    pub fuel: String,
}

impl Car {
    pub fn year_range(&self) -> YearRange {
        YearRange::parse(&self.year)
    }

    /// Individual engine codes with whitespace removed.
    pub fn engine_codes(&self) -> impl Iterator<Item = String> + '_ {
        self.engine_code
            .split(',')
            .map(crate::utils::strip_whitespace)
    }
}
