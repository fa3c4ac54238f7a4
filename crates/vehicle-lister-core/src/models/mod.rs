//! Data models for catalog entities.
//!
//! - `Brand`: a make from the static reference catalog
//! - `Chassis`: a model generation belonging to a brand, with an optional picture
//! - `Car`: a specific engine variant of a chassis
//! - `YearRange`: parsed production span shared by chassis and cars

pub mod brand;
pub mod car;
pub mod chassis;
pub mod year_range;

pub use brand::Brand;
pub use car::Car;
pub use chassis::{Chassis, ChassisSummary};
pub use year_range::{YearEnd, YearRange};

use serde::{Deserialize, Deserializer};

/// Accept either a JSON string or a JSON number for text-typed catalog fields.
/// Some remote documents store power figures as numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
