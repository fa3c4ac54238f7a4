use serde::{Deserialize, Serialize};

use super::YearRange;

/// A model generation (e.g. "3 Series (E46)") belonging to a brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chassis {
    #[serde(rename = "chassisIndex")]
    pub chassis_index: u32,
    pub brand: String,
    pub name: String,
    /// Year-range descriptor, e.g. "1998/02 - 2005/12 E46"
    #[serde(default)]
    pub year: String,
    #[serde(rename = "hasImg", default)]
    pub has_img: bool,
    /// PNG bytes, persisted beside the record rather than inside it
    #[serde(skip)]
    pub picture: Option<Vec<u8>>,
}

impl Chassis {
    pub fn year_range(&self) -> YearRange {
        YearRange::parse(&self.year)
    }

    pub fn has_picture(&self) -> bool {
        self.picture.is_some()
    }

    pub fn summary(&self) -> ChassisSummary {
        ChassisSummary {
            chassis_index: self.chassis_index,
            name: self.name.clone(),
            year: self.year.clone(),
            has_img: self.has_img,
        }
    }
}

/// The slim per-brand listing kept by the summary cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisSummary {
    #[serde(rename = "chassisIndex")]
    pub chassis_index: u32,
    pub name: String,
    pub year: String,
    #[serde(rename = "hasImg")]
    pub has_img: bool,
}

impl ChassisSummary {
    /// Expand back into a chassis of the given brand, without a picture.
    pub fn into_chassis(self, brand: &str) -> Chassis {
        Chassis {
            chassis_index: self.chassis_index,
            brand: brand.to_string(),
            name: self.name,
            year: self.year,
            has_img: self.has_img,
            picture: None,
        }
    }
}
