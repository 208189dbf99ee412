//! The fixed eight-column California housing feature schema.
//!
//! Field names on the wire match the published dataset columns exactly
//! (`MedInc`, `HouseAge`, ...). Range limits mirror the bounds of the
//! training data so out-of-distribution requests are rejected up front.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of model input columns.
pub const FEATURE_COUNT: usize = 8;

/// Canonical column order. Model rows, CSV headers and missing-key
/// reporting all follow this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Name of the target column in sample-store and baseline files.
pub const TARGET_COLUMN: &str = "target";

/// One model input row in [`FEATURE_NAMES`] order.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Loosely-typed feature submission keyed by column name.
pub type FeatureMap = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// HousingFeatures
// ---------------------------------------------------------------------------

/// A validated-shape housing feature record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct HousingFeatures {
    /// Median income in block group.
    #[serde(rename = "MedInc")]
    #[validate(range(min = 0.5, max = 15.0))]
    pub med_inc: f64,
    /// Median house age in block group.
    #[serde(rename = "HouseAge")]
    #[validate(range(min = 1.0, max = 52.0))]
    pub house_age: f64,
    /// Average number of rooms per household.
    #[serde(rename = "AveRooms")]
    #[validate(range(min = 2.0, max = 15.0))]
    pub ave_rooms: f64,
    /// Average number of bedrooms per household.
    #[serde(rename = "AveBedrms")]
    #[validate(range(min = 0.1, max = 5.0))]
    pub ave_bedrms: f64,
    /// Block group population.
    #[serde(rename = "Population")]
    #[validate(range(min = 3.0, max = 40000.0))]
    pub population: f64,
    /// Average number of household members.
    #[serde(rename = "AveOccup")]
    #[validate(range(min = 1.0, max = 50.0))]
    pub ave_occup: f64,
    /// Latitude (California bounds).
    #[serde(rename = "Latitude")]
    #[validate(range(min = 32.5, max = 41.95))]
    pub latitude: f64,
    /// Longitude (California bounds).
    #[serde(rename = "Longitude")]
    #[validate(range(min = -124.35, max = -114.13))]
    pub longitude: f64,
}

impl HousingFeatures {
    /// Build from a model row in [`FEATURE_NAMES`] order.
    pub fn from_row(row: &FeatureRow) -> Self {
        Self {
            med_inc: row[0],
            house_age: row[1],
            ave_rooms: row[2],
            ave_bedrms: row[3],
            population: row[4],
            ave_occup: row[5],
            latitude: row[6],
            longitude: row[7],
        }
    }

    /// Project onto a model row in [`FEATURE_NAMES`] order.
    pub fn to_row(&self) -> FeatureRow {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }

    /// Build from a name-keyed map, failing on the first absent column.
    ///
    /// Extra keys are ignored.
    pub fn from_map(map: &FeatureMap) -> Result<Self, CoreError> {
        let mut row = [0.0; FEATURE_COUNT];
        for (slot, name) in row.iter_mut().zip(FEATURE_NAMES) {
            *slot = *map.get(name).ok_or(CoreError::MissingFeature(name))?;
        }
        Ok(Self::from_row(&row))
    }

    /// Name-keyed view, the inverse of [`from_map`](Self::from_map).
    pub fn to_map(&self) -> FeatureMap {
        FEATURE_NAMES
            .iter()
            .zip(self.to_row())
            .map(|(name, value)| ((*name).to_string(), value))
            .collect()
    }

    /// Check every field against its documented range.
    pub fn validate_ranges(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Feature out of range: {e}")))
    }

    /// Cross-field rules that the per-field ranges cannot express.
    pub fn check_business_rules(&self) -> Result<(), CoreError> {
        if self.ave_bedrms > self.ave_rooms {
            return Err(CoreError::Validation(
                "Invalid input: Average bedrooms cannot exceed average rooms \
                 (ensure AveBedrms <= AveRooms)"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Range checks followed by business rules.
    pub fn validate_all(&self) -> Result<(), CoreError> {
        self.validate_ranges()?;
        self.check_business_rules()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
