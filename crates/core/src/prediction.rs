//! Confidence and price-range heuristics attached to each prediction.

use serde::Serialize;

use crate::features::FeatureRow;
use crate::regression::DecisionTreeRegressor;

/// Confidence reported for a degenerate single-leaf tree.
pub const FLAT_TREE_CONFIDENCE: f64 = 0.8;

/// Estimated bounds around a point prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRange {
    pub min: f64,
    pub max: f64,
    pub range_percent: String,
}

/// Path-length confidence: how far down the tree this row travelled,
/// relative to the deepest leaf. Clamped to `[0, 1]`.
pub fn confidence_score(model: &DecisionTreeRegressor, row: &FeatureRow) -> f64 {
    let depth = model.depth();
    if depth == 0 {
        return FLAT_TREE_CONFIDENCE;
    }
    (model.decision_path_len(row) as f64 / depth as f64).clamp(0.0, 1.0)
}

/// Band of 10% (full confidence) to 40% (zero confidence) around `prediction`.
pub fn prediction_range(prediction: f64, confidence: f64) -> PredictionRange {
    let factor = (1.0 - confidence) * 0.3 + 0.1;
    let amount = prediction * factor;
    PredictionRange {
        min: (prediction - amount).max(0.0),
        max: prediction + amount,
        range_percent: format!("{:.1}%", factor * 100.0),
    }
}

/// Round to `places` decimal places for presentation.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::regression::TreeParams;

    #[test]
    fn full_confidence_gives_ten_percent_band() {
        let range = prediction_range(100.0, 1.0);
        assert!((range.min - 90.0).abs() < 1e-9);
        assert!((range.max - 110.0).abs() < 1e-9);
        assert_eq!(range.range_percent, "10.0%");
    }

    #[test]
    fn zero_confidence_gives_forty_percent_band() {
        let range = prediction_range(100.0, 0.0);
        assert_eq!(range.range_percent, "40.0%");
        assert!((range.min - 60.0).abs() < 1e-9);
    }

    #[test]
    fn lower_bound_never_negative() {
        assert_eq!(prediction_range(-5.0, 0.5).min, 0.0);
    }

    #[test]
    fn flat_tree_uses_fixed_confidence() {
        let mut ds = Dataset::new();
        ds.push([1.0; 8], 5.0);
        let tree = DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap();
        assert_eq!(confidence_score(&tree, &[1.0; 8]), FLAT_TREE_CONFIDENCE);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut ds = Dataset::new();
        ds.push([0.0; 8], 1.0);
        ds.push([1.0; 8], 2.0);
        let tree = DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap();
        // Path of 2 nodes over depth 1.
        assert_eq!(confidence_score(&tree, &[0.0; 8]), 1.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.9876, 3), 0.988);
    }
}
