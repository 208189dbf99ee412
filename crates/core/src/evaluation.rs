//! Held-out evaluation metrics for regression models.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Scores computed on the test partition after a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub rmse: f64,
    pub r2_score: f64,
}

impl ModelPerformance {
    /// Score `predictions` against `targets`.
    pub fn evaluate(predictions: &[f64], targets: &[f64]) -> Result<Self, CoreError> {
        Ok(Self {
            rmse: rmse(predictions, targets)?,
            r2_score: r2_score(predictions, targets)?,
        })
    }
}

fn check_lengths(predictions: &[f64], targets: &[f64]) -> Result<(), CoreError> {
    if predictions.len() != targets.len() {
        return Err(CoreError::Validation(format!(
            "{} predictions for {} targets",
            predictions.len(),
            targets.len()
        )));
    }
    if predictions.is_empty() {
        return Err(CoreError::Validation("Cannot score an empty partition".into()));
    }
    Ok(())
}

/// Root mean squared error.
pub fn rmse(predictions: &[f64], targets: &[f64]) -> Result<f64, CoreError> {
    check_lengths(predictions, targets)?;
    let mse = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum::<f64>()
        / predictions.len() as f64;
    Ok(mse.sqrt())
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant target has `SS_tot == 0`; that scores 1.0 when the predictions
/// are also exact and 0.0 otherwise.
pub fn r2_score(predictions: &[f64], targets: &[f64]) -> Result<f64, CoreError> {
    check_lengths(predictions, targets)?;
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
