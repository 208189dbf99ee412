//! Retraining decision policy.
//!
//! A pure function of the active sample count and the configured minimum.
//! The verdict is derived on every status query and never stored.

use serde::Serialize;

/// Prefix of the reason returned when the threshold is not met.
pub const INSUFFICIENT_SAMPLES: &str = "insufficient new samples";

/// Outcome of evaluating the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrainVerdict {
    pub should_retrain: bool,
    pub reason: String,
}

/// Decide whether `active_samples` justifies a retrain.
///
/// The threshold is inclusive: `decide(m, m)` retrains.
pub fn decide(active_samples: usize, min_new_samples: usize) -> RetrainVerdict {
    if active_samples >= min_new_samples {
        RetrainVerdict {
            should_retrain: true,
            reason: format!(
                "new sample count reached minimum: {active_samples} >= {min_new_samples}"
            ),
        }
    } else {
        RetrainVerdict {
            should_retrain: false,
            reason: format!("{INSUFFICIENT_SAMPLES} ({active_samples} < {min_new_samples})"),
        }
    }
}
