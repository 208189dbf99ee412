//! Hooks the serving layer uses to count lifecycle events.
//!
//! Every method has a no-op default so implementations only override what
//! they track.

use crate::executor::RetrainOutcome;

pub trait RetrainTelemetry: Send + Sync {
    /// `count` samples were accepted into the store.
    fn new_samples(&self, _count: usize) {}

    /// A batch submission finished with `status` (`success`, `partial_success`, `error`).
    fn training_batch(&self, _size: usize, _failed: usize, _status: &str) {}

    fn retrain_triggered(&self, _reason: &str, _force: bool) {}

    fn retrain_finished(&self, _outcome: &RetrainOutcome) {}
}

/// Telemetry sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl RetrainTelemetry for NoopTelemetry {}
