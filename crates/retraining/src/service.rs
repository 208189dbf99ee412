//! Serving facade: the single context object the HTTP layer talks to.
//!
//! Constructed once at startup and shared behind an `Arc`. Owns the sample
//! store, audit log, artifact slot, serving model and retrainer.

use std::sync::Arc;
use std::time::Instant;

use housing_core::decision::{self, RetrainVerdict};
use housing_core::error::CoreError;
use housing_core::features::{FeatureMap, HousingFeatures};
use housing_core::prediction::{confidence_score, prediction_range, round_to, PredictionRange};
use housing_core::regression::{DecisionTreeRegressor, DecisionTreeTrainer, ModelTrainer};
use serde::Serialize;

use crate::artifact::{FsModelStore, ModelStore, Recovery};
use crate::audit::AuditLog;
use crate::baseline::{BaselineSource, CsvBaseline};
use crate::config::RetrainConfig;
use crate::error::StoreError;
use crate::executor::{RetrainFailure, RetrainOutcome, Retrainer};
use crate::sample_store::{FailedSample, SampleStore, SampleSubmission};
use crate::serving::ServingModel;
use crate::status::{RetrainingStatus, Thresholds};
use crate::telemetry::{NoopTelemetry, RetrainTelemetry};

/// Largest batch accepted by [`HousingService::predict_batch`].
pub const MAX_PREDICTION_BATCH: usize = 1000;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One priced prediction with its heuristics.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub predicted_price: f64,
    pub confidence_score: f64,
    pub prediction_range: PredictionRange,
}

/// Result of [`HousingService::submit_sample`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub status: &'static str,
    pub message: String,
    pub new_sample_count: usize,
    pub should_retrain: bool,
    pub retrain_reason: String,
}

/// Result of [`HousingService::submit_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReceipt {
    /// `success`, `partial_success` or `error`.
    pub status: &'static str,
    pub message: String,
    pub samples_added: usize,
    pub total_samples: usize,
    pub failed_samples: usize,
    pub failures: Vec<FailedSample>,
    pub should_retrain: bool,
    pub retrain_reason: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Overrides for the collaborators [`HousingService`] would otherwise build
/// from its configuration.
pub struct HousingServiceBuilder {
    config: RetrainConfig,
    samples: Option<SampleStore>,
    baseline: Option<Arc<dyn BaselineSource>>,
    trainer: Option<Arc<dyn ModelTrainer>>,
    models: Option<Arc<dyn ModelStore>>,
    telemetry: Option<Arc<dyn RetrainTelemetry>>,
}

impl HousingServiceBuilder {
    /// Use `samples` instead of the CSV store under the data directory.
    pub fn sample_store(mut self, samples: SampleStore) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn baseline(mut self, baseline: Arc<dyn BaselineSource>) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn trainer(mut self, trainer: Arc<dyn ModelTrainer>) -> Self {
        self.trainer = Some(trainer);
        self
    }

    pub fn model_store(mut self, models: Arc<dyn ModelStore>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn RetrainTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Open every store, repair an interrupted swap and load the serving model.
    ///
    /// A missing serving artifact is not an error: predictions report
    /// unavailable until a retrain installs one.
    pub fn open(self) -> Result<HousingService, StoreError> {
        let config = self.config;
        let samples = match self.samples {
            Some(samples) => Arc::new(samples),
            None => Arc::new(SampleStore::open_csv(config.sample_store_path())?),
        };
        let audit = Arc::new(AuditLog::open(config.audit_log_path(), config.retrain_log_cap)?);
        let models = self.models.unwrap_or_else(|| Arc::new(FsModelStore));
        let baseline = self.baseline.unwrap_or_else(|| {
            Arc::new(CsvBaseline::new(
                &config.baseline_path,
                config.baseline_target_scale,
            ))
        });
        let trainer = self
            .trainer
            .unwrap_or_else(|| Arc::new(DecisionTreeTrainer::default()));
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(NoopTelemetry));
        let serving = Arc::new(ServingModel::empty(&config.model_name));

        let retrainer = Arc::new(Retrainer::new(
            config.clone(),
            Arc::clone(&samples),
            Arc::clone(&audit),
            Arc::clone(&models),
            Arc::clone(&serving),
            baseline,
            trainer,
        ));

        let slot = retrainer.slot();
        if slot.recover(models.as_ref())? != Recovery::Clean {
            tracing::info!(slot = slot.name(), "Artifact slot repaired at startup");
        }

        match slot.load_serving(models.as_ref())? {
            Some(model) => {
                tracing::info!(
                    model = slot.name(),
                    depth = model.depth(),
                    nodes = model.node_count(),
                    "Serving model loaded"
                );
                serving.load(model);
            }
            None => tracing::warn!(
                path = %slot.serving_path().display(),
                "No serving model artifact found; predictions unavailable until a retrain"
            ),
        }

        Ok(HousingService {
            config,
            samples,
            audit,
            models,
            retrainer,
            serving,
            telemetry,
        })
    }
}

// ---------------------------------------------------------------------------
// HousingService
// ---------------------------------------------------------------------------

pub struct HousingService {
    config: RetrainConfig,
    samples: Arc<SampleStore>,
    audit: Arc<AuditLog>,
    models: Arc<dyn ModelStore>,
    retrainer: Arc<Retrainer>,
    serving: Arc<ServingModel>,
    telemetry: Arc<dyn RetrainTelemetry>,
}

impl HousingService {
    pub fn builder(config: RetrainConfig) -> HousingServiceBuilder {
        HousingServiceBuilder {
            config,
            samples: None,
            baseline: None,
            trainer: None,
            models: None,
            telemetry: None,
        }
    }

    /// Open with every collaborator derived from `config`.
    pub fn open(config: RetrainConfig) -> Result<Self, StoreError> {
        Self::builder(config).open()
    }

    pub fn config(&self) -> &RetrainConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.serving.name()
    }

    pub fn model_loaded(&self) -> bool {
        self.serving.is_loaded()
    }

    /// The model currently answering predictions.
    pub fn current_model(&self) -> Option<Arc<DecisionTreeRegressor>> {
        self.serving.get()
    }

    // -- Predictions --------------------------------------------------------

    /// Validate and price one record.
    pub fn predict(&self, features: &HousingFeatures) -> Result<Prediction, CoreError> {
        features.validate_all()?;
        let model = self.require_model()?;
        Ok(price(&model, features))
    }

    /// Validate and price up to [`MAX_PREDICTION_BATCH`] records.
    ///
    /// The whole batch is rejected if any record fails validation; the error
    /// names the offending index.
    pub fn predict_batch(&self, batch: &[HousingFeatures]) -> Result<Vec<Prediction>, CoreError> {
        if batch.is_empty() {
            return Err(CoreError::Validation("Empty batch provided".into()));
        }
        if batch.len() > MAX_PREDICTION_BATCH {
            return Err(CoreError::Validation(format!(
                "Batch size {} exceeds maximum of {MAX_PREDICTION_BATCH}",
                batch.len()
            )));
        }
        for (index, features) in batch.iter().enumerate() {
            features
                .validate_all()
                .map_err(|e| CoreError::Validation(format!("Row {index}: {e}")))?;
        }

        let model = self.require_model()?;
        Ok(batch.iter().map(|f| price(&model, f)).collect())
    }

    fn require_model(&self) -> Result<Arc<DecisionTreeRegressor>, CoreError> {
        self.serving
            .get()
            .ok_or_else(|| CoreError::Unavailable("Model not loaded".into()))
    }

    // -- Training data ------------------------------------------------------

    /// Validate and store one ground-truth sample.
    pub fn submit_sample(
        &self,
        features: &FeatureMap,
        target: f64,
    ) -> Result<SubmitReceipt, StoreError> {
        let parsed = HousingFeatures::from_map(features)?;
        parsed.validate_all()?;
        let new_sample_count = self.samples.append_features(parsed, target)?;
        self.telemetry.new_samples(1);

        let verdict = self.verdict(new_sample_count);
        tracing::info!(
            new_sample_count,
            should_retrain = verdict.should_retrain,
            "Training sample stored"
        );
        Ok(SubmitReceipt {
            status: "success",
            message: "Training data added successfully".into(),
            new_sample_count,
            should_retrain: verdict.should_retrain,
            retrain_reason: verdict.reason,
        })
    }

    /// Store each valid sample of `batch`; invalid ones are reported by index.
    pub fn submit_batch(&self, batch: &[SampleSubmission]) -> BatchReceipt {
        let report = self
            .samples
            .append_batch_with(batch, HousingFeatures::validate_all);

        let status = if report.failed.is_empty() {
            "success"
        } else if report.added > 0 {
            "partial_success"
        } else {
            "error"
        };
        if report.added > 0 {
            self.telemetry.new_samples(report.added);
        }
        self.telemetry
            .training_batch(batch.len(), report.failed.len(), status);

        let verdict = self.verdict(report.total);
        tracing::info!(
            added = report.added,
            failed = report.failed.len(),
            total = report.total,
            "Training batch processed"
        );
        BatchReceipt {
            status,
            message: format!(
                "Added {} of {} samples ({} failed)",
                report.added,
                batch.len(),
                report.failed.len()
            ),
            samples_added: report.added,
            total_samples: report.total,
            failed_samples: report.failed.len(),
            failures: report.failed,
            should_retrain: verdict.should_retrain,
            retrain_reason: verdict.reason,
        }
    }

    fn verdict(&self, active: usize) -> RetrainVerdict {
        decision::decide(active, self.config.min_new_samples)
    }

    // -- Status -------------------------------------------------------------

    /// Current lifecycle view. Never fails; unreadable sources are reported
    /// in `error`.
    pub fn status(&self) -> RetrainingStatus {
        let mut errors = Vec::new();

        let new_data_samples = self.samples.size().unwrap_or_else(|e| {
            errors.push(format!("sample store: {e}"));
            0
        });
        let model_age_days = self
            .retrainer
            .slot()
            .model_age_days(self.models.as_ref())
            .unwrap_or_else(|e| {
                errors.push(format!("model artifact: {e}"));
                None
            });
        let daily_retrain_attempts = self.audit.count_today().unwrap_or_else(|e| {
            errors.push(format!("audit log: {e}"));
            0
        });
        let recent_retrains = self
            .audit
            .recent(self.config.recent_retrains_shown)
            .unwrap_or_else(|e| {
                errors.push(format!("audit log: {e}"));
                Vec::new()
            });
        errors.dedup();

        let verdict = self.verdict(new_data_samples);
        RetrainingStatus {
            new_data_samples,
            model_age_days,
            should_retrain: verdict.should_retrain,
            retrain_reason: verdict.reason,
            daily_retrain_attempts,
            max_daily_attempts: self.config.max_daily_retrains,
            thresholds: Thresholds {
                min_new_samples: self.config.min_new_samples,
            },
            recent_retrains,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    // -- Retraining ---------------------------------------------------------

    /// Run a retrain on the blocking pool. A completed run has already
    /// hot-reloaded the serving model when this returns.
    ///
    /// The work runs to completion even if the returned future is dropped.
    pub async fn trigger(&self, reason: &str, force: bool) -> RetrainOutcome {
        let started = Instant::now();
        let retrainer = Arc::clone(&self.retrainer);
        let telemetry = Arc::clone(&self.telemetry);
        let reason = reason.to_string();

        telemetry.retrain_triggered(&reason, force);
        let handle = tokio::task::spawn_blocking(move || {
            let outcome = retrainer.trigger(&reason, force);
            telemetry.retrain_finished(&outcome);
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Retraining task aborted");
                RetrainOutcome::Failed(RetrainFailure {
                    message: format!("retraining task aborted: {e}"),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    audited: false,
                })
            }
        }
    }
}

fn price(model: &DecisionTreeRegressor, features: &HousingFeatures) -> Prediction {
    let row = features.to_row();
    let predicted = model.predict(&row);
    let confidence = confidence_score(model, &row);
    let range = prediction_range(predicted, confidence);
    Prediction {
        predicted_price: round_to(predicted, 2),
        confidence_score: round_to(confidence, 2),
        prediction_range: PredictionRange {
            min: round_to(range.min, 2),
            max: round_to(range.max, 2),
            range_percent: range.range_percent,
        },
    }
}
