//! The retraining run: quota, data and policy gates, then assemble, split,
//! fit, evaluate, swap, archive and audit.
//!
//! Runs are serialised by a process-wide lock held across the whole
//! sequence, including the in-memory reload after the swap, so the served
//! model always matches the latest serving artifact. Precondition
//! rejections leave no trace in the audit log; anything that fails after the
//! gates pass is recorded as a failed attempt and consumes a quota slot.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use housing_core::dataset::Dataset;
use housing_core::decision;
use housing_core::evaluation::ModelPerformance;
use housing_core::prediction::round_to;
use housing_core::regression::{DecisionTreeRegressor, ModelTrainer};
use serde::Serialize;

use crate::artifact::{ArtifactSlot, ModelStore, SwapReceipt};
use crate::audit::{AuditLog, RetrainAttempt};
use crate::baseline::BaselineSource;
use crate::config::RetrainConfig;
use crate::error::RetrainError;
use crate::sample_store::{SampleStore, TrainingSample};
use crate::serving::ServingModel;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RetrainReport {
    pub model_name: String,
    pub performance: ModelPerformance,
    pub training_data_size: usize,
    pub baseline_size: usize,
    pub new_samples_used: usize,
    pub duration_seconds: f64,
    pub backup_path: Option<PathBuf>,
    /// Archive snapshot of the consumed samples. `None` if archival failed;
    /// the swap stands either way.
    pub archive_path: Option<PathBuf>,
}

/// Why a run was turned away before doing any work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrainRejection {
    QuotaExceeded { attempts_today: usize, max_daily: usize },
    NoNewData,
    BelowThreshold { reason: String },
}

impl RetrainRejection {
    pub fn message(&self) -> String {
        match self {
            Self::QuotaExceeded {
                attempts_today,
                max_daily,
            } => format!(
                "Daily retrain limit reached ({attempts_today}/{max_daily} attempts today)"
            ),
            Self::NoNewData => "No new training data available".to_string(),
            Self::BelowThreshold { reason } => {
                format!("Retraining not needed: {reason} (use force to override)")
            }
        }
    }
}

/// A run that started executing and then failed.
#[derive(Debug, Clone, Serialize)]
pub struct RetrainFailure {
    pub message: String,
    pub duration_seconds: f64,
    /// Whether the failure made it into the audit log.
    pub audited: bool,
}

/// Result of [`Retrainer::trigger`].
#[derive(Debug, Clone)]
pub enum RetrainOutcome {
    Completed(RetrainReport),
    Rejected(RetrainRejection),
    Failed(RetrainFailure),
}

impl RetrainOutcome {
    /// `success` or `error`, as reported to callers.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Completed(_) => "success",
            Self::Rejected(_) | Self::Failed(_) => "error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Completed(report) => format!(
                "Model retrained successfully in {:.2}s",
                report.duration_seconds
            ),
            Self::Rejected(rejection) => rejection.message(),
            Self::Failed(failure) => format!("Retraining failed: {}", failure.message),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ---------------------------------------------------------------------------
// Retrainer
// ---------------------------------------------------------------------------

/// Collaborators a run needs.
pub struct Retrainer {
    config: RetrainConfig,
    samples: Arc<SampleStore>,
    audit: Arc<AuditLog>,
    models: Arc<dyn ModelStore>,
    slot: ArtifactSlot,
    serving: Arc<ServingModel>,
    baseline: Arc<dyn BaselineSource>,
    trainer: Arc<dyn ModelTrainer>,
    run_lock: Mutex<()>,
}

struct Executed {
    performance: ModelPerformance,
    training_data_size: usize,
    baseline_size: usize,
    swap: SwapReceipt,
}

impl Retrainer {
    pub fn new(
        config: RetrainConfig,
        samples: Arc<SampleStore>,
        audit: Arc<AuditLog>,
        models: Arc<dyn ModelStore>,
        serving: Arc<ServingModel>,
        baseline: Arc<dyn BaselineSource>,
        trainer: Arc<dyn ModelTrainer>,
    ) -> Self {
        let slot = ArtifactSlot::new(&config.models_dir, &config.model_name);
        Self {
            config,
            samples,
            audit,
            models,
            slot,
            serving,
            baseline,
            trainer,
            run_lock: Mutex::new(()),
        }
    }

    pub fn slot(&self) -> &ArtifactSlot {
        &self.slot
    }

    /// Run one retrain. Blocking; call from a blocking-capable thread.
    ///
    /// With `force` the decision policy verdict is skipped. The quota and
    /// empty-store gates always apply.
    pub fn trigger(&self, reason: &str, force: bool) -> RetrainOutcome {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        tracing::info!(reason, force, "Retraining triggered");

        let attempts_today = match self.audit.count_today() {
            Ok(n) => n,
            Err(e) => return unaudited_failure(started, format!("audit log unreadable: {e}")),
        };
        if attempts_today >= self.config.max_daily_retrains {
            tracing::warn!(
                attempts_today,
                max_daily = self.config.max_daily_retrains,
                "Retraining rejected: daily quota exhausted"
            );
            return RetrainOutcome::Rejected(RetrainRejection::QuotaExceeded {
                attempts_today,
                max_daily: self.config.max_daily_retrains,
            });
        }

        let snapshot = match self.samples.snapshot() {
            Ok(rows) => rows,
            Err(e) => return unaudited_failure(started, format!("sample store unreadable: {e}")),
        };
        if snapshot.is_empty() {
            tracing::info!("Retraining rejected: no new samples");
            return RetrainOutcome::Rejected(RetrainRejection::NoNewData);
        }

        if !force {
            let verdict = decision::decide(snapshot.len(), self.config.min_new_samples);
            if !verdict.should_retrain {
                tracing::info!(reason = %verdict.reason, "Retraining rejected by policy");
                return RetrainOutcome::Rejected(RetrainRejection::BelowThreshold {
                    reason: verdict.reason,
                });
            }
        }

        match self.execute(&snapshot) {
            Ok(executed) => self.complete(reason, started, &snapshot, executed),
            Err(e) => {
                let duration_seconds = started.elapsed().as_secs_f64();
                let message = e.to_string();
                tracing::error!(error = %message, duration_seconds, "Retraining failed");
                let audited = match self.audit.record(RetrainAttempt::failed(
                    reason,
                    duration_seconds,
                    &message,
                )) {
                    Ok(()) => true,
                    Err(log_err) => {
                        tracing::error!(error = %log_err, "Failed to audit retraining failure");
                        false
                    }
                };
                RetrainOutcome::Failed(RetrainFailure {
                    message,
                    duration_seconds,
                    audited,
                })
            }
        }
    }

    /// Assemble, split, fit, evaluate, swap and hot-reload.
    fn execute(&self, snapshot: &[TrainingSample]) -> Result<Executed, RetrainError> {
        let baseline = self
            .baseline
            .load()
            .map_err(|e| RetrainError::Dataset(format!("baseline unavailable: {e}")))?;
        let baseline_size = baseline.len();

        let mut combined = Dataset::with_capacity(baseline_size + snapshot.len());
        combined.extend(&baseline);
        for sample in snapshot {
            combined.push(sample.features.to_row(), sample.target);
        }
        let training_data_size = combined.len();
        tracing::info!(
            baseline_size,
            new_samples = snapshot.len(),
            training_data_size,
            "Training dataset assembled"
        );

        let (train, test) = combined
            .train_test_split(self.config.test_fraction, self.config.split_seed)
            .map_err(|e| RetrainError::Dataset(e.to_string()))?;

        let model = self.trainer.fit(&train).map_err(RetrainError::Fit)?;
        let performance = evaluate(&model, &test)?;
        tracing::info!(
            rmse = performance.rmse,
            r2 = performance.r2_score,
            depth = model.depth(),
            "Retrained model evaluated"
        );

        let swap = self
            .slot
            .install(self.models.as_ref(), &model)
            .map_err(RetrainError::Artifact)?;
        self.serving.load(model);
        tracing::info!(model = self.slot.name(), "Serving model reloaded after retrain");

        Ok(Executed {
            performance,
            training_data_size,
            baseline_size,
            swap,
        })
    }

    fn complete(
        &self,
        reason: &str,
        started: Instant,
        snapshot: &[TrainingSample],
        executed: Executed,
    ) -> RetrainOutcome {
        let archive_path = match self.samples.archive_consumed(snapshot.len()) {
            Ok(archive) => archive.map(|a| a.path),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Archiving consumed samples failed; new model stays in service"
                );
                None
            }
        };

        let duration_seconds = started.elapsed().as_secs_f64();
        let performance = ModelPerformance {
            rmse: round_to(executed.performance.rmse, 2),
            r2_score: round_to(executed.performance.r2_score, 3),
        };

        if let Err(e) = self.audit.record(RetrainAttempt::succeeded(
            reason,
            &self.config.model_name,
            duration_seconds,
            performance,
            executed.training_data_size,
            snapshot.len(),
        )) {
            tracing::error!(error = %e, "Failed to audit completed retrain");
        }

        tracing::info!(
            duration_seconds,
            rmse = performance.rmse,
            r2 = performance.r2_score,
            "Retraining completed"
        );

        RetrainOutcome::Completed(RetrainReport {
            model_name: self.config.model_name.clone(),
            performance,
            training_data_size: executed.training_data_size,
            baseline_size: executed.baseline_size,
            new_samples_used: snapshot.len(),
            duration_seconds,
            backup_path: executed.swap.backup,
            archive_path,
        })
    }
}

fn evaluate(
    model: &DecisionTreeRegressor,
    test: &Dataset,
) -> Result<ModelPerformance, RetrainError> {
    let predictions = model.predict_many(test.rows());
    ModelPerformance::evaluate(&predictions, test.targets()).map_err(RetrainError::Evaluation)
}

fn unaudited_failure(started: Instant, message: String) -> RetrainOutcome {
    tracing::error!(error = %message, "Retraining aborted before execution");
    RetrainOutcome::Failed(RetrainFailure {
        message,
        duration_seconds: started.elapsed().as_secs_f64(),
        audited: false,
    })
}
