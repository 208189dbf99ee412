//! End-to-end tests for the retraining lifecycle against a temp directory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use housing_core::dataset::Dataset;
use housing_core::error::CoreError;
use housing_core::features::{FeatureMap, HousingFeatures};
use housing_core::regression::{DecisionTreeRegressor, ModelTrainer, TreeParams};
use housing_retraining::artifact::{ArtifactSlot, FsModelStore, ModelStore};
use housing_retraining::audit::AuditLog;
use housing_retraining::baseline::InMemoryBaseline;
use housing_retraining::executor::{RetrainOutcome, RetrainRejection};
use housing_retraining::sample_store::{
    CsvSampleLog, SampleArchive, SampleLog, SampleStore, SampleSubmission, TrainingSample,
};
use housing_retraining::{HousingService, RetrainConfig, StoreError};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn features(i: usize) -> HousingFeatures {
    HousingFeatures {
        med_inc: 1.0 + (i % 10) as f64 * 0.5,
        house_age: 10.0 + (i % 30) as f64,
        ave_rooms: 5.0,
        ave_bedrms: 1.0,
        population: 800.0 + (i % 7) as f64 * 100.0,
        ave_occup: 3.0,
        latitude: 34.0 + (i % 5) as f64 * 0.5,
        longitude: -118.0,
    }
}

fn price_for(i: usize) -> f64 {
    50.0 + (i % 10) as f64 * 40.0
}

fn baseline(rows: usize) -> Dataset {
    let mut ds = Dataset::new();
    for i in 0..rows {
        ds.push(features(i).to_row(), price_for(i));
    }
    ds
}

fn config(dir: &TempDir) -> RetrainConfig {
    RetrainConfig::for_dirs(dir.path().join("models"), dir.path().join("data"))
}

fn open(config: RetrainConfig) -> HousingService {
    HousingService::builder(config)
        .baseline(Arc::new(InMemoryBaseline(baseline(100))))
        .open()
        .unwrap()
}

fn submit(service: &HousingService, count: usize) {
    for i in 0..count {
        service
            .submit_sample(&features(i).to_map(), price_for(i) + 5.0)
            .unwrap();
    }
}

fn seed_model(value: f64) -> DecisionTreeRegressor {
    let mut ds = Dataset::new();
    ds.push([1.0; 8], value);
    DecisionTreeRegressor::fit(&ds, TreeParams::default()).unwrap()
}

fn slot(config: &RetrainConfig) -> ArtifactSlot {
    ArtifactSlot::new(&config.models_dir, &config.model_name)
}

fn audit(config: &RetrainConfig) -> AuditLog {
    AuditLog::open(config.audit_log_path(), config.retrain_log_cap).unwrap()
}

struct FailingTrainer;

impl ModelTrainer for FailingTrainer {
    fn fit(&self, _train: &Dataset) -> Result<DecisionTreeRegressor, CoreError> {
        Err(CoreError::Validation("injected fit failure".into()))
    }
}

/// Fails its first fit, then trains normally.
#[derive(Default)]
struct FailsOnceTrainer {
    failed: AtomicBool,
}

impl ModelTrainer for FailsOnceTrainer {
    fn fit(&self, train: &Dataset) -> Result<DecisionTreeRegressor, CoreError> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Validation("first fit fails".into()));
        }
        DecisionTreeRegressor::fit(train, TreeParams::default())
    }
}

/// CSV log whose archive step always fails.
struct UnarchivableLog(CsvSampleLog);

impl SampleLog for UnarchivableLog {
    fn append(&self, sample: &TrainingSample) -> Result<usize, StoreError> {
        self.0.append(sample)
    }

    fn read_all(&self) -> Result<Vec<TrainingSample>, StoreError> {
        self.0.read_all()
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.0.len()
    }

    fn archive_leading(&self, _count: usize) -> Result<Option<SampleArchive>, StoreError> {
        Err(StoreError::Io {
            path: self.0.path().to_path_buf(),
            source: std::io::Error::other("archive volume full"),
        })
    }
}

// ---------------------------------------------------------------------------
// Test: threshold reached, retrain succeeds, store is archived
// ---------------------------------------------------------------------------

#[tokio::test]
async fn threshold_scenario_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = open(config.clone());

    submit(&service, 50);
    let status = service.status();
    assert_eq!(status.new_data_samples, 50);
    assert!(status.should_retrain);
    assert!(status.retrain_reason.contains("50 >= 50"), "{}", status.retrain_reason);

    let outcome = service.trigger("threshold", false).await;
    assert_eq!(outcome.status(), "success");
    let report = assert_matches!(outcome, RetrainOutcome::Completed(report) => report);
    assert_eq!(report.new_samples_used, 50);
    assert_eq!(report.baseline_size, 100);
    assert_eq!(report.training_data_size, 150);
    assert!(report.archive_path.is_some());

    let status = service.status();
    assert_eq!(status.new_data_samples, 0);
    assert_eq!(status.daily_retrain_attempts, 1);
    assert_eq!(status.model_age_days, Some(0));

    let entries = audit(&config).all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
    assert_eq!(entries[0].reason, "threshold");
    assert!(entries[0].rmse.unwrap() >= 0.0);
    assert!(entries[0].r2_score.unwrap() <= 1.0);
    assert_eq!(entries[0].new_samples_used, Some(50));
}

// ---------------------------------------------------------------------------
// Test: a completed retrain hot-reloads the serving model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_retrain_makes_predictions_available() {
    let dir = TempDir::new().unwrap();
    let service = open(config(&dir));

    assert!(!service.model_loaded());
    assert_matches!(service.predict(&features(3)), Err(CoreError::Unavailable(_)));

    submit(&service, 5);
    assert!(service.trigger("manual", true).await.is_completed());

    assert!(service.model_loaded());
    let prediction = service.predict(&features(3)).unwrap();
    assert!(prediction.predicted_price > 0.0);
    assert!((0.0..=1.0).contains(&prediction.confidence_score));
    assert!(prediction.prediction_range.min <= prediction.predicted_price);
}

// ---------------------------------------------------------------------------
// Test: quota caps executed attempts per day
// ---------------------------------------------------------------------------

#[tokio::test]
async fn third_retrain_same_day_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = open(config.clone());

    for _ in 0..2 {
        submit(&service, 5);
        assert!(service.trigger("manual", true).await.is_completed());
    }

    submit(&service, 5);
    let outcome = service.trigger("manual", true).await;
    assert_matches!(
        outcome,
        RetrainOutcome::Rejected(RetrainRejection::QuotaExceeded {
            attempts_today: 2,
            max_daily: 2
        })
    );
    assert_eq!(audit(&config).all().unwrap().len(), 2);
    assert_eq!(service.status().new_data_samples, 5);
}

// ---------------------------------------------------------------------------
// Test: empty store short-circuits without touching artifacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_store_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    slot.install(&FsModelStore, &seed_model(7.0)).unwrap();
    let service = open(config.clone());

    let outcome = service.trigger("manual", true).await;
    assert_matches!(outcome, RetrainOutcome::Rejected(RetrainRejection::NoNewData));

    assert!(slot.backups().is_empty());
    assert_eq!(
        FsModelStore.load(&slot.serving_path()).unwrap(),
        seed_model(7.0)
    );
    assert!(audit(&config).all().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: below threshold without force is rejected, force overrides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn policy_gate_applies_unless_forced() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = open(config.clone());
    submit(&service, 3);

    let outcome = service.trigger("manual", false).await;
    let reason = assert_matches!(
        outcome,
        RetrainOutcome::Rejected(RetrainRejection::BelowThreshold { reason }) => reason
    );
    assert!(reason.starts_with("insufficient new samples"));
    assert!(audit(&config).all().unwrap().is_empty());

    assert!(service.trigger("manual", true).await.is_completed());
}

// ---------------------------------------------------------------------------
// Test: a failing fit leaves the serving artifact and samples intact
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_fit_keeps_serving_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    slot.install(&FsModelStore, &seed_model(7.0)).unwrap();

    let service = HousingService::builder(config.clone())
        .baseline(Arc::new(InMemoryBaseline(baseline(20))))
        .trainer(Arc::new(FailingTrainer))
        .open()
        .unwrap();
    submit(&service, 10);

    let outcome = service.trigger("manual", true).await;
    let failure = assert_matches!(outcome, RetrainOutcome::Failed(failure) => failure);
    assert!(failure.audited);
    assert!(failure.message.contains("injected fit failure"));

    assert_eq!(
        FsModelStore.load(&slot.serving_path()).unwrap(),
        seed_model(7.0)
    );
    assert!(slot.backups().is_empty());
    assert!(!slot.staging_path().exists());
    assert_eq!(service.status().new_data_samples, 10);

    let entries = audit(&config).all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].success);
    assert_eq!(entries[0].model_name, "failed");
    assert!(entries[0].rmse.is_none());
}

// ---------------------------------------------------------------------------
// Test: archive failure after a swap keeps the new model and the samples
// ---------------------------------------------------------------------------

#[tokio::test]
async fn archive_failure_does_not_undo_swap() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    slot.install(&FsModelStore, &seed_model(7.0)).unwrap();

    let log = CsvSampleLog::open(config.sample_store_path()).unwrap();
    let service = HousingService::builder(config.clone())
        .baseline(Arc::new(InMemoryBaseline(baseline(100))))
        .sample_store(SampleStore::new(UnarchivableLog(log)))
        .open()
        .unwrap();
    submit(&service, 8);

    let report = assert_matches!(
        service.trigger("manual", true).await,
        RetrainOutcome::Completed(report) => report
    );
    assert!(report.archive_path.is_none());
    assert!(report.backup_path.is_some());

    let installed = FsModelStore.load(&slot.serving_path()).unwrap();
    assert_ne!(installed, seed_model(7.0));
    assert_eq!(*service.current_model().unwrap(), installed);
    assert_eq!(service.status().new_data_samples, 8);

    let entries = audit(&config).all().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].success);
}

// ---------------------------------------------------------------------------
// Test: an audited failure counts against the daily quota
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_attempt_consumes_quota_slot() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let service = HousingService::builder(config.clone())
        .baseline(Arc::new(InMemoryBaseline(baseline(100))))
        .trainer(Arc::new(FailsOnceTrainer::default()))
        .open()
        .unwrap();
    submit(&service, 5);

    let failure = assert_matches!(
        service.trigger("manual", true).await,
        RetrainOutcome::Failed(failure) => failure
    );
    assert!(failure.audited);
    assert!(service.trigger("manual", true).await.is_completed());

    submit(&service, 5);
    assert_matches!(
        service.trigger("manual", true).await,
        RetrainOutcome::Rejected(RetrainRejection::QuotaExceeded {
            attempts_today: 2,
            max_daily: 2
        })
    );
    let entries = audit(&config).all().unwrap();
    assert_eq!(entries.iter().filter(|e| e.success).count(), 1);
    assert_eq!(entries.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: the served model matches the serving artifact after racing runs
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn served_model_tracks_latest_artifact_under_concurrency() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    let service = Arc::new(open(config));
    submit(&service, 5);

    let first = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.trigger("a", true).await })
    };
    let second = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for i in 100..110 {
                service
                    .submit_sample(&features(i).to_map(), price_for(i) * 2.0)
                    .unwrap();
            }
            service.trigger("b", true).await
        })
    };
    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    assert!(outcomes.iter().any(RetrainOutcome::is_completed));

    let on_disk = FsModelStore.load(&slot.serving_path()).unwrap();
    assert_eq!(*service.current_model().unwrap(), on_disk);
}

// ---------------------------------------------------------------------------
// Test: retrain replaces the serving artifact and keeps a backup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrain_backs_up_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    slot.install(&FsModelStore, &seed_model(7.0)).unwrap();
    let service = open(config);

    submit(&service, 5);
    let report = assert_matches!(
        service.trigger("manual", true).await,
        RetrainOutcome::Completed(report) => report
    );

    let backup = report.backup_path.expect("backup of the seeded model");
    assert_eq!(FsModelStore.load(&backup).unwrap(), seed_model(7.0));
    assert_ne!(
        FsModelStore.load(&slot.serving_path()).unwrap(),
        seed_model(7.0)
    );
}

// ---------------------------------------------------------------------------
// Test: concurrent triggers are serialised
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_triggers_run_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    let service = open(config(&dir));
    submit(&service, 5);

    let (a, b) = tokio::join!(service.trigger("a", true), service.trigger("b", true));
    let completed = [&a, &b].iter().filter(|o| o.is_completed()).count();
    let no_data = [&a, &b]
        .iter()
        .filter(|o| matches!(o, RetrainOutcome::Rejected(RetrainRejection::NoNewData)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(no_data, 1);
}

// ---------------------------------------------------------------------------
// Test: identical inputs produce identical metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retraining_is_reproducible() {
    let mut rmses = Vec::new();
    for _ in 0..2 {
        let dir = TempDir::new().unwrap();
        let service = open(config(&dir));
        submit(&service, 20);
        let report = assert_matches!(
            service.trigger("manual", true).await,
            RetrainOutcome::Completed(report) => report
        );
        rmses.push(report.performance);
    }
    assert_eq!(rmses[0], rmses[1]);
}

// ---------------------------------------------------------------------------
// Test: submission validation
// ---------------------------------------------------------------------------

#[test]
fn batch_submission_reports_failures_by_index() {
    let dir = TempDir::new().unwrap();
    let service = open(config(&dir));

    let mut batch: Vec<SampleSubmission> = (0..5)
        .map(|i| SampleSubmission {
            features: features(i).to_map(),
            target: price_for(i),
        })
        .collect();
    batch[2].features.remove("AveOccup");

    let receipt = service.submit_batch(&batch);
    assert_eq!(receipt.status, "partial_success");
    assert_eq!(receipt.samples_added, 4);
    assert_eq!(receipt.failed_samples, 1);
    assert_eq!(receipt.failures[0].index, 2);
    assert_eq!(receipt.total_samples, 4);
    assert!(!receipt.should_retrain);
}

#[test]
fn out_of_range_sample_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = open(config(&dir));

    let mut map: FeatureMap = features(0).to_map();
    map.insert("AveBedrms".into(), 9.0);
    assert!(service.submit_sample(&map, 100.0).is_err());
    assert_eq!(service.status().new_data_samples, 0);
}

#[test]
fn startup_promotes_orphaned_staging_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let slot = slot(&config);
    std::fs::create_dir_all(&config.models_dir).unwrap();
    FsModelStore
        .save(&seed_model(4.0), &slot.staging_path())
        .unwrap();

    let service = open(config);
    assert!(service.model_loaded());
    assert!(slot.serving_path().exists());
    assert!(!slot.staging_path().exists());
}
