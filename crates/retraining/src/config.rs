use std::path::PathBuf;

use housing_core::dataset::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION};
use housing_core::regression::MODEL_FAMILY;

use crate::audit::AUDIT_FILE_NAME;
use crate::sample_store::ACTIVE_FILE_NAME;

/// Retraining lifecycle configuration.
///
/// The split fraction and seed are fixed so every retrain over the same
/// data produces the same partition.
#[derive(Debug, Clone)]
pub struct RetrainConfig {
    /// Directory holding serving, staging and backup artifacts.
    pub models_dir: PathBuf,
    /// Directory holding the sample store, its archives and the audit log.
    pub data_dir: PathBuf,
    /// Baseline CSV merged with new samples on every retrain.
    pub baseline_path: PathBuf,
    /// Multiplier applied to the baseline target column.
    pub baseline_target_scale: f64,
    /// Logical name of the serving artifact.
    pub model_name: String,
    /// Active samples needed before the policy recommends a retrain.
    pub min_new_samples: usize,
    /// Attempts allowed per local calendar day.
    pub max_daily_retrains: usize,
    /// Audit log entries retained.
    pub retrain_log_cap: usize,
    /// Audit entries included in status reports.
    pub recent_retrains_shown: usize,
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl RetrainConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                    |
    /// |-------------------------|--------------------------------------------|
    /// | `MODELS_DIR`            | `./models`                                 |
    /// | `DATA_DIR`              | `./data`                                   |
    /// | `BASELINE_DATA_PATH`    | `./data/processed/california_housing.csv`  |
    /// | `BASELINE_TARGET_SCALE` | `100.0`                                    |
    /// | `MODEL_NAME`            | `DecisionTree`                             |
    /// | `MIN_NEW_SAMPLES`       | `50`                                       |
    /// | `MAX_DAILY_RETRAINS`    | `2`                                        |
    /// | `RETRAIN_LOG_CAP`       | `100`                                      |
    /// | `RECENT_RETRAINS_SHOWN` | `5`                                        |
    pub fn from_env() -> Self {
        let models_dir: PathBuf = std::env::var("MODELS_DIR")
            .unwrap_or_else(|_| "./models".into())
            .into();
        let data_dir: PathBuf = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "./data".into())
            .into();
        let baseline_path: PathBuf = std::env::var("BASELINE_DATA_PATH")
            .unwrap_or_else(|_| "./data/processed/california_housing.csv".into())
            .into();

        let baseline_target_scale: f64 = std::env::var("BASELINE_TARGET_SCALE")
            .unwrap_or_else(|_| "100.0".into())
            .parse()
            .expect("BASELINE_TARGET_SCALE must be a valid f64");

        let model_name = std::env::var("MODEL_NAME").unwrap_or_else(|_| MODEL_FAMILY.into());

        let min_new_samples: usize = std::env::var("MIN_NEW_SAMPLES")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("MIN_NEW_SAMPLES must be a valid usize");

        let max_daily_retrains: usize = std::env::var("MAX_DAILY_RETRAINS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("MAX_DAILY_RETRAINS must be a valid usize");

        let retrain_log_cap: usize = std::env::var("RETRAIN_LOG_CAP")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .expect("RETRAIN_LOG_CAP must be a valid usize");

        let recent_retrains_shown: usize = std::env::var("RECENT_RETRAINS_SHOWN")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("RECENT_RETRAINS_SHOWN must be a valid usize");

        Self {
            models_dir,
            data_dir,
            baseline_path,
            baseline_target_scale,
            model_name,
            min_new_samples,
            max_daily_retrains,
            retrain_log_cap,
            recent_retrains_shown,
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }

    /// Defaults rooted at explicit directories. The baseline path points at
    /// `data_dir/processed/california_housing.csv`.
    pub fn for_dirs(models_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            models_dir: models_dir.into(),
            baseline_path: data_dir.join("processed").join("california_housing.csv"),
            data_dir,
            baseline_target_scale: 100.0,
            model_name: MODEL_FAMILY.into(),
            min_new_samples: 50,
            max_daily_retrains: 2,
            retrain_log_cap: 100,
            recent_retrains_shown: 5,
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }

    pub fn sample_store_path(&self) -> PathBuf {
        self.data_dir.join(ACTIVE_FILE_NAME)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_FILE_NAME)
    }
}
