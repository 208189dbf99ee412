//! Bounded, ordered history of retraining attempts.
//!
//! The whole log is a single JSON array rewritten atomically on every
//! record. Oldest entries are evicted once the cap is exceeded. The daily
//! quota is derived from this log, so eviction can only lower the count for
//! a day when the cap is smaller than the attempts made that day.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{Local, NaiveDate};
use housing_core::evaluation::ModelPerformance;
use housing_core::types::LocalTimestamp;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::sample_store::write_file_atomically;

/// File name of the audit log inside the data directory.
pub const AUDIT_FILE_NAME: &str = "retrain_log.json";

/// `model_name` recorded for attempts that never produced a model.
pub const FAILED_MODEL_NAME: &str = "failed";

/// One retraining attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainAttempt {
    pub timestamp: LocalTimestamp,
    /// Local calendar date of `timestamp`, stored for quota lookups.
    pub date: NaiveDate,
    pub reason: String,
    pub model_name: String,
    pub success: bool,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_samples_used: Option<usize>,
}

impl RetrainAttempt {
    /// A completed run that produced and installed a model.
    pub fn succeeded(
        reason: impl Into<String>,
        model_name: impl Into<String>,
        duration_seconds: f64,
        performance: ModelPerformance,
        training_data_size: usize,
        new_samples_used: usize,
    ) -> Self {
        let timestamp = Local::now();
        Self {
            timestamp,
            date: timestamp.date_naive(),
            reason: reason.into(),
            model_name: model_name.into(),
            success: true,
            duration_seconds,
            rmse: Some(performance.rmse),
            r2_score: Some(performance.r2_score),
            error: None,
            training_data_size: Some(training_data_size),
            new_samples_used: Some(new_samples_used),
        }
    }

    /// A run that failed after it started executing.
    pub fn failed(
        reason: impl Into<String>,
        duration_seconds: f64,
        error: impl Into<String>,
    ) -> Self {
        let timestamp = Local::now();
        Self {
            timestamp,
            date: timestamp.date_naive(),
            reason: reason.into(),
            model_name: FAILED_MODEL_NAME.to_string(),
            success: false,
            duration_seconds,
            rmse: None,
            r2_score: None,
            error: Some(error.into()),
            training_data_size: None,
            new_samples_used: None,
        }
    }
}

/// JSON-file audit log with FIFO eviction.
pub struct AuditLog {
    path: PathBuf,
    cap: usize,
    lock: Mutex<()>,
}

impl AuditLog {
    /// Open the log at `path`, keeping at most `cap` entries (minimum 1).
    pub fn open(path: impl Into<PathBuf>, cap: usize) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }
        Ok(Self {
            path,
            cap: cap.max(1),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append `attempt`, evicting from the front past the cap.
    pub fn record(&self, attempt: RetrainAttempt) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read()?;
        entries.push(attempt);
        if entries.len() > self.cap {
            let excess = entries.len() - self.cap;
            entries.drain(..excess);
        }

        let json = serde_json::to_string_pretty(&entries).map_err(StoreError::json(&self.path))?;
        write_file_atomically(&self.path, &json)
    }

    /// Every retained entry, oldest first.
    pub fn all(&self) -> Result<Vec<RetrainAttempt>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<RetrainAttempt>, StoreError> {
        let mut entries = self.all()?;
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
        Ok(entries)
    }

    /// Attempts recorded on `date`, successful or not.
    pub fn count_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        Ok(self.all()?.iter().filter(|a| a.date == date).count())
    }

    /// Attempts recorded on today's local date.
    pub fn count_today(&self) -> Result<usize, StoreError> {
        self.count_on(Local::now().date_naive())
    }

    fn read(&self) -> Result<Vec<RetrainAttempt>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path)(e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(StoreError::json(&self.path))
    }
}
