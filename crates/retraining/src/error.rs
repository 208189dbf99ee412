use std::io;
use std::path::{Path, PathBuf};

use housing_core::error::CoreError;

/// Failure of a persistence operation (sample store, audit log, artifacts).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record itself was rejected before anything was written.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt record in {} at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Serialization error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Adapter for `map_err` on `std::io` results.
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> StoreError {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    }

    pub fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> StoreError {
        let path = path.to_path_buf();
        move |source| StoreError::Json { path, source }
    }
}

/// Execution-class failure inside a retraining run.
///
/// Every variant is recorded as a failed audit attempt.
#[derive(Debug, thiserror::Error)]
pub enum RetrainError {
    #[error("dataset assembly failed: {0}")]
    Dataset(String),

    #[error("model fit failed: {0}")]
    Fit(CoreError),

    #[error("evaluation failed: {0}")]
    Evaluation(CoreError),

    #[error("artifact swap failed: {0}")]
    Artifact(StoreError),
}
