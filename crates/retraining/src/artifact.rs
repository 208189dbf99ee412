//! Serving-model artifacts and the atomic swap that replaces them.
//!
//! An [`ArtifactSlot`] owns three kinds of file for one logical model name:
//!
//! | File | Role |
//! |------|------|
//! | `{name}.json` | serving artifact loaded by predictions |
//! | `{name}_retrained.json` | staging file for a freshly fitted model |
//! | `{name}_backup_<stamp>.json` | previous serving artifact, kept after a swap |
//!
//! Readers only ever see the old or the new serving artifact: the new model
//! is fully written to staging before the serving file is moved aside, and
//! each move is a same-directory rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use housing_core::regression::DecisionTreeRegressor;

use crate::error::StoreError;
use crate::sample_store::write_file_atomically;

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// File operations the swap needs. Implementations must make `rename`
/// atomic within a directory.
pub trait ModelStore: Send + Sync {
    fn save(&self, model: &DecisionTreeRegressor, path: &Path) -> Result<(), StoreError>;
    fn load(&self, path: &Path) -> Result<DecisionTreeRegressor, StoreError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StoreError>;
    fn exists(&self, path: &Path) -> bool;
    fn last_modified(&self, path: &Path) -> Result<SystemTime, StoreError>;
    fn remove(&self, path: &Path) -> Result<(), StoreError>;
}

/// JSON-on-disk [`ModelStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModelStore;

impl ModelStore for FsModelStore {
    fn save(&self, model: &DecisionTreeRegressor, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string(model).map_err(StoreError::json(path))?;
        write_file_atomically(path, &json)
    }

    fn load(&self, path: &Path) -> Result<DecisionTreeRegressor, StoreError> {
        let raw = fs::read_to_string(path).map_err(StoreError::io(path))?;
        serde_json::from_str(&raw).map_err(StoreError::json(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        fs::rename(from, to).map_err(StoreError::io(from))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn last_modified(&self, path: &Path) -> Result<SystemTime, StoreError> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(StoreError::io(path))
    }

    fn remove(&self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path).map_err(StoreError::io(path))
    }
}

// ---------------------------------------------------------------------------
// ArtifactSlot
// ---------------------------------------------------------------------------

/// Files touched by a completed swap.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub serving: PathBuf,
    /// Where the previous serving artifact now lives, if there was one.
    pub backup: Option<PathBuf>,
}

/// What [`ArtifactSlot::recover`] found at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing to do.
    Clean,
    /// A swap died after moving the serving file aside; staging was promoted.
    Promoted,
    /// A swap died before the serving file moved; the stale staging file was removed.
    Discarded,
}

/// Naming and swap logic for one logical model.
#[derive(Debug, Clone)]
pub struct ArtifactSlot {
    dir: PathBuf,
    name: String,
}

impl ArtifactSlot {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn serving_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    pub fn staging_path(&self) -> PathBuf {
        self.dir.join(format!("{}_retrained.json", self.name))
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let mut candidate = self.dir.join(format!("{}_backup_{stamp}.json", self.name));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = self
                .dir
                .join(format!("{}_backup_{stamp}_{suffix}.json", self.name));
            suffix += 1;
        }
        candidate
    }

    /// Backups currently on disk, oldest first by file name.
    pub fn backups(&self) -> Vec<PathBuf> {
        let prefix = format!("{}_backup_", self.name);
        let mut found: Vec<PathBuf> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".json"))
            })
            .collect();
        found.sort();
        found
    }

    /// Install `model` as the serving artifact.
    ///
    /// Sequence: write staging, move serving to a timestamped backup, move
    /// staging to serving. If the last move fails the backup is moved back.
    pub fn install(
        &self,
        store: &dyn ModelStore,
        model: &DecisionTreeRegressor,
    ) -> Result<SwapReceipt, StoreError> {
        fs::create_dir_all(&self.dir).map_err(StoreError::io(&self.dir))?;
        let serving = self.serving_path();
        let staging = self.staging_path();

        store.save(model, &staging)?;

        let backup = if store.exists(&serving) {
            let backup = self.backup_path();
            if let Err(e) = store.rename(&serving, &backup) {
                let _ = store.remove(&staging);
                return Err(e);
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = store.rename(&staging, &serving) {
            if let Some(backup) = &backup {
                if let Err(restore) = store.rename(backup, &serving) {
                    tracing::error!(
                        backup = %backup.display(),
                        error = %restore,
                        "Failed to restore serving artifact from backup"
                    );
                }
            }
            return Err(e);
        }

        tracing::info!(
            serving = %serving.display(),
            backup = ?backup.as_ref().map(|p| p.display().to_string()),
            "Serving artifact replaced"
        );
        Ok(SwapReceipt { serving, backup })
    }

    /// Repair the slot after a crash mid-swap.
    pub fn recover(&self, store: &dyn ModelStore) -> Result<Recovery, StoreError> {
        let serving = self.serving_path();
        let staging = self.staging_path();
        if !store.exists(&staging) {
            return Ok(Recovery::Clean);
        }
        if store.exists(&serving) {
            store.remove(&staging)?;
            tracing::warn!(staging = %staging.display(), "Discarded stale staging artifact");
            Ok(Recovery::Discarded)
        } else {
            store.rename(&staging, &serving)?;
            tracing::warn!(
                serving = %serving.display(),
                "Promoted staging artifact left by an interrupted swap"
            );
            Ok(Recovery::Promoted)
        }
    }

    /// Load the serving artifact, or `None` if there is none yet.
    pub fn load_serving(
        &self,
        store: &dyn ModelStore,
    ) -> Result<Option<DecisionTreeRegressor>, StoreError> {
        let serving = self.serving_path();
        if !store.exists(&serving) {
            return Ok(None);
        }
        store.load(&serving).map(Some)
    }

    /// Whole days since the serving artifact was last written.
    pub fn model_age_days(&self, store: &dyn ModelStore) -> Result<Option<u64>, StoreError> {
        let serving = self.serving_path();
        if !store.exists(&serving) {
            return Ok(None);
        }
        let modified = store.last_modified(&serving)?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default()
            .as_secs();
        Ok(Some(age / 86_400))
    }
}
