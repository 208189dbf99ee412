//! The reference dataset every retrain starts from.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use housing_core::dataset::Dataset;
use housing_core::features::{FEATURE_COUNT, FEATURE_NAMES, TARGET_COLUMN};

use crate::error::StoreError;

/// Column name used for the target in the published California housing CSV.
pub const PUBLISHED_TARGET_COLUMN: &str = "MedHouseVal";

/// Source of the baseline dataset.
pub trait BaselineSource: Send + Sync {
    fn load(&self) -> Result<Dataset, StoreError>;
}

/// Baseline read from a CSV with a header row.
///
/// Columns are located by name, so extra columns and any column order are
/// accepted. The target is `MedHouseVal` or `target` and is multiplied by
/// `target_scale`, which puts the published dataset (hundreds of thousands
/// of dollars) in the same unit as submitted samples (thousands).
#[derive(Debug, Clone)]
pub struct CsvBaseline {
    pub path: PathBuf,
    pub target_scale: f64,
}

impl CsvBaseline {
    pub fn new(path: impl Into<PathBuf>, target_scale: f64) -> Self {
        Self {
            path: path.into(),
            target_scale,
        }
    }
}

impl BaselineSource for CsvBaseline {
    fn load(&self) -> Result<Dataset, StoreError> {
        let path = &self.path;
        let corrupt = |line: usize, reason: String| StoreError::Corrupt {
            path: path.clone(),
            line,
            reason,
        };

        let file = File::open(path).map_err(StoreError::io(path))?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line.map_err(StoreError::io(path))?,
            None => return Err(corrupt(1, "empty file".into())),
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let position = |name: &str| columns.iter().position(|c| *c == name);

        let mut feature_idx = [0usize; FEATURE_COUNT];
        for (slot, name) in feature_idx.iter_mut().zip(FEATURE_NAMES) {
            *slot = position(name).ok_or_else(|| corrupt(1, format!("missing column {name}")))?;
        }
        let target_idx = position(PUBLISHED_TARGET_COLUMN)
            .or_else(|| position(TARGET_COLUMN))
            .ok_or_else(|| {
                corrupt(
                    1,
                    format!("missing target column ({PUBLISHED_TARGET_COLUMN} or {TARGET_COLUMN})"),
                )
            })?;

        let mut data = Dataset::new();
        for (idx, line) in lines.enumerate() {
            let line = line.map_err(StoreError::io(path))?;
            let line_no = idx + 2;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let field = |i: usize| -> Result<f64, StoreError> {
                let raw = fields
                    .get(i)
                    .ok_or_else(|| corrupt(line_no, format!("missing column {i}")))?;
                raw.trim()
                    .parse()
                    .map_err(|_| corrupt(line_no, format!("not a number: '{raw}'")))
            };

            let mut row = [0.0; FEATURE_COUNT];
            for (value, &i) in row.iter_mut().zip(&feature_idx) {
                *value = field(i)?;
            }
            data.push(row, field(target_idx)? * self.target_scale);
        }

        tracing::debug!(path = %path.display(), rows = data.len(), "Baseline dataset loaded");
        Ok(data)
    }
}

/// Fixed in-memory baseline.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBaseline(pub Dataset);

impl BaselineSource for InMemoryBaseline {
    fn load(&self) -> Result<Dataset, StoreError> {
        Ok(self.0.clone())
    }
}
