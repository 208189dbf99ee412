//! Append-only store of newly submitted ground-truth samples.
//!
//! [`SampleLog`] is the storage seam (append / read_all / archive);
//! [`CsvSampleLog`] backs it with a flat CSV file whose header is the eight
//! feature columns plus `target,timestamp`. [`SampleStore`] layers the
//! per-record checks and batch semantics on top.
//!
//! Archival is snapshot-then-clear: a retraining run reads the active rows,
//! and after a successful swap archives exactly that many leading rows.
//! Rows appended while the run was in flight stay active for the next one.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use housing_core::error::CoreError;
use housing_core::features::{
    FeatureMap, HousingFeatures, FEATURE_COUNT, FEATURE_NAMES, TARGET_COLUMN,
};
use housing_core::types::LocalTimestamp;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// File name of the active sample store inside the data directory.
pub const ACTIVE_FILE_NAME: &str = "new_training_data.csv";

/// Prefix of archive snapshots written next to the active file.
pub const ARCHIVE_PREFIX: &str = "archived_training_data_";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One submitted ground-truth record. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: HousingFeatures,
    pub target: f64,
    pub submitted_at: LocalTimestamp,
}

/// A sample as it arrives from a caller, before schema checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSubmission {
    pub features: FeatureMap,
    pub target: f64,
}

/// A batch element that was not stored, with its position and cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSample {
    pub index: usize,
    pub error: String,
}

/// Outcome of [`SampleStore::append_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchAppendReport {
    pub added: usize,
    pub failed: Vec<FailedSample>,
    /// Active store size after the batch.
    pub total: usize,
}

/// A snapshot written by [`SampleLog::archive_leading`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleArchive {
    pub path: PathBuf,
    pub rows: usize,
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// Durable, ordered log of unconsumed samples.
pub trait SampleLog: Send + Sync {
    /// Persist one sample and return the new active size.
    fn append(&self, sample: &TrainingSample) -> Result<usize, StoreError>;

    /// Every active sample in append order.
    fn read_all(&self) -> Result<Vec<TrainingSample>, StoreError>;

    /// Number of active samples.
    fn len(&self) -> Result<usize, StoreError>;

    /// Move the first `count` active samples into a new archive snapshot.
    ///
    /// Either the whole move happens or the active log is left untouched.
    /// Returns `None` when `count` is zero.
    fn archive_leading(&self, count: usize) -> Result<Option<SampleArchive>, StoreError>;
}

// ---------------------------------------------------------------------------
// CSV-backed log
// ---------------------------------------------------------------------------

/// [`SampleLog`] backed by a CSV file.
///
/// The mutex guards the cached row count and serialises every file access,
/// so an archive never interleaves with an append.
pub struct CsvSampleLog {
    path: PathBuf,
    archive_dir: PathBuf,
    count: Mutex<usize>,
}

impl CsvSampleLog {
    /// Open (creating if needed) the active file at `path`. Archives are
    /// written to the same directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let archive_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&archive_dir).map_err(StoreError::io(&archive_dir))?;
        drop_torn_tail(&path)?;

        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if needs_header {
            write_file_atomically(&path, &header_line())?;
        }

        let count = parse_file(&path)?.len();
        tracing::debug!(path = %path.display(), count, "Sample store opened");

        Ok(Self {
            path,
            archive_dir,
            count: Mutex::new(count),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn archive_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let mut candidate = self.archive_dir.join(format!("{ARCHIVE_PREFIX}{stamp}.csv"));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = self
                .archive_dir
                .join(format!("{ARCHIVE_PREFIX}{stamp}_{suffix}.csv"));
            suffix += 1;
        }
        candidate
    }
}

impl SampleLog for CsvSampleLog {
    fn append(&self, sample: &TrainingSample) -> Result<usize, StoreError> {
        let mut count = self.lock();
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(StoreError::io(&self.path))?;
        let prev_len = file.metadata().map_err(StoreError::io(&self.path))?.len();
        let written = file
            .write_all(format_row(sample).as_bytes())
            .and_then(|()| file.sync_data());
        if let Err(e) = written {
            // A half-written row would be glued to the next append.
            if let Err(rollback) = file.set_len(prev_len).and_then(|()| file.sync_data()) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial sample row"
                );
            }
            return Err(StoreError::io(&self.path)(e));
        }
        *count += 1;
        Ok(*count)
    }

    fn read_all(&self) -> Result<Vec<TrainingSample>, StoreError> {
        let _count = self.lock();
        parse_file(&self.path)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(*self.lock())
    }

    fn archive_leading(&self, count: usize) -> Result<Option<SampleArchive>, StoreError> {
        if count == 0 {
            return Ok(None);
        }
        let mut cached = self.lock();
        let rows = parse_file(&self.path)?;
        if count > rows.len() {
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                line: 0,
                reason: format!(
                    "asked to archive {count} rows but only {} are active",
                    rows.len()
                ),
            });
        }
        let (consumed, remaining) = rows.split_at(count);

        let archive = self.archive_path();
        write_file_atomically(&archive, &render(consumed))?;
        // The active file is only replaced once the archive is durable.
        write_file_atomically(&self.path, &render(remaining))?;
        *cached = remaining.len();

        tracing::info!(
            archive = %archive.display(),
            archived = consumed.len(),
            remaining = remaining.len(),
            "Archived consumed training samples"
        );
        Ok(Some(SampleArchive {
            path: archive,
            rows: consumed.len(),
        }))
    }
}

// ---------------------------------------------------------------------------
// CSV encoding
// ---------------------------------------------------------------------------

fn header_line() -> String {
    format!("{},{TARGET_COLUMN},timestamp\n", FEATURE_NAMES.join(","))
}

fn format_row(sample: &TrainingSample) -> String {
    let mut line = String::new();
    for value in sample.features.to_row() {
        line.push_str(&value.to_string());
        line.push(',');
    }
    line.push_str(&sample.target.to_string());
    line.push(',');
    line.push_str(&sample.submitted_at.to_rfc3339());
    line.push('\n');
    line
}

fn render(samples: &[TrainingSample]) -> String {
    let mut out = header_line();
    for sample in samples {
        out.push_str(&format_row(sample));
    }
    out
}

fn parse_file(path: &Path) -> Result<Vec<TrainingSample>, StoreError> {
    let file = File::open(path).map_err(StoreError::io(path))?;
    let mut samples = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(StoreError::io(path))?;
        let line_no = idx + 1;
        if line_no == 1 || line.trim().is_empty() {
            continue;
        }
        let sample = parse_row(&line).map_err(|reason| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

fn parse_row(line: &str) -> Result<TrainingSample, String> {
    let fields: Vec<&str> = line.trim_end().split(',').collect();
    if fields.len() != FEATURE_COUNT + 2 {
        return Err(format!(
            "expected {} columns, found {}",
            FEATURE_COUNT + 2,
            fields.len()
        ));
    }

    let mut values = [0.0; FEATURE_COUNT + 1];
    for (slot, raw) in values.iter_mut().zip(&fields) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| format!("not a number: '{raw}'"))?;
    }
    let submitted_at = DateTime::parse_from_rfc3339(fields[FEATURE_COUNT + 1].trim())
        .map_err(|e| format!("bad timestamp: {e}"))?
        .with_timezone(&Local);

    let mut row = [0.0; FEATURE_COUNT];
    row.copy_from_slice(&values[..FEATURE_COUNT]);
    Ok(TrainingSample {
        features: HousingFeatures::from_row(&row),
        target: values[FEATURE_COUNT],
        submitted_at,
    })
}

/// Truncate a trailing line that lacks its newline, i.e. a row cut off by a
/// crash mid-append. Every complete row before it is kept.
fn drop_torn_tail(path: &Path) -> Result<(), StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::io(path)(e)),
    };
    if bytes.last().map_or(true, |&b| b == b'\n') {
        return Ok(());
    }
    let keep = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "Dropping incomplete trailing sample row"
    );
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(StoreError::io(path))?;
    file.set_len(keep as u64)
        .and_then(|()| file.sync_all())
        .map_err(StoreError::io(path))
}

/// Write `contents` to a sibling temp file, fsync, then rename over `path`.
pub(crate) fn write_file_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).map_err(StoreError::io(&tmp))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(StoreError::io(&tmp))?;
    drop(file);
    fs::rename(&tmp, path).map_err(StoreError::io(path))
}

// ---------------------------------------------------------------------------
// SampleStore
// ---------------------------------------------------------------------------

/// Checked front door to a [`SampleLog`].
pub struct SampleStore {
    log: Box<dyn SampleLog>,
}

impl SampleStore {
    pub fn new(log: impl SampleLog + 'static) -> Self {
        Self { log: Box::new(log) }
    }

    /// Open the CSV-backed store at `path`.
    pub fn open_csv(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::new(CsvSampleLog::open(path)?))
    }

    /// Validate presence of all eight features, stamp, and append.
    ///
    /// Returns the updated active size.
    pub fn append(&self, features: &FeatureMap, target: f64) -> Result<usize, StoreError> {
        let features = HousingFeatures::from_map(features)?;
        self.append_features(features, target)
    }

    /// Append an already-typed record.
    pub fn append_features(
        &self,
        features: HousingFeatures,
        target: f64,
    ) -> Result<usize, StoreError> {
        if !target.is_finite() || features.to_row().iter().any(|v| !v.is_finite()) {
            return Err(CoreError::Validation("Sample values must be finite".into()).into());
        }
        self.log.append(&TrainingSample {
            features,
            target,
            submitted_at: Local::now(),
        })
    }

    /// Append each element independently; failures are collected, not raised.
    pub fn append_batch(&self, samples: &[SampleSubmission]) -> BatchAppendReport {
        self.append_batch_with(samples, |_| Ok(()))
    }

    /// [`append_batch`](Self::append_batch) with an extra per-record check
    /// run after the presence check.
    pub fn append_batch_with<F>(&self, samples: &[SampleSubmission], check: F) -> BatchAppendReport
    where
        F: Fn(&HousingFeatures) -> Result<(), CoreError>,
    {
        let mut added = 0;
        let mut failed = Vec::new();
        let mut last_total = None;

        for (index, sample) in samples.iter().enumerate() {
            let appended = HousingFeatures::from_map(&sample.features)
                .and_then(|features| check(&features).map(|()| features))
                .map_err(StoreError::from)
                .and_then(|features| self.append_features(features, sample.target));
            match appended {
                Ok(total) => {
                    added += 1;
                    last_total = Some(total);
                }
                Err(e) => failed.push(FailedSample {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        let total = self.size().ok().or(last_total).unwrap_or_default();
        BatchAppendReport {
            added,
            failed,
            total,
        }
    }

    pub fn size(&self) -> Result<usize, StoreError> {
        self.log.len()
    }

    /// Every active sample in append order.
    pub fn snapshot(&self) -> Result<Vec<TrainingSample>, StoreError> {
        self.log.read_all()
    }

    /// Archive the first `consumed` rows, i.e. those returned by an earlier
    /// [`snapshot`](Self::snapshot).
    pub fn archive_consumed(&self, consumed: usize) -> Result<Option<SampleArchive>, StoreError> {
        self.log.archive_leading(consumed)
    }

    /// Archive everything currently active and leave the store empty.
    pub fn archive_and_clear(&self) -> Result<Option<SampleArchive>, StoreError> {
        let count = self.size()?;
        self.log.archive_leading(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
