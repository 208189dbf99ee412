//! In-memory tabular dataset and the seeded train/test split.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::CoreError;
use crate::features::FeatureRow;

/// Default held-out fraction.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default shuffle seed. Identical input data always yields identical splits.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Feature rows with their aligned targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<FeatureRow>,
    targets: Vec<f64>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            targets: Vec::with_capacity(capacity),
        }
    }

    /// Build from parallel vectors, rejecting length mismatches.
    pub fn from_parts(rows: Vec<FeatureRow>, targets: Vec<f64>) -> Result<Self, CoreError> {
        if rows.len() != targets.len() {
            return Err(CoreError::Validation(format!(
                "Dataset has {} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        Ok(Self { rows, targets })
    }

    pub fn push(&mut self, row: FeatureRow, target: f64) {
        self.rows.push(row);
        self.targets.push(target);
    }

    /// Append every row of `other` after the rows already present.
    pub fn extend(&mut self, other: &Dataset) {
        self.rows.extend_from_slice(&other.rows);
        self.targets.extend_from_slice(&other.targets);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Shuffle with a fixed seed and carve off `ceil(len * test_fraction)`
    /// rows as the test partition.
    ///
    /// Both partitions must be non-empty, so at least two rows are required.
    pub fn train_test_split(
        &self,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(Dataset, Dataset), CoreError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(CoreError::Validation(format!(
                "test_fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        let n = self.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n < 2 || n_test == 0 || n_test >= n {
            return Err(CoreError::Validation(format!(
                "Cannot split {n} rows with test_fraction {test_fraction}"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);
        Ok((self.select(train_idx), self.select(test_idx)))
    }

    fn select(&self, indices: &[usize]) -> Dataset {
        let mut out = Dataset::with_capacity(indices.len());
        for &i in indices {
            out.push(self.rows[i], self.targets[i]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Dataset {
        let mut ds = Dataset::new();
        for i in 0..n {
            ds.push([i as f64; 8], i as f64);
        }
        ds
    }

    #[test]
    fn split_sizes_follow_ceiling_rule() {
        let (train, test) = numbered(11).train_test_split(0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn split_is_reproducible_for_same_seed() {
        let ds = numbered(50);
        let a = ds.train_test_split(0.2, 42).unwrap();
        let b = ds.train_test_split(0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn split_partitions_every_row_once() {
        let ds = numbered(30);
        let (train, test) = ds.train_test_split(0.2, 7).unwrap();
        let mut seen: Vec<f64> = train
            .targets()
            .iter()
            .chain(test.targets())
            .copied()
            .collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, ds.targets());
    }

    #[test]
    fn rows_stay_aligned_with_targets() {
        let (train, _) = numbered(20).train_test_split(0.25, 1).unwrap();
        for (row, target) in train.rows().iter().zip(train.targets()) {
            assert_eq!(row[0], *target);
        }
    }

    #[test]
    fn too_small_dataset_rejected() {
        assert!(numbered(1).train_test_split(0.2, 42).is_err());
        assert!(numbered(0).train_test_split(0.2, 42).is_err());
    }

    #[test]
    fn invalid_fraction_rejected() {
        assert!(numbered(10).train_test_split(0.0, 42).is_err());
        assert!(numbered(10).train_test_split(1.0, 42).is_err());
    }

    #[test]
    fn mismatched_parts_rejected() {
        assert!(Dataset::from_parts(vec![[0.0; 8]], vec![]).is_err());
    }

    #[test]
    fn extend_appends_in_order() {
        let mut a = numbered(2);
        a.extend(&numbered(3));
        assert_eq!(a.targets(), &[0.0, 1.0, 0.0, 1.0, 2.0]);
    }
}
