//! Regression model family served by the API and refitted by retraining.

pub mod tree;

pub use tree::{DecisionTreeRegressor, TreeParams};

use crate::dataset::Dataset;
use crate::error::CoreError;

/// Model family name. Doubles as the logical name of the serving slot.
pub const MODEL_FAMILY: &str = "DecisionTree";

/// Anything that can turn a training partition into a servable model.
///
/// Retraining goes through this seam so the fit step can be swapped (or made
/// to fail) without touching the orchestration around it.
pub trait ModelTrainer: Send + Sync {
    fn fit(&self, train: &Dataset) -> Result<DecisionTreeRegressor, CoreError>;
}

/// Fits a [`DecisionTreeRegressor`] with fixed parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTreeTrainer {
    pub params: TreeParams,
}

impl ModelTrainer for DecisionTreeTrainer {
    fn fit(&self, train: &Dataset) -> Result<DecisionTreeRegressor, CoreError> {
        DecisionTreeRegressor::fit(train, self.params)
    }
}
