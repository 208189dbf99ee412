use std::sync::{Arc, PoisonError, RwLock};

use housing_core::regression::DecisionTreeRegressor;

/// The in-memory model answering predictions.
///
/// Swapped as a whole `Arc`, so an in-flight prediction keeps using the
/// model it started with while a reload installs the next one.
pub struct ServingModel {
    name: String,
    current: RwLock<Option<Arc<DecisionTreeRegressor>>>,
}

impl ServingModel {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the current model.
    pub fn load(&self, model: DecisionTreeRegressor) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::new(model));
    }

    /// The current model, if any.
    pub fn get(&self) -> Option<Arc<DecisionTreeRegressor>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }
}
