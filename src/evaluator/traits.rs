//! Traits for the domain computation behind a task
//!
//! A [`Catalog`] resolves dataset and model names to concrete objects; an
//! [`Evaluator`] produces a metric score from them. Both must be callable
//! from a fresh process given only the task identifiers, since the remote
//! path re-enters through the `run-one` entry point on another machine.

use std::sync::Arc;

use crate::error::Result;
use crate::types::ScoreValue;

/// An in-memory dataset: row-major features plus one label per row
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A trained (or trainable) model resolved from the catalog
pub trait Model: Send + Sync {
    /// Model identifier as registered in the catalog
    fn name(&self) -> &str;

    /// Fit on the dataset and return one prediction per row
    fn fit_predict(&self, data: &Dataset) -> Result<Vec<f64>>;
}

/// Resolves dataset and model names to concrete objects
pub trait Catalog: Send + Sync {
    /// Load the named dataset
    fn load_dataset(&self, name: &str) -> Result<Dataset>;

    /// Resolve the model trained for a (dataset, model) pair
    fn resolve_model(&self, dataset: &str, model: &str) -> Result<Arc<dyn Model>>;
}

/// Scores one attribution method on one model/dataset pair under one metric
pub trait Evaluator: Send + Sync {
    /// Compute the metric score. Implementations are expected to be pure:
    /// same inputs, same score, so cached results stay meaningful.
    fn evaluate(
        &self,
        metric: &str,
        data: &Dataset,
        model: Arc<dyn Model>,
        method: &str,
    ) -> Result<ScoreValue>;
}
