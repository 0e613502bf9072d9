//! Identifier registry
//!
//! Dataset, model, method and metric names are validated against an explicit
//! registry before any dispatch begins, so an unknown or malformed name fails
//! fast instead of surfacing halfway through a batch on some remote host.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::matrix;
use crate::types::Task;

/// Known identifier sets, checked before dispatch
#[derive(Debug, Clone)]
pub struct MatrixRegistry {
    datasets: HashSet<String>,
    models: HashSet<String>,
    methods: HashSet<String>,
    metrics: HashSet<String>,
}

impl MatrixRegistry {
    /// Build the registry from the static experiment matrix
    pub fn from_matrix() -> Self {
        Self {
            datasets: matrix::known_datasets().iter().map(|s| s.to_string()).collect(),
            models: matrix::known_models().iter().map(|s| s.to_string()).collect(),
            methods: matrix::known_methods().iter().map(|s| s.to_string()).collect(),
            metrics: matrix::known_metrics().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Register an extra dataset name (for custom catalogs)
    pub fn register_dataset(&mut self, name: impl Into<String>) {
        self.datasets.insert(name.into());
    }

    /// Register an extra model name
    pub fn register_model(&mut self, name: impl Into<String>) {
        self.models.insert(name.into());
    }

    /// Register an extra method name
    pub fn register_method(&mut self, name: impl Into<String>) {
        self.methods.insert(name.into());
    }

    /// Register an extra metric name
    pub fn register_metric(&mut self, name: impl Into<String>) {
        self.metrics.insert(name.into());
    }

    /// Validate one task: identifiers are well-formed and all four names
    /// are registered
    pub fn validate_task(&self, task: &Task) -> Result<()> {
        task.validate()?;

        if !self.datasets.contains(&task.dataset) {
            return Err(Error::UnknownIdentifier {
                kind: "dataset",
                name: task.dataset.clone(),
            });
        }
        if !self.models.contains(&task.model) {
            return Err(Error::UnknownIdentifier {
                kind: "model",
                name: task.model.clone(),
            });
        }
        if !self.methods.contains(&task.method) {
            return Err(Error::UnknownIdentifier {
                kind: "method",
                name: task.method.clone(),
            });
        }
        if !self.metrics.contains(&task.metric) {
            return Err(Error::UnknownIdentifier {
                kind: "metric",
                name: task.metric.clone(),
            });
        }
        Ok(())
    }

    /// Validate a whole batch up front
    pub fn validate_all<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> Result<()> {
        for task in tasks {
            self.validate_task(task)?;
        }
        Ok(())
    }
}

impl Default for MatrixRegistry {
    fn default() -> Self {
        Self::from_matrix()
    }
}
