//! Synthetic evaluator and catalog
//!
//! Deterministic stand-ins for the real domain computation: the catalog
//! fabricates small fixed datasets and a linear model, and the evaluator
//! derives a stable pseudo-score from the task identifiers. Used as the
//! default wiring of the binary and throughout the test suite; the evaluator
//! counts invocations so cache-idempotence is directly observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::ScoreValue;

use super::{Catalog, Dataset, Evaluator, Model};

// ─────────────────────────────────────────────────────────────────
// Synthetic Catalog
// ─────────────────────────────────────────────────────────────────

/// Catalog producing small deterministic datasets and models
#[derive(Debug, Default)]
pub struct SyntheticCatalog;

impl SyntheticCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl Catalog for SyntheticCatalog {
    fn load_dataset(&self, name: &str) -> Result<Dataset> {
        // Rows are seeded from the dataset name so distinct datasets differ
        // but repeated loads are identical.
        let seed = fold_name(name);
        let rows = 16;
        let cols = 4;
        let mut features = Vec::with_capacity(rows);
        let mut labels = Vec::with_capacity(rows);
        for i in 0..rows {
            let row: Vec<f64> = (0..cols)
                .map(|j| splitmix(seed.wrapping_add((i * cols + j) as u64)) as f64 / u64::MAX as f64)
                .collect();
            labels.push(row.iter().sum::<f64>() / cols as f64);
            features.push(row);
        }
        Ok(Dataset { features, labels })
    }

    fn resolve_model(&self, dataset: &str, model: &str) -> Result<Arc<dyn Model>> {
        Ok(Arc::new(MeanModel {
            name: format!("{}__{}", dataset, model),
        }))
    }
}

/// Model that predicts the per-row feature mean
struct MeanModel {
    name: String,
}

impl Model for MeanModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit_predict(&self, data: &Dataset) -> Result<Vec<f64>> {
        Ok(data
            .features
            .iter()
            .map(|row| row.iter().sum::<f64>() / row.len().max(1) as f64)
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────
// Synthetic Evaluator
// ─────────────────────────────────────────────────────────────────

/// Evaluator returning a deterministic pseudo-score per
/// (metric, model, method) triple. Records every invocation.
#[derive(Debug, Default)]
pub struct SyntheticEvaluator {
    invocations: AtomicUsize,
    /// Method names that should fail when evaluated (for failure-path tests)
    failing_methods: RwLock<Vec<String>>,
}

impl SyntheticEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make evaluations of `method` fail
    pub fn fail_method(&self, method: impl Into<String>) {
        self.failing_methods.write().push(method.into());
    }

    /// Number of evaluate() calls so far
    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Evaluator for SyntheticEvaluator {
    fn evaluate(
        &self,
        metric: &str,
        data: &Dataset,
        model: Arc<dyn Model>,
        method: &str,
    ) -> Result<ScoreValue> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if self.failing_methods.read().iter().any(|m| m == method) {
            return Err(Error::EvaluationFailed {
                task: format!("{}/{}", model.name(), method),
                message: format!("scripted failure for method '{}'", method),
            });
        }

        let predictions = model.fit_predict(data)?;
        let base: f64 = predictions.iter().sum::<f64>() / predictions.len().max(1) as f64;
        let jiggle =
            splitmix(fold_name(metric) ^ fold_name(method)) as f64 / u64::MAX as f64;
        Ok(ScoreValue::Scalar(base * 0.5 + jiggle * 0.5))
    }
}

// ─────────────────────────────────────────────────────────────────
// Deterministic seeding helpers
// ─────────────────────────────────────────────────────────────────

fn fold_name(name: &str) -> u64 {
    name.bytes()
        .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3))
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
