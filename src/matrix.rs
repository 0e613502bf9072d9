//! The static experiment matrix
//!
//! Which (dataset, model, method, metric) tuples exist is fixed at compile
//! time: each dataset/model family pairs a method list with a metric list and
//! the matrix is their product. Enumeration supports filtering on any subset
//! of the four fields.

use crate::types::Task;

const REGRESSION_METRICS: &[&str] = &[
    "runtime",
    "local_accuracy",
    "consistency_guarantees",
    "mask_keep_positive",
    "mask_keep_negative",
    "keep_positive",
    "keep_negative",
    "batch_keep_absolute_r2",
    "mask_remove_positive",
    "mask_remove_negative",
    "remove_positive",
    "remove_negative",
    "batch_remove_absolute_r2",
];

const BINARY_CLASSIFICATION_METRICS: &[&str] = &[
    "runtime",
    "local_accuracy",
    "consistency_guarantees",
    "mask_keep_positive",
    "mask_keep_negative",
    "keep_positive",
    "keep_negative",
    "batch_keep_absolute_roc_auc",
    "mask_remove_positive",
    "mask_remove_negative",
    "remove_positive",
    "remove_negative",
    "batch_remove_absolute_roc_auc",
];

const LINEAR_METHODS: &[&str] = &[
    "linear_shap_corr",
    "linear_shap_ind",
    "coef",
    "random",
    "kernel_shap_1000_meanref",
    "sampling_shap_1000",
];

const TREE_METHODS: &[&str] = &[
    "tree_shap",
    "saabas",
    "random",
    "tree_gain",
    "kernel_shap_1000_meanref",
    "mean_abs_tree_shap",
    "sampling_shap_1000",
];

const DEEP_METHODS: &[&str] = &[
    "deep_shap",
    "expected_gradients",
    "random",
    "kernel_shap_1000_meanref",
    "sampling_shap_1000",
];

/// One block of the matrix: every method × metric combination for a fixed
/// (dataset, model) pair
struct MatrixBlock {
    dataset: &'static str,
    model: &'static str,
    methods: &'static [&'static str],
    metrics: &'static [&'static str],
}

const MATRIX: &[MatrixBlock] = &[
    // corrgroups60: regression
    MatrixBlock { dataset: "corrgroups60", model: "lasso", methods: LINEAR_METHODS, metrics: REGRESSION_METRICS },
    MatrixBlock { dataset: "corrgroups60", model: "ridge", methods: LINEAR_METHODS, metrics: REGRESSION_METRICS },
    MatrixBlock { dataset: "corrgroups60", model: "decision_tree", methods: TREE_METHODS, metrics: REGRESSION_METRICS },
    MatrixBlock { dataset: "corrgroups60", model: "random_forest", methods: TREE_METHODS, metrics: REGRESSION_METRICS },
    MatrixBlock { dataset: "corrgroups60", model: "gbm", methods: TREE_METHODS, metrics: REGRESSION_METRICS },
    MatrixBlock { dataset: "corrgroups60", model: "ffnn", methods: DEEP_METHODS, metrics: REGRESSION_METRICS },
    // cric: binary classification
    MatrixBlock { dataset: "cric", model: "lasso", methods: LINEAR_METHODS, metrics: BINARY_CLASSIFICATION_METRICS },
    MatrixBlock { dataset: "cric", model: "ridge", methods: LINEAR_METHODS, metrics: BINARY_CLASSIFICATION_METRICS },
    MatrixBlock { dataset: "cric", model: "decision_tree", methods: TREE_METHODS, metrics: BINARY_CLASSIFICATION_METRICS },
    MatrixBlock { dataset: "cric", model: "random_forest", methods: TREE_METHODS, metrics: BINARY_CLASSIFICATION_METRICS },
    MatrixBlock { dataset: "cric", model: "gbm", methods: TREE_METHODS, metrics: BINARY_CLASSIFICATION_METRICS },
];

/// Filter over the experiment matrix; `None` fields match everything
#[derive(Debug, Clone, Default)]
pub struct MatrixFilter {
    pub dataset: Option<String>,
    pub model: Option<String>,
    pub method: Option<String>,
    pub metric: Option<String>,
}

impl MatrixFilter {
    fn matches(&self, task: &Task) -> bool {
        fn ok(want: &Option<String>, got: &str) -> bool {
            want.as_deref().map_or(true, |w| w == got)
        }
        ok(&self.dataset, &task.dataset)
            && ok(&self.model, &task.model)
            && ok(&self.method, &task.method)
            && ok(&self.metric, &task.metric)
    }
}

/// Enumerate the matrix, in definition order, restricted by the filter
pub fn experiments(filter: &MatrixFilter) -> Vec<Task> {
    let mut tasks = Vec::new();
    for block in MATRIX {
        for metric in block.metrics {
            for method in block.methods {
                let task = Task::new(block.dataset, block.model, *method, *metric);
                if filter.matches(&task) {
                    tasks.push(task);
                }
            }
        }
    }
    tasks
}

/// Distinct dataset names appearing in the matrix
pub fn known_datasets() -> Vec<&'static str> {
    distinct(MATRIX.iter().map(|b| b.dataset))
}

/// Distinct model names appearing in the matrix
pub fn known_models() -> Vec<&'static str> {
    distinct(MATRIX.iter().map(|b| b.model))
}

/// Distinct method names appearing in the matrix
pub fn known_methods() -> Vec<&'static str> {
    distinct(MATRIX.iter().flat_map(|b| b.methods.iter().copied()))
}

/// Distinct metric names appearing in the matrix
pub fn known_metrics() -> Vec<&'static str> {
    distinct(MATRIX.iter().flat_map(|b| b.metrics.iter().copied()))
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
