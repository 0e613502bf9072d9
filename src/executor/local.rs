//! Local experiment execution
//!
//! One task runs as cache-check-then-evaluate; a batch fans out over a
//! bounded number of blocking workers. Results come back in input order
//! regardless of completion order. Unlike the remote path, a local failure
//! aborts the whole batch: local tasks are trusted pure computation, so an
//! error means a bug rather than flaky infrastructure.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::info;

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::evaluator::{Catalog, Evaluator, MatrixRegistry};
use crate::matrix::{self, MatrixFilter};
use crate::types::{CachedResult, Task};

// ─────────────────────────────────────────────────────────────────
// Experiment Context
// ─────────────────────────────────────────────────────────────────

/// Everything one experiment needs: the cache, the domain seams, the
/// registry and the engine version for key derivation. Shared by handle
/// across workers.
pub struct ExperimentContext {
    pub cache: CacheStore,
    pub catalog: Arc<dyn Catalog>,
    pub evaluator: Arc<dyn Evaluator>,
    pub registry: MatrixRegistry,
    pub engine_version: String,
    pub use_cache: bool,
}

impl ExperimentContext {
    /// Cache key for a task under this context's engine version
    pub fn cache_key(&self, task: &Task) -> String {
        task.cache_key(&self.engine_version)
    }
}

// ─────────────────────────────────────────────────────────────────
// Single Experiment
// ─────────────────────────────────────────────────────────────────

/// Run one experiment: consult the cache, evaluate on a miss, persist the
/// fresh result. Exactly one cache file exists per key afterwards.
pub fn run_experiment(ctx: &ExperimentContext, task: &Task) -> Result<CachedResult> {
    ctx.registry.validate_task(task)?;
    let key = ctx.cache_key(task);

    if ctx.use_cache {
        if let Some(cached) = ctx.cache.get(&key)? {
            return Ok(cached);
        }
    }

    info!(task = %task, key = %key, "computing experiment");
    let started = Instant::now();

    let data = ctx.catalog.load_dataset(&task.dataset)?;
    let model = ctx.catalog.resolve_model(&task.dataset, &task.model)?;
    let score = ctx
        .evaluator
        .evaluate(&task.metric, &data, model, &task.method)
        .map_err(|e| match e {
            e @ Error::EvaluationFailed { .. } => e,
            other => Error::EvaluationFailed {
                task: task.to_string(),
                message: other.to_string(),
            },
        })?;

    let result = CachedResult::new(score, &ctx.engine_version);
    ctx.cache.put(&key, &result)?;

    info!(
        task = %task,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "experiment finished"
    );
    Ok(result)
}

// ─────────────────────────────────────────────────────────────────
// Local Executor
// ─────────────────────────────────────────────────────────────────

/// Runs a task list across a fixed number of local workers
pub struct LocalExecutor {
    ctx: Arc<ExperimentContext>,
    workers: usize,
}

impl LocalExecutor {
    /// Create an executor; `workers == 1` means strictly sequential
    pub fn new(ctx: Arc<ExperimentContext>, workers: usize) -> Self {
        Self {
            ctx,
            workers: workers.max(1),
        }
    }

    /// Run every task exactly once, returning `(task, result)` pairs in
    /// input order. The first failure aborts the batch.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<Vec<(Task, CachedResult)>> {
        self.ctx.registry.validate_all(&tasks)?;

        if self.workers == 1 {
            // Baseline/debug mode: no concurrency at all.
            let mut out = Vec::with_capacity(tasks.len());
            for task in tasks {
                let result = run_experiment(&self.ctx, &task)?;
                out.push((task, result));
            }
            return Ok(out);
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let ctx = self.ctx.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(format!("worker pool closed: {}", e)))?;
                let result = tokio::task::spawn_blocking(move || {
                    run_experiment(&ctx, &task).map(|r| (task, r))
                })
                .await
                .map_err(|e| Error::Internal(format!("worker panicked: {}", e)))??;
                Ok::<_, Error>(result)
            }));
        }

        // Awaiting in spawn order preserves input order in the output.
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let pair = handle
                .await
                .map_err(|e| Error::Internal(format!("worker join failed: {}", e)))??;
            out.push(pair);
        }
        Ok(out)
    }
}

/// Run the filtered experiment matrix locally with `workers` workers
pub async fn run_experiments(
    ctx: Arc<ExperimentContext>,
    filter: &MatrixFilter,
    workers: usize,
) -> Result<Vec<(Task, CachedResult)>> {
    let tasks = matrix::experiments(filter);
    LocalExecutor::new(ctx, workers).run(tasks).await
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{SyntheticCatalog, SyntheticEvaluator};
    use crate::version::ENGINE_VERSION;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> (Arc<ExperimentContext>, Arc<SyntheticEvaluator>) {
        let evaluator = Arc::new(SyntheticEvaluator::new());
        let ctx = Arc::new(ExperimentContext {
            cache: CacheStore::open(dir.path()).unwrap(),
            catalog: Arc::new(SyntheticCatalog::new()),
            evaluator: evaluator.clone(),
            registry: MatrixRegistry::from_matrix(),
            engine_version: ENGINE_VERSION.to_string(),
            use_cache: true,
        });
        (ctx, evaluator)
    }

    fn sample_task() -> Task {
        Task::new("corrgroups60", "lasso", "tree_shap", "runtime")
    }

    #[test]
    fn test_fresh_run_writes_exactly_one_file() {
        let dir = TempDir::new().unwrap();
        let (ctx, evaluator) = context(&dir);

        let task = Task::new("corrgroups60", "lasso", "coef", "runtime");
        run_experiment(&ctx, &task).unwrap();

        assert_eq!(evaluator.invocation_count(), 1);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(
            entries,
            vec![format!(
                "v{}__corrgroups60__lasso__coef__runtime.json",
                ENGINE_VERSION
            )]
        );
    }

    #[test]
    fn test_cache_idempotence() {
        let dir = TempDir::new().unwrap();
        let (ctx, evaluator) = context(&dir);
        let task = sample_task();

        let first = run_experiment(&ctx, &task).unwrap();
        let second = run_experiment(&ctx, &task).unwrap();

        assert_eq!(first.score, second.score);
        // The second call must come from the cache.
        assert_eq!(evaluator.invocation_count(), 1);
    }

    #[test]
    fn test_use_cache_false_recomputes() {
        let dir = TempDir::new().unwrap();
        let evaluator = Arc::new(SyntheticEvaluator::new());
        let ctx = ExperimentContext {
            cache: CacheStore::open(dir.path()).unwrap(),
            catalog: Arc::new(SyntheticCatalog::new()),
            evaluator: evaluator.clone(),
            registry: MatrixRegistry::from_matrix(),
            engine_version: ENGINE_VERSION.to_string(),
            use_cache: false,
        };

        let task = sample_task();
        run_experiment(&ctx, &task).unwrap();
        run_experiment(&ctx, &task).unwrap();
        assert_eq!(evaluator.invocation_count(), 2);
    }

    #[test]
    fn test_unknown_task_fails_fast() {
        let dir = TempDir::new().unwrap();
        let (ctx, evaluator) = context(&dir);
        let task = Task::new("no_such_dataset", "lasso", "coef", "runtime");
        assert!(run_experiment(&ctx, &task).is_err());
        assert_eq!(evaluator.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(&dir);

        let tasks: Vec<Task> = ["coef", "random", "sampling_shap_1000"]
            .iter()
            .map(|m| Task::new("corrgroups60", "lasso", *m, "runtime"))
            .collect();

        let results = LocalExecutor::new(ctx, 3).run(tasks.clone()).await.unwrap();
        let returned: Vec<Task> = results.into_iter().map(|(t, _)| t).collect();
        assert_eq!(returned, tasks);
    }

    #[tokio::test]
    async fn test_sequential_matches_parallel() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let (ctx_a, _) = context(&dir_a);
        let (ctx_b, _) = context(&dir_b);

        let tasks: Vec<Task> = ["coef", "random"]
            .iter()
            .map(|m| Task::new("cric", "ridge", *m, "local_accuracy"))
            .collect();

        let seq = LocalExecutor::new(ctx_a, 1).run(tasks.clone()).await.unwrap();
        let par = LocalExecutor::new(ctx_b, 4).run(tasks).await.unwrap();
        for ((ta, ra), (tb, rb)) in seq.iter().zip(par.iter()) {
            assert_eq!(ta, tb);
            assert_eq!(ra.score, rb.score);
        }
    }

    #[tokio::test]
    async fn test_local_failure_aborts_batch() {
        let dir = TempDir::new().unwrap();
        let (ctx, evaluator) = context(&dir);
        evaluator.fail_method("random");

        let tasks: Vec<Task> = ["coef", "random", "sampling_shap_1000"]
            .iter()
            .map(|m| Task::new("corrgroups60", "lasso", *m, "runtime"))
            .collect();

        let err = LocalExecutor::new(ctx, 1).run(tasks).await.unwrap_err();
        assert!(matches!(err, Error::EvaluationFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_experiments_filtered() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(&dir);
        let filter = MatrixFilter {
            dataset: Some("corrgroups60".to_string()),
            model: Some("lasso".to_string()),
            metric: Some("runtime".to_string()),
            ..Default::default()
        };
        let results = run_experiments(ctx, &filter, 2).await.unwrap();
        // One result per linear method.
        assert_eq!(results.len(), 6);
    }
}
