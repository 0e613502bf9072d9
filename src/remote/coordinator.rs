//! Batch coordination across the host fleet
//!
//! Owns the whole distributed run: pre-flight cleanup of stale workers on
//! every distinct host, shuffling of tasks and host slots, one persistent
//! worker per slot looping dequeue → admission → execute → acknowledge, and
//! the final drain wait. A batch finishes with per-task failures counted;
//! only unreachable hosts (pre-flight) and protocol violations end it with
//! an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::evaluator::MatrixRegistry;
use crate::remote::limiter::{RateLimiter, RateLimiterConfig};
use crate::remote::progress::{BatchProgress, ProgressSnapshot};
use crate::remote::queue::WorkQueue;
use crate::remote::runner::{RemoteRunner, RemoteRunnerConfig};
use crate::remote::shell::{RemoteCommand, RemoteShell};
use crate::types::{HostSlot, Task};

/// Pattern matched by the pre-flight `pkill` on each host
const STALE_WORKER_PATTERN: &str = "benchgrid run-one";

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Timeout for the pre-flight reachability/cleanup command per host
    pub preflight_timeout: Duration,
    /// Per-task runner settings
    pub runner: RemoteRunnerConfig,
    /// Per-host admission control settings
    pub limiter: RateLimiterConfig,
    /// Emit the overwritable status line
    pub show_status: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            preflight_timeout: Duration::from_secs(15),
            runner: RemoteRunnerConfig::default(),
            limiter: RateLimiterConfig::default(),
            show_status: true,
        }
    }
}

/// Final counters of a completed batch
#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
}

impl From<ProgressSnapshot> for BatchSummary {
    fn from(snap: ProgressSnapshot) -> Self {
        Self {
            total: snap.total,
            done: snap.done,
            failed: snap.failed,
        }
    }
}

/// Drives one distributed batch
pub struct BatchCoordinator {
    cache: CacheStore,
    shell: Arc<dyn RemoteShell>,
    config: BatchConfig,
    engine_version: String,
}

impl BatchCoordinator {
    pub fn new(
        cache: CacheStore,
        shell: Arc<dyn RemoteShell>,
        config: BatchConfig,
        engine_version: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            shell,
            config,
            engine_version: engine_version.into(),
        }
    }

    /// Run the batch to completion. Returns the final counters, or the
    /// first batch-fatal error once the queue has drained.
    pub async fn run(&self, tasks: Vec<Task>, hostslots: Vec<HostSlot>) -> Result<BatchSummary> {
        if tasks.is_empty() || hostslots.is_empty() {
            return Ok(BatchSummary {
                total: tasks.len(),
                done: 0,
                failed: 0,
            });
        }
        for task in &tasks {
            task.validate()?;
        }

        // Kill leftovers from a previous run before dispatching anything;
        // racing a zombie batch for the same hosts corrupts both.
        let mut hostslots = hostslots;
        hostslots.shuffle(&mut rand::thread_rng());
        self.preflight(&hostslots).await?;

        // Shuffling decorrelates expensive tasks from any single host.
        let mut tasks = tasks;
        tasks.shuffle(&mut rand::thread_rng());

        let total = tasks.len();
        info!(total = total, hosts = hostslots.len(), "starting remote batch");

        let progress = Arc::new(if self.config.show_status {
            BatchProgress::new(total)
        } else {
            BatchProgress::silent(total)
        });
        let queue = Arc::new(WorkQueue::new());
        let limiter = Arc::new(RateLimiter::new(self.config.limiter.clone()));
        let runner = Arc::new(RemoteRunner::new(
            self.cache.clone(),
            self.shell.clone(),
            self.config.runner.clone(),
            self.engine_version.clone(),
        ));

        let workers: Vec<_> = hostslots
            .into_iter()
            .map(|slot| {
                let queue = queue.clone();
                let limiter = limiter.clone();
                let runner = runner.clone();
                let progress = progress.clone();
                tokio::spawn(async move {
                    worker_loop(slot, queue, limiter, runner, progress).await;
                })
            })
            .collect();

        for task in tasks {
            queue.put(task);
        }
        queue.join().await;

        for worker in &workers {
            worker.abort();
        }

        if let Some(fatal) = progress.take_fatal() {
            return Err(fatal);
        }

        let summary = BatchSummary::from(progress.snapshot());
        info!(
            done = summary.done,
            failed = summary.failed,
            total = summary.total,
            "remote batch complete"
        );
        Ok(summary)
    }

    /// Best-effort stale-worker cleanup on every distinct hostname. An
    /// unreachable host aborts the batch; a non-zero pkill exit does not
    /// (it also kills our own ssh session, and exits 1 when idle).
    async fn preflight(&self, hostslots: &[HostSlot]) -> Result<()> {
        let hostnames: HashSet<&str> = hostslots.iter().map(|s| s.hostname.as_str()).collect();
        for hostname in hostnames {
            let command = RemoteCommand::new("pkill")
                .arg("-f")
                .arg(STALE_WORKER_PATTERN);
            match self
                .shell
                .run(hostname, &command, Some(self.config.preflight_timeout))
                .await
            {
                Ok(status) => {
                    info!(host = %hostname, code = status.code, "pre-flight cleanup done");
                }
                Err(e) => {
                    error!(host = %hostname, error = %e, "pre-flight cleanup failed");
                    return Err(Error::HostUnreachable {
                        host: hostname.to_string(),
                        timeout_secs: self.config.preflight_timeout.as_secs(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One persistent worker bound to a host slot
async fn worker_loop(
    slot: HostSlot,
    queue: Arc<WorkQueue<Task>>,
    limiter: Arc<RateLimiter>,
    runner: Arc<RemoteRunner>,
    progress: Arc<BatchProgress>,
) {
    loop {
        let task = queue.get().await;
        limiter.admit(&slot.hostname).await;
        progress.mark_sent();

        match runner.execute(&task, &slot, &progress).await {
            Ok(_) => {}
            Err(e) => {
                // Batch-fatal (protocol violation or local transport
                // breakage): record it, count the task, keep draining so
                // join() can complete and surface the error.
                error!(task = %task, host = %slot.hostname, error = %e, "worker hit fatal error");
                warn!(host = %slot.hostname, "continuing drain after fatal error");
                progress.mark_failed();
                progress.record_fatal(e);
            }
        }

        progress.mark_done();
        queue.task_done();
    }
}

/// Validate and run a remote batch
pub async fn run_remote_experiments(
    cache: CacheStore,
    shell: Arc<dyn RemoteShell>,
    registry: &MatrixRegistry,
    config: BatchConfig,
    tasks: Vec<Task>,
    hostslots: Vec<HostSlot>,
    engine_version: &str,
) -> Result<BatchSummary> {
    registry.validate_all(&tasks)?;
    BatchCoordinator::new(cache, shell, config, engine_version)
        .run(tasks, hostslots)
        .await
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::{MockBehavior, MockShell};
    use crate::version::ENGINE_VERSION;
    use tempfile::TempDir;

    struct Fixture {
        _local: TempDir,
        _remote: TempDir,
        cache: CacheStore,
        shell: Arc<MockShell>,
    }

    fn fixture() -> Fixture {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        Fixture {
            cache: CacheStore::open(local.path()).unwrap(),
            shell: Arc::new(MockShell::new(remote.path())),
            _local: local,
            _remote: remote,
        }
    }

    fn fast_config() -> BatchConfig {
        BatchConfig {
            preflight_timeout: Duration::from_secs(1),
            runner: RemoteRunnerConfig {
                jitter_max: Duration::ZERO,
                exec_timeout: Some(Duration::from_secs(5)),
            },
            limiter: RateLimiterConfig {
                max_per_window: 100,
                window: Duration::from_secs(60),
                poll_interval: Duration::from_millis(1),
            },
            show_status: false,
        }
    }

    fn coordinator(f: &Fixture) -> BatchCoordinator {
        BatchCoordinator::new(
            f.cache.clone(),
            f.shell.clone(),
            fast_config(),
            ENGINE_VERSION,
        )
    }

    fn tasks(methods: &[&str]) -> Vec<Task> {
        methods
            .iter()
            .map(|m| Task::new("cric", "gbm", *m, "runtime"))
            .collect()
    }

    fn slots(entries: &[&str]) -> Vec<HostSlot> {
        HostSlot::parse_all(entries.iter().copied()).unwrap()
    }

    #[tokio::test]
    async fn test_batch_completes_and_caches_everything() {
        let f = fixture();
        let batch = tasks(&["tree_shap", "saabas", "coef", "random"]);
        let summary = coordinator(&f)
            .run(batch.clone(), slots(&["m1:/bin/bg", "m2:/bin/bg"]))
            .await
            .unwrap();

        assert_eq!(summary.done, 4);
        assert_eq!(summary.failed, 0);
        for task in &batch {
            assert!(f.cache.contains(&task.cache_key(ENGINE_VERSION)));
        }
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let f = fixture();
        f.shell.script("saabas", MockBehavior::ExitCode(2));
        f.shell.script("tree_gain", MockBehavior::ExitCode(1));

        let batch = tasks(&["tree_shap", "saabas", "coef", "tree_gain", "random"]);
        let summary = coordinator(&f)
            .run(batch, slots(&["m1:/bin/bg", "m2:/bin/bg", "m3:/bin/bg"]))
            .await
            .unwrap();

        // Failed tasks are counted, the rest still complete.
        assert_eq!(summary.done, 5);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_unreachable_host_aborts_preflight() {
        let f = fixture();
        f.shell.script("deadhost", MockBehavior::Timeout);

        let err = coordinator(&f)
            .run(
                tasks(&["coef"]),
                slots(&["m1:/bin/bg", "deadhost:/bin/bg"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HostUnreachable { host, .. } if host == "deadhost"));

        // Nothing was dispatched. Match the quoted argument so the
        // preflight pkill pattern (`'benchgrid run-one'`) is not counted.
        assert_eq!(f.shell.runs_matching("'run-one'"), 0);
    }

    #[tokio::test]
    async fn test_preflight_runs_once_per_distinct_host() {
        let f = fixture();
        coordinator(&f)
            .run(
                tasks(&["coef", "random"]),
                slots(&["m1:/bin/bg", "m1:/bin/bg", "m2:/bin/bg"]),
            )
            .await
            .unwrap();
        assert_eq!(f.shell.runs_matching("pkill"), 2);
    }

    #[tokio::test]
    async fn test_protocol_violation_surfaces_after_drain() {
        let f = fixture();
        f.shell.script("saabas", MockBehavior::SucceedNoArtifact);

        let batch = tasks(&["tree_shap", "saabas", "coef"]);
        let err = coordinator(&f)
            .run(batch, slots(&["m1:/bin/bg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { .. }));

        // The other tasks were still processed before the error surfaced.
        assert!(f.cache.contains(
            &Task::new("cric", "gbm", "tree_shap", "runtime").cache_key(ENGINE_VERSION)
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let f = fixture();
        let summary = coordinator(&f)
            .run(Vec::new(), slots(&["m1:/bin/bg"]))
            .await
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(f.shell.runs().len(), 0);
    }

    #[tokio::test]
    async fn test_cached_tasks_are_not_redispatched() {
        let f = fixture();
        let batch = tasks(&["coef"]);
        let c = coordinator(&f);

        c.run(batch.clone(), slots(&["m1:/bin/bg"])).await.unwrap();
        let dispatched_before = f.shell.runs_matching("'run-one'");
        c.run(batch, slots(&["m1:/bin/bg"])).await.unwrap();

        // Second run finds everything in the local cache. Match the quoted
        // argument so the preflight pkill pattern is not counted.
        assert_eq!(f.shell.runs_matching("'run-one'"), dispatched_before);
    }

    #[tokio::test]
    async fn test_run_remote_experiments_validates_first() {
        let f = fixture();
        let registry = MatrixRegistry::from_matrix();
        let bad = vec![Task::new("unknown_ds", "gbm", "coef", "runtime")];

        let err = run_remote_experiments(
            f.cache.clone(),
            f.shell.clone(),
            &registry,
            fast_config(),
            bad,
            slots(&["m1:/bin/bg"]),
            ENGINE_VERSION,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier { .. }));
        assert_eq!(f.shell.runs().len(), 0);
    }
}
