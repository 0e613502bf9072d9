//! Remote task execution
//!
//! Runs one task on one host: local cache short-circuit, jittered session
//! start, out-of-process invocation of the engine's own `run-one` entry point
//! over the remote shell, then retrieval of the artifact the remote side
//! wrote. The remote invocation performs its own cache check with the same
//! key derivation, so re-sending a task is idempotent.

use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::remote::progress::BatchProgress;
use crate::remote::shell::{RemoteCommand, RemoteShell};
use crate::types::{HostSlot, Task};

/// How one remote execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Result was already in the local cache; nothing was sent
    CachedLocal,
    /// Remote run succeeded and the artifact was retrieved
    Completed,
    /// Remote run failed or timed out; counted, batch continues
    Failed,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RemoteRunnerConfig {
    /// Upper bound of the random pre-connection jitter
    pub jitter_max: Duration,
    /// Timeout for one remote execution; `None` waits indefinitely
    pub exec_timeout: Option<Duration>,
}

impl Default for RemoteRunnerConfig {
    fn default() -> Self {
        Self {
            jitter_max: Duration::from_secs(5),
            exec_timeout: Some(Duration::from_secs(3600)),
        }
    }
}

/// Executes single tasks on remote hosts
pub struct RemoteRunner {
    cache: CacheStore,
    shell: std::sync::Arc<dyn RemoteShell>,
    config: RemoteRunnerConfig,
    engine_version: String,
}

impl RemoteRunner {
    pub fn new(
        cache: CacheStore,
        shell: std::sync::Arc<dyn RemoteShell>,
        config: RemoteRunnerConfig,
        engine_version: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            shell,
            config,
            engine_version: engine_version.into(),
        }
    }

    /// Execute one task on one host slot.
    ///
    /// Task-local failures (non-zero remote exit, timeout) are recorded in
    /// `progress` and returned as [`TaskOutcome::Failed`]; they never abort
    /// the worker. A missing artifact after a successful remote run is a
    /// protocol violation and comes back as a hard error.
    pub async fn execute(
        &self,
        task: &Task,
        slot: &HostSlot,
        progress: &BatchProgress,
    ) -> Result<TaskOutcome> {
        let key = task.cache_key(&self.engine_version);

        // Reruns of a partially completed batch skip straight past.
        if self.cache.get(&key)?.is_some() {
            return Ok(TaskOutcome::CachedLocal);
        }

        // Spread session starts out so a fresh batch doesn't open every
        // connection in the same instant.
        let jitter_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=self.config.jitter_max.as_millis() as u64)
        };
        if jitter_ms > 0 {
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        let command = self.build_command(task, &key, slot);
        let rendered = command.render();
        info!(task = %task, host = %slot.hostname, "dispatching remote experiment");

        let status = match self
            .shell
            .run(&slot.hostname, &command, self.config.exec_timeout)
            .await
        {
            Ok(status) => status,
            Err(e @ Error::RemoteTimeout { .. }) => {
                warn!(task = %task, host = %slot.hostname, error = %e, "remote execution timed out");
                progress.mark_failed();
                return Ok(TaskOutcome::Failed);
            }
            Err(e) => return Err(e),
        };

        if !status.success() {
            error!(
                task = %task,
                host = %slot.hostname,
                code = status.code,
                command = %rendered,
                stderr = %status.stderr.trim(),
                "remote command failed"
            );
            progress.mark_failed();
            return Ok(TaskOutcome::Failed);
        }

        // Pull the artifact the remote side wrote under the same key.
        // Staged under a temp name first so a concurrent cache reader never
        // sees a partially copied file.
        let result_path = self.cache.path_for(&key);
        let staging = self
            .cache
            .dir()
            .join(format!(".{}.{}.fetch", key, std::process::id()));
        if let Err(e) = self
            .shell
            .fetch(&slot.hostname, &result_path, &staging)
            .await
        {
            let _ = std::fs::remove_file(&staging);
            warn!(task = %task, host = %slot.hostname, error = %e, "result retrieval failed");
            return Err(Error::ProtocolViolation {
                host: slot.hostname.clone(),
                path: result_path,
            });
        }
        std::fs::rename(&staging, &result_path).map_err(|e| Error::IoWrite {
            path: result_path.clone(),
            source: e,
        })?;

        if !self.cache.contains(&key) {
            return Err(Error::ProtocolViolation {
                host: slot.hostname.clone(),
                path: result_path,
            });
        }

        Ok(TaskOutcome::Completed)
    }

    /// Build the structured remote invocation for a task
    fn build_command(&self, task: &Task, key: &str, slot: &HostSlot) -> RemoteCommand {
        let cache_dir = self.cache.dir().to_string_lossy().to_string();
        RemoteCommand::new(&slot.remote_binary)
            .env("CUDA_VISIBLE_DEVICES", "")
            .arg("run-one")
            .args(task.fields().map(str::to_string))
            .arg("--cache-dir")
            .arg(&cache_dir)
            .redirect_to(self.cache.dir().join(format!("{}.output", key)))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
