//! Mock remote shell
//!
//! Simulates a fleet without any network: the "remote filesystem" is a local
//! directory, successful `run-one` invocations write the result artifact
//! there exactly like a real remote engine would, and `fetch` copies it back.
//! Behaviors can be scripted per host or per command substring to exercise
//! failure isolation, timeouts and protocol violations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::types::{CachedResult, ScoreValue, Task};
use crate::version::ENGINE_VERSION;

use super::shell::{CommandStatus, RemoteCommand, RemoteShell};

/// Scripted outcome for a matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Exit 0 and write the result artifact to the mock remote filesystem
    Succeed,
    /// Exit with the given non-zero code
    ExitCode(i32),
    /// Simulate a transport timeout
    Timeout,
    /// Exit 0 but write no artifact (protocol violation on retrieval)
    SucceedNoArtifact,
}

/// One recorded `run` invocation
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub host: String,
    pub rendered: String,
    pub timeout: Option<Duration>,
}

/// In-memory fleet simulator implementing [`RemoteShell`]
pub struct MockShell {
    /// Directory standing in for every host's cache directory
    remote_dir: PathBuf,
    /// (needle, behavior): first needle found in the hostname or rendered
    /// command wins
    rules: Mutex<Vec<(String, MockBehavior)>>,
    calls: Mutex<Vec<RecordedRun>>,
    fetched: Mutex<Vec<PathBuf>>,
}

impl MockShell {
    pub fn new(remote_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_dir: remote_dir.into(),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Script a behavior for runs whose hostname or rendered command
    /// contains `needle`
    pub fn script(&self, needle: impl Into<String>, behavior: MockBehavior) {
        self.rules.lock().push((needle.into(), behavior));
    }

    /// All recorded run invocations
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.calls.lock().clone()
    }

    /// Local destination paths of recorded `fetch` calls
    pub fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().clone()
    }

    /// Recorded runs whose rendered command contains `needle`
    pub fn runs_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|r| r.rendered.contains(needle))
            .count()
    }

    fn behavior_for(&self, host: &str, rendered: &str) -> MockBehavior {
        self.rules
            .lock()
            .iter()
            .find(|(needle, _)| host.contains(needle.as_str()) || rendered.contains(needle.as_str()))
            .map(|(_, b)| *b)
            .unwrap_or(MockBehavior::Succeed)
    }

    /// Write the artifact a real remote engine would produce for a
    /// `run-one` invocation
    fn write_artifact(&self, command: &RemoteCommand) -> Result<()> {
        let args = command.arg_list();
        if args.first().map(String::as_str) != Some("run-one") || args.len() < 5 {
            return Ok(());
        }
        let task = Task::new(
            args[1].clone(),
            args[2].clone(),
            args[3].clone(),
            args[4].clone(),
        );
        let key = task.cache_key(ENGINE_VERSION);
        let result = CachedResult::new(ScoreValue::Scalar(0.5), ENGINE_VERSION);
        let bytes = serde_json::to_vec(&result).map_err(Error::CacheEncode)?;
        fs::write(self.remote_dir.join(format!("{}.json", key)), bytes)?;
        Ok(())
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn run(
        &self,
        host: &str,
        command: &RemoteCommand,
        timeout: Option<Duration>,
    ) -> Result<CommandStatus> {
        let rendered = command.render();
        self.calls.lock().push(RecordedRun {
            host: host.to_string(),
            rendered: rendered.clone(),
            timeout,
        });

        match self.behavior_for(host, &rendered) {
            MockBehavior::Succeed => {
                self.write_artifact(command)?;
                Ok(CommandStatus {
                    code: 0,
                    stderr: String::new(),
                })
            }
            MockBehavior::ExitCode(code) => Ok(CommandStatus {
                code,
                stderr: format!("scripted failure on {}", host),
            }),
            MockBehavior::Timeout => Err(Error::RemoteTimeout {
                host: host.to_string(),
                timeout_secs: timeout.map_or(0, |t| t.as_secs()),
            }),
            MockBehavior::SucceedNoArtifact => Ok(CommandStatus {
                code: 0,
                stderr: String::new(),
            }),
        }
    }

    async fn fetch(&self, host: &str, remote_path: &Path, local_path: &Path) -> Result<()> {
        self.fetched.lock().push(local_path.to_path_buf());
        let file_name = remote_path
            .file_name()
            .ok_or_else(|| Error::Internal("fetch of pathless remote file".to_string()))?;
        let source = self.remote_dir.join(file_name);
        if !source.is_file() {
            return Err(Error::RemoteExit {
                host: host.to_string(),
                code: 1,
            });
        }
        fs::copy(&source, local_path).map_err(|e| Error::IoWrite {
            path: local_path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_one_command(method: &str) -> RemoteCommand {
        RemoteCommand::new("/usr/bin/benchgrid").args([
            "run-one",
            "cric",
            "gbm",
            method,
            "runtime",
        ])
    }

    #[tokio::test]
    async fn test_successful_run_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let shell = MockShell::new(dir.path());

        let status = shell
            .run("m1", &run_one_command("tree_shap"), None)
            .await
            .unwrap();
        assert!(status.success());

        let key = Task::new("cric", "gbm", "tree_shap", "runtime").cache_key(ENGINE_VERSION);
        assert!(dir.path().join(format!("{}.json", key)).is_file());
    }

    #[tokio::test]
    async fn test_scripted_exit_code() {
        let dir = TempDir::new().unwrap();
        let shell = MockShell::new(dir.path());
        shell.script("saabas", MockBehavior::ExitCode(3));

        let status = shell.run("m1", &run_one_command("saabas"), None).await.unwrap();
        assert_eq!(status.code, 3);
        // Other commands still succeed.
        let status = shell.run("m1", &run_one_command("coef"), None).await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_scripted_timeout_by_host() {
        let dir = TempDir::new().unwrap();
        let shell = MockShell::new(dir.path());
        shell.script("deadhost", MockBehavior::Timeout);

        let err = shell
            .run("deadhost", &run_one_command("coef"), Some(Duration::from_secs(15)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteTimeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_roundtrip() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let shell = MockShell::new(remote.path());

        shell
            .run("m1", &run_one_command("coef"), None)
            .await
            .unwrap();

        let key = Task::new("cric", "gbm", "coef", "runtime").cache_key(ENGINE_VERSION);
        let name = format!("{}.json", key);
        let local_path = local.path().join(&name);
        shell
            .fetch("m1", &PathBuf::from("/tmp/cache").join(&name), &local_path)
            .await
            .unwrap();
        assert!(local_path.is_file());
    }

    #[tokio::test]
    async fn test_fetch_missing_artifact_fails() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let shell = MockShell::new(remote.path());

        let err = shell
            .fetch("m1", Path::new("/tmp/cache/absent.json"), &local.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteExit { .. }));
    }

    #[tokio::test]
    async fn test_records_runs() {
        let dir = TempDir::new().unwrap();
        let shell = MockShell::new(dir.path());
        shell.run("m1", &run_one_command("coef"), None).await.unwrap();
        shell.run("m2", &run_one_command("random"), None).await.unwrap();

        assert_eq!(shell.runs().len(), 2);
        assert_eq!(shell.runs_matching("random"), 1);
    }
}
