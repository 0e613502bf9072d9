//! Remote shell transport
//!
//! The seam between the engine and ssh/scp. Commands are built as structured
//! argument lists with explicit environment assignments, rendered only at the
//! transport boundary; identifiers are validated long before they get here,
//! so no user-controlled string is ever interpolated into a shell unchecked.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Remote Command
// ─────────────────────────────────────────────────────────────────

/// A structured remote invocation: environment assignments, a program,
/// arguments, and an optional combined-output redirect on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    env: Vec<(String, String)>,
    program: String,
    args: Vec<String>,
    redirect_to: Option<PathBuf>,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            env: Vec::new(),
            program: program.into(),
            args: Vec::new(),
            redirect_to: None,
        }
    }

    /// Add an environment assignment prefixed to the command
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Redirect combined stdout/stderr to a file on the remote host
    pub fn redirect_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.redirect_to = Some(path.into());
        self
    }

    /// The program being invoked
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument list (without the program)
    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    /// Render the single-line command executed by the remote shell.
    /// Every word is single-quoted; environment assignments use `env` so
    /// the rendering stays a plain argv prefix.
    pub fn render(&self) -> String {
        let mut words: Vec<String> = Vec::new();
        if !self.env.is_empty() {
            words.push("env".to_string());
            for (k, v) in &self.env {
                words.push(quote(&format!("{}={}", k, v)));
            }
        }
        words.push(quote(&self.program));
        words.extend(self.args.iter().map(|a| quote(a)));

        let mut line = words.join(" ");
        if let Some(path) = &self.redirect_to {
            line.push_str(&format!(" > {} 2>&1", quote(&path.to_string_lossy())));
        }
        line
    }
}

/// Single-quote a word for the remote shell, escaping embedded quotes
fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

// ─────────────────────────────────────────────────────────────────
// Transport Seam
// ─────────────────────────────────────────────────────────────────

/// Outcome of a completed (not timed-out) remote command
#[derive(Debug, Clone)]
pub struct CommandStatus {
    /// Remote exit code; -1 if terminated by signal
    pub code: i32,
    /// Captured stderr of the transport process
    pub stderr: String,
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Executes commands and retrieves files on remote hosts
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a command on `host`, waiting for completion. `Ok` carries the
    /// remote exit status; `Err` means the transport failed (spawn error
    /// or timeout).
    async fn run(
        &self,
        host: &str,
        command: &RemoteCommand,
        timeout: Option<Duration>,
    ) -> Result<CommandStatus>;

    /// Copy `host:remote_path` to `local_path`
    async fn fetch(&self, host: &str, remote_path: &Path, local_path: &Path) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────
// SSH Implementation
// ─────────────────────────────────────────────────────────────────

/// ssh/scp-backed transport. Authentication is assumed pre-configured
/// (keys and ssh-config aliases).
#[derive(Debug, Clone)]
pub struct SshShell {
    ssh_program: String,
    scp_program: String,
}

impl SshShell {
    pub fn new() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
        }
    }

    /// Transport with explicit ssh/scp programs (tests substitute shims)
    pub fn with_programs(ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        Self {
            ssh_program: ssh.into(),
            scp_program: scp.into(),
        }
    }
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(
        &self,
        host: &str,
        command: &RemoteCommand,
        timeout: Option<Duration>,
    ) -> Result<CommandStatus> {
        let rendered = command.render();
        trace!(host = %host, command = %rendered, "ssh spawn");

        let mut child = Command::new(&self.ssh_program)
            .arg(host)
            .arg(&rendered)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::SshSpawn {
                program: self.ssh_program.clone(),
                source: e,
            })?;

        // Drain stderr concurrently with the wait: a child that fills the
        // pipe would otherwise block in write() while we block in wait().
        let stderr_pipe = child.stderr.take();
        let drain = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = match timeout {
            Some(limit) => tokio::select! {
                status = child.wait() => status,
                _ = tokio::time::sleep(limit) => {
                    debug!(host = %host, timeout_secs = limit.as_secs(), "ssh timed out, killing");
                    let _ = child.kill().await;
                    return Err(Error::RemoteTimeout {
                        host: host.to_string(),
                        timeout_secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| Error::SshSpawn {
            program: self.ssh_program.clone(),
            source: e,
        })?;

        let stderr = drain.await.unwrap_or_default();

        Ok(CommandStatus {
            code: status.code().unwrap_or(-1),
            stderr,
        })
    }

    async fn fetch(&self, host: &str, remote_path: &Path, local_path: &Path) -> Result<()> {
        let source = format!("{}:{}", host, remote_path.display());
        trace!(host = %host, source = %source, dest = %local_path.display(), "scp fetch");

        let output = Command::new(&self.scp_program)
            .arg(&source)
            .arg(local_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::SshSpawn {
                program: self.scp_program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(Error::RemoteExit {
                host: host.to_string(),
                code: output.status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
