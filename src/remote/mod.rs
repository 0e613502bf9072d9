//! Distributed execution engine
//!
//! - [`queue`]: in-memory FIFO work queue with drain tracking
//! - [`limiter`]: per-host sliding-window connection admission
//! - [`shell`]: structured remote commands and the ssh/scp transport seam
//! - [`mock`]: network-free fleet simulator for tests
//! - [`progress`]: shared batch counters and the status line
//! - [`runner`]: single-task remote execution with cache short-circuit
//! - [`coordinator`]: whole-batch orchestration across host slots

pub mod coordinator;
pub mod limiter;
pub mod mock;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod shell;

pub use coordinator::{run_remote_experiments, BatchConfig, BatchCoordinator, BatchSummary};
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use progress::{BatchProgress, ProgressSnapshot};
pub use queue::WorkQueue;
pub use runner::{RemoteRunner, RemoteRunnerConfig, TaskOutcome};
pub use shell::{CommandStatus, RemoteCommand, RemoteShell, SshShell};
