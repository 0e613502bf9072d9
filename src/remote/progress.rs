//! Batch progress accounting
//!
//! One shared context object owns the batch counters; workers mutate them
//! only through its methods, each of which takes the object's single mutex.
//! Counter semantics: `sent` = handed to a host, `done` = finished either
//! way, `failed` ⊆ done, and `sent - done` is the in-flight count.

use std::io::Write;

use parking_lot::Mutex;

use crate::error::Error;

#[derive(Debug, Default)]
struct ProgressState {
    sent: usize,
    done: usize,
    failed: usize,
    /// First batch-fatal error recorded by any worker
    fatal: Option<Error>,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub sent: usize,
    pub done: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// Tasks handed out but not yet finished
    pub fn running(&self) -> usize {
        self.sent - self.done
    }
}

/// Shared batch counters plus the single-line status reporter
pub struct BatchProgress {
    total: usize,
    show_status: bool,
    state: Mutex<ProgressState>,
}

impl BatchProgress {
    /// Progress for a batch of `total` tasks with status-line output
    pub fn new(total: usize) -> Self {
        Self {
            total,
            show_status: true,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Progress without status-line output (tests, library embedding)
    pub fn silent(total: usize) -> Self {
        Self {
            total,
            show_status: false,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Record a task handed to a host
    pub fn mark_sent(&self) {
        let mut state = self.state.lock();
        state.sent += 1;
        self.print_status(&state);
    }

    /// Record a task finished (successfully or not)
    pub fn mark_done(&self) {
        let mut state = self.state.lock();
        state.done += 1;
        self.print_status(&state);
    }

    /// Record a task-local failure
    pub fn mark_failed(&self) {
        let mut state = self.state.lock();
        state.failed += 1;
        self.print_status(&state);
    }

    /// Record a batch-fatal error; the first one wins
    pub fn record_fatal(&self, error: Error) {
        let mut state = self.state.lock();
        if state.fatal.is_none() {
            state.fatal = Some(error);
        }
    }

    /// Take the recorded fatal error, if any
    pub fn take_fatal(&self) -> Option<Error> {
        self.state.lock().fatal.take()
    }

    /// Current counter values
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock();
        ProgressSnapshot {
            total: self.total,
            sent: state.sent,
            done: state.done,
            failed: state.failed,
        }
    }

    /// Overwritable one-line status, emitted after every counter change
    fn print_status(&self, state: &ProgressState) {
        if !self.show_status {
            return;
        }
        let running = state.sent - state.done;
        eprint!(
            "\rBenchmark task {} of {} done ({} failed, {} running)",
            state.done, self.total, state.failed, running
        );
        let _ = std::io::stderr().flush();
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_lifecycle() {
        let progress = BatchProgress::silent(3);
        progress.mark_sent();
        progress.mark_sent();

        let snap = progress.snapshot();
        assert_eq!(snap.sent, 2);
        assert_eq!(snap.running(), 2);

        progress.mark_failed();
        progress.mark_done();
        progress.mark_done();

        let snap = progress.snapshot();
        assert_eq!(snap.done, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.running(), 0);
    }

    #[test]
    fn test_first_fatal_wins() {
        let progress = BatchProgress::silent(1);
        progress.record_fatal(Error::Internal("first".to_string()));
        progress.record_fatal(Error::Internal("second".to_string()));

        let fatal = progress.take_fatal().unwrap();
        assert!(fatal.to_string().contains("first"));
        assert!(progress.take_fatal().is_none());
    }

    #[test]
    fn test_concurrent_counting() {
        use std::sync::Arc;
        let progress = Arc::new(BatchProgress::silent(100));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let progress = progress.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    progress.mark_sent();
                    progress.mark_done();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = progress.snapshot();
        assert_eq!(snap.sent, 100);
        assert_eq!(snap.done, 100);
        assert_eq!(snap.running(), 0);
    }
}
