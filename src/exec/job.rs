// src/exec/job.rs

//! Build job request, run state and completion report.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::types::JobId;

/// One build attempt as decided by the pipeline core: rendered script plus
/// the directory to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub id: JobId,
    pub script: String,
    pub working_dir: PathBuf,
}

/// How the build process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (unix only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Lifecycle of a job inside the work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    /// Cancelled before or while running.
    Cancelled,
    /// The process exited on its own. A non-zero code is still a completion.
    Completed(ExitInfo),
    /// The OS refused to start the process.
    SpawnFailed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending | JobState::Running)
    }
}

/// Sent exactly once per submitted job, after the process (if any) exited and
/// both output readers were detached.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: JobId,
    pub state: JobState,
    /// Exit status, also present for a cancelled job that had started.
    pub exit: Option<ExitInfo>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl JobReport {
    pub fn spawn_failed(id: JobId, reason: impl Into<String>) -> Self {
        Self {
            id,
            state: JobState::SpawnFailed(reason.into()),
            exit: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    pub fn cancelled_before_start(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Cancelled,
            exit: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Full stdout, decoded lossily.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Full stderr, decoded lossily.
    pub fn error(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Shared control block for a submitted job: cancellation flag plus the
/// current run state.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    cancel_tx: Arc<watch::Sender<bool>>,
    state: Arc<Mutex<JobState>>,
}

impl JobHandle {
    pub fn new(id: JobId) -> Self {
        let (cancel_tx, _rx) = watch::channel(false);
        Self {
            id,
            cancel_tx: Arc::new(cancel_tx),
            state: Arc::new(Mutex::new(JobState::Pending)),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Request cancellation. Idempotent; a job that already finished is
    /// unaffected.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Receiver that observes the cancellation request.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    pub fn state(&self) -> JobState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_state(&self, state: JobState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }
}
