// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The runtime talks to a `BuildBackend` instead of the work queue directly.
//! This makes it easy to swap in a fake backend in tests while keeping the
//! process-spawning implementation in [`runner`](super::runner).
//!
//! - `RealBuildBackend` is the default implementation used by `livebuild`.
//!   It wraps [`spawn_work_queue`] and forwards jobs to the background worker.
//! - Tests can provide their own `BuildBackend` that, for example, records
//!   which jobs were submitted and emits `BuildEvent::Completed` on demand.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::pipeline::RuntimeEvent;
use crate::types::JobId;

use super::job::BuildJob;
use super::queue::{WorkQueue, spawn_work_queue};

/// Trait abstracting how build jobs are executed.
///
/// Implementations must report every accepted job exactly once through a
/// `BuildEvent::Completed` on the runtime channel, cancelled jobs included.
pub trait BuildBackend: Send {
    /// Queue a job behind any job still running.
    fn submit(&mut self, job: BuildJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Request cancellation of a queued or running job. Unknown ids are
    /// ignored.
    fn cancel(&mut self, job: JobId);

    /// Jobs accepted but not yet reported as completed.
    fn outstanding(&self) -> usize;
}

/// Real build backend used in production.
pub struct RealBuildBackend {
    queue: WorkQueue,
}

impl RealBuildBackend {
    /// Create a new backend, wiring it to the given runtime event sender.
    ///
    /// This spawns the background worker immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            queue: spawn_work_queue(runtime_tx),
        }
    }
}

impl BuildBackend for RealBuildBackend {
    fn submit(&mut self, job: BuildJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let queue = self.queue.clone();
        Box::pin(async move { queue.submit(job).map(|_| ()) })
    }

    fn cancel(&mut self, job: JobId) {
        if !self.queue.cancel(job) {
            tracing::debug!(%job, "cancel ignored; job already finished");
        }
    }

    fn outstanding(&self) -> usize {
        self.queue.outstanding()
    }
}
