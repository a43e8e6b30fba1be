// src/exec/queue.rs

//! Single-slot build work queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::exec::job::{BuildJob, JobHandle};
use crate::exec::runner::run_job;
use crate::pipeline::{BuildEvent, RuntimeEvent};
use crate::types::JobId;

type ActiveJobs = Arc<Mutex<HashMap<JobId, JobHandle>>>;

/// Handle to the background worker that runs build jobs one at a time, in
/// submission order.
///
/// Every submitted job produces exactly one [`BuildEvent::Completed`] on the
/// runtime channel, including jobs cancelled while still waiting in the
/// backlog.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<(BuildJob, JobHandle)>,
    active: ActiveJobs,
    outstanding: Arc<AtomicUsize>,
}

impl WorkQueue {
    /// Add a job to the backlog and return its control handle.
    pub fn submit(&self, job: BuildJob) -> Result<JobHandle> {
        let handle = JobHandle::new(job.id);
        lock(&self.active).insert(job.id, handle.clone());
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        if let Err(err) = self.tx.send((job, handle.clone())) {
            let (job, _) = err.0;
            lock(&self.active).remove(&job.id);
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::msg(format!(
                "build work queue is closed; dropped job {}",
                job.id
            ))
            .into());
        }

        debug!(job = %handle.id(), outstanding = self.outstanding(), "job queued");
        Ok(handle)
    }

    /// Request cancellation of `job`. Returns `false` if it already finished
    /// or was never submitted here.
    pub fn cancel(&self, job: JobId) -> bool {
        match lock(&self.active).get(&job) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every queued or running job.
    pub fn cancel_all(&self) {
        for handle in lock(&self.active).values() {
            handle.cancel();
        }
    }

    /// Jobs submitted but not yet reported as completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Spawn the background worker loop.
///
/// Jobs are run strictly one after another; per queue there is never more
/// than one build process alive.
pub fn spawn_work_queue(runtime_tx: mpsc::Sender<RuntimeEvent>) -> WorkQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<(BuildJob, JobHandle)>();
    let active: ActiveJobs = Arc::default();
    let outstanding = Arc::new(AtomicUsize::new(0));

    let queue = WorkQueue {
        tx,
        active: Arc::clone(&active),
        outstanding: Arc::clone(&outstanding),
    };

    tokio::spawn(async move {
        info!("build work queue started");

        while let Some((job, handle)) = rx.recv().await {
            let id = job.id;
            let report = run_job(job, handle, runtime_tx.clone()).await;

            lock(&active).remove(&id);
            outstanding.fetch_sub(1, Ordering::SeqCst);

            if runtime_tx
                .send(RuntimeEvent::Build(BuildEvent::Completed(report)))
                .await
                .is_err()
            {
                debug!(job = %id, "runtime gone; stopping work queue");
                break;
            }
        }

        info!("build work queue finished (channel closed)");
    });

    queue
}

fn lock(active: &ActiveJobs) -> std::sync::MutexGuard<'_, HashMap<JobId, JobHandle>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
