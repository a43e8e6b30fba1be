use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use livebuild::errors::Result;
use livebuild::exec::{BuildBackend, BuildJob, ExitInfo, JobReport, JobState};
use livebuild::pipeline::{BuildEvent, RuntimeEvent};
use livebuild::types::{JobId, OutputStream};

/// Everything the runtime asked of the backend, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Submit(BuildJob),
    Cancel(JobId),
}

/// Shared view of a [`FakeBackend`], kept by the test after the backend has
/// been moved into the runtime.
#[derive(Debug, Clone)]
pub struct FakeBackendHandle {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    outstanding: Arc<Mutex<Vec<JobId>>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl FakeBackendHandle {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<BuildJob> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Submit(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Cancel(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Jobs submitted and not yet completed by the test.
    pub fn outstanding(&self) -> Vec<JobId> {
        self.outstanding.lock().unwrap().clone()
    }

    /// Emit a chunk of output for `job`, as a running process would.
    pub async fn emit(&self, job: JobId, stream: OutputStream, text: &str) {
        self.runtime_tx
            .send(RuntimeEvent::Build(BuildEvent::Output {
                job,
                stream,
                text: text.to_string(),
            }))
            .await
            .unwrap();
    }

    /// Report `job` as exited with `code`.
    pub async fn complete(&self, job: JobId, code: i32) {
        let exit = ExitInfo {
            code: Some(code),
            signal: None,
        };
        self.finish(JobReport {
            id: job,
            state: JobState::Completed(exit),
            exit: Some(exit),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
        .await;
    }

    /// Report `job` as cancelled (after SIGTERM).
    pub async fn complete_cancelled(&self, job: JobId) {
        self.finish(JobReport {
            id: job,
            state: JobState::Cancelled,
            exit: Some(ExitInfo {
                code: None,
                signal: Some(15),
            }),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
        .await;
    }

    async fn finish(&self, report: JobReport) {
        self.outstanding.lock().unwrap().retain(|id| *id != report.id);
        self.runtime_tx
            .send(RuntimeEvent::Build(BuildEvent::Completed(report)))
            .await
            .unwrap();
    }
}

/// A fake build backend that:
/// - records submitted jobs and cancellations
/// - never runs anything; the test decides when jobs produce output and
///   complete through its [`FakeBackendHandle`].
pub struct FakeBackend {
    handle: FakeBackendHandle,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> (Self, FakeBackendHandle) {
        let handle = FakeBackendHandle {
            calls: Arc::default(),
            outstanding: Arc::default(),
            runtime_tx,
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl BuildBackend for FakeBackend {
    fn submit(&mut self, job: BuildJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let calls = Arc::clone(&self.handle.calls);
        let outstanding = Arc::clone(&self.handle.outstanding);

        Box::pin(async move {
            outstanding.lock().unwrap().push(job.id);
            calls.lock().unwrap().push(BackendCall::Submit(job));
            Ok(())
        })
    }

    fn cancel(&mut self, job: JobId) {
        self.handle.calls.lock().unwrap().push(BackendCall::Cancel(job));
    }

    fn outstanding(&self) -> usize {
        // Jobs are only ever completed by the test; don't hold up shutdown.
        0
    }
}
