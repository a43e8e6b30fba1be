// src/pipeline/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactWatcher;
use crate::config::PreferenceSource;
use crate::debounce::DebounceTimer;
use crate::errors::Result;
use crate::exec::{BuildBackend, JobReport, JobState};
use crate::fs::FileSystem;
use crate::types::Epoch;
use crate::watch::{FileWatcher, forward_to};

use super::core::BuildCore;
use super::sink::{ArtifactViewer, BuildListener};
use super::{BuildEvent, BuildNotice, CoreCommand, RuntimeEvent};

/// How long shutdown waits for a cancelled build to report back.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What the runtime did, returned when it stops.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSummary {
    pub jobs_started: u64,
    /// How the last current build ended, if one did.
    pub last_state: Option<JobState>,
}

impl RuntimeSummary {
    /// Whether the last build exited with status 0.
    pub fn last_build_succeeded(&self) -> bool {
        matches!(self.last_state, Some(JobState::Completed(exit)) if exit.success())
    }
}

/// Drives [`BuildCore`] in response to `RuntimeEvent`s and performs the IO
/// it asks for: document watches, the build debounce timer, the build
/// backend, the listener and the artifact watcher.
///
/// All listener and viewer calls happen here, on one task, so output of
/// different builds can never interleave.
pub struct Runtime<B: BuildBackend> {
    core: BuildCore,
    prefs: Arc<dyn PreferenceSource>,
    backend: B,
    fs: Arc<dyn FileSystem>,
    listener: Box<dyn BuildListener>,
    artifact: ArtifactWatcher,
    document_file: Option<FileWatcher>,
    document_dir: Option<FileWatcher>,
    build_timer: DebounceTimer,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl<B: BuildBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl<B: BuildBackend> Runtime<B> {
    /// `channel` must be the same channel the backend reports into.
    pub fn new(
        core: BuildCore,
        channel: (mpsc::Sender<RuntimeEvent>, mpsc::Receiver<RuntimeEvent>),
        backend: B,
        prefs: Arc<dyn PreferenceSource>,
        fs: Arc<dyn FileSystem>,
        listener: Box<dyn BuildListener>,
        viewer: Box<dyn ArtifactViewer>,
    ) -> Self {
        let (event_tx, event_rx) = channel;
        let artifact = ArtifactWatcher::new(event_tx.clone(), Arc::clone(&fs), viewer);

        Self {
            core,
            prefs,
            backend,
            fs,
            listener,
            artifact,
            document_file: None,
            document_dir: None,
            build_timer: DebounceTimer::new("build"),
            event_tx,
            event_rx,
        }
    }

    /// Sender for feeding events (document changes, build requests,
    /// shutdown) into the running loop.
    pub fn sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.event_tx.clone()
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from the channel.
    /// - Feeds build events into the core and artifact events into the
    ///   artifact watcher.
    /// - Executes commands returned by the core.
    pub async fn run(mut self) -> Result<RuntimeSummary> {
        info!("livebuild runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            match event {
                RuntimeEvent::Build(BuildEvent::DebounceFired(token))
                    if !self.build_timer.accept(token) => {}
                RuntimeEvent::Build(event) => {
                    if !matches!(event, BuildEvent::Output { .. }) {
                        debug!(?event, "runtime received event");
                    }
                    if !self.step(event).await? {
                        info!("core requested exit; stopping runtime");
                        break;
                    }
                }
                RuntimeEvent::Artifact(event) => {
                    debug!(?event, "runtime received artifact event");
                    self.artifact.handle(event);
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.shutdown().await?;

        let summary = RuntimeSummary {
            jobs_started: self.core.jobs_started(),
            last_state: self.core.last_state().cloned(),
        };
        info!(jobs = summary.jobs_started, "runtime exiting");
        Ok(summary)
    }

    /// Feed one event into the core and execute everything it asks for.
    /// Returns whether the loop should keep running.
    async fn step(&mut self, event: BuildEvent) -> Result<bool> {
        let step = self.core.step(event, self.prefs.as_ref());
        let mut keep_running = step.keep_running;
        let mut pending: VecDeque<CoreCommand> = step.commands.into();

        while let Some(command) = pending.pop_front() {
            if let Some(feedback) = self.execute_command(command).await? {
                // Resolved synchronously so nothing else runs in between.
                let step = self.core.step(feedback, self.prefs.as_ref());
                keep_running &= step.keep_running;
                pending.extend(step.commands);
            }
        }

        Ok(keep_running)
    }

    /// Execute a single command from the core. Returns an event to feed back
    /// into the core when the command could not be carried out.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<BuildEvent>> {
        match command {
            CoreCommand::WatchDocument { file, dir, epoch } => {
                self.close_document_watches();
                self.document_dir = self.open_directory_watch(&dir, &file, epoch);
                return Ok(self.open_file_watch(&file, epoch));
            }
            CoreCommand::RewatchDocumentFile { file, epoch } => {
                self.close_document_file();
                return Ok(self.open_file_watch(&file, epoch));
            }
            CoreCommand::UnwatchDocumentFile => self.close_document_file(),
            CoreCommand::UnwatchDocument => self.close_document_watches(),
            CoreCommand::AssignArtifact(path) => self.artifact.assign(path),
            CoreCommand::ArmDebounce(delay) => {
                self.build_timer
                    .schedule(delay, self.event_tx.clone(), |token| {
                        RuntimeEvent::Build(BuildEvent::DebounceFired(token))
                    });
            }
            CoreCommand::CancelDebounce => {
                self.build_timer.cancel();
            }
            CoreCommand::CancelJob(job) => self.backend.cancel(job),
            CoreCommand::SubmitJob(job) => {
                let id = job.id;
                if let Err(err) = self.backend.submit(job).await {
                    warn!(job = %id, error = %err, "could not submit build");
                    return Ok(Some(BuildEvent::Completed(JobReport::spawn_failed(
                        id,
                        err.to_string(),
                    ))));
                }
            }
            CoreCommand::Notify(notice) => self.notify(notice),
            CoreCommand::ReportConfigError(err) => self.listener.on_config_error(&err),
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(None)
    }

    fn notify(&mut self, notice: BuildNotice) {
        match notice {
            BuildNotice::Started => self.listener.on_build_started(),
            BuildNotice::Cleared => self.listener.on_log_cleared(),
            BuildNotice::Output(text) => self.listener.on_build_output(&text),
            BuildNotice::Error(text) => self.listener.on_build_error(&text),
            BuildNotice::Finished => self.listener.on_build_finished(),
        }
    }

    fn open_file_watch(&mut self, file: &Path, epoch: Epoch) -> Option<BuildEvent> {
        let fs = Arc::clone(&self.fs);
        let document = file.to_path_buf();
        let handler = forward_to(self.event_tx.clone(), move |kind| {
            RuntimeEvent::Build(BuildEvent::DocumentChanged {
                epoch,
                kind,
                document_exists: fs.is_file(&document),
            })
        });

        match FileWatcher::open(file, handler) {
            Ok(watcher) => {
                self.document_file = Some(watcher);
                None
            }
            Err(err) => {
                warn!(error = %err, "document not watched");
                Some(BuildEvent::DocumentUnavailable { epoch })
            }
        }
    }

    fn open_directory_watch(&self, dir: &Path, file: &Path, epoch: Epoch) -> Option<FileWatcher> {
        let fs = Arc::clone(&self.fs);
        let document = file.to_path_buf();
        let handler = forward_to(self.event_tx.clone(), move |_kind| {
            RuntimeEvent::Build(BuildEvent::DocumentDirectoryChanged {
                epoch,
                document_exists: fs.is_file(&document),
            })
        });

        match FileWatcher::open(dir, handler) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "document directory not watched; a replaced document will not be picked up");
                None
            }
        }
    }

    fn close_document_file(&mut self) {
        if let Some(watcher) = self.document_file.take() {
            watcher.close();
        }
    }

    fn close_document_watches(&mut self) {
        self.close_document_file();
        if let Some(watcher) = self.document_dir.take() {
            watcher.close();
        }
    }

    /// Stop watching, cancel the build and give it a moment to exit.
    async fn shutdown(&mut self) -> Result<()> {
        for command in self.core.shutdown() {
            self.execute_command(command).await?;
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.backend.outstanding() > 0 {
            match tokio::time::timeout_at(deadline, self.event_rx.recv()).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = self.backend.outstanding(),
                        "build did not exit in time after cancellation"
                    );
                    break;
                }
            }
        }

        self.artifact.close();
        self.listener.on_closed();
        Ok(())
    }
}
