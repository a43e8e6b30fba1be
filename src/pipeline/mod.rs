// src/pipeline/mod.rs

//! Build orchestration for livebuild.
//!
//! This module ties together:
//! - the document watch (file + containing directory)
//! - the build debounce timer
//! - the single-slot build work queue
//! - the artifact watcher
//! - the external build listener
//!
//! The pure core state machine lives in [`core`] (with its handlers in
//! [`event_handlers`]); the async/IO shell is implemented in [`runtime`].

use std::path::PathBuf;

use crate::artifact::ArtifactEvent;
use crate::debounce::DebounceToken;
use crate::exec::JobReport;
use crate::types::{ChangeKind, Epoch, JobId, OutputStream};

/// Where the pipeline is for its current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    /// A write was seen and the build debounce timer is armed.
    Debouncing,
    Running,
    /// A build is running and another write armed the debounce timer; when
    /// it fires, the running build is cancelled and replaced.
    RunningWithPendingRerun,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit once the current build finishes (used for `--once`).
    pub exit_when_idle: bool,
}

/// Events that drive the build side of the pipeline.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// Start (or stop, with `None`) tracking a source document.
    SetDocument(Option<PathBuf>),
    /// The document file watch reported a change; `document_exists` was
    /// sampled when the event was forwarded.
    DocumentChanged {
        epoch: Epoch,
        kind: ChangeKind,
        document_exists: bool,
    },
    /// The document file could not be watched.
    DocumentUnavailable { epoch: Epoch },
    /// The document's directory changed; `document_exists` was sampled when
    /// the event was forwarded.
    DocumentDirectoryChanged { epoch: Epoch, document_exists: bool },
    /// The build debounce timer fired (already accepted by the shell).
    DebounceFired(DebounceToken),
    /// Build immediately, regardless of auto-build settings.
    RunNow,
    /// A chunk of decoded output from a build process.
    Output {
        job: JobId,
        stream: OutputStream,
        text: String,
    },
    /// A build job finished (exited, was cancelled, or failed to spawn).
    Completed(JobReport),
}

/// Events flowing into the runtime from watchers, timers, the work queue and
/// the front-end.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Build(BuildEvent),
    Artifact(ArtifactEvent),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

impl From<BuildEvent> for RuntimeEvent {
    fn from(event: BuildEvent) -> Self {
        RuntimeEvent::Build(event)
    }
}

impl From<ArtifactEvent> for RuntimeEvent {
    fn from(event: ArtifactEvent) -> Self {
        RuntimeEvent::Artifact(event)
    }
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod sink;

pub use self::core::BuildCore;
pub use self::event_handlers::{BuildNotice, CoreCommand, CoreStep};
pub use self::runtime::{Runtime, RuntimeSummary};
pub use self::sink::{ArtifactViewer, BuildListener, ConsoleListener, LogViewer};
