// src/pipeline/event_handlers.rs

//! Event handling logic for the build core.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Preferences;
use crate::errors::LivebuildError;
use crate::exec::{BuildJob, JobReport, JobState};
use crate::pipeline::core::BuildCore;
use crate::pipeline::PipelineState;
use crate::template::{DocumentPaths, is_blank_script};
use crate::types::{ChangeKind, Epoch, JobId, OutputStream};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug)]
pub enum CoreCommand {
    /// Replace both document watches (file and containing directory).
    WatchDocument {
        file: PathBuf,
        dir: PathBuf,
        epoch: Epoch,
    },
    /// Reopen the file watch only; the directory watch stays.
    RewatchDocumentFile { file: PathBuf, epoch: Epoch },
    UnwatchDocumentFile,
    UnwatchDocument,
    /// Retarget the artifact watcher (`None` stops it).
    AssignArtifact(Option<PathBuf>),
    /// (Re)arm the build debounce timer.
    ArmDebounce(Duration),
    CancelDebounce,
    CancelJob(JobId),
    SubmitJob(BuildJob),
    Notify(BuildNotice),
    ReportConfigError(LivebuildError),
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}

/// What the build listener should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildNotice {
    Started,
    Cleared,
    Output(String),
    Error(String),
    Finished,
}

/// Decision returned by the core after handling a single `BuildEvent`.
#[derive(Debug)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Retarget the pipeline to a new document (or none).
///
/// Everything tied to the previous document is torn down first: watches,
/// pending debounce, running build.
pub fn handle_set_document(
    core: &mut BuildCore,
    document: Option<PathBuf>,
    prefs: impl FnOnce() -> Preferences,
) -> CoreStep {
    core.document_epoch += 1;
    core.document_watch_lost = false;

    let mut commands = vec![CoreCommand::UnwatchDocument, CoreCommand::CancelDebounce];
    if let Some(job) = core.current_job.take() {
        commands.push(CoreCommand::CancelJob(job));
        commands.push(CoreCommand::Notify(BuildNotice::Finished));
    }
    core.state = PipelineState::Idle;

    core.document = document.as_deref().and_then(DocumentPaths::from_document);
    if document.is_some() && core.document.is_none() {
        warn!(?document, "not a usable document path; nothing to watch");
    }

    let Some(paths) = core.document.clone() else {
        commands.push(CoreCommand::AssignArtifact(None));
        return CoreStep::continue_with(commands);
    };

    info!(document = ?paths.file_path, epoch = core.document_epoch, "tracking document");

    let prefs = prefs();
    commands.push(CoreCommand::WatchDocument {
        file: paths.file_path.clone(),
        dir: paths.dir_path.clone(),
        epoch: core.document_epoch,
    });
    commands.push(CoreCommand::AssignArtifact(Some(
        paths.artifact_path(&prefs.artifact_extension),
    )));

    CoreStep::continue_with(commands)
}

/// Handle a change reported by the document file watch.
pub fn handle_document_changed(
    core: &mut BuildCore,
    epoch: Epoch,
    kind: ChangeKind,
    document_exists: bool,
    prefs: impl FnOnce() -> Preferences,
) -> CoreStep {
    if !core.is_current_epoch(epoch) {
        return CoreStep::continue_with(Vec::new());
    }

    let mut commands = Vec::new();

    if kind.intersects(ChangeKind::REMOVED | ChangeKind::RENAMED) {
        match core.document_file() {
            // Replaced under the same name (atomic save): the old watch
            // follows the old file.
            Some(file) if document_exists => {
                commands.push(CoreCommand::RewatchDocumentFile { file, epoch });
                commands.extend(on_write(core, prefs));
            }
            _ => {
                debug!(?kind, "document went away; waiting for it to reappear");
                core.document_watch_lost = true;
                commands.push(CoreCommand::UnwatchDocumentFile);
            }
        }
        return CoreStep::continue_with(commands);
    }

    if kind.contains(ChangeKind::WRITTEN) {
        commands.extend(on_write(core, prefs));
    }

    CoreStep::continue_with(commands)
}

/// Handle a change in the document's directory.
///
/// Only the document's own existence transitions matter here; other
/// entries coming and going (build by-products) are ignored.
pub fn handle_document_directory_changed(
    core: &mut BuildCore,
    epoch: Epoch,
    document_exists: bool,
    prefs: impl FnOnce() -> Preferences,
) -> CoreStep {
    if !core.is_current_epoch(epoch) {
        return CoreStep::continue_with(Vec::new());
    }

    let mut commands = Vec::new();

    match (core.document_watch_lost, document_exists) {
        (true, true) => {
            if let Some(file) = core.document_file() {
                info!(document = ?file, "document reappeared");
                core.document_watch_lost = false;
                commands.push(CoreCommand::RewatchDocumentFile { file, epoch });
                commands.extend(on_write(core, prefs));
            }
        }
        (false, false) => {
            debug!("document disappeared from its directory");
            core.document_watch_lost = true;
            commands.push(CoreCommand::UnwatchDocumentFile);
        }
        _ => {}
    }

    CoreStep::continue_with(commands)
}

/// The document file watch could not be (re)opened.
pub fn handle_document_unavailable(core: &mut BuildCore, epoch: Epoch) -> CoreStep {
    if core.is_current_epoch(epoch) {
        core.document_watch_lost = true;
    }
    CoreStep::continue_with(Vec::new())
}

/// The build debounce timer fired.
pub fn handle_debounce_fired(
    core: &mut BuildCore,
    prefs: impl FnOnce() -> Preferences,
) -> CoreStep {
    match core.state {
        PipelineState::Debouncing | PipelineState::RunningWithPendingRerun => {
            start_build(core, prefs)
        }
        state => {
            debug!(?state, "debounce fired with nothing pending; ignoring");
            CoreStep::continue_with(Vec::new())
        }
    }
}

/// Explicit build request. Never gated by the auto-build setting.
pub fn handle_run_now(core: &mut BuildCore, prefs: impl FnOnce() -> Preferences) -> CoreStep {
    if core.document.is_none() {
        warn!("build requested but no document is set");
        return CoreStep::continue_with(Vec::new());
    }

    let mut step = start_build(core, prefs);
    step.commands.insert(0, CoreCommand::CancelDebounce);
    step
}

/// Forward output of the current job; drop output of superseded jobs.
pub fn handle_output(
    core: &BuildCore,
    job: JobId,
    stream: OutputStream,
    text: String,
) -> CoreStep {
    if core.current_job != Some(job) {
        debug!(%job, current = ?core.current_job, "discarding output of superseded build");
        return CoreStep::continue_with(Vec::new());
    }

    let notice = match stream {
        OutputStream::Stdout => BuildNotice::Output(text),
        OutputStream::Stderr => BuildNotice::Error(text),
    };
    CoreStep::continue_with(vec![CoreCommand::Notify(notice)])
}

/// Handle a job completion report.
pub fn handle_completion(core: &mut BuildCore, report: JobReport) -> CoreStep {
    if core.current_job != Some(report.id) {
        debug!(job = %report.id, current = ?core.current_job, "discarding completion of superseded build");
        return CoreStep::continue_with(Vec::new());
    }

    core.current_job = None;
    let mut commands = Vec::new();

    match report.state {
        JobState::SpawnFailed(ref reason) => {
            commands.push(CoreCommand::Notify(BuildNotice::Error(format!(
                "{reason}\n"
            ))));
        }
        JobState::Completed(exit) if !exit.success() => {
            info!(job = %report.id, code = ?exit.code, signal = ?exit.signal, "build exited unsuccessfully");
        }
        _ => {}
    }
    commands.push(CoreCommand::Notify(BuildNotice::Finished));
    core.last_state = Some(report.state);

    core.state = match core.state {
        // The debounce timer is still armed for the rerun.
        PipelineState::RunningWithPendingRerun => PipelineState::Debouncing,
        _ => PipelineState::Idle,
    };

    finish_step(core, commands)
}

/// React to a "written" change of the current document.
fn on_write(core: &mut BuildCore, prefs: impl FnOnce() -> Preferences) -> Vec<CoreCommand> {
    let prefs = prefs();
    if !prefs.auto_build_enabled {
        debug!("document written; auto-build disabled");
        return Vec::new();
    }

    core.state = match core.state {
        PipelineState::Idle | PipelineState::Debouncing => PipelineState::Debouncing,
        PipelineState::Running | PipelineState::RunningWithPendingRerun => {
            PipelineState::RunningWithPendingRerun
        }
    };
    debug!(delay = ?prefs.auto_build_delay, state = ?core.state, "arming build debounce");

    vec![CoreCommand::ArmDebounce(prefs.auto_build_delay)]
}

/// Cancel whatever runs, clear the log and submit a fresh job.
fn start_build(core: &mut BuildCore, prefs: impl FnOnce() -> Preferences) -> CoreStep {
    let mut commands = Vec::new();

    let cancelled = core.current_job.take();
    if let Some(job) = cancelled {
        info!(%job, "cancelling running build");
        commands.push(CoreCommand::CancelJob(job));
    }
    commands.push(CoreCommand::Notify(BuildNotice::Cleared));

    let Some(paths) = core.document.clone() else {
        core.state = PipelineState::Idle;
        if cancelled.is_some() {
            commands.push(CoreCommand::Notify(BuildNotice::Finished));
        }
        return finish_step(core, commands);
    };

    let prefs = prefs();
    let script = prefs.script.render(&paths);

    if is_blank_script(&script) {
        warn!("build script is empty; nothing to run");
        core.state = PipelineState::Idle;
        commands.push(CoreCommand::ReportConfigError(LivebuildError::EmptyScript));
        if cancelled.is_some() {
            commands.push(CoreCommand::Notify(BuildNotice::Finished));
        }
        return finish_step(core, commands);
    }

    core.next_job += 1;
    let id = JobId(core.next_job);
    core.current_job = Some(id);
    core.state = PipelineState::Running;

    info!(job = %id, dir = ?paths.dir_path, "submitting build");
    commands.push(CoreCommand::SubmitJob(BuildJob {
        id,
        script,
        working_dir: paths.dir_path,
    }));
    commands.push(CoreCommand::Notify(BuildNotice::Started));

    CoreStep::continue_with(commands)
}

/// In `--once` mode, exit as soon as the pipeline is idle.
fn finish_step(core: &BuildCore, mut commands: Vec<CoreCommand>) -> CoreStep {
    let mut keep_running = true;
    if core.options.exit_when_idle && core.state == PipelineState::Idle {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
