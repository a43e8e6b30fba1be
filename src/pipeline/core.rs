// src/pipeline/core.rs

//! Pure build state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`BuildEvent`]s and produces:
//! - an updated pipeline state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`pipeline::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - opening and closing watches, arming timers
//! - submitting and cancelling jobs on the work queue
//! - calling the build listener and the artifact viewer
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use std::path::PathBuf;

use crate::config::PreferenceSource;
use crate::exec::JobState;
use crate::pipeline::event_handlers::{
    CoreCommand, CoreStep, handle_completion, handle_debounce_fired,
    handle_document_changed, handle_document_directory_changed, handle_document_unavailable,
    handle_output, handle_run_now, handle_set_document,
};
use crate::pipeline::{BuildEvent, PipelineState, RuntimeOptions};
use crate::template::DocumentPaths;
use crate::types::{Epoch, JobId};

/// Pure build pipeline state.
///
/// This owns:
/// - the current document and its watch epoch
/// - the id of the one job that counts as current
/// - runtime options (e.g. `exit_when_idle`)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
/// Preferences are read through a [`PreferenceSource`] only when an event
/// actually needs them.
#[derive(Debug, Default)]
pub struct BuildCore {
    pub(super) state: PipelineState,
    pub(super) document: Option<DocumentPaths>,
    /// Bumped on every retarget; watch events carry the epoch they were
    /// subscribed with.
    pub(super) document_epoch: Epoch,
    /// The file watch was dropped because the document went away; the
    /// directory watch brings it back.
    pub(super) document_watch_lost: bool,
    /// Output and completions of any other job are stale.
    pub(super) current_job: Option<JobId>,
    pub(super) next_job: u64,
    pub(super) last_state: Option<JobState>,
    pub(super) options: RuntimeOptions,
}

impl BuildCore {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn document(&self) -> Option<&DocumentPaths> {
        self.document.as_ref()
    }

    pub fn document_epoch(&self) -> Epoch {
        self.document_epoch
    }

    /// The job whose output is currently forwarded, if any.
    pub fn current_job(&self) -> Option<JobId> {
        self.current_job
    }

    /// How the most recent current job ended.
    pub fn last_state(&self) -> Option<&JobState> {
        self.last_state.as_ref()
    }

    /// Number of jobs submitted so far.
    pub fn jobs_started(&self) -> u64 {
        self.next_job
    }

    pub(super) fn document_file(&self) -> Option<PathBuf> {
        self.document.as_ref().map(|paths| paths.file_path.clone())
    }

    pub(super) fn is_current_epoch(&self, epoch: Epoch) -> bool {
        if epoch != self.document_epoch {
            tracing::debug!(epoch, current = self.document_epoch, "ignoring stale document event");
            return false;
        }
        self.document.is_some()
    }

    /// Handle a single build event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: BuildEvent, prefs: &dyn PreferenceSource) -> CoreStep {
        let load = || prefs.load();

        match event {
            BuildEvent::SetDocument(document) => handle_set_document(self, document, load),
            BuildEvent::DocumentChanged {
                epoch,
                kind,
                document_exists,
            } => handle_document_changed(self, epoch, kind, document_exists, load),
            BuildEvent::DocumentDirectoryChanged {
                epoch,
                document_exists,
            } => handle_document_directory_changed(self, epoch, document_exists, load),
            BuildEvent::DocumentUnavailable { epoch } => handle_document_unavailable(self, epoch),
            BuildEvent::DebounceFired(_) => handle_debounce_fired(self, load),
            BuildEvent::RunNow => handle_run_now(self, load),
            BuildEvent::Output { job, stream, text } => handle_output(self, job, stream, text),
            BuildEvent::Completed(report) => handle_completion(self, report),
        }
    }

    /// Commands that stop everything in flight before the shell exits.
    pub fn shutdown(&mut self) -> Vec<CoreCommand> {
        self.state = PipelineState::Idle;
        let mut commands = vec![CoreCommand::CancelDebounce];
        if let Some(job) = self.current_job.take() {
            commands.push(CoreCommand::CancelJob(job));
        }
        commands.push(CoreCommand::UnwatchDocument);
        commands.push(CoreCommand::AssignArtifact(None));
        commands
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::config::{Preferences, StaticPreferences};
    use crate::errors::LivebuildError;
    use crate::exec::{BuildJob, ExitInfo, JobReport};
    use crate::pipeline::BuildNotice;
    use crate::template::ScriptTemplate;
    use crate::types::{ChangeKind, OutputStream};

    fn prefs(auto: bool, script: &str) -> StaticPreferences {
        StaticPreferences(Preferences {
            auto_build_enabled: auto,
            auto_build_delay: Duration::from_secs(2),
            script: ScriptTemplate::new(script),
            artifact_extension: "pdf".to_string(),
        })
    }

    fn auto() -> StaticPreferences {
        prefs(true, "platex {filename}.tex")
    }

    fn tracking(options: RuntimeOptions, prefs: &StaticPreferences) -> BuildCore {
        let mut core = BuildCore::new(options);
        core.step(
            BuildEvent::SetDocument(Some(PathBuf::from("/work/paper.tex"))),
            prefs,
        );
        core
    }

    fn written(core: &BuildCore) -> BuildEvent {
        BuildEvent::DocumentChanged {
            epoch: core.document_epoch(),
            kind: ChangeKind::WRITTEN,
            document_exists: true,
        }
    }

    fn fired() -> BuildEvent {
        // The shell only forwards accepted tokens; the core ignores the value.
        BuildEvent::DebounceFired(crate::debounce::DebounceToken::for_tests(1))
    }

    fn submitted(step: &CoreStep) -> Vec<&BuildJob> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::SubmitJob(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    fn cancelled(step: &CoreStep) -> Vec<JobId> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::CancelJob(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn notices(step: &CoreStep) -> Vec<BuildNotice> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Notify(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    fn completed(id: JobId, code: i32) -> BuildEvent {
        BuildEvent::Completed(JobReport {
            id,
            state: JobState::Completed(ExitInfo {
                code: Some(code),
                signal: None,
            }),
            exit: Some(ExitInfo {
                code: Some(code),
                signal: None,
            }),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    #[test]
    fn set_document_watches_file_directory_and_artifact() {
        let prefs = auto();
        let mut core = BuildCore::new(RuntimeOptions::default());
        let step = core.step(
            BuildEvent::SetDocument(Some(PathBuf::from("/work/paper.tex"))),
            &prefs,
        );

        assert!(step.keep_running);
        assert!(matches!(step.commands[0], CoreCommand::UnwatchDocument));
        assert!(step.commands.iter().any(|c| matches!(
            c,
            CoreCommand::WatchDocument { file, dir, epoch: 1 }
                if file == Path::new("/work/paper.tex") && dir == Path::new("/work")
        )));
        assert!(step.commands.iter().any(|c| matches!(
            c,
            CoreCommand::AssignArtifact(Some(path)) if path == Path::new("/work/paper.pdf")
        )));
        assert_eq!(core.state(), PipelineState::Idle);
    }

    #[test]
    fn write_arms_debounce_when_auto_build_enabled() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(written(&core), &prefs);
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::ArmDebounce(d)] if *d == Duration::from_secs(2)
        ));
        assert_eq!(core.state(), PipelineState::Debouncing);

        // Further writes re-arm; still debouncing.
        let step = core.step(written(&core), &prefs);
        assert!(matches!(step.commands.as_slice(), [CoreCommand::ArmDebounce(_)]));
        assert_eq!(core.state(), PipelineState::Debouncing);
    }

    #[test]
    fn write_is_ignored_when_auto_build_disabled() {
        let prefs = prefs(false, "make");
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(written(&core), &prefs);
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), PipelineState::Idle);
    }

    #[test]
    fn metadata_only_changes_do_not_trigger() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(
            BuildEvent::DocumentChanged {
                epoch: core.document_epoch(),
                kind: ChangeKind::LINK_CHANGED | ChangeKind::REVOKED,
                document_exists: true,
            },
            &prefs,
        );
        assert!(step.commands.is_empty());
    }

    #[test]
    fn debounce_fire_submits_job_in_document_directory() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(written(&core), &prefs);

        let step = core.step(fired(), &prefs);
        let jobs = submitted(&step);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].script, "platex paper.tex");
        assert_eq!(jobs[0].working_dir, PathBuf::from("/work"));
        assert_eq!(
            notices(&step),
            vec![BuildNotice::Cleared, BuildNotice::Started]
        );
        assert_eq!(core.state(), PipelineState::Running);
        assert_eq!(core.current_job(), Some(jobs[0].id));
    }

    #[test]
    fn stray_fire_while_idle_is_ignored() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(fired(), &prefs);
        assert!(step.commands.is_empty());
    }

    #[test]
    fn write_during_build_cancels_and_replaces_after_debounce() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(written(&core), &prefs);
        core.step(fired(), &prefs);
        let first = core.current_job().unwrap();

        core.step(written(&core), &prefs);
        assert_eq!(core.state(), PipelineState::RunningWithPendingRerun);

        let step = core.step(fired(), &prefs);
        assert_eq!(cancelled(&step), vec![first]);
        let jobs = submitted(&step);
        assert_eq!(jobs.len(), 1);
        assert_ne!(jobs[0].id, first);

        // Cancel precedes submit.
        let cancel_at = step
            .commands
            .iter()
            .position(|c| matches!(c, CoreCommand::CancelJob(_)))
            .unwrap();
        let submit_at = step
            .commands
            .iter()
            .position(|c| matches!(c, CoreCommand::SubmitJob(_)))
            .unwrap();
        assert!(cancel_at < submit_at);
    }

    #[test]
    fn completion_while_rerun_pending_keeps_debouncing() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(written(&core), &prefs);
        core.step(fired(), &prefs);
        let job = core.current_job().unwrap();
        core.step(written(&core), &prefs);

        let step = core.step(completed(job, 0), &prefs);
        assert_eq!(notices(&step), vec![BuildNotice::Finished]);
        assert_eq!(core.state(), PipelineState::Debouncing);

        let step = core.step(fired(), &prefs);
        assert!(cancelled(&step).is_empty());
        assert_eq!(submitted(&step).len(), 1);
    }

    #[test]
    fn run_now_cancels_running_job_and_pending_debounce() {
        let prefs = prefs(false, "make");
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(BuildEvent::RunNow, &prefs);
        let first = submitted(&step)[0].id;

        let step = core.step(BuildEvent::RunNow, &prefs);
        assert!(matches!(step.commands[0], CoreCommand::CancelDebounce));
        assert_eq!(cancelled(&step), vec![first]);
        let jobs = submitted(&step);
        assert_eq!(jobs.len(), 1);
        assert_eq!(core.current_job(), Some(jobs[0].id));
        assert_eq!(core.state(), PipelineState::Running);
    }

    #[test]
    fn run_now_without_document_does_nothing() {
        let prefs = auto();
        let mut core = BuildCore::new(RuntimeOptions::default());

        let step = core.step(BuildEvent::RunNow, &prefs);
        assert!(step.commands.is_empty());
        assert_eq!(core.jobs_started(), 0);
    }

    #[test]
    fn empty_script_reports_config_error_and_stays_idle() {
        let prefs = prefs(true, "  \n\t ");
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(written(&core), &prefs);

        let step = core.step(fired(), &prefs);
        assert!(submitted(&step).is_empty());
        assert!(step.commands.iter().any(|c| matches!(
            c,
            CoreCommand::ReportConfigError(LivebuildError::EmptyScript)
        )));
        assert_eq!(core.state(), PipelineState::Idle);
        assert_eq!(core.jobs_started(), 0);
    }

    #[test]
    fn empty_script_after_cancel_still_finishes_previous_build() {
        let runnable = prefs(false, "make");
        let mut core = tracking(RuntimeOptions::default(), &runnable);
        core.step(BuildEvent::RunNow, &runnable);
        let job = core.current_job().unwrap();

        let empty = prefs(false, "");
        let step = core.step(BuildEvent::RunNow, &empty);
        assert_eq!(cancelled(&step), vec![job]);
        assert!(notices(&step).contains(&BuildNotice::Finished));
        assert_eq!(core.current_job(), None);
        assert_eq!(core.state(), PipelineState::Idle);
    }

    #[test]
    fn output_of_current_job_is_forwarded_by_stream() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let job = core.current_job().unwrap();

        let step = core.step(
            BuildEvent::Output {
                job,
                stream: OutputStream::Stdout,
                text: "This is pdfTeX".into(),
            },
            &prefs,
        );
        assert_eq!(notices(&step), vec![BuildNotice::Output("This is pdfTeX".into())]);

        let step = core.step(
            BuildEvent::Output {
                job,
                stream: OutputStream::Stderr,
                text: "! Undefined control sequence.".into(),
            },
            &prefs,
        );
        assert_eq!(
            notices(&step),
            vec![BuildNotice::Error("! Undefined control sequence.".into())]
        );
    }

    #[test]
    fn output_and_completion_of_superseded_job_are_discarded() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let old = core.current_job().unwrap();
        core.step(BuildEvent::RunNow, &prefs);
        let new = core.current_job().unwrap();

        let step = core.step(
            BuildEvent::Output {
                job: old,
                stream: OutputStream::Stdout,
                text: "late".into(),
            },
            &prefs,
        );
        assert!(step.commands.is_empty());

        let step = core.step(completed(old, 143), &prefs);
        assert!(step.commands.is_empty());
        assert_eq!(core.current_job(), Some(new));
        assert_eq!(core.state(), PipelineState::Running);
    }

    #[test]
    fn completion_returns_to_idle_and_records_outcome() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let job = core.current_job().unwrap();

        let step = core.step(completed(job, 1), &prefs);
        assert!(step.keep_running);
        assert_eq!(notices(&step), vec![BuildNotice::Finished]);
        assert_eq!(core.state(), PipelineState::Idle);
        assert!(matches!(
            core.last_state(),
            Some(JobState::Completed(exit)) if exit.code == Some(1)
        ));
    }

    #[test]
    fn spawn_failure_is_surfaced_as_build_error() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let job = core.current_job().unwrap();

        let step = core.step(
            BuildEvent::Completed(JobReport::spawn_failed(job, "No such file or directory")),
            &prefs,
        );
        assert_eq!(
            notices(&step),
            vec![
                BuildNotice::Error("No such file or directory\n".into()),
                BuildNotice::Finished
            ]
        );
        assert_eq!(core.state(), PipelineState::Idle);
    }

    #[test]
    fn once_mode_exits_after_build_finishes() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions { exit_when_idle: true }, &prefs);
        let step = core.step(BuildEvent::RunNow, &prefs);
        assert!(step.keep_running);
        let job = core.current_job().unwrap();

        let step = core.step(completed(job, 0), &prefs);
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
    }

    #[test]
    fn once_mode_exits_on_empty_script() {
        let prefs = prefs(false, "");
        let mut core = tracking(RuntimeOptions { exit_when_idle: true }, &prefs);

        let step = core.step(BuildEvent::RunNow, &prefs);
        assert!(!step.keep_running);
    }

    #[test]
    fn events_from_previous_document_are_ignored() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        let old_epoch = core.document_epoch();

        core.step(
            BuildEvent::SetDocument(Some(PathBuf::from("/other/notes.tex"))),
            &prefs,
        );
        let step = core.step(
            BuildEvent::DocumentChanged {
                epoch: old_epoch,
                kind: ChangeKind::WRITTEN,
                document_exists: true,
            },
            &prefs,
        );
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), PipelineState::Idle);
    }

    #[test]
    fn switching_document_cancels_running_build() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let job = core.current_job().unwrap();

        let step = core.step(BuildEvent::SetDocument(None), &prefs);
        assert_eq!(cancelled(&step), vec![job]);
        assert!(step
            .commands
            .iter()
            .any(|c| matches!(c, CoreCommand::AssignArtifact(None))));
        assert_eq!(core.current_job(), None);
        assert!(core.document().is_none());
    }

    #[test]
    fn removed_document_is_rewatched_when_directory_shows_it_again() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        let epoch = core.document_epoch();

        let step = core.step(
            BuildEvent::DocumentChanged {
                epoch,
                kind: ChangeKind::REMOVED,
                document_exists: false,
            },
            &prefs,
        );
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::UnwatchDocumentFile]
        ));

        let step = core.step(
            BuildEvent::DocumentDirectoryChanged {
                epoch,
                document_exists: true,
            },
            &prefs,
        );
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::RewatchDocumentFile { .. }, CoreCommand::ArmDebounce(_)]
        ));
        assert_eq!(core.state(), PipelineState::Debouncing);
    }

    #[test]
    fn atomic_replace_rewatches_immediately() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(
            BuildEvent::DocumentChanged {
                epoch: core.document_epoch(),
                kind: ChangeKind::RENAMED,
                document_exists: true,
            },
            &prefs,
        );
        assert!(matches!(
            step.commands.as_slice(),
            [CoreCommand::RewatchDocumentFile { .. }, CoreCommand::ArmDebounce(_)]
        ));
    }

    #[test]
    fn directory_churn_without_transition_is_ignored() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);

        let step = core.step(
            BuildEvent::DocumentDirectoryChanged {
                epoch: core.document_epoch(),
                document_exists: true,
            },
            &prefs,
        );
        assert!(step.commands.is_empty());
    }

    #[test]
    fn shutdown_cancels_in_flight_work() {
        let prefs = auto();
        let mut core = tracking(RuntimeOptions::default(), &prefs);
        core.step(BuildEvent::RunNow, &prefs);
        let job = core.current_job().unwrap();

        let commands = core.shutdown();
        assert!(commands
            .iter()
            .any(|c| matches!(c, CoreCommand::CancelJob(id) if *id == job)));
        assert!(matches!(commands[0], CoreCommand::CancelDebounce));
        assert_eq!(core.current_job(), None);
    }
}
