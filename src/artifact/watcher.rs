// src/artifact/watcher.rs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::artifact::state::{ArtifactCommand, ArtifactState};
use crate::artifact::{ArtifactEvent, RELOAD_DEBOUNCE};
use crate::debounce::DebounceTimer;
use crate::fs::FileSystem;
use crate::pipeline::{ArtifactViewer, RuntimeEvent};
use crate::types::Epoch;
use crate::watch::{FileWatcher, forward_to};

/// Owns the artifact's directory and file watches, its reload timer and the
/// viewer, and carries out what [`ArtifactState`] decides.
///
/// Watch events are sent into the runtime channel and handed back through
/// [`ArtifactWatcher::handle`] on the event loop.
pub struct ArtifactWatcher {
    state: ArtifactState,
    directory: Option<FileWatcher>,
    file: Option<FileWatcher>,
    reload_timer: DebounceTimer,
    events: mpsc::Sender<RuntimeEvent>,
    fs: Arc<dyn FileSystem>,
    viewer: Box<dyn ArtifactViewer>,
}

impl std::fmt::Debug for ArtifactWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWatcher")
            .field("state", &self.state)
            .field("directory", &self.directory)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl ArtifactWatcher {
    pub fn new(
        events: mpsc::Sender<RuntimeEvent>,
        fs: Arc<dyn FileSystem>,
        viewer: Box<dyn ArtifactViewer>,
    ) -> Self {
        Self {
            state: ArtifactState::new(),
            directory: None,
            file: None,
            reload_timer: DebounceTimer::new("artifact-reload"),
            events,
            fs,
            viewer,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.state.path()
    }

    pub fn exists(&self) -> bool {
        self.state.exists()
    }

    /// Start tracking `path`, or stop with `None`.
    pub fn assign(&mut self, path: Option<PathBuf>) {
        if let Some(ref path) = path {
            info!(?path, "tracking artifact");
        }
        let exists = path.as_deref().is_some_and(|p| self.fs.is_file(p));
        let commands = self.state.assign(path, exists);
        self.apply(commands);
    }

    pub fn handle(&mut self, event: ArtifactEvent) {
        let commands = match event {
            ArtifactEvent::DirectoryChanged { epoch, exists } => {
                self.state.directory_changed(epoch, exists)
            }
            ArtifactEvent::FileChanged {
                epoch,
                kind,
                exists,
            } => self.state.file_changed(epoch, kind, exists),
            ArtifactEvent::ReloadFired(token) => {
                if !self.reload_timer.accept(token) {
                    return;
                }
                self.state.reload_fired()
            }
            ArtifactEvent::ReloadRequested => self.state.reload_requested(),
        };
        self.apply(commands);
    }

    /// Release both watches and drop any pending reload.
    pub fn close(&mut self) {
        self.reload_timer.cancel();
        self.close_file();
        if let Some(directory) = self.directory.take() {
            directory.close();
        }
    }

    fn apply(&mut self, commands: Vec<ArtifactCommand>) {
        let mut queue: VecDeque<_> = commands.into();

        while let Some(command) = queue.pop_front() {
            debug!(?command, "artifact command");
            match command {
                ArtifactCommand::WatchDirectory { dir, epoch } => {
                    self.directory = self.open_directory_watch(&dir, epoch);
                }
                ArtifactCommand::WatchFile { path, epoch } => {
                    self.close_file();
                    match self.open_file_watch(&path, epoch) {
                        Some(watcher) => self.file = Some(watcher),
                        None => queue.extend(self.state.file_unavailable(epoch)),
                    }
                }
                ArtifactCommand::UnwatchFile => self.close_file(),
                ArtifactCommand::UnwatchAll => self.close(),
                ArtifactCommand::ScheduleReload => {
                    self.reload_timer
                        .schedule(RELOAD_DEBOUNCE, self.events.clone(), |token| {
                            RuntimeEvent::Artifact(ArtifactEvent::ReloadFired(token))
                        });
                }
                ArtifactCommand::CancelReload => {
                    self.reload_timer.cancel();
                }
                ArtifactCommand::Reload {
                    path,
                    restore_position,
                } => {
                    info!(?path, restore_position, "reloading artifact");
                    self.viewer.on_artifact_changed(&path, restore_position);
                }
            }
        }
    }

    fn open_directory_watch(&self, dir: &Path, epoch: Epoch) -> Option<FileWatcher> {
        let artifact = self.state.path()?.to_path_buf();
        let fs = Arc::clone(&self.fs);
        let handler = forward_to(self.events.clone(), move |_kind| {
            RuntimeEvent::Artifact(ArtifactEvent::DirectoryChanged {
                epoch,
                exists: fs.is_file(&artifact),
            })
        });

        match FileWatcher::open(dir, handler) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "artifact directory not watched; artifact changes will be missed");
                None
            }
        }
    }

    fn open_file_watch(&self, path: &Path, epoch: Epoch) -> Option<FileWatcher> {
        let fs = Arc::clone(&self.fs);
        let artifact = path.to_path_buf();
        let handler = forward_to(self.events.clone(), move |kind| {
            RuntimeEvent::Artifact(ArtifactEvent::FileChanged {
                epoch,
                kind,
                exists: fs.is_file(&artifact),
            })
        });

        match FileWatcher::open(path, handler) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                debug!(error = %err, "artifact file not watched yet");
                None
            }
        }
    }

    fn close_file(&mut self) {
        if let Some(file) = self.file.take() {
            file.close();
        }
    }
}

impl Drop for ArtifactWatcher {
    fn drop(&mut self) {
        self.close();
    }
}
